//! TAGE (Tagged Geometric History Length) branch predictor.
//!
//! A bimodal base table backed by up to eight tagged tables indexed with
//! geometrically increasing history lengths (8, 16, ... 64 bits). Each
//! lookup selects a **provider** (longest-history tag hit) and an **alt
//! provider** (second longest); the alt prediction is used when the
//! provider entry has not yet proven useful. On mispredictions, entries are
//! allocated into longer-history tables, aging the useful bits of occupied
//! cells that were skipped.

use crate::bpred::history::BitWindow;
use crate::common::Address;

/// Saturation of the base-table counters.
const T0_COUNTER_MAX: u32 = 7;
/// Saturation of the tagged-table counters.
const TI_COUNTER_MAX: u32 = 7;
/// Saturation of the alt-preference counter.
const USE_ALT_COUNTER_MAX: u32 = 7;

/// Entries in the bimodal base table.
const BASE_PREDICTOR_SIZE: usize = 128;
/// Width of the tagged-table tags.
const TAGE_TAG_BITS: u32 = 14;
/// New entries allocated per misprediction.
const MAX_ALLOCATIONS: u32 = 1;

/// Width of the global direction history.
pub const HIST_BUFFER_SIZE: u32 = 64;

/// Per-table history lengths; slot 0 is a placeholder for the base table.
const HIST_LENGTHS: [u32; 9] = [0, 8, 16, 24, 32, 40, 48, 56, 64];

/// One tagged-table cell.
#[derive(Debug, Clone, Copy, Default)]
struct TageEntry {
    counter: u32,
    tag: u64,
    useful: bool,
}

/// TAGE direction predictor.
///
/// Table 0 is the bimodal base; tables `1..=table_num` are tagged. The
/// provider/alt scratch fields are written by every lookup and consumed by
/// the matching update.
pub struct Tage {
    table_num: usize,
    index_size: u32,
    idx_mask: u64,
    tag_mask: u64,

    /// Global direction history, newest outcome at bit 0.
    history: u64,
    /// Prefer the alt provider when the provider is unproven.
    use_alt_on_na: u32,

    base: [u32; BASE_PREDICTOR_SIZE],
    /// Tagged tables; slot 0 is unused (the base table lives separately).
    tables: Vec<Vec<TageEntry>>,

    provider_index: usize,
    alt_provider_index: usize,
    provider_pred_index: usize,
    provider_pred: bool,
    alt_provider_pred: bool,
}

impl Tage {
    /// Creates a predictor with `table_num` tagged tables of
    /// `1 << index_size` entries each.
    ///
    /// # Panics
    ///
    /// Panics if `table_num` is not in `[1, 8]` or `index_size` is not in
    /// `[2, 64]`.
    pub fn new(table_num: usize, index_size: u32) -> Self {
        assert!(
            (1..=8).contains(&table_num),
            "TAGE supports 1 to 8 tagged tables, got {table_num}"
        );
        assert!(
            (2..=64).contains(&index_size),
            "TAGE index size must be in [2, 64], got {index_size}"
        );

        let entry_count = 1usize
            .checked_shl(index_size)
            .expect("TAGE tables of 2^index_size entries must be addressable");
        let mut tables = Vec::with_capacity(table_num + 1);
        tables.push(Vec::new());
        for _ in 1..=table_num {
            tables.push(vec![TageEntry::default(); entry_count]);
        }

        let idx_mask = if index_size == 64 {
            u64::MAX
        } else {
            (1u64 << index_size) - 1
        };

        Self {
            table_num,
            index_size,
            idx_mask,
            tag_mask: (1u64 << TAGE_TAG_BITS) - 1,
            history: 0,
            use_alt_on_na: 0,
            base: [T0_COUNTER_MAX / 2; BASE_PREDICTOR_SIZE],
            tables,
            provider_index: 0,
            alt_provider_index: 0,
            provider_pred_index: 0,
            provider_pred: false,
            alt_provider_pred: false,
        }
    }

    /// Predicts the branch at `pc`, trains on the resolved direction, and
    /// returns whether the prediction was correct.
    pub fn predict(&mut self, pc: Address, taken: bool, target: Address) -> bool {
        let pred = self.get_prediction(pc);
        self.update_predictor(pc, taken, pred, target);
        taken == pred
    }

    /// Returns the predicted direction for the branch at `pc`.
    ///
    /// Fills the provider/alt scratch state consumed by
    /// [`Tage::update_predictor`]. Repeated calls with no intervening
    /// update return the same value.
    pub fn get_prediction(&mut self, pc: Address) -> bool {
        let provider_useful_null = self.lookup(pc);
        if provider_useful_null && self.use_alt_on_na > USE_ALT_COUNTER_MAX / 2 {
            self.alt_provider_pred
        } else {
            self.provider_pred
        }
    }

    /// Trains the predictor on a resolved branch.
    ///
    /// `pred_dir` is the direction previously returned by
    /// [`Tage::get_prediction`] for the same branch.
    pub fn update_predictor(
        &mut self,
        pc: Address,
        resolve_dir: bool,
        pred_dir: bool,
        _target: Address,
    ) {
        self.update_provider_counter(resolve_dir);

        // A misprediction earns the branch an entry with longer history.
        if resolve_dir != pred_dir {
            self.allocate_new_entries(pc);
        }

        // Only a disagreement between alt and provider tells us which of
        // the two to trust next time.
        if self.alt_provider_pred != self.provider_pred {
            if self.alt_provider_pred == resolve_dir {
                self.set_useful(false);
                if self.use_alt_on_na < USE_ALT_COUNTER_MAX {
                    self.use_alt_on_na += 1;
                }
            } else {
                self.set_useful(true);
                if self.use_alt_on_na > 0 {
                    self.use_alt_on_na -= 1;
                }
            }
        }

        self.history = (self.history << 1) | u64::from(resolve_dir);
    }

    /// Finds the provider and alt provider for `pc`.
    ///
    /// Returns whether the provider entry's useful bit is clear (only
    /// meaningful when the provider is a tagged table).
    fn lookup(&mut self, pc: Address) -> bool {
        let mut provider = None;
        let mut alt = None;
        let mut provider_useful_null = false;

        for table in (1..=self.table_num).rev() {
            if provider.is_some() && alt.is_some() {
                break;
            }
            let idx = self.tage_index(pc, table) as usize;
            let tag = self.tage_tag(pc, table);
            let entry = self.tables[table][idx];
            if entry.tag == tag {
                if provider.is_none() {
                    provider = Some(table);
                    self.provider_pred_index = idx;
                    self.provider_pred = entry.counter > TI_COUNTER_MAX / 2;
                    provider_useful_null = !entry.useful;
                } else {
                    alt = Some(table);
                    self.alt_provider_pred = entry.counter >= TI_COUNTER_MAX / 2;
                }
            }
        }

        if provider.is_none() || alt.is_none() {
            let base_idx = (pc as usize) % BASE_PREDICTOR_SIZE;
            let counter = self.base[base_idx];
            if provider.is_none() {
                provider = Some(0);
                self.provider_pred_index = base_idx;
                self.provider_pred = counter > T0_COUNTER_MAX / 2;
            }
            if alt.is_none() {
                alt = Some(0);
                self.alt_provider_pred = counter > T0_COUNTER_MAX / 2;
            }
        }

        self.provider_index = provider.unwrap();
        self.alt_provider_index = alt.unwrap();
        provider_useful_null
    }

    /// Steps the provider's counter toward the resolved direction.
    fn update_provider_counter(&mut self, resolve_dir: bool) {
        let counter = if self.provider_index == 0 {
            &mut self.base[self.provider_pred_index]
        } else {
            &mut self.tables[self.provider_index][self.provider_pred_index].counter
        };
        if !resolve_dir && *counter > 0 {
            *counter -= 1;
        } else if resolve_dir && *counter < T0_COUNTER_MAX {
            *counter += 1;
        }
    }

    /// Allocates entries in tables with longer history than the provider.
    ///
    /// A cell whose useful bit is set is not stolen; its useful bit is
    /// cleared instead, so a repeat offender claims it next time.
    fn allocate_new_entries(&mut self, pc: Address) {
        let mut allocated = 0;
        for table in (self.provider_index + 1)..=self.table_num {
            if allocated >= MAX_ALLOCATIONS {
                break;
            }
            let idx = self.tage_index(pc, table) as usize;
            if self.tables[table][idx].useful {
                self.tables[table][idx].useful = false;
            } else {
                let tag = self.tage_tag(pc, table);
                self.tables[table][idx] = TageEntry {
                    counter: TI_COUNTER_MAX / 2,
                    tag,
                    useful: false,
                };
                allocated += 1;
            }
        }
    }

    /// Writes the provider entry's useful bit (tagged providers only).
    fn set_useful(&mut self, truth_value: bool) {
        if self.provider_index > 0 {
            self.tables[self.provider_index][self.provider_pred_index].useful = truth_value;
        }
    }

    #[inline]
    fn history_bit(&self, pos: u32) -> bool {
        (self.history >> pos) & 1 != 0
    }

    /// Index into tagged table `table` for the branch at `pc`.
    ///
    /// Folds the table's history window down to `index_size` bits by
    /// shifting and XOR-ing the outermost unused history bits into
    /// positions 0 and `index_size / 2`, then XORs with the PC.
    fn tage_index(&self, pc: Address, table: usize) -> u64 {
        let mut folded = BitWindow::new(self.index_size as u8);
        let mut sm: u32 = 0;
        let mut lg: u32 = HIST_LENGTHS[table] - 1;
        while sm <= lg {
            let last = folded.get((self.index_size - 1) as usize);
            let mid = folded.get((self.index_size / 2 - 1) as usize);
            folded.shl(1);
            folded.set(0, last ^ self.history_bit(sm));
            folded.set((self.index_size / 2) as usize, mid ^ self.history_bit(lg));
            sm += 1;
            if lg == 0 {
                break;
            }
            lg -= 1;
        }
        folded.value() ^ (pc & self.idx_mask)
    }

    /// Tag for tagged table `table`; the same fold at a fixed 14-bit width.
    fn tage_tag(&self, pc: Address, table: usize) -> u64 {
        let mut folded: u64 = 0;
        let mut sm: u32 = 0;
        let mut lg: u32 = HIST_LENGTHS[table] - 1;
        while sm <= lg {
            let last = (folded >> (TAGE_TAG_BITS - 1)) & 1 != 0;
            let mid = (folded >> (TAGE_TAG_BITS / 2 - 1)) & 1 != 0;
            folded <<= 1;
            folded = set_bit(folded, 0, last ^ self.history_bit(sm));
            folded = set_bit(folded, TAGE_TAG_BITS / 2, mid ^ self.history_bit(lg));
            sm += 1;
            if lg == 0 {
                break;
            }
            lg -= 1;
        }
        (folded & self.tag_mask) ^ (pc & self.tag_mask)
    }
}

/// Writes bit `pos` of `word` to `val`.
#[inline]
fn set_bit(word: u64, pos: u32, val: bool) -> u64 {
    (word & !(1u64 << pos)) | (u64::from(val) << pos)
}
