//! Front-end trace records.
//!
//! A trace is a JSON-lines file: one record per line, in program order per
//! thread. `define_bbl` records populate the decode cache and must precede
//! the first `bbl` record that references them; the remaining records are
//! the event stream the instrumentation layer would deliver through its
//! callbacks.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::bbl::DynUop;
use crate::common::{Address, ThreadId};

/// One line of a trace file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceRecord {
    /// Registers a decoded basic block in the decode cache.
    DefineBbl {
        addr: Address,
        instrs: u32,
        bytes: u32,
        uops: Vec<DynUop>,
    },
    /// A load address observed at runtime.
    Load { tid: ThreadId, addr: Address },
    /// A store address observed at runtime.
    Store { tid: ThreadId, addr: Address },
    /// A predicated load and its predicate value.
    PredLoad {
        tid: ThreadId,
        addr: Address,
        pred: bool,
    },
    /// A predicated store and its predicate value.
    PredStore {
        tid: ThreadId,
        addr: Address,
        pred: bool,
    },
    /// A conditional branch and both successor addresses.
    Branch {
        tid: ThreadId,
        pc: Address,
        taken: bool,
        taken_npc: Address,
        not_taken_npc: Address,
    },
    /// A basic-block boundary; `(addr, instrs)` keys the decode cache.
    Bbl {
        tid: ThreadId,
        addr: Address,
        instrs: u32,
    },
}

/// Reads a JSON-lines trace file.
///
/// Blank lines are skipped; a malformed line aborts the load with its line
/// number.
pub fn read_trace(path: &Path) -> io::Result<Vec<TraceRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("trace line {}: {e}", line_no + 1),
            )
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_round_trips_through_json_lines() {
        let records = vec![
            TraceRecord::DefineBbl {
                addr: 0x400000,
                instrs: 1,
                bytes: 4,
                uops: vec![DynUop::default()],
            },
            TraceRecord::Bbl {
                tid: 0,
                addr: 0x400000,
                instrs: 1,
            },
            TraceRecord::Load {
                tid: 0,
                addr: 0x1000,
            },
            TraceRecord::Branch {
                tid: 0,
                pc: 0x400004,
                taken: true,
                taken_npc: 0x400040,
                not_taken_npc: 0x400008,
            },
        ];

        let mut file = NamedTempFile::new().unwrap();
        for record in &records {
            writeln!(file, "{}", serde_json::to_string(record).unwrap()).unwrap();
        }
        writeln!(file).unwrap();

        let loaded = read_trace(file.path()).unwrap();
        assert_eq!(loaded.len(), records.len());
        match &loaded[0] {
            TraceRecord::DefineBbl { addr, uops, .. } => {
                assert_eq!(*addr, 0x400000);
                assert_eq!(uops.len(), 1);
            }
            other => panic!("unexpected first record: {other:?}"),
        }
        match &loaded[3] {
            TraceRecord::Branch { taken, .. } => assert!(*taken),
            other => panic!("unexpected branch record: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{\"kind\": \"load\", \"tid\": 0, \"addr\": 16}}").unwrap();
        writeln!(file, "not json").unwrap();

        let err = read_trace(file.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("line 2"));
    }
}
