//! Branch prediction.
//!
//! The frontend timing model uses a TAGE direction predictor: a bimodal
//! base table backed by up to eight tagged tables indexed with geometrically
//! increasing history lengths. Table indices are produced by folding the
//! global history through a fixed-width bit window.

/// Fixed-width bit window used by the TAGE index fold.
pub mod history;

/// TAGE (Tagged Geometric History Length) direction predictor.
pub mod tage;

pub use self::tage::Tage;
