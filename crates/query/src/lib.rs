//! Read queries over stored price history
//!
//! Features:
//! - Latest snapshot per asset
//! - Population standard deviation of price over a trailing sample window

pub mod service;
pub mod stats;

pub use service::{
    Deviation, QueryService, Snapshot, DEFAULT_DEVIATION_WINDOW, MIN_DEVIATION_SAMPLES,
};
pub use stats::{mean, population_std_dev, round_dp};
