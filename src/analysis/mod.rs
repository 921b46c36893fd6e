//! Results of a sweep: the keyed table, per-layer reports and their summaries.

pub mod groups;
pub mod reports;
pub mod results;
pub mod stats;

pub use groups::{LayerGroup, LayerGroups};
pub use reports::{scan_reports, RunReport};
pub use results::{ResultAggregator, ResultTable};
