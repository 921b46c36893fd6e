//! Pulling the compute-cycle count out of the simulator's free-form stdout.

use once_cell::sync::Lazy;
use regex::Regex;

pub const COMPUTE_CYCLES_MARKER: &str = "COMPUTE CYCLES =";

/// turns raw simulator output into the scalar metric of a run
pub trait MetricExtractor {
    /// `None` when the marker is missing or the value after it is not an integer
    fn extract(&self, output: &str) -> Option<u64>;
}

/// Finds `marker` and reads the first whitespace-separated token after it.
#[derive(Debug, Clone)]
pub struct MarkerExtractor {
    pattern: Regex,
}

impl MarkerExtractor {
    pub fn new(marker: &str) -> eyre::Result<Self> {
        let pattern = Regex::new(&format!(r"{}\s*(\S+)", regex::escape(marker)))?;
        Ok(Self { pattern })
    }
}

static COMPUTE_CYCLES: Lazy<MarkerExtractor> = Lazy::new(|| MarkerExtractor {
    pattern: Regex::new(r"COMPUTE CYCLES =\s*(\S+)").expect("static pattern"),
});

impl Default for MarkerExtractor {
    fn default() -> Self {
        COMPUTE_CYCLES.clone()
    }
}

impl MetricExtractor for MarkerExtractor {
    fn extract(&self, output: &str) -> Option<u64> {
        let token = self.pattern.captures(output)?.get(1)?.as_str();
        token.parse().ok()
    }
}

/// extract the compute cycles with the default marker
pub fn extract_metric(output: &str) -> Option<u64> {
    COMPUTE_CYCLES.extract(output)
}
