//! The ripple schedule over the N:M ratios of one block size.
//!
//! For a block size `M` there are `M / 2` distinguishable ratios (`1:M` up to `M/2:M`, the
//! denser ones are complements). A schedule starts with all weight on `1:M` and moves
//! `step_size` percent at a time from the leftmost non-empty bucket to its right neighbour,
//! until all weight sits on the coarsest ratio.

use std::fmt::Write;

use eyre::ensure;
use serde::{Deserialize, Serialize};

use super::SparsityRatio;

pub const DEFAULT_STEP_SIZE: u32 = 10;

/// One distribution of percentages over the ratios `1:M ..= (M/2):M`.
///
/// The percentages always sum to 100.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleStep {
    m: u32,
    percentages: Vec<u32>,
}

impl ScheduleStep {
    fn new(m: u32, percentages: Vec<u32>) -> Self {
        debug_assert_eq!(percentages.iter().sum::<u32>(), 100);
        Self { m, percentages }
    }

    pub fn m(&self) -> u32 {
        self.m
    }

    pub fn percentages(&self) -> &[u32] {
        &self.percentages
    }

    /// the ratio of each bucket, finest first
    pub fn ratios(&self) -> impl Iterator<Item = SparsityRatio> + '_ {
        (1..=self.percentages.len() as u32).map(|n| SparsityRatio { n, m: self.m })
    }

    /// pairs of (ratio, percentage), including the empty buckets
    pub fn weighted_ratios(&self) -> impl Iterator<Item = (SparsityRatio, u32)> + '_ {
        self.ratios().zip(self.percentages.iter().copied())
    }

    /// the ratio holding the largest share, ties go to the finer ratio
    pub fn dominant_ratio(&self) -> SparsityRatio {
        let (index, _) = self
            .percentages
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, percentage)| **percentage)
            .unwrap_or((0, &0));
        SparsityRatio {
            n: index as u32 + 1,
            m: self.m,
        }
    }

    /// Split `count` items over the ratios in proportion to the percentages.
    ///
    /// Uses the largest remainder method, ties go to the finer ratio. The result is ordered
    /// finest ratio first and always has exactly `count` entries.
    ///
    /// ```
    /// use nm_sweep::sparsity::generate;
    /// let steps = generate(8, 10).unwrap();
    /// // [50, 50, 0, 0]
    /// let labels: Vec<_> = steps[5].apportion(4).iter().map(|r| r.to_string()).collect();
    /// assert_eq!(labels, vec!["1:8", "1:8", "2:8", "2:8"]);
    /// ```
    pub fn apportion(&self, count: usize) -> Vec<SparsityRatio> {
        let mut shares: Vec<usize> = self
            .percentages
            .iter()
            .map(|p| *p as usize * count / 100)
            .collect();
        let assigned: usize = shares.iter().sum();
        let mut by_remainder: Vec<(usize, usize)> = self
            .percentages
            .iter()
            .enumerate()
            .map(|(index, p)| (index, *p as usize * count % 100))
            .collect();
        // stable sort keeps the finer ratio first on equal remainders
        by_remainder.sort_by(|a, b| b.1.cmp(&a.1));
        for (index, _) in by_remainder.into_iter().take(count - assigned) {
            shares[index] += 1;
        }
        self.ratios()
            .zip(shares)
            .flat_map(|(ratio, share)| std::iter::repeat(ratio).take(share))
            .collect()
    }
}

/// Generate the ripple schedule for block size `m`.
///
/// Requires `m >= 2` and a `step_size` that divides 100, otherwise the walk would either have
/// no bucket or overshoot the last one.
///
/// ```
/// use nm_sweep::sparsity::generate;
/// let steps = generate(4, 50).unwrap();
/// let steps: Vec<_> = steps.iter().map(|s| s.percentages().to_vec()).collect();
/// assert_eq!(steps, vec![vec![100, 0], vec![50, 50], vec![0, 100]]);
/// ```
pub fn generate(m: u32, step_size: u32) -> eyre::Result<Vec<ScheduleStep>> {
    let num_ratios = (m / 2) as usize;
    ensure!(
        num_ratios >= 1,
        "block size {m} has no N:M ratio to schedule, it must be at least 2"
    );
    ensure!(
        step_size > 0 && 100 % step_size == 0,
        "step size {step_size} does not evenly divide 100"
    );

    let mut percentages = vec![0; num_ratios];
    percentages[0] = 100;
    let mut steps = vec![];
    while percentages[num_ratios - 1] < 100 {
        steps.push(ScheduleStep::new(m, percentages.clone()));
        if let Some(index) = percentages.iter().position(|p| *p > 0) {
            percentages[index] -= step_size;
            if let Some(next) = percentages.get_mut(index + 1) {
                *next += step_size;
            }
        }
    }
    let mut last = vec![0; num_ratios];
    last[num_ratios - 1] = 100;
    steps.push(ScheduleStep::new(m, last));
    Ok(steps)
}

/// render the schedule as a table, one row per step and one column per ratio
pub fn format_table(steps: &[ScheduleStep]) -> String {
    let mut table = String::new();
    let Some(first) = steps.first() else {
        return table;
    };
    let header = first.ratios().map(|r| r.to_string()).collect::<Vec<_>>();
    writeln!(table, "{:<5} {}", "Step", header.join(" | ")).ok();
    for (index, step) in steps.iter().enumerate() {
        let row = step
            .percentages()
            .iter()
            .zip(&header)
            .map(|(p, label)| format!("{p:>width$}", width = label.len()))
            .collect::<Vec<_>>();
        writeln!(table, "{:<5} {}", index, row.join(" | ")).ok();
    }
    table
}
