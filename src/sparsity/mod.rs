//! N:M structured sparsity: ratio labels, the ripple schedule and the compressed storage model.

use std::str::FromStr;

use derive_more::Display;
use eyre::{ensure, eyre, WrapErr};
use serde::{Deserialize, Serialize};

pub mod schedule;
pub mod storage;

pub use schedule::{generate, ScheduleStep, DEFAULT_STEP_SIZE};
pub use storage::{estimate, StorageCost};

/// `n` non-zero elements in every `m` contiguous elements, `0:m` drops the whole block.
///
/// ```
/// use nm_sweep::sparsity::SparsityRatio;
/// let ratio: SparsityRatio = "2:4".parse().unwrap();
/// assert_eq!(ratio, SparsityRatio::new(2, 4).unwrap());
/// assert_eq!(ratio.to_string(), "2:4");
/// ```
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[display(fmt = "{}:{}", n, m)]
#[serde(try_from = "String", into = "String")]
pub struct SparsityRatio {
    pub n: u32,
    pub m: u32,
}

impl SparsityRatio {
    pub fn new(n: u32, m: u32) -> eyre::Result<Self> {
        ensure!(m > 0, "the block size M of a sparsity ratio must be positive");
        ensure!(n <= m, "sparsity ratio {n}:{m} has more non-zeros than its block size");
        Ok(Self { n, m })
    }

    /// the label used in file names, `1:4` becomes `1s4`
    pub fn file_label(&self) -> String {
        format!("{}s{}", self.n, self.m)
    }
}

impl FromStr for SparsityRatio {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (n, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| eyre!("sparsity ratio {s:?} is not of the form N:M"))?;
        let n = n
            .trim()
            .parse()
            .wrap_err_with(|| format!("bad N in sparsity ratio {s:?}"))?;
        let m = m
            .trim()
            .parse()
            .wrap_err_with(|| format!("bad M in sparsity ratio {s:?}"))?;
        Self::new(n, m)
    }
}

impl TryFrom<String> for SparsityRatio {
    type Error = eyre::Report;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SparsityRatio> for String {
    fn from(value: SparsityRatio) -> Self {
        value.to_string()
    }
}
