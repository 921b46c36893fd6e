use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// mean, population standard deviation and max of a set of cycle counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub max: u64,
}

/// give a set of values, return its mean, std, max; `None` when there is nothing to summarize
/// # Example
/// ```
/// use nm_sweep::analysis::stats::get_mean_std_max_from_iter;
/// let summary = get_mean_std_max_from_iter([1u64, 2]).unwrap();
/// assert_eq!((summary.mean, summary.std, summary.max), (1.5, 0.5, 2));
/// assert!(get_mean_std_max_from_iter(Vec::<u64>::new()).is_none());
/// ```
pub fn get_mean_std_max_from_iter(
    data: impl IntoIterator<Item = u64> + Clone,
) -> Option<Summary> {
    let max = data.clone().into_iter().max()?;
    let mean = data.clone().into_iter().map(|x| x as f64).mean();
    let std = data
        .into_iter()
        .map(|x| x as f64)
        .population_std_dev();
    Some(Summary { mean, std, max })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_has_no_spread() {
        let summary = get_mean_std_max_from_iter([42u64]).unwrap();
        assert_eq!(summary.mean, 42.);
        assert_eq!(summary.std, 0.);
        assert_eq!(summary.max, 42);
    }

    #[test]
    fn known_spread() {
        let summary = get_mean_std_max_from_iter(vec![2u64, 4, 4, 4, 5, 5, 7, 9]).unwrap();
        assert!((summary.mean - 5.).abs() < 1e-12);
        assert!((summary.std - 2.).abs() < 1e-12);
        assert_eq!(summary.max, 9);
    }
}
