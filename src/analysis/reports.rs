//! Collecting the compute reports a sweep left in its results directory.

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use tracing::warn;
use walkdir::WalkDir;

use super::{
    groups::LayerGroups,
    stats::{get_mean_std_max_from_iter, Summary},
};
use crate::sim::{read_compute_report, LayerCycles, COMPUTE_REPORT};

/// the per-layer cycles of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_name: String,
    pub path: PathBuf,
    pub layers: Vec<LayerCycles>,
}

impl RunReport {
    pub fn total_cycles(&self) -> u64 {
        self.layers.iter().map(|layer| layer.total_cycles).sum()
    }

    /// group totals of this run with their mean/std/max
    pub fn grouped(&self, groups: &LayerGroups) -> (Vec<(String, u64)>, Option<Summary>) {
        let sums = groups.sum(&self.layers);
        let summary = get_mean_std_max_from_iter(sums.iter().map(|(_, cycles)| *cycles));
        (sums, summary)
    }
}

/// Find every compute report under `dir`, the run name is the report's parent directory.
///
/// Unreadable reports are logged and skipped. The result is sorted by run name.
pub fn scan_reports(dir: impl AsRef<Path>) -> eyre::Result<Vec<RunReport>> {
    let dir = dir.as_ref();
    let mut reports = vec![];
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.wrap_err_with(|| format!("cannot walk {dir:?}"))?;
        if !entry.file_type().is_file() || entry.file_name() != COMPUTE_REPORT {
            continue;
        }
        let path = entry.into_path();
        let run_name = path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match read_compute_report(&path) {
            Ok(layers) => reports.push(RunReport {
                run_name,
                path,
                layers,
            }),
            Err(e) => warn!("skip {path:?}: {e:#}"),
        }
    }
    reports.sort_by(|a, b| a.run_name.cmp(&b.run_name));
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_report(root: &Path, run: &str, body: &str) {
        let dir = root.join(run);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(COMPUTE_REPORT), body).unwrap();
    }

    #[test]
    fn finds_nested_reports() {
        let dir = tempfile::tempdir().unwrap();
        write_report(
            dir.path(),
            "lws_8x8_1s8",
            "LayerID, Total Cycles,\n0, 100,\n1, 50,\n",
        );
        write_report(
            &dir.path().join("nested"),
            "lws_4x4_1s4",
            "LayerID, Total Cycles,\n0, 7,\n",
        );
        write_report(dir.path(), "broken", "nothing useful\n");
        fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        let reports = scan_reports(dir.path()).unwrap();
        let names: Vec<_> = reports.iter().map(|r| r.run_name.as_str()).collect();
        assert_eq!(names, vec!["lws_4x4_1s4", "lws_8x8_1s8"]);
        assert_eq!(reports[1].total_cycles(), 150);

        let (sums, summary) = reports[1].grouped(&LayerGroups::default());
        assert_eq!(sums[0], ("Conv1".to_string(), 100));
        assert_eq!(sums[1], ("Conv2".to_string(), 50));
        assert_eq!(summary.unwrap().max, 100);
    }

    #[test]
    fn missing_directory() {
        assert!(scan_reports("/definitely/not/here").is_err());
    }
}
