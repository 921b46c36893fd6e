//! The result table of a sweep and the aggregator that fills it.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufWriter},
    path::Path,
};

use eyre::{ensure, eyre, WrapErr};
use hashbrown::HashMap;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{
    sim::{LayerCycles, RunOutcome, RunResult},
    space::{AxisKind, PointKey},
};

pub const CYCLES_COLUMN: &str = "Compute Cycles";
pub const STATUS_COLUMN: &str = "Status";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum LabelPart {
    Number(u64),
    Text(String),
}

static LABEL_PARTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+|\D+").expect("static pattern"));

/// split a label so `4x4` sorts before `16x16` and `step2` before `step10`
fn label_parts(label: &str) -> Vec<LabelPart> {
    LABEL_PARTS
        .find_iter(label)
        .map(|part| match part.as_str().parse() {
            Ok(number) => LabelPart::Number(number),
            Err(_) => LabelPart::Text(part.as_str().to_string()),
        })
        .collect()
}

fn natural_cmp(a: &PointKey, b: &PointKey) -> Ordering {
    a.labels()
        .map(label_parts)
        .cmp(b.labels().map(label_parts))
}

#[derive(Serialize)]
struct JsonRow<'a> {
    run_name: String,
    axes: BTreeMap<String, &'a str>,
    status: &'static str,
    cycles: Option<u64>,
    layers: &'a [LayerCycles],
}

#[derive(Serialize)]
struct JsonTable<'a> {
    run_column: &'a str,
    axes: Vec<String>,
    rows: Vec<JsonRow<'a>>,
}

/// Every recorded point keyed by its axis labels. Keys are unique, insertion order is not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable {
    run_column: String,
    run_prefix: Option<String>,
    axes: Vec<AxisKind>,
    entries: HashMap<PointKey, RunResult>,
    /// names read back from a saved table, they win over the prefix
    run_names: HashMap<PointKey, String>,
}

impl ResultTable {
    pub fn new(run_column: impl Into<String>, run_prefix: Option<String>, axes: Vec<AxisKind>) -> Self {
        Self {
            run_column: run_column.into(),
            run_prefix,
            axes,
            entries: HashMap::new(),
            run_names: HashMap::new(),
        }
    }

    pub fn axes(&self) -> &[AxisKind] {
        &self.axes
    }

    pub fn run_column(&self) -> &str {
        &self.run_column
    }

    pub fn get(&self, key: &PointKey) -> Option<&RunResult> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// the number of points without a cycle count
    pub fn failures(&self) -> usize {
        self.entries.values().filter(|r| !r.is_success()).count()
    }

    /// all rows sorted by their labels, numbers inside labels compare as numbers
    pub fn rows(&self) -> Vec<(&PointKey, &RunResult)> {
        self.entries
            .iter()
            .sorted_by(|a, b| natural_cmp(a.0, b.0))
            .collect()
    }

    /// group the rows with `group`, keeping the row order inside each group
    pub fn group_by<K: Ord>(
        &self,
        mut group: impl FnMut(&PointKey) -> K,
    ) -> BTreeMap<K, Vec<(&PointKey, &RunResult)>> {
        let mut groups: BTreeMap<K, Vec<_>> = BTreeMap::new();
        for row in self.rows() {
            groups.entry(group(row.0)).or_default().push(row);
        }
        groups
    }

    /// the summed cycles of every group, failed points add nothing
    pub fn group_sum<K: Ord>(&self, group: impl FnMut(&PointKey) -> K) -> BTreeMap<K, u64> {
        self.group_by(group)
            .into_iter()
            .map(|(key, rows)| {
                let total = rows.iter().filter_map(|(_, r)| r.cycles()).sum();
                (key, total)
            })
            .collect()
    }

    fn run_name(&self, key: &PointKey) -> String {
        match self.run_names.get(key) {
            Some(name) => name.clone(),
            None => key.run_name(self.run_prefix.as_deref()),
        }
    }

    fn header(&self) -> Vec<String> {
        std::iter::once(self.run_column.clone())
            .chain(self.axes.iter().map(AxisKind::to_string))
            .chain([CYCLES_COLUMN.to_string(), STATUS_COLUMN.to_string()])
            .collect()
    }

    /// `<run column>,<axes...>,Compute Cycles,Status`, one row per point in row order
    pub fn write_csv(&self, writer: impl io::Write) -> eyre::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.header())?;
        for (key, result) in self.rows() {
            let cycles = result.cycles().map(|c| c.to_string()).unwrap_or_default();
            let record = std::iter::once(self.run_name(key))
                .chain(key.labels().map(str::to_string))
                .chain([cycles, result.outcome.status().to_string()]);
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let path = path.as_ref();
        create_parent(path)?;
        let file = File::create(path).wrap_err_with(|| format!("cannot create {path:?}"))?;
        self.write_csv(BufWriter::new(file))
            .wrap_err_with(|| format!("cannot write results to {path:?}"))
    }

    /// the table with per-layer cycles as pretty JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let path = path.as_ref();
        create_parent(path)?;
        let rows = self
            .rows()
            .into_iter()
            .map(|(key, result)| JsonRow {
                run_name: self.run_name(key),
                axes: key
                    .entries()
                    .iter()
                    .map(|(kind, label)| (kind.to_string(), label.as_str()))
                    .collect(),
                status: result.outcome.status(),
                cycles: result.cycles(),
                layers: &result.layers,
            })
            .collect();
        let table = JsonTable {
            run_column: &self.run_column,
            axes: self.axes.iter().map(AxisKind::to_string).collect(),
            rows,
        };
        let file = File::create(path).wrap_err_with(|| format!("cannot create {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &table)?;
        Ok(())
    }

    /// Read back a table written by [`ResultTable::write_csv`].
    ///
    /// Run names are kept as read. Failure reasons and per-layer cycles are not part of the
    /// CSV and come back empty.
    pub fn load_csv(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let mut reader =
            csv::Reader::from_path(path).wrap_err_with(|| format!("cannot open {path:?}"))?;
        let header = reader.headers()?.clone();
        ensure!(
            header.len() >= 3
                && header.get(header.len() - 2) == Some(CYCLES_COLUMN)
                && header.get(header.len() - 1) == Some(STATUS_COLUMN),
            "{path:?} is not a results table"
        );
        let run_column = header.get(0).unwrap_or_default().to_string();
        let axes = header
            .iter()
            .skip(1)
            .take(header.len() - 3)
            .map(str::parse)
            .collect::<eyre::Result<Vec<AxisKind>>>()
            .wrap_err_with(|| format!("bad axis column in {path:?}"))?;

        let mut table = Self::new(run_column, None, axes.clone());
        for (line, record) in reader.records().enumerate() {
            let record = record.wrap_err_with(|| format!("bad row {} in {path:?}", line + 2))?;
            let labels = record.iter().skip(1).take(axes.len()).map(str::to_string);
            let key = PointKey::new(axes.iter().copied().zip(labels).collect());
            let cycles = match record.get(axes.len() + 1).filter(|c| !c.is_empty()) {
                Some(cycles) => Some(
                    cycles
                        .parse()
                        .wrap_err_with(|| format!("bad cycles {cycles:?} in {path:?}"))?,
                ),
                None => None,
            };
            let status = record
                .get(axes.len() + 2)
                .ok_or_else(|| eyre!("row {} of {path:?} has no status", line + 2))?;
            let run_name = record.get(0).unwrap_or_default().to_string();
            table.insert(key.clone(), RunOutcome::from_status(status, cycles)?.into());
            table.run_names.insert(key, run_name);
        }
        Ok(table)
    }

    fn insert(&mut self, key: PointKey, result: RunResult) {
        self.entries.insert(key, result);
    }
}

fn create_parent(path: &Path) -> eyre::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).wrap_err_with(|| format!("cannot create {dir:?}"))
        }
        _ => Ok(()),
    }
}

/// Folds the results of a sweep into a [`ResultTable`].
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    table: ResultTable,
}

impl ResultAggregator {
    pub fn new(run_column: impl Into<String>, run_prefix: Option<String>, axes: Vec<AxisKind>) -> Self {
        Self {
            table: ResultTable::new(run_column, run_prefix, axes),
        }
    }

    /// insert or overwrite the result of a point
    pub fn record(&mut self, key: PointKey, result: RunResult) {
        self.table.insert(key, result);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// a snapshot of the table so far
    pub fn export(&self) -> ResultTable {
        self.table.clone()
    }

    pub fn into_table(self) -> ResultTable {
        self.table
    }
}
