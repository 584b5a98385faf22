//! Dataset boundary: loads the maintenance CSV, carves out this node's
//! device partition, standardizes features and splits off a holdout.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use tracing::info;

use fedmaint_core::dataset::{Dataset, NUM_CLASSES};

/// Machine quality variant this node is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    L,
    M,
    H,
}

impl Device {
    /// Numeric tag appended to the feature vector so the model can tell
    /// partitions apart.
    pub fn code(self) -> f32 {
        match self {
            Device::L => 0.0,
            Device::M => 1.0,
            Device::H => 2.0,
        }
    }
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "L" => Ok(Device::L),
            "M" => Ok(Device::M),
            "H" => Ok(Device::H),
            other => bail!("unknown device type {other:?}, expected L, M or H"),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Device::L => "L",
            Device::M => "M",
            Device::H => "H",
        };
        f.write_str(s)
    }
}

const FEATURE_COLUMNS: [&str; 5] = [
    "Air temperature [K]",
    "Process temperature [K]",
    "Rotational speed [rpm]",
    "Torque [Nm]",
    "Tool wear [min]",
];
const TYPE_COLUMN: &str = "Type";
const LABEL_COLUMN: &str = "Failure Type";

/// Train and holdout splits for one device partition.
pub struct Partition {
    pub train: Dataset,
    pub holdout: Dataset,
}

/// Loads the CSV at `path` and returns the standardized partition for
/// `device`. Label codes come from the sorted distinct label strings over the
/// whole file, so every node agrees on the encoding.
pub fn load_partition(path: &Path, device: Device, holdout_fraction: f32) -> Result<Partition> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading dataset {}", path.display()))?;
    let mut lines = raw.lines();
    let header = lines.next().context("dataset file is empty")?;
    let columns = split_row(header);

    let type_idx = column_index(&columns, TYPE_COLUMN)?;
    let label_idx = column_index(&columns, LABEL_COLUMN)?;
    let feature_idx: Vec<usize> = FEATURE_COLUMNS
        .iter()
        .map(|c| column_index(&columns, c))
        .collect::<Result<_>>()?;

    let mut rows: Vec<(String, Vec<f32>, String)> = Vec::new();
    for (number, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_row(line);
        if fields.len() != columns.len() {
            bail!("row {} has {} fields, expected {}", number + 2, fields.len(), columns.len());
        }
        let mut features = Vec::with_capacity(feature_idx.len());
        for &idx in &feature_idx {
            let value: f32 = fields[idx]
                .parse()
                .with_context(|| format!("row {}: bad value {:?}", number + 2, fields[idx]))?;
            features.push(value);
        }
        rows.push((fields[type_idx].clone(), features, fields[label_idx].clone()));
    }

    // Shared label encoding across all participants.
    let mut label_names: Vec<&str> = rows.iter().map(|(_, _, l)| l.as_str()).collect();
    label_names.sort_unstable();
    label_names.dedup();
    if label_names.len() > NUM_CLASSES {
        bail!("dataset has {} label values, supports at most {NUM_CLASSES}", label_names.len());
    }
    let label_code = |name: &str| -> u32 {
        label_names.iter().position(|l| *l == name).unwrap() as u32
    };

    let device_name = device.to_string();
    if !rows.iter().any(|(t, _, _)| *t == device_name) {
        bail!("no rows for device type {device_name} in {}", path.display());
    }

    // Deterministic holdout over the whole file: every k-th row, so repeated
    // runs and different devices all agree on the split.
    let stride = if holdout_fraction > 0.0 {
        (1.0 / holdout_fraction).round().max(1.0) as usize
    } else {
        usize::MAX
    };
    let mut train_rows = Vec::new();
    let mut holdout_rows = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        if stride != usize::MAX && i % stride == stride - 1 {
            holdout_rows.push(row);
        } else {
            train_rows.push(row);
        }
    }

    // Scaling statistics come from the whole-file training split, so every
    // device standardizes against the same feature distribution.
    let (means, stds) = feature_stats(&train_rows);
    let build = |rows: &[&(String, Vec<f32>, String)]| -> Result<Dataset> {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (kind, values, label) in rows {
            if *kind != device_name {
                continue;
            }
            let mut scaled: Vec<f32> = values
                .iter()
                .zip(means.iter().zip(stds.iter()))
                .map(|(v, (m, s))| (v - m) / s)
                .collect();
            scaled.push(device.code());
            features.push(scaled);
            labels.push(label_code(label));
        }
        Ok(Dataset::new(features, labels)?)
    };
    let train = build(&train_rows)?;
    let holdout = build(&holdout_rows)?;

    info!(
        device = %device_name,
        train = train.len(),
        holdout = holdout.len(),
        classes = ?train.class_distribution(),
        "partition loaded"
    );
    Ok(Partition { train, holdout })
}

fn column_index(columns: &[String], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .with_context(|| format!("missing column {name:?}"))
}

fn feature_stats(rows: &[&(String, Vec<f32>, String)]) -> (Vec<f32>, Vec<f32>) {
    let width = rows.first().map_or(0, |(_, v, _)| v.len());
    let n = rows.len().max(1) as f32;
    let mut means = vec![0.0f32; width];
    for (_, values, _) in rows {
        for (m, v) in means.iter_mut().zip(values) {
            *m += v / n;
        }
    }
    let mut stds = vec![0.0f32; width];
    for (_, values, _) in rows {
        for ((s, v), m) in stds.iter_mut().zip(values).zip(&means) {
            *s += (v - m) * (v - m) / n;
        }
    }
    for s in &mut stds {
        *s = s.sqrt();
        if *s == 0.0 {
            *s = 1.0;
        }
    }
    (means, stds)
}

/// Quote-aware CSV field splitter; label strings in this dataset contain
/// commas when exported from some tools.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
