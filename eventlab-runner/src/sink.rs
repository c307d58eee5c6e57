//! File-backed result sinks.
//!
//! Both sinks buffer appended rows and write one file per series under
//! `<root>/<run_id>/` when closed. Nothing touches disk before `close`.

use eventlab_core::domain::RunId;
use eventlab_core::persistence::{is_file_safe_series, ResultSink, SeriesRow, SinkError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default)]
struct Buffer {
    run_id: Option<RunId>,
    series: BTreeMap<String, Vec<SeriesRow>>,
}

impl Buffer {
    fn open(&mut self, run_id: &RunId) -> Result<(), SinkError> {
        if let Some(existing) = &self.run_id {
            return Err(SinkError::AlreadyOpen(existing.clone()));
        }
        self.run_id = Some(run_id.clone());
        Ok(())
    }

    fn append(&mut self, ticker: &str, rows: &[SeriesRow]) -> Result<(), SinkError> {
        if self.run_id.is_none() {
            return Err(SinkError::NotOpen);
        }
        if !is_file_safe_series(ticker) {
            return Err(SinkError::InvalidSeriesName(ticker.to_string()));
        }
        self.series
            .entry(ticker.to_string())
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }

    /// Take the buffered run, creating its output directory.
    fn take(&mut self, root: &Path) -> Result<(PathBuf, BTreeMap<String, Vec<SeriesRow>>), SinkError> {
        let run_id = self.run_id.take().ok_or(SinkError::NotOpen)?;
        let dir = root.join(run_id.as_str());
        std::fs::create_dir_all(&dir)?;
        Ok((dir, std::mem::take(&mut self.series)))
    }
}

/// Writes `<ticker>.csv` files: a `timestamp` column followed by the value
/// columns in name order. Cells for columns a row lacks are left empty.
#[derive(Debug)]
pub struct CsvSink {
    root: PathBuf,
    buffer: Buffer,
    written: Vec<PathBuf>,
}

impl CsvSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            buffer: Buffer::default(),
            written: Vec::new(),
        }
    }

    /// Files produced by the last `close`.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

pub fn encode_csv(series: &str, rows: &[SeriesRow]) -> Result<Vec<u8>, SinkError> {
    let encode = |e: csv::Error| SinkError::Encode {
        series: series.to_string(),
        message: e.to_string(),
    };

    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.values.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["timestamp"];
    header.extend(columns.iter().copied());
    writer.write_record(&header).map_err(encode)?;

    for row in rows {
        let mut record = vec![row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(
            columns
                .iter()
                .map(|c| row.values.get(*c).map(f64::to_string).unwrap_or_default()),
        );
        writer.write_record(&record).map_err(encode)?;
    }

    writer.into_inner().map_err(|e| SinkError::Encode {
        series: series.to_string(),
        message: e.to_string(),
    })
}

impl ResultSink for CsvSink {
    fn open(&mut self, run_id: &RunId) -> Result<(), SinkError> {
        self.buffer.open(run_id)
    }

    fn append(&mut self, ticker: &str, rows: &[SeriesRow]) -> Result<(), SinkError> {
        self.buffer.append(ticker, rows)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let (dir, series) = self.buffer.take(&self.root)?;
        self.written.clear();
        for (name, rows) in &series {
            let path = dir.join(format!("{name}.csv"));
            std::fs::write(&path, encode_csv(name, rows)?)?;
            self.written.push(path);
        }
        info!(dir = %dir.display(), files = self.written.len(), "wrote CSV series");
        Ok(())
    }
}

/// Writes `<ticker>.json` files, each a JSON array of rows.
#[derive(Debug)]
pub struct JsonSink {
    root: PathBuf,
    buffer: Buffer,
    written: Vec<PathBuf>,
}

impl JsonSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            buffer: Buffer::default(),
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ResultSink for JsonSink {
    fn open(&mut self, run_id: &RunId) -> Result<(), SinkError> {
        self.buffer.open(run_id)
    }

    fn append(&mut self, ticker: &str, rows: &[SeriesRow]) -> Result<(), SinkError> {
        self.buffer.append(ticker, rows)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let (dir, series) = self.buffer.take(&self.root)?;
        self.written.clear();
        for (name, rows) in &series {
            let json = serde_json::to_vec_pretty(rows).map_err(|e| SinkError::Encode {
                series: name.clone(),
                message: e.to_string(),
            })?;
            let path = dir.join(format!("{name}.json"));
            std::fs::write(&path, json)?;
            self.written.push(path);
        }
        info!(dir = %dir.display(), files = self.written.len(), "wrote JSON series");
        Ok(())
    }
}
