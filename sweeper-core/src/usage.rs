// Usage report loading
//
// The report is the CSV an asset audit exports: one row per asset with at
// least `Path`, `Name` and `TotalUsage` columns. Other columns are ignored.

use crate::error::ReportError;
use crate::liveness::AssetSet;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use sweeper_scanner::AssetId;
use tracing::{debug, info};

pub const DEFAULT_REPORT_NAME: &str = "Report.csv";

/// Total usage count per asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageReport {
    counts: BTreeMap<AssetId, u64>,
}

impl UsageReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a report from `(path, name, total_usage)` rows.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, u64)>,
    {
        let mut report = Self::new();
        for (path, name, usage) in rows {
            report.insert(AssetId::join(path, name), usage);
        }
        report
    }

    /// Add usage for an asset. Repeated rows for one asset add up.
    pub fn insert(&mut self, asset: AssetId, usage: u64) {
        *self.counts.entry(asset).or_insert(0) += usage;
    }

    /// Read a report from disk. A missing or unreadable file is
    /// `ReportError::Unavailable`; nothing is substituted for it.
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let content = fs::read_to_string(path).map_err(|source| ReportError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let report = Self::parse(&content)?;
        info!(
            "Loaded usage report {} ({} assets)",
            path.display(),
            report.len()
        );
        Ok(report)
    }

    pub fn parse(content: &str) -> Result<Self, ReportError> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());

        let Some((_, header)) = lines.next() else {
            return Err(ReportError::MissingColumn("Path"));
        };
        let header = split_line(header);
        let path_col = column(&header, "Path")?;
        let name_col = column(&header, "Name")?;
        let usage_col = column(&header, "TotalUsage")?;
        let needed = path_col.max(name_col).max(usage_col) + 1;

        let mut report = Self::new();
        for (idx, line) in lines {
            let line_no = idx + 1;
            let fields = split_line(line);
            if fields.len() < needed {
                return Err(ReportError::ShortRow {
                    line: line_no,
                    expected: needed,
                    found: fields.len(),
                });
            }

            let raw = fields[usage_col].trim();
            let usage: u64 = raw.parse().map_err(|_| ReportError::InvalidUsage {
                line: line_no,
                value: raw.to_string(),
            })?;

            let asset = AssetId::join(fields[path_col].trim(), &fields[name_col]);
            debug!("Report row {}: {} used {} times", line_no, asset, usage);
            report.insert(asset, usage);
        }

        Ok(report)
    }

    pub fn usage(&self, asset: &AssetId) -> Option<u64> {
        self.counts.get(asset).copied()
    }

    /// Assets with a usage count above zero.
    pub fn used(&self) -> AssetSet {
        self.counts
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(a, _)| a.clone())
            .collect()
    }

    pub fn unused(&self) -> AssetSet {
        self.counts
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(a, _)| a.clone())
            .collect()
    }

    pub fn assets(&self) -> AssetSet {
        self.counts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

fn column(header: &[String], name: &'static str) -> Result<usize, ReportError> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or(ReportError::MissingColumn(name))
}

/// Split one CSV line into fields. Double-quoted fields may contain commas
/// and `""` escapes; quoted newlines are not supported.
pub(crate) fn split_line(line: &str) -> Vec<String> {
    let line = line.strip_prefix('\u{feff}').unwrap_or(line);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            '"' if field.is_empty() => quoted = true,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            '\r' if !quoted && chars.peek().is_none() => {}
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}
