//! Retreat rosters for printing or sharing.
//!
//! Two reports exist: the attendees of a retreat, and the servantees that did not sign up
//! for it. Each renders as a plain text table or as JSON and can be written to a file
//! named after the retreat.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::attendance::missing_from;
use crate::models::{Retreat, Servantee};

const UNKNOWN_NAME: &str = "unknown";
const PLACEHOLDER: &str = "-";
const MISSING_COLUMNS: usize = 3;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report is empty; nothing to write")]
    Empty,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Attendees,
    Missing,
}

impl ReportKind {
    fn file_prefix(self) -> &'static str {
        match self {
            ReportKind::Attendees => "attendees",
            ReportKind::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub name: String,
    pub phone: String,
}

/// `value` unless it is missing or blank.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetreatReport {
    pub kind: ReportKind,
    pub retreat_id: String,
    pub retreat_name: String,
    pub rows: Vec<ReportRow>,
}

impl RetreatReport {
    /// Everyone registered for `retreat`. Attendees known only by id have no name or
    /// phone to show.
    pub fn attendees(retreat: &Retreat) -> Self {
        let rows = retreat
            .attendees
            .iter()
            .map(|attendee| ReportRow {
                name: present(attendee.name()).unwrap_or(UNKNOWN_NAME).to_string(),
                phone: present(attendee.phone()).unwrap_or(PLACEHOLDER).to_string(),
            })
            .collect();
        Self::new(ReportKind::Attendees, retreat, rows)
    }

    /// Servantees not registered for `retreat`, in the order given.
    pub fn missing(retreat: &Retreat, servantees: &[Servantee]) -> Self {
        let rows = missing_from(retreat, servantees)
            .into_iter()
            .map(|s| ReportRow {
                name: if s.name.trim().is_empty() {
                    PLACEHOLDER.to_string()
                } else {
                    s.name.clone()
                },
                phone: present(s.phone.as_deref()).unwrap_or(PLACEHOLDER).to_string(),
            })
            .collect();
        Self::new(ReportKind::Missing, retreat, rows)
    }

    fn new(kind: ReportKind, retreat: &Retreat, rows: Vec<ReportRow>) -> Self {
        Self {
            kind,
            retreat_id: retreat.id.clone(),
            retreat_name: retreat.name.clone(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn title(&self) -> String {
        match self.kind {
            ReportKind::Attendees => format!("Attendees of {}", self.retreat_name),
            ReportKind::Missing => format!("Servantees missing from {}", self.retreat_name),
        }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)? + "\n"),
        }
    }

    fn render_text(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|row| row.name.chars().count())
            .max()
            .unwrap_or(0);
        let mut out = format!("{}\n\n", self.title());
        match self.kind {
            ReportKind::Attendees => {
                for row in &self.rows {
                    let pad = width - row.name.chars().count();
                    let _ = writeln!(out, "{}{}  {}", row.name, " ".repeat(pad), row.phone);
                }
            }
            ReportKind::Missing => {
                for chunk in self.rows.chunks(MISSING_COLUMNS) {
                    let cells: Vec<String> = chunk
                        .iter()
                        .map(|row| {
                            let pad = width - row.name.chars().count();
                            format!("{}{}", row.name, " ".repeat(pad))
                        })
                        .collect();
                    let _ = writeln!(out, "{}", cells.join("  ").trim_end());
                }
            }
        }
        let _ = writeln!(out, "\nTotal: {}", self.rows.len());
        out
    }

    /// File name derived from the report kind and retreat name.
    pub fn file_name(&self, format: ReportFormat) -> String {
        let name: String = self
            .retreat_name
            .trim()
            .chars()
            .map(|ch| {
                if ch.is_alphanumeric() || ch == '-' {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        let name = if name.is_empty() {
            self.retreat_id.clone()
        } else {
            name
        };
        format!("{}_{}.{}", self.kind.file_prefix(), name, format.extension())
    }

    /// Write the rendered report into `directory` and return the file path. Empty reports
    /// are not written.
    pub fn write_to(&self, directory: &Path, format: ReportFormat) -> Result<PathBuf, ReportError> {
        if self.is_empty() {
            return Err(ReportError::Empty);
        }
        fs::create_dir_all(directory)?;
        let path = directory.join(self.file_name(format));
        fs::write(&path, self.render(format)?)?;
        info!(path = %path.display(), rows = self.rows.len(), "report written");
        Ok(path)
    }
}
