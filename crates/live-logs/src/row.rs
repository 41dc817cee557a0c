//! Per-record projection consumed by the rendering surface.
//!
//! Everything here is a pure function of its inputs; rows can be rebuilt on
//! every render.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::color::{PodColor, PodColorAssigner};
use crate::types::{ChannelKind, LogLevel, SequenceId, SequencedRecord};
use crate::view::{MergedView, NO_PODS_MESSAGE};

const POD_SHORT_CHARS: usize = 5;
const VERSION_SHORT_CHARS: usize = 7;

/// Time zone used to render timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    /// The viewer's local zone
    #[default]
    Local,
    /// Coordinated universal time
    Utc,
}

/// Renders epoch milliseconds as `dd MMM, HH:mm:ss.SS`.
#[must_use]
pub fn format_time(created_at: i64, mode: TimeMode) -> String {
    let Some(utc) = DateTime::<Utc>::from_timestamp_millis(created_at) else {
        return created_at.to_string();
    };
    let hundredths = created_at.rem_euclid(1_000) / 10;
    let clock = match mode {
        TimeMode::Utc => utc.format("%d %b, %H:%M:%S").to_string(),
        TimeMode::Local => utc.with_timezone(&Local).format("%d %b, %H:%M:%S").to_string(),
    };
    format!("{clock}.{hundredths:02}")
}

/// Renders epoch milliseconds as a full UTC date, e.g. for tooltips.
#[must_use]
pub fn format_utc(created_at: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(created_at).map_or_else(
        || created_at.to_string(),
        |utc| utc.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    )
}

/// Last characters of a pod name, which is where replica suffixes live.
#[must_use]
pub fn short_pod(pod_name: &str) -> String {
    let count = pod_name.chars().count();
    pod_name
        .chars()
        .skip(count.saturating_sub(POD_SHORT_CHARS))
        .collect()
}

/// Leading characters of a version hash.
#[must_use]
pub fn short_version(version: &str) -> String {
    version.chars().take(VERSION_SHORT_CHARS).collect()
}

/// Render-ready projection of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentationRow {
    /// Position in the view
    pub index: usize,
    /// Arrival id of the record
    pub sequence_id: SequenceId,
    /// Originating channel
    pub channel: ChannelKind,
    /// Pod color
    pub color: PodColor,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Display time in the requested mode
    pub time: String,
    /// Full UTC time
    pub time_utc: String,
    /// Full pod name
    pub pod_name: Option<String>,
    /// Truncated pod name for display
    pub pod_short: Option<String>,
    /// Full version
    pub version: Option<String>,
    /// Truncated version for display
    pub version_short: Option<String>,
    /// Container name
    pub container: Option<String>,
    /// Severity
    pub level: LogLevel,
    /// The log message
    pub message: String,
    /// Synthetic row with nothing attributable to a pod
    pub placeholder: bool,
    /// Record had missing fields that were defaulted
    pub malformed: bool,
}

impl PresentationRow {
    /// Projects a record at a view position.
    #[must_use]
    pub fn project(record: &SequencedRecord, index: usize, color: PodColor, mode: TimeMode) -> Self {
        let line = record.record.line();
        let channel = record.record.kind();
        let placeholder = (channel == ChannelKind::Infra && line.pod_name.is_none())
            || line.message.contains(NO_PODS_MESSAGE);

        Self {
            index,
            sequence_id: record.sequence_id,
            channel,
            color,
            created_at: line.created_at,
            time: format_time(line.created_at, mode),
            time_utc: format_utc(line.created_at),
            pod_name: line.pod_name.clone(),
            pod_short: line.pod_name.as_deref().map(short_pod),
            version: line.version.clone(),
            version_short: line.version.as_deref().map(short_version),
            container: line.container.clone(),
            level: line.level,
            message: line.message.clone(),
            placeholder,
            malformed: line.malformed,
        }
    }

    /// Tab-separated UTC time, full pod name and message, for the clipboard.
    #[must_use]
    pub fn copy_text(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.time_utc,
            self.pod_name.as_deref().unwrap_or("-"),
            self.message
        )
    }
}

/// Projects a whole view, assigning pod colors on first sighting.
pub fn project_rows(
    view: &MergedView,
    colors: &mut PodColorAssigner,
    mode: TimeMode,
) -> Vec<PresentationRow> {
    view.iter()
        .enumerate()
        .map(|(index, record)| {
            let color = colors.color_for(record.record.pod_name());
            PresentationRow::project(record, index, color, mode)
        })
        .collect()
}

/// Pod equality filter applied by the rendering surface.
///
/// It narrows what is shown without feeding back into the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodFilter {
    pod_name: Option<String>,
}

impl PodFilter {
    /// Filter that keeps every row.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Filter that keeps rows of one pod.
    #[must_use]
    pub fn pod(pod_name: impl Into<String>) -> Self {
        Self {
            pod_name: Some(pod_name.into()),
        }
    }

    /// Returns true if the row passes.
    #[must_use]
    pub fn matches(&self, row: &PresentationRow) -> bool {
        self.pod_name
            .as_deref()
            .is_none_or(|pod| row.pod_name.as_deref() == Some(pod))
    }

    /// Rows that pass, in order.
    pub fn apply<'a>(
        &'a self,
        rows: &'a [PresentationRow],
    ) -> impl Iterator<Item = &'a PresentationRow> + 'a {
        rows.iter().filter(move |row| self.matches(row))
    }
}

/// Piece of a message split around search matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text outside any match
    Plain(&'a str),
    /// Text matching the search term
    Match(&'a str),
}

impl fmt::Display for Segment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(text) | Self::Match(text) => f.write_str(text),
        }
    }
}

/// Splits a message around case-insensitive occurrences of `term`.
///
/// The term is matched literally; case folding is Unicode-aware.
#[must_use]
pub fn highlight_segments<'a>(message: &'a str, term: &str) -> Vec<Segment<'a>> {
    if term.is_empty() {
        return vec![Segment::Plain(message)];
    }
    let Ok(matcher) = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    else {
        return vec![Segment::Plain(message)];
    };

    let mut segments = Vec::new();
    let mut cursor = 0;
    for found in matcher.find_iter(message) {
        if found.start() > cursor {
            segments.push(Segment::Plain(&message[cursor..found.start()]));
        }
        segments.push(Segment::Match(found.as_str()));
        cursor = found.end();
    }
    if cursor < message.len() || segments.is_empty() {
        segments.push(Segment::Plain(&message[cursor..]));
    }
    segments
}
