//! Core record types for the live log pipeline.
//!
//! This module provides:
//! - [`ChannelKind`]: Which feed a record arrived on
//! - [`RawLogRecord`]: A record as the transport hands it over
//! - [`LogRecord`]: The normalized record, tagged by channel
//! - [`SequencedRecord`]: A record stamped with its arrival [`SequenceId`]

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Largest `created_at` still read as milliseconds; wider values are nanoseconds.
const MAX_MILLIS_TIMESTAMP: i64 = 9_999_999_999_999;

/// Arrival-order identifier, unique across both channels of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceId(pub u64);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The logical feed a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Application/service logs
    Service,
    /// Infrastructure sidecar logs (ingress, proxy)
    Infra,
}

impl ChannelKind {
    /// Returns the string representation of this channel kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Infra => "infra",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to a record, when the source provides one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debugging information
    Debug,
    /// General information
    Info,
    /// Warning conditions
    Warning,
    /// Error conditions
    Error,
    /// Critical conditions
    Critical,
    /// Missing or unrecognized level
    Unknown,
}

impl LogLevel {
    /// Parses a level label, case-insensitively. Unrecognized labels map to `Unknown`.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warning,
            "error" | "err" => Self::Error,
            "critical" | "fatal" => Self::Critical,
            _ => Self::Unknown,
        }
    }

    /// Returns the string representation of this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

/// Infrastructure component an infra record was emitted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfraComponent {
    /// Ingress controller
    Ingress,
    /// Sidecar or edge proxy
    Proxy,
    /// Any other component label
    Other(String),
}

impl InfraComponent {
    /// Maps a component label onto a known component.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_ascii_lowercase();
        if lower.contains("ingress") || lower.contains("nginx") {
            Self::Ingress
        } else if lower.contains("proxy") || lower.contains("envoy") {
            Self::Proxy
        } else {
            Self::Other(label.trim().to_string())
        }
    }
}

/// A record as delivered by the transport, before normalization.
///
/// Every field is optional so that a partial delivery still deserializes;
/// [`LogRecord::from_raw`] decides what a missing field means.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogRecord {
    /// Pod that produced the line
    #[serde(default, alias = "pod", alias = "instance")]
    pub pod_name: Option<String>,
    /// Epoch timestamp, milliseconds or nanoseconds
    #[serde(default, alias = "timestamp")]
    pub created_at: Option<i64>,
    /// The log message
    #[serde(default)]
    pub message: Option<String>,
    /// Short content hash or tag of the deployed version
    #[serde(default)]
    pub version: Option<String>,
    /// Container within the pod
    #[serde(default)]
    pub container: Option<String>,
    /// Severity label
    #[serde(default)]
    pub level: Option<String>,
    /// Infra component label
    #[serde(default)]
    pub component: Option<String>,
}

impl RawLogRecord {
    /// Creates a raw record with a timestamp and a message.
    #[must_use]
    pub fn new(created_at: i64, message: impl Into<String>) -> Self {
        Self {
            created_at: Some(created_at),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Sets the pod name.
    #[must_use]
    pub fn with_pod(mut self, pod_name: impl Into<String>) -> Self {
        self.pod_name = Some(pod_name.into());
        self
    }

    /// Sets the version tag.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the container name.
    #[must_use]
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Sets the severity label.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Sets the infra component label.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

/// Fields shared by both record variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Pod that produced the line; `None` when absent or empty
    pub pod_name: Option<String>,
    /// Epoch milliseconds
    pub created_at: i64,
    /// The log message
    pub message: String,
    /// Short content hash or tag of the deployed version
    pub version: Option<String>,
    /// Container within the pod
    pub container: Option<String>,
    /// Severity
    pub level: LogLevel,
    /// Set when `created_at` or `message` had to be defaulted
    pub malformed: bool,
}

/// A normalized log record, tagged by the channel it arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum LogRecord {
    /// Application/service record
    Service(LogLine),
    /// Infrastructure record
    Infra {
        /// Emitting component, when labelled
        component: Option<InfraComponent>,
        /// Shared fields
        #[serde(flatten)]
        line: LogLine,
    },
}

/// Converts a raw timestamp to epoch milliseconds.
///
/// Timestamps with more than 13 digits are nanoseconds.
#[must_use]
pub const fn normalize_timestamp(raw: i64) -> i64 {
    if raw > MAX_MILLIS_TIMESTAMP {
        raw / 1_000_000
    } else {
        raw
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl LogRecord {
    /// Normalizes a transport record for the given channel.
    ///
    /// Never fails: a missing timestamp becomes 0 and a missing message
    /// becomes empty, with [`LogLine::malformed`] set.
    #[must_use]
    pub fn from_raw(kind: ChannelKind, raw: RawLogRecord) -> Self {
        let malformed = raw.created_at.is_none() || raw.message.is_none();
        let line = LogLine {
            pod_name: non_empty(raw.pod_name),
            created_at: raw.created_at.map_or(0, normalize_timestamp),
            message: raw.message.unwrap_or_default(),
            version: non_empty(raw.version),
            container: non_empty(raw.container),
            level: raw.level.as_deref().map_or(LogLevel::Unknown, LogLevel::parse),
            malformed,
        };

        match kind {
            ChannelKind::Service => Self::Service(line),
            ChannelKind::Infra => Self::Infra {
                component: raw.component.as_deref().map(InfraComponent::from_label),
                line,
            },
        }
    }

    /// Returns the shared fields.
    #[must_use]
    pub const fn line(&self) -> &LogLine {
        match self {
            Self::Service(line) | Self::Infra { line, .. } => line,
        }
    }

    /// Returns the channel this record arrived on.
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        match self {
            Self::Service(_) => ChannelKind::Service,
            Self::Infra { .. } => ChannelKind::Infra,
        }
    }

    /// Epoch milliseconds of the record.
    #[must_use]
    pub const fn created_at(&self) -> i64 {
        self.line().created_at
    }

    /// Pod name, if the record has one.
    #[must_use]
    pub fn pod_name(&self) -> Option<&str> {
        self.line().pod_name.as_deref()
    }

    /// The log message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.line().message
    }
}

/// A record stamped with the id it was assigned on arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedRecord {
    /// Arrival order across both channels
    pub sequence_id: SequenceId,
    /// The normalized record
    pub record: LogRecord,
}

impl SequencedRecord {
    /// Display ordering key: `(created_at, sequence_id)`.
    #[must_use]
    pub const fn sort_key(&self) -> (i64, SequenceId) {
        (self.record.created_at(), self.sequence_id)
    }
}

/// Records are shared between buffers and views without copying.
pub type SharedRecord = Arc<SequencedRecord>;
