//! # live-logs
//!
//! Live log view pipeline for one service.
//!
//! Two independent feeds (service logs and infra logs) arrive in arbitrary
//! interleaving. This crate stamps every record with a session-wide
//! [`SequenceId`], buffers each feed separately, recomputes a single ordered
//! [`MergedView`] at a bounded rate, and lets the user freeze presentation
//! without stopping ingestion.
//!
//! This crate provides:
//!
//! - [`LogChannel`]: One subscription plus its [`ChannelBuffer`]
//! - [`LogTransport`]: Seam to whatever delivers records ([`MemoryTransport`] in-process)
//! - [`BatchScheduler`]: Debounced recompute deadline
//! - [`merge_filter_sort`]: The pure merge step
//! - [`PauseController`]: Freeze/unfreeze of the presented view
//! - [`PodColorAssigner`] and [`PresentationRow`]: Display projection
//! - [`LogSession`]: All of the above for one open view
//! - [`SessionDriver`]: Async event loop around a session
//!
//! ## Example
//!
//! ```rust
//! use live_logs::{
//!     ChannelKind, LiveLogsConfig, LogSession, MemoryTransport, RawLogRecord, SessionWindow,
//!     SubscriptionKey,
//! };
//! use tokio::time::Instant;
//!
//! let transport = MemoryTransport::shared();
//! let key = SubscriptionKey::new("org", "cluster", "project", "env", "api");
//!
//! let mut session = LogSession::open(
//!     LiveLogsConfig::default(),
//!     transport.clone(),
//!     Some(key.clone()),
//!     SessionWindow::new(0),
//! )?;
//!
//! transport.publish(ChannelKind::Infra, &key, RawLogRecord::new(20, "GET /health 200"));
//! transport.publish(ChannelKind::Service, &key, RawLogRecord::new(10, "listening"));
//!
//! let view = session.flush(Instant::now());
//! assert_eq!(view.len(), 2);
//! assert_eq!(view.as_slice()[0].record.message(), "listening");
//! # Ok::<(), live_logs::LiveLogsError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod channel;
pub mod color;
pub mod config;
pub mod driver;
pub mod error;
pub mod merge;
pub mod pause;
pub mod row;
pub mod scheduler;
pub mod sequence;
pub mod session;
pub mod transport;
pub mod types;
pub mod view;

// Re-export main types
pub use buffer::ChannelBuffer;
pub use channel::{ChannelState, InactiveReason, LogChannel, SubscriptionKey};
pub use color::{palette_index, PodColor, PodColorAssigner, POD_PALETTE};
pub use config::LiveLogsConfig;
pub use driver::{DriverHandle, SessionDriver, ViewCommand};
pub use error::{LiveLogsError, Result};
pub use merge::merge_filter_sort;
pub use pause::{PauseController, PauseState};
pub use row::{
    format_time, format_utc, highlight_segments, project_rows, short_pod, short_version, PodFilter,
    PresentationRow, Segment, TimeMode,
};
pub use scheduler::BatchScheduler;
pub use sequence::SequenceAssigner;
pub use session::{LiveView, LogSession, SessionId};
pub use transport::{Delivery, LogTransport, MemoryTransport, SharedTransport, Subscription};
pub use types::{
    normalize_timestamp, ChannelKind, InfraComponent, LogLevel, LogLine, LogRecord, RawLogRecord,
    SequenceId, SequencedRecord, SharedRecord,
};
pub use view::{MergedView, SessionWindow, ViewState, NO_PODS_MESSAGE};
