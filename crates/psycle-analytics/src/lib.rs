// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side analytics pipeline for Psycle.
//!
//! Captures lifecycle and product events from the app, stamps them with an
//! anonymous per-install identity and build metadata, and delivers them on a
//! best-effort basis to up to two HTTP sinks. Tracking never blocks the caller
//! and never surfaces an error.
//!
//! # Features
//!
//! - **Pre-initialization queue**: events tracked before the identity is
//!   resolved keep their original id and timestamp and are flushed in order
//! - **Coalesced initialization**: concurrent callers share one in-flight
//!   initialization; a failed attempt can be retried
//! - **Lifecycle guards**: `app_open` once per install, `session_start` and
//!   `app_ready` once per process
//! - **Independent sinks**: a generic JSON endpoint and PostHog, each with its
//!   own timeout
//! - **Debug recorder**: an in-memory ring buffer with a self-test report,
//!   compiled into debug builds and `e2e-debug` builds
//!
//! # Example
//!
//! ```ignore
//! use psycle_analytics::{AnalyticsClient, FileStore, Properties};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnalyticsClient::builder()
//!         .store(Arc::new(FileStore::new("/var/lib/psycle/analytics.json")))
//!         .build()?;
//!
//!     client.track_session_start();
//!     client.initialize(None).await?;
//!     client.track_app_open().await;
//!     client.track_app_ready();
//!
//!     client.track(
//!         "lesson_complete",
//!         Properties::new().insert("lessonId", "mental_l01").insert("genreId", "mental"),
//!     );
//!
//!     Ok(())
//! }
//! ```

mod builder;
mod client;
mod debug;
mod error;
mod identity;
mod queue;
mod sink;
mod storage;

pub use builder::{EventContext, EventFactory};
pub use client::{AnalyticsClient, AnalyticsClientBuilder, INITIALIZED_LABEL};
pub use debug::{DebugRecorder, DebugStatus, NoOpDebugRecorder, SharedDebugRecorder};
#[cfg(any(debug_assertions, feature = "e2e-debug"))]
pub use debug::{
	DebugEvent, DebugEventKind, DebugState, InMemoryDebugRecorder, MAX_DEBUG_EVENTS, REPORT_EVENTS,
};
pub use error::{AnalyticsError, Result, StorageError};
pub use identity::{IdentityProvider, StoredIdentityProvider};
pub use queue::EventQueue;
pub use sink::{EventSink, HttpSink, PostHogSink, SharedEventSink, SinkSet, DEFAULT_SEND_TIMEOUT};
pub use storage::{FileStore, KeyValueStore, MemoryStore, ANON_ID_KEY, APP_OPEN_TRACKED_KEY};

// Re-export core types for convenience
pub use psycle_analytics_core::{
	names, AnalyticsConfig, AnalyticsEvent, AppEnv, ConfigOverrides, Platform, Properties,
	QueuedEvent, SCHEMA_VERSION, UNKNOWN_ANON_ID,
};
