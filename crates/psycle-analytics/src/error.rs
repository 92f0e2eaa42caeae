// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics pipeline.
//!
//! None of these ever reach the code calling `track()`. Only the direct caller
//! of `initialize()` can observe [`AnalyticsError::InitializationFailed`].

use psycle_analytics_core::EventNameError;
use thiserror::Error;

/// Key-value store errors.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("storage I/O failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("storage data is corrupt: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("storage unavailable: {0}")]
	Unavailable(String),
}

/// Analytics pipeline errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	#[error(transparent)]
	Storage(#[from] StorageError),

	/// HTTP request failed before a response arrived.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// A sink answered with a non-2xx status.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// A sink did not answer within its timeout.
	#[error("{sink} request timed out after {timeout_ms}ms")]
	Timeout { sink: &'static str, timeout_ms: u64 },

	#[error("analytics initialization failed: {0}")]
	InitializationFailed(String),

	#[error("invalid event: {0}")]
	InvalidEvent(#[from] EventNameError),

	/// The client was built outside a Tokio runtime.
	#[error("analytics client requires a Tokio runtime")]
	NoRuntime,

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
