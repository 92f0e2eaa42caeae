// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event types.
//!
//! A [`QueuedEvent`] is captured the moment `track()` is called, before the
//! anonymous identity may be known. Once the identity is resolved it is
//! turned into an [`AnalyticsEvent`], keeping its original id and timestamp.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Schema version stamped on every event.
pub const SCHEMA_VERSION: &str = "analytics_v1";

/// Placeholder identity used when none has been resolved yet.
pub const UNKNOWN_ANON_ID: &str = "unknown";

/// Maximum accepted length of an event name.
pub const MAX_EVENT_NAME_LEN: usize = 200;

/// Platform the app runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
	Ios,
	Android,
	Web,
}

impl Platform {
	/// The platform of the current compilation target.
	///
	/// Targets other than iOS and Android report as `web`.
	pub const fn current() -> Self {
		if cfg!(target_os = "ios") {
			Platform::Ios
		} else if cfg!(target_os = "android") {
			Platform::Android
		} else {
			Platform::Web
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Platform::Ios => "ios",
			Platform::Android => "android",
			Platform::Web => "web",
		}
	}
}

impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Deployment environment of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
	Dev,
	Prod,
}

impl AppEnv {
	/// Environment implied by the build profile.
	pub const fn from_build() -> Self {
		if cfg!(debug_assertions) {
			AppEnv::Dev
		} else {
			AppEnv::Prod
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			AppEnv::Dev => "dev",
			AppEnv::Prod => "prod",
		}
	}
}

impl fmt::Display for AppEnv {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid app environment {0:?}, expected \"dev\" or \"prod\"")]
pub struct ParseAppEnvError(pub String);

impl FromStr for AppEnv {
	type Err = ParseAppEnvError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"dev" => Ok(AppEnv::Dev),
			"prod" => Ok(AppEnv::Prod),
			other => Err(ParseAppEnvError(other.to_string())),
		}
	}
}

/// Reasons an event name is rejected before delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventNameError {
	#[error("event name is empty")]
	Empty,

	#[error("event name is {0} characters, maximum is {MAX_EVENT_NAME_LEN}")]
	TooLong(usize),

	#[error("event name contains control characters")]
	ControlCharacter,
}

/// Checks that an event name can be delivered.
pub fn validate_event_name(name: &str) -> Result<(), EventNameError> {
	if name.trim().is_empty() {
		return Err(EventNameError::Empty);
	}
	let len = name.chars().count();
	if len > MAX_EVENT_NAME_LEN {
		return Err(EventNameError::TooLong(len));
	}
	if name.chars().any(char::is_control) {
		return Err(EventNameError::ControlCharacter);
	}
	Ok(())
}

/// An event captured before the anonymous identity is known.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
	pub name: String,
	pub properties: Map<String, Value>,
	pub event_id: Uuid,
	pub timestamp: DateTime<Utc>,
}

impl QueuedEvent {
	/// Captures an event now, assigning a fresh id and the current time.
	pub fn capture(name: impl Into<String>, properties: Map<String, Value>) -> Self {
		Self {
			name: name.into(),
			properties,
			event_id: Uuid::new_v4(),
			timestamp: Utc::now(),
		}
	}
}

/// A delivery-ready event with all common metadata stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
	pub event_id: Uuid,
	#[serde(with = "iso_millis")]
	pub timestamp: DateTime<Utc>,
	pub anon_id: String,
	pub build_id: String,
	pub schema_version: String,
	pub platform: Platform,
	pub env: AppEnv,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	pub name: String,
	#[serde(default)]
	pub properties: Map<String, Value>,
}

impl AnalyticsEvent {
	/// Returns true if the event carries a resolved identity.
	pub fn has_resolved_identity(&self) -> bool {
		self.anon_id != UNKNOWN_ANON_ID
	}

	/// ISO-8601 timestamp with millisecond precision, e.g. `2025-01-01T00:00:00.000Z`.
	pub fn timestamp_iso(&self) -> String {
		iso_millis::format(&self.timestamp)
	}
}

/// Serde adapter writing timestamps as `YYYY-MM-DDTHH:MM:SS.sssZ`.
pub(crate) mod iso_millis {
	use chrono::{DateTime, SecondsFormat, Utc};
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn format(ts: &DateTime<Utc>) -> String {
		ts.to_rfc3339_opts(SecondsFormat::Millis, true)
	}

	pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&format(ts))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;
		DateTime::parse_from_rfc3339(&raw)
			.map(|ts| ts.with_timezone(&Utc))
			.map_err(serde::de::Error::custom)
	}
}
