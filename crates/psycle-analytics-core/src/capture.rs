// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! PostHog capture envelope.
//!
//! Events are sent to `https://{host}/i/v0/e/` as anonymous events: the
//! anonymous id is the `distinct_id` and `$process_person_profile` is false so
//! PostHog never creates a person profile.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::AnalyticsEvent;

/// Property key that stops PostHog from creating person profiles.
pub const PROCESS_PERSON_PROFILE: &str = "$process_person_profile";

/// Builds the capture URL for a PostHog host.
///
/// A bare host is given `https://`; a host that already names its scheme is
/// used as-is. Trailing slashes are ignored.
pub fn posthog_capture_url(host: &str) -> String {
	let host = host.trim().trim_end_matches('/');
	if host.starts_with("https://") || host.starts_with("http://") {
		format!("{host}/i/v0/e/")
	} else {
		format!("https://{host}/i/v0/e/")
	}
}

/// Body of a PostHog capture request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturePayload {
	pub api_key: String,
	pub event: String,
	pub distinct_id: String,
	pub properties: Map<String, Value>,
	pub timestamp: String,
}

impl CapturePayload {
	/// Converts an event into the PostHog envelope.
	///
	/// Common metadata is written after the caller's properties, so it wins on
	/// key collisions.
	pub fn from_event(event: &AnalyticsEvent, api_key: impl Into<String>) -> Self {
		let mut properties = Map::with_capacity(event.properties.len() + 7);
		properties.insert(PROCESS_PERSON_PROFILE.to_string(), Value::Bool(false));
		for (k, v) in &event.properties {
			properties.insert(k.clone(), v.clone());
		}
		properties.insert("buildId".to_string(), Value::from(event.build_id.clone()));
		properties.insert(
			"schemaVersion".to_string(),
			Value::from(event.schema_version.clone()),
		);
		properties.insert("platform".to_string(), Value::from(event.platform.as_str()));
		properties.insert("env".to_string(), Value::from(event.env.as_str()));
		properties.insert("eventId".to_string(), Value::from(event.event_id.to_string()));
		if let Some(user_id) = &event.user_id {
			properties.insert("userId".to_string(), Value::from(user_id.clone()));
		}

		Self {
			api_key: api_key.into(),
			event: event.name.clone(),
			distinct_id: event.anon_id.clone(),
			properties,
			timestamp: event.timestamp_iso(),
		}
	}
}
