// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stamps common metadata onto captured events.

use psycle_analytics_core::{
	validate_event_name, AnalyticsEvent, AppEnv, Platform, QueuedEvent, SCHEMA_VERSION,
	UNKNOWN_ANON_ID,
};

use crate::error::Result;

/// Per-build metadata shared by every event.
#[derive(Debug, Clone)]
pub struct EventFactory {
	build_id: String,
	platform: Platform,
}

/// Per-event values that may change while the process runs.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
	pub anon_id: Option<&'a str>,
	pub env: AppEnv,
	pub user_id: Option<&'a str>,
}

impl EventFactory {
	pub fn new(build_id: impl Into<String>, platform: Platform) -> Self {
		Self {
			build_id: build_id.into(),
			platform,
		}
	}

	pub fn build_id(&self) -> &str {
		&self.build_id
	}

	pub fn platform(&self) -> Platform {
		self.platform
	}

	/// Turns a captured event into a delivery-ready one.
	///
	/// The event id and timestamp of `queued` are kept as-is. A missing
	/// identity is stamped as `"unknown"`.
	pub fn build(&self, queued: &QueuedEvent, ctx: &EventContext<'_>) -> Result<AnalyticsEvent> {
		validate_event_name(&queued.name)?;

		Ok(AnalyticsEvent {
			event_id: queued.event_id,
			timestamp: queued.timestamp,
			anon_id: ctx.anon_id.unwrap_or(UNKNOWN_ANON_ID).to_string(),
			build_id: self.build_id.clone(),
			schema_version: SCHEMA_VERSION.to_string(),
			platform: self.platform,
			env: ctx.env,
			user_id: ctx.user_id.map(str::to_string),
			name: queued.name.clone(),
			properties: queued.properties.clone(),
		})
	}
}

impl Default for EventFactory {
	fn default() -> Self {
		Self::new(env!("CARGO_PKG_VERSION"), Platform::current())
	}
}
