// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Observer port for event transitions.
//!
//! The client reports every event transition (queued, sent, failed) and
//! lifecycle milestones to a [`DebugRecorder`]. Production clients use the
//! [`NoOpDebugRecorder`]. Debug builds, and release builds with the
//! `e2e-debug` feature, also get [`InMemoryDebugRecorder`], which backs the
//! in-app self-test screen and E2E assertions such as "session_start fired
//! exactly once" and "anonId is stable across launches".
//!
//! Recorders only observe; nothing they do changes delivery.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status of a recorded transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugStatus {
	Queued,
	Sent,
	Failed,
	System,
}

impl DebugStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			DebugStatus::Queued => "queued",
			DebugStatus::Sent => "sent",
			DebugStatus::Failed => "failed",
			DebugStatus::System => "system",
		}
	}
}

impl std::fmt::Display for DebugStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Receives event transitions from the analytics client.
pub trait DebugRecorder: Send + Sync + 'static {
	/// An event was queued, handed to the sinks, or failed locally.
	fn record_event(
		&self,
		name: &str,
		status: DebugStatus,
		anon_id: &str,
		properties: &Map<String, Value>,
	);

	/// A lifecycle milestone such as `initialized`.
	fn record_system(&self, label: &str, anon_id: &str);

	/// The anonymous identity was resolved.
	fn set_current_anon_id(&self, anon_id: &str);
}

/// Type alias for a shared recorder.
pub type SharedDebugRecorder = Arc<dyn DebugRecorder>;

/// A recorder that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpDebugRecorder;

impl DebugRecorder for NoOpDebugRecorder {
	fn record_event(
		&self,
		_name: &str,
		_status: DebugStatus,
		_anon_id: &str,
		_properties: &Map<String, Value>,
	) {
	}

	fn record_system(&self, _label: &str, _anon_id: &str) {}

	fn set_current_anon_id(&self, _anon_id: &str) {}
}

#[cfg(any(debug_assertions, feature = "e2e-debug"))]
pub use recorder::{
	DebugEvent, DebugEventKind, DebugState, InMemoryDebugRecorder, MAX_DEBUG_EVENTS, REPORT_EVENTS,
};

#[cfg(any(debug_assertions, feature = "e2e-debug"))]
mod recorder {
	use std::collections::{BTreeMap, VecDeque};
	use std::fmt::Write;

	use chrono::{DateTime, SecondsFormat, Utc};
	use parking_lot::RwLock;
	use psycle_analytics_core::names::{self, CORE_EVENTS};
	use psycle_analytics_core::UNKNOWN_ANON_ID;
	use serde::{Deserialize, Serialize};
	use serde_json::{Map, Value};

	use super::{DebugRecorder, DebugStatus};

	/// Capacity of the event ring buffer.
	pub const MAX_DEBUG_EVENTS: usize = 100;
	/// Number of events listed in [`InMemoryDebugRecorder::report`].
	pub const REPORT_EVENTS: usize = 10;

	#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
	#[serde(rename_all = "lowercase")]
	pub enum DebugEventKind {
		Event,
		System,
	}

	/// One recorded transition.
	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	#[serde(rename_all = "camelCase")]
	pub struct DebugEvent {
		pub kind: DebugEventKind,
		pub name: String,
		pub status: DebugStatus,
		pub anon_id: String,
		pub timestamp: DateTime<Utc>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		pub meta: Option<Map<String, Value>>,
	}

	/// Snapshot for the self-test screen and E2E harness.
	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	#[serde(rename_all = "camelCase")]
	pub struct DebugState {
		pub anon_id: String,
		/// Newest first.
		pub events: Vec<DebugEvent>,
		pub counters: BTreeMap<String, u64>,
		pub failures: Vec<String>,
		pub passed: bool,
		pub second_launch_mode: bool,
	}

	struct Inner {
		events: VecDeque<DebugEvent>,
		counters: BTreeMap<String, u64>,
		current_anon_id: String,
		second_launch_mode: bool,
	}

	impl Inner {
		fn new(anon_id: String) -> Self {
			Self {
				events: VecDeque::with_capacity(MAX_DEBUG_EVENTS),
				counters: zeroed_counters(),
				current_anon_id: anon_id,
				second_launch_mode: false,
			}
		}

		fn count(&self, name: &str) -> u64 {
			self.counters.get(name).copied().unwrap_or(0)
		}
	}

	fn zeroed_counters() -> BTreeMap<String, u64> {
		CORE_EVENTS.iter().map(|name| (name.to_string(), 0)).collect()
	}

	/// Ring-buffer recorder with per-event counters and a pass/fail judgment.
	pub struct InMemoryDebugRecorder {
		inner: RwLock<Inner>,
	}

	impl Default for InMemoryDebugRecorder {
		fn default() -> Self {
			Self::new()
		}
	}

	impl InMemoryDebugRecorder {
		pub fn new() -> Self {
			Self {
				inner: RwLock::new(Inner::new(UNKNOWN_ANON_ID.to_string())),
			}
		}

		fn push(
			&self,
			name: &str,
			status: DebugStatus,
			anon_id: &str,
			meta: Option<Map<String, Value>>,
		) {
			let kind = if status == DebugStatus::System {
				DebugEventKind::System
			} else {
				DebugEventKind::Event
			};
			let event = DebugEvent {
				kind,
				name: name.to_string(),
				status,
				anon_id: anon_id.to_string(),
				timestamp: Utc::now(),
				meta,
			};

			let mut inner = self.inner.write();
			if inner.events.len() >= MAX_DEBUG_EVENTS {
				inner.events.pop_front();
			}
			inner.events.push_back(event);

			if status != DebugStatus::System && names::is_core_event(name) {
				*inner.counters.entry(name.to_string()).or_insert(0) += 1;
			}
			inner.current_anon_id = anon_id.to_string();
		}

		/// Marks this run as a second launch, where `app_open` must not fire.
		pub fn set_second_launch_mode(&self, enabled: bool) {
			self.inner.write().second_launch_mode = enabled;
		}

		pub fn is_second_launch_mode(&self) -> bool {
			self.inner.read().second_launch_mode
		}

		pub fn current_anon_id(&self) -> String {
			self.inner.read().current_anon_id.clone()
		}

		/// Number of recorded non-system transitions of a core event.
		pub fn count(&self, name: &str) -> u64 {
			self.inner.read().count(name)
		}

		/// The `limit` most recent entries, newest first.
		pub fn recent(&self, limit: usize) -> Vec<DebugEvent> {
			self.inner.read().events.iter().rev().take(limit).cloned().collect()
		}

		/// Checks the recorded history against the self-test rules.
		///
		/// Returns the list of violations; an empty list is a pass.
		pub fn evaluate(&self) -> Vec<String> {
			let inner = self.inner.read();
			let mut failures = Vec::new();

			if inner.current_anon_id.contains(UNKNOWN_ANON_ID) {
				failures.push("anonId is unknown".to_string());
			}

			let session_starts = inner.count(names::SESSION_START);
			if session_starts > 1 {
				failures.push(format!(
					"session_start fired {session_starts} times (expected at most 1)"
				));
			}

			let app_readies = inner.count(names::APP_READY);
			if app_readies > 1 {
				failures.push(format!(
					"app_ready fired {app_readies} times (expected at most 1)"
				));
			}

			if inner
				.events
				.iter()
				.any(|e| e.name == names::APP_READY && e.status == DebugStatus::Queued)
			{
				failures.push("app_ready was queued (should fire after initialize)".to_string());
			}

			if inner.second_launch_mode && inner.count(names::APP_OPEN) > 0 {
				failures.push(
					"app_open fired in second launch mode (should fire only on first launch)"
						.to_string(),
				);
			}

			failures
		}

		pub fn snapshot(&self) -> DebugState {
			let failures = self.evaluate();
			let inner = self.inner.read();
			DebugState {
				anon_id: inner.current_anon_id.clone(),
				events: inner.events.iter().rev().cloned().collect(),
				counters: inner.counters.clone(),
				passed: failures.is_empty(),
				failures,
				second_launch_mode: inner.second_launch_mode,
			}
		}

		/// Human-readable self-test report.
		pub fn report(&self) -> String {
			let state = self.snapshot();
			let mut out = String::new();

			let _ = writeln!(out, "=== Analytics Self-Test Report ===");
			let _ = writeln!(out);
			let _ = writeln!(out, "Status: {}", if state.passed { "PASS" } else { "FAIL" });
			let _ = writeln!(out, "anonId: {}", state.anon_id);
			let _ = writeln!(
				out,
				"Second Launch Mode: {}",
				if state.second_launch_mode { "ON" } else { "OFF" }
			);
			let _ = writeln!(
				out,
				"Timestamp: {}",
				Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
			);
			let _ = writeln!(out);
			let _ = writeln!(out, "--- Event Counters ---");
			for name in CORE_EVENTS {
				let _ = writeln!(out, "{name}: {}", state.counters.get(*name).copied().unwrap_or(0));
			}

			if !state.failures.is_empty() {
				let _ = writeln!(out);
				let _ = writeln!(out, "--- Failures ---");
				for (i, failure) in state.failures.iter().enumerate() {
					let _ = writeln!(out, "{}. {failure}", i + 1);
				}
			}

			let _ = writeln!(out);
			let _ = writeln!(out, "--- Recent Events (last {REPORT_EVENTS}) ---");
			for event in state.events.iter().take(REPORT_EVENTS) {
				let short_id: String = event.anon_id.chars().take(8).collect();
				let _ = writeln!(
					out,
					"[{}] {} ({}) - {short_id}...",
					event.timestamp.format("%H:%M:%S"),
					event.name,
					event.status
				);
			}

			let _ = writeln!(out);
			out.push_str("=== End of Report ===");
			out
		}

		/// Clears history, counters and second-launch mode. The anon id is kept.
		pub fn reset(&self) {
			let mut inner = self.inner.write();
			inner.events.clear();
			inner.counters = zeroed_counters();
			inner.second_launch_mode = false;
		}
	}

	impl DebugRecorder for InMemoryDebugRecorder {
		fn record_event(
			&self,
			name: &str,
			status: DebugStatus,
			anon_id: &str,
			properties: &Map<String, Value>,
		) {
			let meta = (!properties.is_empty()).then(|| properties.clone());
			self.push(name, status, anon_id, meta);
		}

		fn record_system(&self, label: &str, anon_id: &str) {
			self.push(label, DebugStatus::System, anon_id, None);
		}

		fn set_current_anon_id(&self, anon_id: &str) {
			self.inner.write().current_anon_id = anon_id.to_string();
		}
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_strings() {
		assert_eq!(DebugStatus::Queued.to_string(), "queued");
		assert_eq!(
			serde_json::to_value(DebugStatus::Failed).unwrap(),
			serde_json::json!("failed")
		);
	}

	#[test]
	fn noop_recorder_accepts_everything() {
		let recorder: SharedDebugRecorder = Arc::new(NoOpDebugRecorder);
		recorder.record_event("app_open", DebugStatus::Sent, "anon", &Map::new());
		recorder.record_system("initialized", "anon");
		recorder.set_current_anon_id("anon");
	}
}
