// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Events held back until initialization completes.

use std::collections::VecDeque;

use psycle_analytics_core::QueuedEvent;

/// FIFO of events submitted before the anonymous identity is known.
///
/// Lives only in memory; events still queued when the process dies are lost.
#[derive(Debug, Default)]
pub struct EventQueue {
	events: VecDeque<QueuedEvent>,
}

impl EventQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, event: QueuedEvent) {
		self.events.push_back(event);
	}

	/// Removes every queued event, oldest first.
	pub fn drain(&mut self) -> Vec<QueuedEvent> {
		self.events.drain(..).collect()
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn clear(&mut self) {
		self.events.clear();
	}
}
