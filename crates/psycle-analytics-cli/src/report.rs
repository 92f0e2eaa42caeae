// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Self-test report output.
//!
//! Only debug builds and `e2e-debug` builds carry the in-memory recorder.
//! Other builds accept the flags and explain why there is nothing to print.

pub use imp::SelfTest;

#[cfg(any(debug_assertions, feature = "e2e-debug"))]
mod imp {
	use std::sync::Arc;

	use anyhow::Result;
	use psycle_analytics::{InMemoryDebugRecorder, SharedDebugRecorder};

	pub struct SelfTest {
		recorder: Arc<InMemoryDebugRecorder>,
	}

	impl SelfTest {
		pub fn new(second_launch: bool) -> Self {
			let recorder = Arc::new(InMemoryDebugRecorder::new());
			recorder.set_second_launch_mode(second_launch);
			Self { recorder }
		}

		pub fn recorder(&self) -> SharedDebugRecorder {
			self.recorder.clone()
		}

		pub fn print(&self, json: bool) -> Result<()> {
			if json {
				println!("{}", serde_json::to_string_pretty(&self.recorder.snapshot())?);
			} else {
				println!("{}", self.recorder.report());
			}
			Ok(())
		}

		pub fn passed(&self) -> bool {
			self.recorder.evaluate().is_empty()
		}
	}
}

#[cfg(not(any(debug_assertions, feature = "e2e-debug")))]
mod imp {
	use std::sync::Arc;

	use anyhow::Result;
	use psycle_analytics::{NoOpDebugRecorder, SharedDebugRecorder};
	use tracing::warn;

	pub struct SelfTest;

	impl SelfTest {
		pub fn new(_second_launch: bool) -> Self {
			Self
		}

		pub fn recorder(&self) -> SharedDebugRecorder {
			Arc::new(NoOpDebugRecorder)
		}

		pub fn print(&self, _json: bool) -> Result<()> {
			warn!("self-test report requires a debug build or the e2e-debug feature");
			Ok(())
		}

		pub fn passed(&self) -> bool {
			true
		}
	}
}
