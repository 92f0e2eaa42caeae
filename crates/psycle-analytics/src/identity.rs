// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Anonymous identity resolution.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::{KeyValueStore, ANON_ID_KEY};

/// Source of the anonymous identity used as `anonId` / `distinct_id`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
	/// Returns the identity of this install.
	async fn resolve(&self) -> Result<String>;
}

/// Identity persisted in a [`KeyValueStore`].
///
/// The first resolution generates a UUID v4 and stores it; later resolutions
/// read it back. If the store fails, the failure is logged and a fresh
/// identifier is returned for this process only, so this provider never
/// returns an error.
pub struct StoredIdentityProvider {
	store: Arc<dyn KeyValueStore>,
}

impl StoredIdentityProvider {
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}

	async fn load_or_create(&self) -> Result<String> {
		if let Some(stored) = self.store.get(ANON_ID_KEY).await? {
			if !stored.is_empty() {
				return Ok(stored);
			}
		}

		let id = Uuid::new_v4().to_string();
		self.store.set(ANON_ID_KEY, &id).await?;
		debug!(anon_id = %id, "generated anonymous id");
		Ok(id)
	}
}

#[async_trait]
impl IdentityProvider for StoredIdentityProvider {
	async fn resolve(&self) -> Result<String> {
		match self.load_or_create().await {
			Ok(id) => Ok(id),
			Err(e) => {
				error!(error = %e, "failed to load or persist anonymous id, using in-memory id");
				Ok(Uuid::new_v4().to_string())
			}
		}
	}
}
