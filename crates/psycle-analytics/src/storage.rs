// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable key-value storage consumed by the pipeline.
//!
//! The pipeline needs only three string-keyed operations. [`MemoryStore`]
//! keeps values in memory (share one `Arc` between clients to simulate two
//! launches on the same device), [`FileStore`] keeps them in a JSON file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;

/// Storage key of the anonymous identity.
pub const ANON_ID_KEY: &str = "@psycle/analytics_anon_id";
/// Storage key of the "app_open already sent" flag.
pub const APP_OPEN_TRACKED_KEY: &str = "@psycle/analytics_did_track_app_open";

/// Async string-keyed persistence that survives process restarts.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
	async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

	async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

	async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
	values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.values.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.read().is_empty()
	}
}

#[async_trait]
impl KeyValueStore for MemoryStore {
	async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		Ok(self.values.read().get(key).cloned())
	}

	async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		self.values.write().insert(key.to_string(), value.to_string());
		Ok(())
	}

	async fn remove(&self, key: &str) -> Result<(), StorageError> {
		self.values.write().remove(key);
		Ok(())
	}
}

/// Store backed by a single JSON object on disk.
///
/// Each write rewrites the whole file through a temporary file and a rename.
/// A missing file reads as empty.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl FileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
		match tokio::fs::read(&self.path).await {
			Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
			Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
			Err(e) => Err(e.into()),
		}
	}

	async fn write_all(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				tokio::fs::create_dir_all(parent).await?;
			}
		}
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, serde_json::to_vec_pretty(values)?).await?;
		tokio::fs::rename(&tmp, &self.path).await?;
		debug!(path = %self.path.display(), entries = values.len(), "wrote analytics store");
		Ok(())
	}
}

#[async_trait]
impl KeyValueStore for FileStore {
	async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		let _guard = self.lock.lock().await;
		Ok(self.read_all().await?.remove(key))
	}

	async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let _guard = self.lock.lock().await;
		let mut values = self.read_all().await?;
		values.insert(key.to_string(), value.to_string());
		self.write_all(&values).await
	}

	async fn remove(&self, key: &str) -> Result<(), StorageError> {
		let _guard = self.lock.lock().await;
		let mut values = self.read_all().await?;
		if values.remove(key).is_some() {
			self.write_all(&values).await?;
		}
		Ok(())
	}
}
