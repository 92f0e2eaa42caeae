// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Helper for building event properties.

use serde_json::{Map, Value};

/// A builder for free-form event properties.
///
/// # Example
///
/// ```
/// use psycle_analytics_core::Properties;
///
/// let props = Properties::new()
///     .insert("lessonId", "mental_l03")
///     .insert("genreId", "mental")
///     .insert("questionIndex", 4)
///     .insert("isReviewRound", false);
/// assert_eq!(props.len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair. A later insert of the same key wins.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}
}

impl From<Properties> for Map<String, Value> {
	fn from(props: Properties) -> Self {
		props.inner
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

/// Non-object values carry no properties.
impl From<Value> for Properties {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self { inner: map },
			_ => Self::new(),
		}
	}
}

impl From<()> for Properties {
	fn from(_: ()) -> Self {
		Self::new()
	}
}
