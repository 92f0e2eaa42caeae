// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `KEY=VALUE` event property arguments.

use psycle_analytics::Properties;
use serde_json::Value;

/// Parses one `KEY=VALUE` argument.
///
/// Values that parse as JSON (numbers, booleans, null, arrays, objects,
/// quoted strings) keep their JSON type; anything else is a plain string.
pub fn parse_prop(raw: &str) -> Result<(String, Value), String> {
	let (key, value) = raw
		.split_once('=')
		.ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
	let key = key.trim();
	if key.is_empty() {
		return Err(format!("empty property key in `{raw}`"));
	}

	let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
	Ok((key.to_string(), value))
}

pub fn into_properties(props: Vec<(String, Value)>) -> Properties {
	props
		.into_iter()
		.fold(Properties::new(), |acc, (key, value)| acc.insert(key, value))
}
