// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analytics configuration.
//!
//! The configuration is read once from the environment and may be refined by
//! a [`ConfigOverrides`] passed to the client's `initialize()`.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `PSYCLE_ANALYTICS_ENABLED` | `0`, `false`, `no` or `off` disables tracking |
//! | `PSYCLE_ANALYTICS_DEBUG` | verbose delivery logging, defaults on in debug builds |
//! | `PSYCLE_APP_ENV` | `dev` or `prod`; anything else is ignored with a warning |
//! | `PSYCLE_ANALYTICS_ENDPOINT` | generic HTTP sink URL |
//! | `PSYCLE_POSTHOG_HOST` | PostHog ingestion host, e.g. `eu.i.posthog.com` |
//! | `PSYCLE_POSTHOG_API_KEY` | PostHog project API key |

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::event::AppEnv;

/// Prefix shared by all analytics environment variables.
pub const ENV_PREFIX: &str = "PSYCLE_";

const VAR_ENABLED: &str = "PSYCLE_ANALYTICS_ENABLED";
const VAR_DEBUG: &str = "PSYCLE_ANALYTICS_DEBUG";
const VAR_APP_ENV: &str = "PSYCLE_APP_ENV";
const VAR_ENDPOINT: &str = "PSYCLE_ANALYTICS_ENDPOINT";
const VAR_POSTHOG_HOST: &str = "PSYCLE_POSTHOG_HOST";
const VAR_POSTHOG_API_KEY: &str = "PSYCLE_POSTHOG_API_KEY";

/// Process-wide analytics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
	/// Kill switch. When false every event is dropped.
	pub enabled: bool,
	/// Log every event and every delivery failure.
	pub debug: bool,
	/// Explicit environment; falls back to the build profile.
	pub app_env: Option<AppEnv>,
	/// Generic HTTP sink URL.
	pub endpoint: Option<String>,
	pub posthog_host: Option<String>,
	pub posthog_api_key: Option<String>,
}

impl Default for AnalyticsConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			debug: cfg!(debug_assertions),
			app_env: None,
			endpoint: None,
			posthog_host: None,
			posthog_api_key: None,
		}
	}
}

impl AnalyticsConfig {
	/// Reads the configuration from the process environment.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads the configuration through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
		let defaults = Self::default();

		Self {
			enabled: get(VAR_ENABLED)
				.map(|v| parse_flag(&v))
				.unwrap_or(defaults.enabled),
			debug: get(VAR_DEBUG)
				.map(|v| parse_flag(&v))
				.unwrap_or(defaults.debug),
			app_env: get(VAR_APP_ENV).and_then(|raw| match raw.parse::<AppEnv>() {
				Ok(env) => Some(env),
				Err(e) => {
					warn!(error = %e, "ignoring {VAR_APP_ENV}, falling back to build profile");
					None
				}
			}),
			endpoint: get(VAR_ENDPOINT),
			posthog_host: get(VAR_POSTHOG_HOST),
			posthog_api_key: get(VAR_POSTHOG_API_KEY),
		}
	}

	/// The effective environment stamped on events.
	pub fn effective_env(&self) -> AppEnv {
		self.app_env.unwrap_or_else(AppEnv::from_build)
	}

	/// Returns true if the PostHog sink has everything it needs.
	pub fn posthog_configured(&self) -> bool {
		self.posthog_host.is_some() && self.posthog_api_key.is_some()
	}

	/// Applies overrides; fields left unset keep their current value.
	pub fn merge(&mut self, overrides: ConfigOverrides) {
		if let Some(enabled) = overrides.enabled {
			self.enabled = enabled;
		}
		if let Some(debug) = overrides.debug {
			self.debug = debug;
		}
		if overrides.app_env.is_some() {
			self.app_env = overrides.app_env;
		}
		if overrides.endpoint.is_some() {
			self.endpoint = overrides.endpoint;
		}
		if overrides.posthog_host.is_some() {
			self.posthog_host = overrides.posthog_host;
		}
		if overrides.posthog_api_key.is_some() {
			self.posthog_api_key = overrides.posthog_api_key;
		}
	}
}

/// A partial configuration accepted by `initialize()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverrides {
	pub enabled: Option<bool>,
	pub debug: Option<bool>,
	pub app_env: Option<AppEnv>,
	pub endpoint: Option<String>,
	pub posthog_host: Option<String>,
	pub posthog_api_key: Option<String>,
}

impl ConfigOverrides {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = Some(enabled);
		self
	}

	pub fn debug(mut self, debug: bool) -> Self {
		self.debug = Some(debug);
		self
	}

	pub fn app_env(mut self, env: AppEnv) -> Self {
		self.app_env = Some(env);
		self
	}

	pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = Some(endpoint.into());
		self
	}

	pub fn posthog(mut self, host: impl Into<String>, api_key: impl Into<String>) -> Self {
		self.posthog_host = Some(host.into());
		self.posthog_api_key = Some(api_key.into());
		self
	}
}

fn parse_flag(raw: &str) -> bool {
	!matches!(
		raw.to_ascii_lowercase().as_str(),
		"0" | "false" | "no" | "off"
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |key| map.get(key).cloned()
	}

	#[test]
	fn empty_environment_uses_defaults() {
		let config = AnalyticsConfig::from_lookup(|_| None);
		assert_eq!(config, AnalyticsConfig::default());
		assert!(config.enabled);
		assert!(!config.posthog_configured());
	}

	#[test]
	fn reads_all_variables() {
		let config = AnalyticsConfig::from_lookup(lookup_from(&[
			("PSYCLE_ANALYTICS_ENABLED", "true"),
			("PSYCLE_ANALYTICS_DEBUG", "1"),
			("PSYCLE_APP_ENV", "prod"),
			("PSYCLE_ANALYTICS_ENDPOINT", "https://collect.example.com/events"),
			("PSYCLE_POSTHOG_HOST", "eu.i.posthog.com"),
			("PSYCLE_POSTHOG_API_KEY", "phc_test"),
		]));

		assert!(config.enabled);
		assert!(config.debug);
		assert_eq!(config.app_env, Some(AppEnv::Prod));
		assert_eq!(
			config.endpoint.as_deref(),
			Some("https://collect.example.com/events")
		);
		assert!(config.posthog_configured());
	}

	#[test]
	fn kill_switch_values_disable() {
		for value in ["0", "false", "FALSE", "no", "off"] {
			let config =
				AnalyticsConfig::from_lookup(lookup_from(&[("PSYCLE_ANALYTICS_ENABLED", value)]));
			assert!(!config.enabled, "{value} should disable analytics");
		}
	}

	#[test]
	fn invalid_app_env_falls_back_to_build_profile() {
		let config = AnalyticsConfig::from_lookup(lookup_from(&[("PSYCLE_APP_ENV", "staging")]));
		assert_eq!(config.app_env, None);
		assert_eq!(config.effective_env(), AppEnv::from_build());
	}

	#[test]
	fn blank_values_are_unset() {
		let config = AnalyticsConfig::from_lookup(lookup_from(&[
			("PSYCLE_ANALYTICS_ENDPOINT", "   "),
			("PSYCLE_POSTHOG_HOST", ""),
		]));
		assert_eq!(config.endpoint, None);
		assert_eq!(config.posthog_host, None);
	}

	#[test]
	fn posthog_needs_host_and_key() {
		let config = AnalyticsConfig {
			posthog_host: Some("us.i.posthog.com".to_string()),
			..AnalyticsConfig::default()
		};
		assert!(!config.posthog_configured());
	}

	#[test]
	fn merge_only_touches_set_fields() {
		let mut config = AnalyticsConfig {
			endpoint: Some("https://a.example.com".to_string()),
			..AnalyticsConfig::default()
		};

		config.merge(ConfigOverrides::new().debug(true).app_env(AppEnv::Dev));

		assert!(config.debug);
		assert_eq!(config.app_env, Some(AppEnv::Dev));
		assert_eq!(config.endpoint.as_deref(), Some("https://a.example.com"));
		assert!(config.enabled);

		config.merge(ConfigOverrides::new().enabled(false).posthog("h", "k"));
		assert!(!config.enabled);
		assert!(config.posthog_configured());
	}
}
