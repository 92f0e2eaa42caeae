// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Psycle product analytics.
//!
//! This crate carries no I/O. It defines:
//!
//! - [`QueuedEvent`] and [`AnalyticsEvent`]: an event before and after the
//!   anonymous identity is known
//! - [`AnalyticsConfig`] and [`ConfigOverrides`]: process-wide settings and
//!   the partial overrides accepted at initialization
//! - [`CapturePayload`]: the PostHog capture envelope
//! - [`Properties`]: a builder for free-form event properties
//! - [`names`]: the event names emitted by the app

pub mod capture;
pub mod config;
pub mod event;
pub mod names;
pub mod properties;

pub use capture::{posthog_capture_url, CapturePayload};
pub use config::{AnalyticsConfig, ConfigOverrides, ENV_PREFIX};
pub use event::{
	validate_event_name, AnalyticsEvent, AppEnv, EventNameError, ParseAppEnvError, Platform,
	QueuedEvent, MAX_EVENT_NAME_LEN, SCHEMA_VERSION, UNKNOWN_ANON_ID,
};
pub use properties::Properties;
