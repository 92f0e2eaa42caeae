// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event names emitted by the app.

/// First launch of the install. Fired at most once per install.
pub const APP_OPEN: &str = "app_open";
/// Start of a process. Fired at most once per process.
pub const SESSION_START: &str = "session_start";
/// Analytics became ready. Fired at most once per process.
pub const APP_READY: &str = "app_ready";

pub const ONBOARDING_START: &str = "onboarding_start";
pub const ONBOARDING_COMPLETE: &str = "onboarding_complete";
pub const LESSON_START: &str = "lesson_start";
pub const LESSON_COMPLETE: &str = "lesson_complete";

pub const QUESTION_INCORRECT: &str = "question_incorrect";
pub const STREAK_LOST: &str = "streak_lost";
pub const ENERGY_BLOCKED: &str = "energy_blocked";
pub const ENERGY_BONUS_HIT: &str = "energy_bonus_hit";
pub const SHOP_OPEN_FROM_ENERGY: &str = "shop_open_from_energy";
pub const NOTIFICATION_PERMISSION_RESULT: &str = "notification_permission_result";
pub const REMINDER_SCHEDULED: &str = "reminder_scheduled";
pub const REMINDER_OPENED: &str = "reminder_opened";
pub const CHECKOUT_START: &str = "checkout_start";
pub const CHECKOUT_FAILED: &str = "checkout_failed";
pub const PLAN_SELECT: &str = "plan_select";
pub const PLAN_CHANGED: &str = "plan_changed";

/// Events the self-test counts and judges.
pub const CORE_EVENTS: &[&str] = &[
	APP_OPEN,
	SESSION_START,
	APP_READY,
	ONBOARDING_START,
	ONBOARDING_COMPLETE,
	LESSON_START,
	LESSON_COMPLETE,
];

/// Returns true if `name` is one of the [`CORE_EVENTS`].
pub fn is_core_event(name: &str) -> bool {
	CORE_EVENTS.contains(&name)
}
