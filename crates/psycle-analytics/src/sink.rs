// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery sinks.
//!
//! Every sink is optional and independent. [`SinkSet::dispatch`] hands an
//! event to each sink's dispatcher task, where every send runs under its own
//! timeout, so a slow or failing sink never delays or suppresses another. Delivery is
//! at-most-once: failures are logged and the event is dropped for that sink.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use psycle_analytics_core::{posthog_capture_url, AnalyticsConfig, AnalyticsEvent, CapturePayload};
use reqwest::Client;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{AnalyticsError, Result};

/// Time allowed for a single delivery.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(3);

/// Receiver of delivery-ready events.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
	/// Short name used in logs and timeout errors.
	fn name(&self) -> &'static str;

	/// Delivers one event.
	async fn send(&self, event: &AnalyticsEvent) -> Result<()>;
}

/// Type alias for a shared sink.
pub type SharedEventSink = Arc<dyn EventSink>;

/// POSTs the full event as JSON to an arbitrary endpoint.
pub struct HttpSink {
	client: Client,
	endpoint: String,
}

impl HttpSink {
	pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
		Self {
			client,
			endpoint: endpoint.into(),
		}
	}

	/// Returns a sink if `endpoint` is configured.
	pub fn from_config(config: &AnalyticsConfig, client: &Client) -> Option<Self> {
		config
			.endpoint
			.as_ref()
			.map(|endpoint| Self::new(client.clone(), endpoint.clone()))
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

#[async_trait]
impl EventSink for HttpSink {
	fn name(&self) -> &'static str {
		"http"
	}

	async fn send(&self, event: &AnalyticsEvent) -> Result<()> {
		let response = self.client.post(&self.endpoint).json(event).send().await?;
		check_response(response).await
	}
}

/// Sends events to PostHog's capture endpoint.
pub struct PostHogSink {
	client: Client,
	capture_url: String,
	api_key: String,
}

impl PostHogSink {
	pub fn new(client: Client, host: &str, api_key: impl Into<String>) -> Self {
		Self {
			client,
			capture_url: posthog_capture_url(host),
			api_key: api_key.into(),
		}
	}

	/// Returns a sink if both host and API key are configured.
	pub fn from_config(config: &AnalyticsConfig, client: &Client) -> Option<Self> {
		match (&config.posthog_host, &config.posthog_api_key) {
			(Some(host), Some(api_key)) => Some(Self::new(client.clone(), host, api_key.clone())),
			_ => None,
		}
	}

	pub fn capture_url(&self) -> &str {
		&self.capture_url
	}
}

#[async_trait]
impl EventSink for PostHogSink {
	fn name(&self) -> &'static str {
		"posthog"
	}

	async fn send(&self, event: &AnalyticsEvent) -> Result<()> {
		let payload = CapturePayload::from_event(event, self.api_key.clone());
		let response = self
			.client
			.post(&self.capture_url)
			.json(&payload)
			.send()
			.await?;
		check_response(response).await
	}
}

async fn check_response(response: reqwest::Response) -> Result<()> {
	let status = response.status();
	if status.is_success() {
		return Ok(());
	}
	let message = response
		.text()
		.await
		.ok()
		.filter(|body| !body.is_empty())
		.unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
	Err(AnalyticsError::ServerError {
		status: status.as_u16(),
		message,
	})
}

/// One queued delivery for a sink's dispatcher.
struct Delivery {
	event: Arc<AnalyticsEvent>,
	debug: bool,
}

/// Channel into a sink's long-lived dispatcher task.
struct SinkWorker {
	name: &'static str,
	tx: mpsc::UnboundedSender<Delivery>,
}

/// The sinks one event fans out to.
///
/// Each sink gets its own dispatcher task, spawned when the set is built. The
/// dispatcher starts sends in the order events were dispatched and keeps
/// several in flight at once. Dropping the set closes the channels; each
/// dispatcher then finishes its in-flight sends and exits.
pub struct SinkSet {
	workers: Vec<SinkWorker>,
}

impl SinkSet {
	/// Spawns one dispatcher per sink on `runtime`.
	pub fn new(runtime: &Handle, sinks: Vec<SharedEventSink>, timeout: Duration) -> Self {
		let workers = sinks
			.into_iter()
			.map(|sink| {
				let (tx, rx) = mpsc::unbounded_channel();
				let name = sink.name();
				runtime.spawn(run_dispatcher(sink, rx, timeout));
				SinkWorker { name, tx }
			})
			.collect();
		Self { workers }
	}

	/// Builds the configured HTTP and PostHog sinks followed by `extra`.
	pub fn from_config(
		runtime: &Handle,
		config: &AnalyticsConfig,
		client: &Client,
		extra: &[SharedEventSink],
		timeout: Duration,
	) -> Self {
		let mut sinks: Vec<SharedEventSink> = Vec::with_capacity(extra.len() + 2);
		if let Some(sink) = HttpSink::from_config(config, client) {
			sinks.push(Arc::new(sink));
		}
		if let Some(sink) = PostHogSink::from_config(config, client) {
			sinks.push(Arc::new(sink));
		}
		sinks.extend(extra.iter().cloned());
		Self::new(runtime, sinks, timeout)
	}

	pub fn is_empty(&self) -> bool {
		self.workers.is_empty()
	}

	pub fn names(&self) -> Vec<&'static str> {
		self.workers.iter().map(|w| w.name).collect()
	}

	/// Queues `event` on every sink's dispatcher and returns without waiting.
	///
	/// Events dispatched in sequence reach each sink's `send` in that sequence.
	pub fn dispatch(&self, event: Arc<AnalyticsEvent>, debug: bool) {
		for worker in &self.workers {
			let delivery = Delivery {
				event: Arc::clone(&event),
				debug,
			};
			if worker.tx.send(delivery).is_err() {
				trace!(sink = worker.name, event = %event.name, "sink dispatcher stopped; event dropped");
			}
		}
	}
}

async fn run_dispatcher(
	sink: SharedEventSink,
	mut rx: mpsc::UnboundedReceiver<Delivery>,
	timeout: Duration,
) {
	let mut in_flight = FuturesUnordered::new();
	loop {
		tokio::select! {
			biased;
			received = rx.recv() => match received {
				Some(delivery) => in_flight.push(deliver(Arc::clone(&sink), delivery, timeout)),
				None => break,
			},
			Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
		}
	}
	while in_flight.next().await.is_some() {}
	trace!(sink = sink.name(), "sink dispatcher stopped");
}

async fn deliver(sink: SharedEventSink, delivery: Delivery, timeout: Duration) {
	let Delivery { event, debug } = delivery;
	let outcome = match tokio::time::timeout(timeout, sink.send(&event)).await {
		Ok(result) => result,
		Err(_) => Err(AnalyticsError::Timeout {
			sink: sink.name(),
			timeout_ms: timeout.as_millis() as u64,
		}),
	};
	report_delivery(sink.name(), &event, outcome, debug);
}

fn report_delivery(sink: &'static str, event: &AnalyticsEvent, outcome: Result<()>, debug: bool) {
	match outcome {
		Ok(()) if debug => {
			debug!(sink, event = %event.name, event_id = %event.event_id, "event delivered")
		}
		Ok(()) => {}
		Err(e) if debug => {
			warn!(sink, event = %event.name, event_id = %event.event_id, error = %e, "event delivery failed")
		}
		Err(e) => {
			trace!(sink, event = %event.name, error = %e, "event delivery failed")
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use psycle_analytics_core::{AppEnv, Platform, SCHEMA_VERSION};
	use uuid::Uuid;
	use wiremock::matchers::{body_partial_json, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn event(name: &str) -> AnalyticsEvent {
		AnalyticsEvent {
			event_id: Uuid::new_v4(),
			timestamp: Utc::now(),
			anon_id: "anon-sink".to_string(),
			build_id: "1.0.0".to_string(),
			schema_version: SCHEMA_VERSION.to_string(),
			platform: Platform::Ios,
			env: AppEnv::Dev,
			user_id: None,
			name: name.to_string(),
			properties: Default::default(),
		}
	}

	fn client() -> Client {
		psycle_common_http::builder().build().unwrap()
	}

	#[tokio::test]
	async fn from_config_only_builds_configured_sinks() {
		let runtime = Handle::current();
		let client = client();

		let none = SinkSet::from_config(
			&runtime,
			&AnalyticsConfig::default(),
			&client,
			&[],
			DEFAULT_SEND_TIMEOUT,
		);
		assert!(none.is_empty());

		let host_only = AnalyticsConfig {
			posthog_host: Some("eu.i.posthog.com".to_string()),
			..AnalyticsConfig::default()
		};
		assert!(
			SinkSet::from_config(&runtime, &host_only, &client, &[], DEFAULT_SEND_TIMEOUT).is_empty()
		);

		let both = AnalyticsConfig {
			endpoint: Some("https://collect.example.com".to_string()),
			posthog_host: Some("eu.i.posthog.com".to_string()),
			posthog_api_key: Some("phc".to_string()),
			..AnalyticsConfig::default()
		};
		let set = SinkSet::from_config(&runtime, &both, &client, &[], DEFAULT_SEND_TIMEOUT);
		assert_eq!(set.names(), vec!["http", "posthog"]);
	}

	#[derive(Default)]
	struct OrderSink {
		names: parking_lot::Mutex<Vec<String>>,
	}

	#[async_trait]
	impl EventSink for OrderSink {
		fn name(&self) -> &'static str {
			"order"
		}

		async fn send(&self, event: &AnalyticsEvent) -> Result<()> {
			self.names.lock().push(event.name.clone());
			Ok(())
		}
	}

	struct StuckSink;

	#[async_trait]
	impl EventSink for StuckSink {
		fn name(&self) -> &'static str {
			"stuck"
		}

		async fn send(&self, _event: &AnalyticsEvent) -> Result<()> {
			std::future::pending::<()>().await;
			Ok(())
		}
	}

	async fn wait_for(sink: &OrderSink, count: usize) -> Vec<String> {
		tokio::time::timeout(Duration::from_secs(5), async {
			loop {
				if sink.names.lock().len() >= count {
					return sink.names.lock().clone();
				}
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("sink did not receive every event")
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn dispatch_preserves_order_per_sink() {
		let first = Arc::new(OrderSink::default());
		let second = Arc::new(OrderSink::default());
		let set = SinkSet::new(
			&Handle::current(),
			vec![first.clone() as SharedEventSink, second.clone() as SharedEventSink],
			DEFAULT_SEND_TIMEOUT,
		);

		let expected: Vec<String> = (0..200).map(|i| format!("event_{i}")).collect();
		for name in &expected {
			set.dispatch(Arc::new(event(name)), false);
		}

		assert_eq!(wait_for(&first, expected.len()).await, expected);
		assert_eq!(wait_for(&second, expected.len()).await, expected);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn stuck_sends_do_not_hold_back_later_events() {
		let stuck: SharedEventSink = Arc::new(StuckSink);
		let sink = Arc::new(OrderSink::default());
		let set = SinkSet::new(
			&Handle::current(),
			vec![stuck, sink.clone() as SharedEventSink],
			Duration::from_millis(50),
		);

		for name in ["a", "b", "c"] {
			set.dispatch(Arc::new(event(name)), true);
		}

		assert_eq!(wait_for(&sink, 3).await, vec!["a", "b", "c"]);
	}

	#[test]
	fn posthog_sink_derives_capture_url() {
		let sink = PostHogSink::new(client(), "us.i.posthog.com", "phc");
		assert_eq!(sink.capture_url(), "https://us.i.posthog.com/i/v0/e/");
	}

	#[tokio::test]
	async fn http_sink_posts_event_json() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/events"))
			.and(header("content-type", "application/json"))
			.and(body_partial_json(serde_json::json!({
				"name": "lesson_start",
				"anonId": "anon-sink",
				"schemaVersion": "analytics_v1",
			})))
			.respond_with(ResponseTemplate::new(204))
			.expect(1)
			.mount(&server)
			.await;

		let sink = HttpSink::new(client(), format!("{}/events", server.uri()));
		sink.send(&event("lesson_start")).await.unwrap();
	}

	#[tokio::test]
	async fn http_sink_maps_non_success_status() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
			.mount(&server)
			.await;

		let sink = HttpSink::new(client(), server.uri());
		let result = sink.send(&event("app_open")).await;

		match result {
			Err(AnalyticsError::ServerError { status, message }) => {
				assert_eq!(status, 503);
				assert_eq!(message, "maintenance");
			}
			other => panic!("expected server error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn posthog_sink_posts_capture_envelope() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/i/v0/e/"))
			.and(body_partial_json(serde_json::json!({
				"api_key": "phc_test",
				"event": "session_start",
				"distinct_id": "anon-sink",
				"properties": {
					"$process_person_profile": false,
					"schemaVersion": "analytics_v1",
					"platform": "ios",
					"env": "dev",
				},
			})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let sink = PostHogSink::new(client(), &server.uri(), "phc_test");
		sink.send(&event("session_start")).await.unwrap();
	}
}
