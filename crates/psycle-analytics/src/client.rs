// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The analytics client.
//!
//! [`AnalyticsClient::track`] may be called at any time, including before
//! [`AnalyticsClient::initialize`]. Events tracked before initialization are
//! queued with their id and timestamp captured at call time, and the first
//! such event starts initialization in the background. Once the anonymous
//! identity is resolved, the queue is flushed in submission order and later
//! events are dispatched straight away.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use psycle_analytics_core::{
	names, AnalyticsConfig, ConfigOverrides, Platform, Properties, QueuedEvent, UNKNOWN_ANON_ID,
};
use reqwest::Client;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use crate::builder::{EventContext, EventFactory};
use crate::debug::{DebugStatus, NoOpDebugRecorder, SharedDebugRecorder};
use crate::error::{AnalyticsError, Result};
use crate::identity::{IdentityProvider, StoredIdentityProvider};
use crate::queue::EventQueue;
use crate::sink::{EventSink, SharedEventSink, SinkSet, DEFAULT_SEND_TIMEOUT};
use crate::storage::{KeyValueStore, MemoryStore, APP_OPEN_TRACKED_KEY};

/// Label of the system event recorded when initialization completes.
pub const INITIALIZED_LABEL: &str = "initialized";

/// In-flight initialization shared by every concurrent caller.
type InitFuture = Shared<BoxFuture<'static, std::result::Result<(), String>>>;

/// Builder for constructing an [`AnalyticsClient`].
pub struct AnalyticsClientBuilder {
	config: Option<AnalyticsConfig>,
	store: Option<Arc<dyn KeyValueStore>>,
	identity: Option<Arc<dyn IdentityProvider>>,
	sinks: Vec<SharedEventSink>,
	recorder: SharedDebugRecorder,
	http_client: Option<Client>,
	build_id: Option<String>,
	platform: Option<Platform>,
	send_timeout: Duration,
}

impl AnalyticsClientBuilder {
	pub fn new() -> Self {
		Self {
			config: None,
			store: None,
			identity: None,
			sinks: Vec::new(),
			recorder: Arc::new(NoOpDebugRecorder),
			http_client: None,
			build_id: None,
			platform: None,
			send_timeout: DEFAULT_SEND_TIMEOUT,
		}
	}

	/// Sets the configuration. Defaults to [`AnalyticsConfig::from_env`].
	pub fn config(mut self, config: AnalyticsConfig) -> Self {
		self.config = Some(config);
		self
	}

	/// Sets the durable store. Defaults to an in-memory store, which loses
	/// the anonymous identity on restart.
	pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Replaces the store-backed identity provider.
	pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
		self.identity = Some(provider);
		self
	}

	/// Adds a sink that receives every event in addition to the configured
	/// HTTP and PostHog sinks.
	pub fn sink(mut self, sink: impl EventSink) -> Self {
		self.sinks.push(Arc::new(sink));
		self
	}

	pub fn shared_sink(mut self, sink: SharedEventSink) -> Self {
		self.sinks.push(sink);
		self
	}

	pub fn debug_recorder(mut self, recorder: SharedDebugRecorder) -> Self {
		self.recorder = recorder;
		self
	}

	pub fn http_client(mut self, client: Client) -> Self {
		self.http_client = Some(client);
		self
	}

	/// Sets the build id stamped on events. Defaults to the crate version.
	pub fn build_id(mut self, build_id: impl Into<String>) -> Self {
		self.build_id = Some(build_id.into());
		self
	}

	pub fn platform(mut self, platform: Platform) -> Self {
		self.platform = Some(platform);
		self
	}

	/// Sets the per-sink delivery timeout.
	pub fn send_timeout(mut self, timeout: Duration) -> Self {
		self.send_timeout = timeout;
		self
	}

	/// Builds the client. Must be called from within a Tokio runtime.
	pub fn build(self) -> Result<AnalyticsClient> {
		let runtime = Handle::try_current().map_err(|_| AnalyticsError::NoRuntime)?;
		let config = self.config.unwrap_or_else(AnalyticsConfig::from_env);
		let store = self
			.store
			.unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
		let identity = self.identity.unwrap_or_else(|| {
			Arc::new(StoredIdentityProvider::new(Arc::clone(&store))) as Arc<dyn IdentityProvider>
		});
		let http_client = match self.http_client {
			Some(client) => client,
			None => psycle_common_http::new_client_with_timeout(self.send_timeout)?,
		};
		let defaults = EventFactory::default();
		let factory = EventFactory::new(
			self.build_id.unwrap_or_else(|| defaults.build_id().to_string()),
			self.platform.unwrap_or_else(|| defaults.platform()),
		);

		let sinks = SinkSet::from_config(
			&runtime,
			&config,
			&http_client,
			&self.sinks,
			self.send_timeout,
		);
		debug!(
			enabled = config.enabled,
			sinks = ?sinks.names(),
			build_id = factory.build_id(),
			"analytics client built"
		);

		let inner = Arc::new(ClientInner {
			runtime,
			store,
			identity,
			factory,
			http_client,
			extra_sinks: self.sinks,
			send_timeout: self.send_timeout,
			recorder: self.recorder,
			state: Mutex::new(ClientState::new(config, sinks)),
		});

		Ok(AnalyticsClient { inner })
	}
}

impl Default for AnalyticsClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ClientState {
	config: AnalyticsConfig,
	sinks: SinkSet,
	anon_id: Option<String>,
	user_id: Option<String>,
	initialized: bool,
	init_future: Option<InitFuture>,
	queue: EventQueue,
	session_start_tracked: bool,
	app_ready_tracked: bool,
	/// Bumped by the debug reset so a stale in-flight initialization cannot
	/// commit into the reset state.
	epoch: u64,
}

impl ClientState {
	fn new(config: AnalyticsConfig, sinks: SinkSet) -> Self {
		Self {
			config,
			sinks,
			anon_id: None,
			user_id: None,
			initialized: false,
			init_future: None,
			queue: EventQueue::new(),
			session_start_tracked: false,
			app_ready_tracked: false,
			epoch: 0,
		}
	}

	fn anon_id_or_unknown(&self) -> &str {
		self.anon_id.as_deref().unwrap_or(UNKNOWN_ANON_ID)
	}

	fn event_context(&self) -> EventContext<'_> {
		EventContext {
			anon_id: self.anon_id.as_deref(),
			env: self.config.effective_env(),
			user_id: self.user_id.as_deref(),
		}
	}
}

struct ClientInner {
	runtime: Handle,
	store: Arc<dyn KeyValueStore>,
	identity: Arc<dyn IdentityProvider>,
	factory: EventFactory,
	http_client: Client,
	extra_sinks: Vec<SharedEventSink>,
	send_timeout: Duration,
	recorder: SharedDebugRecorder,
	state: Mutex<ClientState>,
}

impl ClientInner {
	/// Builds the event and hands it to every sink.
	///
	/// Called with the state lock held so dispatch order is submission order.
	fn dispatch(&self, state: &ClientState, queued: &QueuedEvent) -> Result<()> {
		let event = Arc::new(self.factory.build(queued, &state.event_context())?);
		if state.config.debug {
			debug!(
				event = %event.name,
				event_id = %event.event_id,
				anon_id = %event.anon_id,
				properties = %serde_json::Value::Object(event.properties.clone()),
				"dispatching analytics event"
			);
		}
		state.sinks.dispatch(event, state.config.debug);
		Ok(())
	}

	fn flush_queue(&self, state: &mut ClientState) {
		let queued = state.queue.drain();
		if queued.is_empty() {
			return;
		}
		if state.config.debug {
			debug!(count = queued.len(), "flushing queued analytics events");
		}

		for event in &queued {
			if let Err(e) = self.dispatch(state, event) {
				self.recorder.record_event(
					&event.name,
					DebugStatus::Failed,
					state.anon_id_or_unknown(),
					&event.properties,
				);
				error!(event = %event.name, error = %e, "failed to deliver queued analytics event");
			}
		}
	}

	async fn run_initialization(
		self: Arc<Self>,
		overrides: Option<ConfigOverrides>,
		epoch: u64,
	) -> std::result::Result<(), String> {
		if let Some(overrides) = overrides {
			let mut state = self.state.lock();
			state.config.merge(overrides);
			state.sinks = SinkSet::from_config(
				&self.runtime,
				&state.config,
				&self.http_client,
				&self.extra_sinks,
				self.send_timeout,
			);
		}

		let resolved = self.identity.resolve().await;

		let mut state = self.state.lock();
		if state.epoch != epoch {
			return Err("initialization was superseded by a debug reset".to_string());
		}
		state.init_future = None;

		let anon_id = match resolved {
			Ok(anon_id) => anon_id,
			Err(e) => {
				error!(error = %e, queued = state.queue.len(), "analytics initialization failed");
				return Err(e.to_string());
			}
		};

		state.anon_id = Some(anon_id.clone());
		state.initialized = true;
		if state.config.debug {
			info!(anon_id = %anon_id, enabled = state.config.enabled, "analytics initialized");
		}

		self.flush_queue(&mut state);

		self.recorder.set_current_anon_id(&anon_id);
		self.recorder.record_system(INITIALIZED_LABEL, &anon_id);
		Ok(())
	}
}

/// Client for capturing analytics events.
///
/// Cheap to clone; clones share the same state.
///
/// # Example
///
/// ```ignore
/// use psycle_analytics::{AnalyticsClient, Properties};
///
/// let client = AnalyticsClient::builder()
///     .store(Arc::new(FileStore::new(data_dir.join("analytics.json"))))
///     .build()?;
///
/// client.track_session_start();
/// client.track("lesson_start", Properties::new().insert("lessonId", "mental_l01"));
///
/// client.initialize(None).await?;
/// client.track_app_ready();
/// client.track_app_open().await;
/// ```
#[derive(Clone)]
pub struct AnalyticsClient {
	inner: Arc<ClientInner>,
}

impl AnalyticsClient {
	pub fn builder() -> AnalyticsClientBuilder {
		AnalyticsClientBuilder::new()
	}

	/// Resolves the anonymous identity and flushes queued events.
	///
	/// Returns immediately once initialized. Concurrent callers share one
	/// in-flight initialization and all observe its outcome. On failure the
	/// queue is kept and a later call retries.
	///
	/// `overrides` is merged into the configuration only by the call that
	/// starts initialization.
	pub async fn initialize(&self, overrides: Option<ConfigOverrides>) -> Result<()> {
		let init = {
			let mut state = self.inner.state.lock();
			if state.initialized {
				return Ok(());
			}
			match &state.init_future {
				Some(init) => init.clone(),
				None => {
					let task = self.inner.runtime.spawn(
						Arc::clone(&self.inner).run_initialization(overrides, state.epoch),
					);
					let init = async move {
						task.await
							.unwrap_or_else(|e| Err(format!("initialization task failed: {e}")))
					}
					.boxed()
					.shared();
					state.init_future = Some(init.clone());
					init
				}
			}
		};

		init.await.map_err(AnalyticsError::InitializationFailed)
	}

	/// Records an event. Never blocks, never fails.
	pub fn track(&self, name: &str, properties: impl Into<Properties>) {
		let properties = properties.into().into_map();
		let mut state = self.inner.state.lock();
		if !state.config.enabled {
			return;
		}

		if !state.initialized {
			let queued = QueuedEvent::capture(name, properties);
			if state.config.debug {
				debug!(event = name, "analytics event queued until initialized");
			}
			self.inner.recorder.record_event(
				name,
				DebugStatus::Queued,
				state.anon_id_or_unknown(),
				&queued.properties,
			);
			state.queue.push(queued);

			let start_init = state.init_future.is_none();
			drop(state);
			if start_init {
				self.spawn_initialize();
			}
			return;
		}

		let queued = QueuedEvent::capture(name, properties);
		match self.inner.dispatch(&state, &queued) {
			Ok(()) => self.inner.recorder.record_event(
				name,
				DebugStatus::Sent,
				state.anon_id_or_unknown(),
				&queued.properties,
			),
			Err(e) => {
				self.inner.recorder.record_event(
					name,
					DebugStatus::Failed,
					state.anon_id_or_unknown(),
					&queued.properties,
				);
				error!(event = name, error = %e, "failed to track analytics event");
			}
		}
	}

	fn spawn_initialize(&self) {
		let client = self.clone();
		self.inner.runtime.spawn(async move {
			if let Err(e) = client.initialize(None).await {
				error!(error = %e, "lazy analytics initialization failed");
			}
		});
	}

	/// Records `app_open` once per install.
	///
	/// The durable flag is only written while tracking is enabled, so an
	/// install that starts with analytics switched off still reports its
	/// first open later.
	pub async fn track_app_open(&self) {
		let debug = {
			let state = self.inner.state.lock();
			if !state.config.enabled {
				return;
			}
			state.config.debug
		};

		match self.inner.store.get(APP_OPEN_TRACKED_KEY).await {
			Ok(Some(flag)) if flag == "true" => {
				if debug {
					debug!("app_open already tracked, skipping");
				}
				return;
			}
			Ok(_) => {}
			Err(e) => {
				error!(error = %e, "failed to read app_open flag, skipping app_open");
				return;
			}
		}

		self.track(names::APP_OPEN, ());

		if let Err(e) = self.inner.store.set(APP_OPEN_TRACKED_KEY, "true").await {
			error!(error = %e, "failed to persist app_open flag");
		}
	}

	/// Records `session_start` once per process.
	pub fn track_session_start(&self) {
		if self.take_process_guard(|state| &mut state.session_start_tracked) {
			self.track(names::SESSION_START, ());
		}
	}

	/// Records `app_ready` once per process.
	pub fn track_app_ready(&self) {
		if self.take_process_guard(|state| &mut state.app_ready_tracked) {
			self.track(names::APP_READY, ());
		}
	}

	/// Flips an in-memory once-per-process guard, returning true the first time.
	fn take_process_guard(&self, guard: impl FnOnce(&mut ClientState) -> &mut bool) -> bool {
		let mut state = self.inner.state.lock();
		let debug = state.config.debug;
		let flag = guard(&mut *state);
		if *flag {
			if debug {
				debug!("event already tracked in this process, skipping");
			}
			return false;
		}
		*flag = true;
		true
	}

	/// The resolved anonymous id, or `"unknown"` before initialization.
	pub fn anon_id(&self) -> String {
		self.inner.state.lock().anon_id_or_unknown().to_string()
	}

	/// Sets the authenticated user stamped on subsequently built events.
	pub fn set_user_id(&self, user_id: Option<String>) {
		self.inner.state.lock().user_id = user_id;
	}

	pub fn is_initialized(&self) -> bool {
		self.inner.state.lock().initialized
	}

	/// Returns true while an initialization is in flight.
	pub fn is_initializing(&self) -> bool {
		self.inner.state.lock().init_future.is_some()
	}

	/// Number of events waiting for initialization.
	pub fn queued_len(&self) -> usize {
		self.inner.state.lock().queue.len()
	}

	/// A copy of the current configuration.
	pub fn config(&self) -> AnalyticsConfig {
		self.inner.state.lock().config.clone()
	}

	/// Names of the sinks events currently fan out to.
	pub fn sink_names(&self) -> Vec<&'static str> {
		self.inner.state.lock().sinks.names()
	}

	/// Returns the client to its just-launched state for E2E reruns.
	///
	/// Clears the in-memory state and the durable app_open flag. With
	/// `regenerate_anon_id` the stored identity is removed too, so the next
	/// initialization creates a new one.
	#[cfg(any(debug_assertions, feature = "e2e-debug"))]
	pub async fn reset_for_debug(&self, regenerate_anon_id: bool) -> Result<()> {
		{
			let mut state = self.inner.state.lock();
			state.initialized = false;
			state.init_future = None;
			state.session_start_tracked = false;
			state.app_ready_tracked = false;
			state.queue.clear();
			state.epoch += 1;
			if regenerate_anon_id {
				state.anon_id = None;
			}
		}

		self.inner.store.remove(APP_OPEN_TRACKED_KEY).await?;
		if regenerate_anon_id {
			self.inner.store.remove(crate::storage::ANON_ID_KEY).await?;
		}

		info!(regenerate_anon_id, "analytics debug reset completed");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::debug::InMemoryDebugRecorder;
	use crate::error::StorageError;
	use crate::identity::tests::BrokenStore;
	use crate::storage::ANON_ID_KEY;
	use async_trait::async_trait;
	use psycle_analytics_core::AnalyticsEvent;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	use tokio::sync::Notify;

	#[derive(Default)]
	struct RecordingSink {
		events: Mutex<Vec<AnalyticsEvent>>,
	}

	impl RecordingSink {
		fn names(&self) -> Vec<String> {
			self.events.lock().iter().map(|e| e.name.clone()).collect()
		}

		async fn wait_for(&self, count: usize) -> Vec<AnalyticsEvent> {
			for _ in 0..200 {
				if self.events.lock().len() >= count {
					break;
				}
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
			self.events.lock().clone()
		}
	}

	#[async_trait]
	impl EventSink for RecordingSink {
		fn name(&self) -> &'static str {
			"recording"
		}

		async fn send(&self, event: &AnalyticsEvent) -> Result<()> {
			self.events.lock().push(event.clone());
			Ok(())
		}
	}

	/// Identity provider that blocks until released and counts resolutions.
	struct GatedIdentity {
		calls: AtomicUsize,
		gate: Notify,
		fail: AtomicBool,
	}

	impl GatedIdentity {
		fn new() -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				gate: Notify::new(),
				fail: AtomicBool::new(false),
			})
		}
	}

	#[async_trait]
	impl IdentityProvider for GatedIdentity {
		async fn resolve(&self) -> Result<String> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.gate.notified().await;
			if self.fail.load(Ordering::SeqCst) {
				return Err(StorageError::Unavailable("keychain locked".to_string()).into());
			}
			Ok("gated-anon".to_string())
		}
	}

	fn test_config() -> AnalyticsConfig {
		AnalyticsConfig {
			debug: true,
			..AnalyticsConfig::default()
		}
	}

	fn client_with(sink: &Arc<RecordingSink>) -> AnalyticsClient {
		AnalyticsClient::builder()
			.config(test_config())
			.shared_sink(sink.clone())
			.build()
			.unwrap()
	}

	#[test]
	fn build_outside_runtime_fails() {
		let result = AnalyticsClient::builder().config(test_config()).build();
		assert!(matches!(result, Err(AnalyticsError::NoRuntime)));
	}

	#[tokio::test]
	async fn concurrent_initialize_resolves_identity_once() {
		let identity = GatedIdentity::new();
		let client = AnalyticsClient::builder()
			.config(test_config())
			.identity_provider(identity.clone())
			.build()
			.unwrap();

		let callers: Vec<_> = (0..8)
			.map(|_| {
				let client = client.clone();
				tokio::spawn(async move { client.initialize(None).await })
			})
			.collect();

		while identity.calls.load(Ordering::SeqCst) == 0 {
			tokio::task::yield_now().await;
		}
		assert!(client.is_initializing());
		assert!(!client.is_initialized());
		identity.gate.notify_one();

		for caller in callers {
			caller.await.unwrap().unwrap();
		}
		assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
		assert!(client.is_initialized());
		assert!(!client.is_initializing());
		assert_eq!(client.anon_id(), "gated-anon");

		client.initialize(None).await.unwrap();
		assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failed_initialization_keeps_queue_and_allows_retry() {
		let sink = Arc::new(RecordingSink::default());
		let identity = GatedIdentity::new();
		identity.fail.store(true, Ordering::SeqCst);
		let client = AnalyticsClient::builder()
			.config(test_config())
			.identity_provider(identity.clone())
			.shared_sink(sink.clone())
			.build()
			.unwrap();

		let init = tokio::spawn({
			let client = client.clone();
			async move { client.initialize(None).await }
		});
		while identity.calls.load(Ordering::SeqCst) == 0 {
			tokio::task::yield_now().await;
		}
		client.track("onboarding_start", ());
		identity.gate.notify_one();

		let result = init.await.unwrap();
		assert!(matches!(result, Err(AnalyticsError::InitializationFailed(_))));
		assert!(!client.is_initialized());
		assert!(!client.is_initializing());
		assert_eq!(client.queued_len(), 1);
		assert_eq!(client.anon_id(), UNKNOWN_ANON_ID);

		identity.fail.store(false, Ordering::SeqCst);
		let retry = tokio::spawn({
			let client = client.clone();
			async move { client.initialize(None).await }
		});
		while identity.calls.load(Ordering::SeqCst) < 2 {
			tokio::task::yield_now().await;
		}
		identity.gate.notify_one();
		retry.await.unwrap().unwrap();

		let delivered = sink.wait_for(1).await;
		assert_eq!(delivered.len(), 1);
		assert_eq!(delivered[0].name, "onboarding_start");
		assert_eq!(delivered[0].anon_id, "gated-anon");
		assert_eq!(client.queued_len(), 0);
	}

	#[tokio::test]
	async fn track_before_initialize_starts_lazy_initialization() {
		let sink = Arc::new(RecordingSink::default());
		let client = client_with(&sink);

		client.track("onboarding_start", ());
		assert_eq!(client.queued_len(), 1);

		let delivered = sink.wait_for(1).await;
		assert_eq!(delivered.len(), 1);
		assert!(client.is_initialized());
		assert_ne!(delivered[0].anon_id, UNKNOWN_ANON_ID);
	}

	#[tokio::test]
	async fn queued_events_keep_their_capture_time() {
		let sink = Arc::new(RecordingSink::default());
		let identity = GatedIdentity::new();
		let client = AnalyticsClient::builder()
			.config(test_config())
			.identity_provider(identity.clone())
			.shared_sink(sink.clone())
			.build()
			.unwrap();

		for name in ["a", "b", "c"] {
			client.track(name, ());
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
		let released_at = chrono::Utc::now();
		identity.gate.notify_one();

		let delivered = sink.wait_for(3).await;
		assert_eq!(sink.names(), vec!["a", "b", "c"]);
		assert!(delivered.iter().all(|e| e.timestamp < released_at));
		assert!(delivered.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn queued_flush_keeps_submission_order_on_multi_thread_runtime() {
		for _ in 0..20 {
			let sink = Arc::new(RecordingSink::default());
			let identity = GatedIdentity::new();
			let client = AnalyticsClient::builder()
				.config(test_config())
				.identity_provider(identity.clone())
				.shared_sink(sink.clone())
				.build()
				.unwrap();

			let expected: Vec<String> = (0..50).map(|i| format!("step_{i}")).collect();
			for name in &expected {
				client.track(name, ());
			}
			identity.gate.notify_one();

			sink.wait_for(expected.len()).await;
			assert_eq!(sink.names(), expected);
		}
	}

	#[tokio::test]
	async fn kill_switch_drops_everything() {
		let sink = Arc::new(RecordingSink::default());
		let client = AnalyticsClient::builder()
			.config(AnalyticsConfig {
				enabled: false,
				..test_config()
			})
			.shared_sink(sink.clone())
			.build()
			.unwrap();

		for _ in 0..5 {
			client.track("lesson_start", ());
		}
		client.track_session_start();
		client.track_app_open().await;

		assert_eq!(client.queued_len(), 0);
		assert!(!client.is_initializing());
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(sink.names().is_empty());
	}

	#[tokio::test]
	async fn invalid_event_is_recorded_as_failed() {
		let sink = Arc::new(RecordingSink::default());
		let recorder = Arc::new(InMemoryDebugRecorder::new());
		let client = AnalyticsClient::builder()
			.config(test_config())
			.shared_sink(sink.clone())
			.debug_recorder(recorder.clone())
			.build()
			.unwrap();
		client.initialize(None).await.unwrap();

		client.track("", ());
		client.track("lesson_complete", ());

		let delivered = sink.wait_for(1).await;
		assert_eq!(delivered.len(), 1);
		let recent = recorder.recent(2);
		assert_eq!(recent[0].name, "lesson_complete");
		assert_eq!(recent[0].status, DebugStatus::Sent);
		assert_eq!(recent[1].status, DebugStatus::Failed);
	}

	#[tokio::test]
	async fn recorder_sees_queued_initialized_and_sent() {
		let sink = Arc::new(RecordingSink::default());
		let recorder = Arc::new(InMemoryDebugRecorder::new());
		let client = AnalyticsClient::builder()
			.config(test_config())
			.shared_sink(sink.clone())
			.debug_recorder(recorder.clone())
			.build()
			.unwrap();

		client.track_session_start();
		client.initialize(None).await.unwrap();
		client.track_app_ready();

		let events = recorder.recent(10);
		let trail: Vec<_> = events
			.iter()
			.rev()
			.map(|e| (e.name.as_str(), e.status))
			.collect();
		assert_eq!(
			trail,
			vec![
				("session_start", DebugStatus::Queued),
				(INITIALIZED_LABEL, DebugStatus::System),
				("app_ready", DebugStatus::Sent),
			]
		);
		assert_eq!(recorder.current_anon_id(), client.anon_id());
		assert!(recorder.snapshot().passed);
	}

	#[tokio::test]
	async fn user_id_is_stamped_after_it_is_set() {
		let sink = Arc::new(RecordingSink::default());
		let client = client_with(&sink);
		client.initialize(None).await.unwrap();

		client.set_user_id(Some("user-1".to_string()));
		client.track("plan_changed", ());

		let delivered = sink.wait_for(1).await;
		assert_eq!(delivered[0].user_id.as_deref(), Some("user-1"));
	}

	#[tokio::test]
	async fn initialize_overrides_are_merged() {
		let client = AnalyticsClient::builder()
			.config(test_config())
			.build()
			.unwrap();
		assert!(client.sink_names().is_empty());

		client
			.initialize(Some(
				ConfigOverrides::new()
					.endpoint("https://collect.example.com/e")
					.posthog("eu.i.posthog.com", "phc_x"),
			))
			.await
			.unwrap();

		assert_eq!(client.sink_names(), vec!["http", "posthog"]);
		assert_eq!(
			client.config().endpoint.as_deref(),
			Some("https://collect.example.com/e")
		);
	}

	#[tokio::test]
	async fn broken_store_still_initializes() {
		let client = AnalyticsClient::builder()
			.config(test_config())
			.store(Arc::new(BrokenStore))
			.build()
			.unwrap();

		client.initialize(None).await.unwrap();
		assert!(client.is_initialized());
		assert_ne!(client.anon_id(), UNKNOWN_ANON_ID);

		// a failing flag read skips app_open instead of erroring
		client.track_app_open().await;
	}

	#[tokio::test]
	async fn debug_reset_restores_launch_state() {
		let store = Arc::new(MemoryStore::new());
		let sink = Arc::new(RecordingSink::default());
		let client = AnalyticsClient::builder()
			.config(test_config())
			.store(store.clone())
			.shared_sink(sink.clone())
			.build()
			.unwrap();

		client.initialize(None).await.unwrap();
		client.track_session_start();
		client.track_app_open().await;
		let first_id = client.anon_id();
		sink.wait_for(2).await;

		client.reset_for_debug(false).await.unwrap();
		assert!(!client.is_initialized());
		assert_eq!(store.get(APP_OPEN_TRACKED_KEY).await.unwrap(), None);
		assert_eq!(client.anon_id(), first_id);

		client.initialize(None).await.unwrap();
		client.track_session_start();
		client.track_app_open().await;
		sink.wait_for(4).await;
		assert_eq!(
			sink.names(),
			vec!["session_start", "app_open", "session_start", "app_open"]
		);

		client.reset_for_debug(true).await.unwrap();
		assert_eq!(client.anon_id(), UNKNOWN_ANON_ID);
		assert_eq!(store.get(ANON_ID_KEY).await.unwrap(), None);
		client.initialize(None).await.unwrap();
		assert_ne!(client.anon_id(), first_id);
	}
}
