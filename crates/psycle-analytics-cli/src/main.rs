// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Psycle analytics developer tool.
//!
//! Drives the analytics pipeline from the command line against a file-backed
//! store, so the anonymous identity and the app_open flag survive between
//! invocations the same way they survive app restarts on a device.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use psycle_analytics::{
	AnalyticsClient, AnalyticsConfig, AnalyticsEvent, AppEnv, ConfigOverrides, EventSink,
	FileStore, DEFAULT_SEND_TIMEOUT,
};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod props;
mod report;

use report::SelfTest;

const STATE_FILE: &str = "analytics.json";

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EnvArg {
	Dev,
	Prod,
}

impl From<EnvArg> for AppEnv {
	fn from(v: EnvArg) -> Self {
		match v {
			EnvArg::Dev => AppEnv::Dev,
			EnvArg::Prod => AppEnv::Prod,
		}
	}
}

/// Psycle analytics - drive the client-side event pipeline
#[derive(Parser, Debug)]
#[command(name = "psycle-analytics", version, about, long_about = None)]
struct Args {
	/// Directory holding the analytics state file
	#[arg(long, env = "PSYCLE_ANALYTICS_DATA_DIR")]
	data_dir: Option<PathBuf>,

	/// Generic HTTP sink URL (overrides PSYCLE_ANALYTICS_ENDPOINT)
	#[arg(long)]
	endpoint: Option<String>,

	/// PostHog host (overrides PSYCLE_POSTHOG_HOST)
	#[arg(long, requires = "posthog_api_key")]
	posthog_host: Option<String>,

	/// PostHog project API key (overrides PSYCLE_POSTHOG_API_KEY)
	#[arg(long, requires = "posthog_host")]
	posthog_api_key: Option<String>,

	/// Drop every event
	#[arg(long)]
	disable: bool,

	/// Log every event and delivery failure
	#[arg(long)]
	debug: bool,

	/// Environment stamped on events
	#[arg(long, value_enum)]
	env: Option<EnvArg>,

	/// Print each delivered event to stdout as a JSON line
	#[arg(long)]
	print: bool,

	/// Milliseconds to wait for in-flight deliveries before exiting
	#[arg(long, default_value_t = DEFAULT_SEND_TIMEOUT.as_millis() as u64)]
	flush_wait_ms: u64,

	/// Print the self-test report after the command
	#[arg(long)]
	report: bool,

	/// Print the self-test state as JSON instead of text
	#[arg(long, requires = "report")]
	json: bool,

	/// Judge the report as a second launch, where app_open must not fire
	#[arg(long)]
	second_launch: bool,

	/// Log level when RUST_LOG is unset
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Track one event
	Track {
		/// Event name, e.g. lesson_complete
		name: String,
		/// Event property (repeatable: -p KEY=VALUE)
		#[arg(long = "prop", short = 'p', value_name = "KEY=VALUE", value_parser = props::parse_prop)]
		props: Vec<(String, Value)>,
	},
	/// Simulate an app launch: session_start, initialize, app_open, app_ready
	Launch,
	/// Track app_open unless this install already has
	AppOpen,
	/// Print the anonymous id, creating it if needed
	AnonId,
	/// Show the resolved configuration and sinks
	Config,
	/// Clear the app_open flag (and optionally the anonymous id)
	Reset {
		/// Also forget the anonymous id so the next run creates a new one
		#[arg(long)]
		regenerate_anon_id: bool,
	},
}

/// Writes delivered events to stdout.
struct StdoutSink;

#[async_trait]
impl EventSink for StdoutSink {
	fn name(&self) -> &'static str {
		"stdout"
	}

	async fn send(&self, event: &AnalyticsEvent) -> psycle_analytics::Result<()> {
		println!("{}", serde_json::to_string(event)?);
		Ok(())
	}
}

fn init_tracing(level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_writer(std::io::stderr))
		.init();
}

fn data_dir(args: &Args) -> Result<PathBuf> {
	match &args.data_dir {
		Some(dir) => Ok(dir.clone()),
		None => dirs::data_dir()
			.map(|dir| dir.join("psycle"))
			.context("could not determine a data directory; pass --data-dir"),
	}
}

fn config(args: &Args) -> AnalyticsConfig {
	let mut overrides = ConfigOverrides::new();
	if args.disable {
		overrides = overrides.enabled(false);
	}
	if args.debug {
		overrides = overrides.debug(true);
	}
	if let Some(env) = args.env {
		overrides = overrides.app_env(env.into());
	}
	if let Some(endpoint) = &args.endpoint {
		overrides = overrides.endpoint(endpoint.clone());
	}
	if let (Some(host), Some(key)) = (&args.posthog_host, &args.posthog_api_key) {
		overrides = overrides.posthog(host.clone(), key.clone());
	}

	let mut config = AnalyticsConfig::from_env();
	config.merge(overrides);
	config
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	init_tracing(&args.log_level);

	let state_path = data_dir(&args)?.join(STATE_FILE);
	debug!(path = %state_path.display(), "using analytics state file");

	let self_test = SelfTest::new(args.second_launch);
	let mut builder = AnalyticsClient::builder()
		.config(config(&args))
		.store(Arc::new(FileStore::new(&state_path)))
		.debug_recorder(self_test.recorder());
	if args.print {
		builder = builder.sink(StdoutSink);
	}
	let client = builder.build()?;

	run(&client, args.command).await?;

	if client.is_initialized() && !client.sink_names().is_empty() {
		tokio::time::sleep(Duration::from_millis(args.flush_wait_ms)).await;
	}

	if args.report {
		self_test.print(args.json)?;
		if !self_test.passed() {
			std::process::exit(1);
		}
	}

	Ok(())
}

async fn run(client: &AnalyticsClient, command: Command) -> Result<()> {
	match command {
		Command::Track { name, props } => {
			client.track(&name, props::into_properties(props));
			client.initialize(None).await?;
			info!(event = %name, anon_id = %client.anon_id(), "event tracked");
		}
		Command::Launch => {
			client.track_session_start();
			client.initialize(None).await?;
			client.track_app_open().await;
			client.track_app_ready();
			info!(anon_id = %client.anon_id(), "launch simulated");
		}
		Command::AppOpen => {
			client.initialize(None).await?;
			client.track_app_open().await;
		}
		Command::AnonId => {
			client.initialize(None).await?;
			println!("{}", client.anon_id());
		}
		Command::Config => {
			let config = client.config();
			println!("enabled: {}", config.enabled);
			println!("debug: {}", config.debug);
			println!("env: {}", config.effective_env());
			println!("endpoint: {}", config.endpoint.as_deref().unwrap_or("-"));
			println!("posthog host: {}", config.posthog_host.as_deref().unwrap_or("-"));
			println!("sinks: {}", client.sink_names().join(", "));
		}
		#[cfg(any(debug_assertions, feature = "e2e-debug"))]
		Command::Reset { regenerate_anon_id } => {
			client.reset_for_debug(regenerate_anon_id).await?;
			println!(
				"analytics state reset{}",
				if regenerate_anon_id {
					" (anonymous id cleared)"
				} else {
					""
				}
			);
		}
		#[cfg(not(any(debug_assertions, feature = "e2e-debug")))]
		Command::Reset { .. } => {
			anyhow::bail!("reset requires a debug build or the e2e-debug feature");
		}
	}
	Ok(())
}
