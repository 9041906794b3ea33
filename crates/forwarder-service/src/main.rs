//! Main entry point for the minimal forwarder service.
//!
//! The binary serves the relay API, signs requests with the configured
//! account for testing, and runs an in-process demo of the relay flow.

use clap::{Parser, Subcommand};
use forwarder_config::Config;
use forwarder_core::Forwarder;
use forwarder_types::utils::{parse_address, parse_bytes};
use forwarder_types::{ForwardRequest, ForwarderEvent, SignedForwardRequest, U256};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

mod apis;
mod demo;
mod factory_registry;
mod server;

use factory_registry::{build_account_from_config, build_forwarder_from_config};

/// Default gas budget for requests built by `sign`.
const DEFAULT_SIGN_GAS: u64 = 100_000;

/// Command-line arguments for the forwarder service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, global = true, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, global = true, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Serve the relay API (the default)
	Serve,
	/// Sign a forward request with the configured account
	Sign(SignArgs),
	/// Run the relay scenarios in-process
	Demo,
}

#[derive(clap::Args, Debug)]
struct SignArgs {
	/// Target address
	#[arg(long)]
	to: String,

	/// Calldata as hex
	#[arg(long, default_value = "0x")]
	data: String,

	/// Native value to forward
	#[arg(long, default_value = "0")]
	value: String,

	/// Gas budget for the forwarded call
	#[arg(long, default_value_t = DEFAULT_SIGN_GAS)]
	gas: u64,

	/// Nonce to use. Defaults to the signer's current nonce in storage.
	#[arg(long)]
	nonce: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.forwarder.id);

	match args.command.unwrap_or(Command::Serve) {
		Command::Serve => serve(config).await,
		Command::Sign(sign_args) => sign(config, sign_args).await,
		Command::Demo => run_demo(config).await,
	}
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
	let forwarder = Arc::new(build_forwarder_from_config(config.clone()).await?);
	tracing::info!("Started forwarder");

	let cleanup_handle = spawn_storage_cleanup(
		forwarder.clone(),
		Duration::from_secs(config.storage.cleanup_interval_seconds),
	);
	let events_handle = spawn_event_logger(&forwarder);

	let result = match config.api.filter(|api| api.enabled) {
		Some(api_config) => {
			tokio::select! {
				result = server::start_server(api_config, forwarder.clone()) => {
					tracing::info!("API server finished");
					result
				}
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Received shutdown signal");
					Ok(())
				}
			}
		},
		None => {
			tracing::warn!("API disabled - nothing will submit requests to this forwarder");
			tokio::signal::ctrl_c().await?;
			Ok(())
		},
	};

	cleanup_handle.abort();
	events_handle.abort();
	tracing::info!("Stopped forwarder");
	result
}

/// Periodically removes expired receipts.
fn spawn_storage_cleanup(
	forwarder: Arc<Forwarder>,
	period: Duration,
) -> tokio::task::JoinHandle<()> {
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(period);
		loop {
			interval.tick().await;
			match forwarder.cleanup_expired().await {
				Ok(count) if count > 0 => {
					tracing::debug!("Storage cleanup: removed {} expired entries", count);
				},
				Err(e) => {
					tracing::warn!("Storage cleanup failed: {}", e);
				},
				_ => {},
			}
		}
	})
}

/// Logs every forwarder event at debug level.
fn spawn_event_logger(forwarder: &Forwarder) -> tokio::task::JoinHandle<()> {
	let mut events = forwarder.event_bus().subscribe();
	tokio::spawn(async move {
		loop {
			match events.recv().await {
				Ok(ForwarderEvent::RequestExecuted {
					from,
					to,
					nonce,
					success,
					gas_used,
				}) => {
					tracing::debug!(%from, %to, %nonce, success, gas_used, "Request executed");
				},
				Ok(ForwarderEvent::RequestRejected {
					from,
					nonce,
					reason,
				}) => {
					tracing::debug!(%from, %nonce, reason = reason.as_code(), "Request rejected");
				},
				Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
					tracing::warn!(skipped, "Event logger lagged");
				},
				Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
			}
		}
	})
}

/// Builds and signs a request, printing it as JSON ready for `/api/execute`.
async fn sign(config: Config, args: SignArgs) -> Result<(), Box<dyn std::error::Error>> {
	let account = build_account_from_config(&config)?.ok_or(demo::DemoError::NoAccount)?;
	let forwarder = build_forwarder_from_config(config).await?;
	let from = account.get_address().await?;

	let nonce = match args.nonce {
		Some(nonce) => U256::from_str(&nonce)?,
		None => forwarder.get_nonce(from).await?,
	};

	let request = ForwardRequest {
		from,
		to: parse_address(&args.to)?,
		value: U256::from_str(&args.value)?,
		gas: U256::from(args.gas),
		nonce,
		data: parse_bytes(&args.data)?,
	};
	let signature = account
		.sign_forward_request(&request, forwarder.domain())
		.await?;

	let signed = SignedForwardRequest { request, signature };
	println!("{}", serde_json::to_string_pretty(&signed)?);
	Ok(())
}

async fn run_demo(config: Config) -> Result<(), Box<dyn std::error::Error>> {
	let token = demo::token_address(&config).ok_or(demo::DemoError::NoToken)?;
	let account = build_account_from_config(&config)?.ok_or(demo::DemoError::NoAccount)?;
	let forwarder = build_forwarder_from_config(config).await?;

	let outcomes = demo::run_demo(&forwarder, &account, token).await?;
	let failed = outcomes.iter().filter(|o| !o.passed).count();
	if failed > 0 {
		return Err(format!("{} of {} demo scenarios failed", failed, outcomes.len()).into());
	}

	tracing::info!(scenarios = outcomes.len(), "Demo complete");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_args_default_values() {
		let args = Args::parse_from(["forwarder"]);

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
		assert!(args.command.is_none());
	}

	#[test]
	fn test_args_global_flags_after_subcommand() {
		let args = Args::parse_from(["forwarder", "demo", "--config", "custom.toml", "-l", "debug"]);

		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
		assert!(matches!(args.command, Some(Command::Demo)));
	}

	#[test]
	fn test_sign_args() {
		let args = Args::parse_from([
			"forwarder",
			"sign",
			"--to",
			"0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512",
			"--data",
			"0x1249c58b",
		]);

		match args.command {
			Some(Command::Sign(sign)) => {
				assert_eq!(sign.gas, DEFAULT_SIGN_GAS);
				assert_eq!(sign.value, "0");
				assert!(sign.nonce.is_none());
			},
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_serve_config_from_file() {
		let temp_dir = tempfile::tempdir().unwrap();
		let config_path = temp_dir.path().join("forwarder.toml");
		std::fs::write(
			&config_path,
			r#"
[forwarder]
id = "test-forwarder"
address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
chain_id = 31337

[storage]
primary = "memory"
cleanup_interval_seconds = 60

[storage.implementations.memory]

[[targets]]
implementation = "gasless_token"
address = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"
token_name = "GaslessToken"
symbol = "GLT"
"#,
		)
		.unwrap();

		let config = Config::from_file(config_path.to_str().unwrap())
			.await
			.unwrap();
		let forwarder = build_forwarder_from_config(config).await.unwrap();
		assert_eq!(forwarder.domain().name, "MinimalForwarder");
	}
}
