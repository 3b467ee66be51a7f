mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use greennet_api::mqtt::MqttTransport;
use greennet_core::{Gateway, SyncState};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::config::Connection;
use crate::error::CliError;

/// Allowance for the broker connection on top of the bootstrap timeout.
const CONNECT_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose, cli.global.quiet);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, quiet: bool) {
    let filter = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a gateway session
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "greennet", &mut std::io::stdout());
            Ok(())
        }

        // All other commands run against a synchronized gateway
        cmd => {
            let cfg = config::load_config_or_default();
            let connection = config::resolve_connection(&cli.global, &cfg)?;
            tracing::debug!(profile = %connection.profile_name, "resolved connection");
            let session = Session::open(connection, &cli.global).await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &session.gateway, &cli.global).await;
            session.close().await;
            result
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// A started gateway plus the MQTT transport feeding it.
struct Session {
    gateway: Gateway,
    transport: Arc<MqttTransport>,
}

impl Session {
    /// Connect, start the sync engine and wait for the device snapshot.
    async fn open(connection: Connection, global: &GlobalOpts) -> Result<Self, CliError> {
        let broker = format!("{}:{}", connection.mqtt.host, connection.mqtt.port);
        let gateway_id = connection.gateway.gateway_id.clone();
        let wait = connection.gateway.bootstrap_timeout + CONNECT_GRACE;

        let (transport, events) = MqttTransport::connect(connection.mqtt, CancellationToken::new());
        let transport = Arc::new(transport);
        let gateway = Gateway::new(connection.gateway, Arc::<MqttTransport>::clone(&transport), events);
        gateway.start().await?;
        let session = Self { gateway, transport };

        let spinner = spinner(global, format!("Synchronizing with {gateway_id} via {broker}"));
        let mut state = session.gateway.sync_state();
        let bootstrapped = tokio::time::timeout(
            wait,
            state.wait_for(|s| matches!(s, SyncState::Synchronized { .. })),
        )
        .await
        .ok()
        .and_then(Result::ok)
        .map(|s| matches!(*s, SyncState::Synchronized { bootstrapped: true }));
        spinner.finish_and_clear();

        match bootstrapped {
            Some(true) => Ok(session),
            Some(false) => {
                tracing::warn!(gateway = %gateway_id, "device snapshot not received, device list may be incomplete");
                Ok(session)
            }
            None => {
                session.close().await;
                Err(CliError::ConnectionFailed {
                    gateway: gateway_id,
                    broker,
                })
            }
        }
    }

    async fn close(self) {
        self.gateway.shutdown().await;
        self.transport.shutdown();
    }
}

fn spinner(global: &GlobalOpts, message: String) -> ProgressBar {
    if global.quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
