//! netquery command-line entry point.
//!
//! Parses arguments, loads the config file, initialises logging, and runs the
//! chosen subcommand on the Tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()              -- TOML file, then CLI/env overrides
//!  └─ subcommand
//!       ├─ search / find / query -- QuerySession on a blocking thread,
//!       │                           Ctrl-C raises its CancelHandle
//!       ├─ serve                 -- QueryResponder thread + event pump
//!       └─ init-config           -- writes the effective config as TOML
//! ```
//!
//! Results go to stdout; logs go to stderr.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use netquery::application::query_session::QuerySession;
use netquery::application::search::{collect_all, find_first, query_address};
use netquery::infrastructure::clock::SystemClock;
use netquery::infrastructure::network::{
    responder::start_query_responder,
    udp::{resolve_server, UdpTransport},
};
use netquery::infrastructure::presentation::{OutputFormat, ResultPrinter};
use netquery::infrastructure::storage::config::{init_config, load_config, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Find game servers on the local network, or query one directly.
#[derive(Debug, Parser)]
#[command(name = "netquery", version, about)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Game port to query (and to listen on for `serve`).
    #[arg(long, global = true, env = "NETQUERY_PORT")]
    port: Option<u16>,

    /// Local address to bind to.
    #[arg(long, global = true, env = "NETQUERY_BIND", value_name = "ADDR")]
    bind: Option<IpAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Broadcast a query and list every server that answers.
    Search {
        /// Print one JSON object per server instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Broadcast a query and print the first server that answers.
    Find,
    /// Query one server directly.
    Query {
        /// Server as HOST or HOST:PORT.
        host: String,
        /// Print the answer as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Answer queries from other machines until interrupted.
    Serve,
    /// Write the current settings (file plus overrides) to the config file.
    InitConfig {
        /// Replace an existing config file.
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Applies command-line and environment overrides on top of the file
    /// config.
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(bind) = self.bind {
            config.network.bind_address = bind.to_string();
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load config")?;
    cli.apply_overrides(&mut config);

    // Logs go to stderr so stdout carries only results.  `RUST_LOG` wins over
    // the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Search { json } => search(&config, json).await,
        Command::Find => find(&config).await,
        Command::Query { host, json } => query(&config, &host, json).await,
        Command::Serve => serve(&config).await,
        Command::InitConfig { force } => {
            let path = init_config(&config, cli.config.as_deref(), force)
                .context("failed to write config")?;
            println!("wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

type UdpSession = QuerySession<UdpTransport, SystemClock>;

/// Opens a query socket on an ephemeral port of the configured interface.
fn open_session(config: &AppConfig) -> anyhow::Result<UdpSession> {
    let bind_ip = config.network.bind_ip()?;
    let broadcast = config.network.broadcast_socket_addr()?;
    let transport = UdpTransport::bind(SocketAddr::new(bind_ip, 0), broadcast)
        .context("failed to open query socket")?;
    Ok(QuerySession::new(transport, SystemClock::new()))
}

/// Runs `work` on a blocking thread.  Ctrl-C cancels the session; `work`
/// still returns whatever it had collected by then.
async fn run_blocking<R, F>(mut session: UdpSession, work: F) -> anyhow::Result<R>
where
    R: Send + 'static,
    F: FnOnce(&mut UdpSession) -> R + Send + 'static,
{
    let cancel = session.cancel_handle();
    let mut task = tokio::task::spawn_blocking(move || work(&mut session));

    tokio::select! {
        result = &mut task => Ok(result?),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("failed to listen for Ctrl-C: {e}");
            }
            info!("interrupted, stopping query loop");
            cancel.cancel();
            Ok(task.await?)
        }
    }
}

async fn search(config: &AppConfig, json: bool) -> anyhow::Result<ExitCode> {
    let session = open_session(config)?;
    let format = if json {
        OutputFormat::JsonLines
    } else {
        OutputFormat::Table
    };

    run_blocking(session, move |session| -> anyhow::Result<()> {
        let mut printer = ResultPrinter::new(std::io::stdout().lock(), format);
        printer.print_banner()?;
        let found = collect_all(session, |server| {
            if let Err(e) = printer.print_server(&server) {
                warn!("failed to print result: {e}");
            }
        });
        printer.print_summary(found)?;
        Ok(())
    })
    .await??;

    Ok(ExitCode::SUCCESS)
}

async fn find(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let session = open_session(config)?;

    match run_blocking(session, |session| find_first(session)).await? {
        Some(addr) => {
            println!("{addr}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("no server found");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn query(config: &AppConfig, host: &str, json: bool) -> anyhow::Result<ExitCode> {
    let addr = resolve_server(host, config.network.port)
        .with_context(|| format!("cannot query {host}"))?;
    let session = open_session(config)?;

    match run_blocking(session, move |session| query_address(session, addr)).await? {
        Some(server) => {
            let format = if json {
                OutputFormat::JsonLines
            } else {
                OutputFormat::Table
            };
            let mut printer = ResultPrinter::new(std::io::stdout().lock(), format);
            printer.print_server(&server)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("no response from {addr}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn serve(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let bind = SocketAddr::new(config.network.bind_ip()?, config.network.port);
    let running = Arc::new(AtomicBool::new(true));
    let mut responder = start_query_responder(
        bind,
        config.responder.to_query_data(),
        Arc::clone(&running),
    )
    .context("failed to start query responder")?;

    info!(
        "answering queries on UDP {} as {:?}.  Press Ctrl-C to exit.",
        responder.local_addr(),
        config.responder.description
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut answered: u64 = 0;

    loop {
        tokio::select! {
            event = responder.events().recv() => match event {
                Some(event) => {
                    answered += 1;
                    info!(
                        from = %event.from,
                        replied = event.answered,
                        total = answered,
                        "query received"
                    );
                }
                None => break,
            },
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!("failed to listen for Ctrl-C: {e}");
                }
                info!("shutdown signal received");
                break;
            }
        }
    }

    running.store(false, Ordering::Relaxed);
    tokio::task::spawn_blocking(move || responder.join()).await?;
    info!(total = answered, "responder stopped");
    Ok(ExitCode::SUCCESS)
}
