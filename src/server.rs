//! Server plumbing: logging setup, startup banner, accept loop and shutdown.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::{env, io};

use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Settings;
use crate::connection::ConnectionTracker;
use crate::{args::Args, env_vars};
use promgate_core::{ConfigProvider, ProxyState, handle_request};

/// Opens `path` for appending, creating it if needed.
///
/// The file is never truncated or rotated here; rotation is left to
/// external tooling such as logrotate with `copytruncate`.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the level implied by `--verbose` /
/// `--quiet`. With `--log-file`, records are appended to that file with
/// ANSI colours disabled.
pub fn init_tracing(args: &Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));

    let writer = match &args.log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(io::stderr),
    };
    let ansi = args.log_file.is_none();

    let registry = tracing_subscriber::registry().with(env_filter);
    if args.json_logs {
        registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_ansi(ansi).with_writer(writer))
            .try_init()?;
    }

    Ok(())
}

/// Print startup banner with configuration
pub fn print_startup_info(args: &Args, settings: &Settings) {
    if args.quiet {
        // Quiet mode: only essential information
        println!(
            "🚀 PromGate v{} starting on {}",
            env!("CARGO_PKG_VERSION"),
            settings.listen_addr()
        );
        return;
    }

    println!("🛡️  {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("   {}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("📡 Network Configuration:");
    println!("   Listen:         {}", settings.listen_addr());
    println!("   Config File:    {}", args.config.display());
    println!();

    let proxy = &settings.proxy;
    println!("🔧 Backend:");
    println!("   URL:            {}", proxy.backend_base());
    println!("   Timeout:        {} seconds", proxy.timeout.as_secs());
    println!("   Max Body Size:  {}", proxy.max_body_size_mb());
    println!();

    println!("⚡ Admission:");
    println!("   Max Concurrent: {}", settings.max_concurrency);
    println!("   Queue Timeout:  {} seconds", proxy.queue_timeout.as_secs());
    println!();

    let rules = &settings.rules;
    println!("🔒 Query Rules:");
    if rules.allowed_spaces.is_empty() {
        println!("   Spaces:         None allowed (every query is rejected)");
    } else {
        println!("   Spaces:         {}", rules.allowed_spaces.sorted().join(", "));
    }
    println!(
        "   Max Lookback:   {}",
        promgate_core::duration::format_duration(rules.max_lookback)
    );
    println!(
        "   Max Fn Range:   {}",
        promgate_core::duration::format_duration(rules.max_function_range)
    );

    // Show environment configuration in verbose mode
    if args.verbose {
        print_env_config();
    }

    println!();
    println!("🚀 Server starting...");
}

/// Print environment variable configuration status (used in verbose mode)
fn print_env_config() {
    println!();
    println!("🔧 Environment Variables:");

    for &var_name in env_vars::all_env_vars() {
        match env::var(var_name) {
            Ok(value) => println!("   {:<28} = {}", var_name, value),
            Err(_) => println!("   {:<28} = [NOT SET]", var_name),
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Accepts connections until `shutdown` resolves.
///
/// Each connection is served by hyper's HTTP/1 implementation on its own
/// task and registered with `tracker`. When `shutdown` fires, open
/// connections are asked to close after their current request, queries
/// still waiting for admission are refused, and callers wait on the tracker
/// to let in-flight requests finish.
pub async fn serve<C, F>(
    listener: TcpListener,
    state: ProxyState<C>,
    tracker: ConnectionTracker,
    shutdown: F,
) where
    C: ConfigProvider + 'static,
    F: Future<Output = ()>,
{
    let (stop_tx, stop_rx) = watch::channel(());
    tokio::pin!(shutdown);

    loop {
        let (stream, remote_addr) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(error = %err, "Failed to accept connection");
                    continue;
                }
            },
        };

        debug!(remote_addr = %remote_addr, "New connection");

        let io = TokioIo::new(stream);
        let state = state.clone();
        let guard = tracker.track();
        let mut stop_rx = stop_rx.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                handle_request(req, remote_addr, state.clone())
            });
            let conn = http1::Builder::new().serve_connection(io, service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = stop_rx.changed() => {
                    conn.as_mut().graceful_shutdown();
                    conn.as_mut().await
                }
            };

            if let Err(err) = result {
                debug!(remote_addr = %remote_addr, error = %err, "Connection error");
            }
            drop(guard);
        });
    }

    // Queued queries fail fast instead of waiting out their queue timeout.
    state.gate().close();
    // Wakes every connection task; receivers also observe the drop.
    let _ = stop_tx.send(());
}
