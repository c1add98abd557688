use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use promgate::args::Args;
use promgate::config::Settings;
use promgate::connection::ConnectionTracker;
use promgate::{ProxyState, server};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(err) = args.validate() {
        eprintln!("❌ Configuration error: {err}");
        std::process::exit(1);
    }

    if let Err(err) = server::init_tracing(&args) {
        eprintln!("❌ Failed to initialise logging: {err}");
        std::process::exit(1);
    }

    let settings = match Settings::load(&args.config) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("❌ Configuration error: {err}");
            std::process::exit(1);
        }
    };

    server::print_startup_info(&args, &settings);

    let listen_addr = settings.listen_addr();
    let drain_timeout = settings.proxy.timeout;
    let state = match ProxyState::new(Arc::new(settings)) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("❌ Failed to initialise proxy: {err}");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("❌ Failed to bind to {listen_addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(addr = %listen_addr, "PromGate is running");

    let tracker = ConnectionTracker::new();
    server::serve(listener, state, tracker.clone(), server::shutdown_signal()).await;

    info!(
        connections = tracker.count(),
        "Waiting for open connections to finish"
    );
    if !tracker.wait_for_shutdown(drain_timeout).await {
        warn!(
            connections = tracker.count(),
            "Shutdown timeout reached, dropping remaining connections"
        );
    }
    info!("PromGate stopped");
}
