//! dnsrelay - a recursive-capable DNS relay.
//!
//! Answers queries from a local record table when possible, forwards the
//! rest to a configured upstream resolver over UDP, and relays the answers
//! back to the original client with the original identifier restored.

use dnsrelay::config::load_config;
use dnsrelay::dns::filter::FilterPolicy;
use dnsrelay::dns::relay::RelayEngine;
use dnsrelay::dns::store::RecordStore;
use dnsrelay::logging;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();

    // Parse command line arguments
    let mut config_path: Option<&str> = None;
    let mut cli_listen: Option<String> = None;
    let mut cli_upstream: Option<String> = None;
    let mut cli_record_file: Option<String> = None;
    let mut cli_filter: Option<FilterPolicy> = None;
    let mut cli_debug = false;
    let mut cli_dump = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                config_path = args.get(i).map(|s| s.as_str());
            }
            "--listen" => {
                i += 1;
                cli_listen = args.get(i).cloned();
            }
            "-4" | "-6" => {
                cli_filter = FilterPolicy::from_cli_flag(&args[i]);
            }
            "-d" => {
                cli_debug = true;
            }
            "-dd" => {
                cli_debug = true;
                cli_dump = true;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                return Ok(());
            }
            arg if !arg.starts_with('-') => {
                if looks_like_address(arg) && cli_upstream.is_none() {
                    cli_upstream = Some(arg.to_string());
                } else {
                    cli_record_file = Some(arg.to_string());
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    // Load config from file; CLI arguments override it
    let mut config = load_config(config_path)?;
    if let Some(listen) = cli_listen {
        config.listen = listen;
    }
    if let Some(upstream) = cli_upstream {
        config.upstream = upstream;
    }
    if let Some(record_file) = cli_record_file {
        config.record_file = record_file;
    }
    if let Some(filter) = cli_filter {
        config.filter = filter;
    }
    if cli_debug {
        config.logging.level = "debug".to_string();
    }
    if cli_dump {
        config.dump_packets = true;
    }

    let _log_guard = logging::init_logging(&config.logging);

    info!(
        listen = %config.listen,
        upstream = %config.upstream,
        filter = %config.filter,
        records = %config.record_file,
        "starting DNS relay"
    );

    let store = Arc::new(RecordStore::load(&config.record_file));
    let engine = RelayEngine::bind(&config, store).await?;

    let shutdown = engine.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
        }
    });

    engine.run().await?;
    Ok(())
}

fn looks_like_address(arg: &str) -> bool {
    arg.parse::<IpAddr>().is_ok() || arg.parse::<SocketAddr>().is_ok()
}

fn print_usage(program: &str) {
    println!("Usage: {} [options] [upstream] [record-file]", program);
    println!();
    println!("Options:");
    println!("  -c, --config <path>   Configuration file (default: config.yaml)");
    println!("  --listen <addr:port>  Listen address (default: 0.0.0.0:53)");
    println!("  -4                    Return IPv4 (A) answers only");
    println!("  -6                    Return IPv6 (AAAA) answers only");
    println!("  -d                    Debug logging");
    println!("  -dd                   Debug logging with packet dumps");
    println!("  -h, --help            Show this help");
    println!();
    println!("  [upstream]            Upstream DNS server, IP or IP:port");
    println!("  [record-file]         Local record file (default: records.txt)");
}
