//! noderpc CLI: issue failover JSON-RPC calls against a node pool.
//!
//! Usage:
//! ```bash
//! # Call through two HTTP nodes, failing over between them
//! noderpc call --node https://api.node-a.example --node https://api.node-b.example \
//!     --method get_dynamic_global_properties
//!
//! # Race a WS pool, positional params, plain method envelope
//! NODERPC_NODES=wss://ws.node-a.example,wss://ws.node-b.example \
//!     noderpc call --method get_block --params '[1]' --no-default-api
//! ```

use std::env;
use std::fs;
use std::process;

use anyhow::{bail, Context, Result};
use noderpc_connector::{Connector, ConnectorConfig};
use noderpc_core::request::CallRequest;
use noderpc_core::NodeStatus;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const NODES_ENV: &str = "NODERPC_NODES";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "call" => cmd_call(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("noderpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("noderpc {}", env!("CARGO_PKG_VERSION"));
    println!("Fault-tolerant JSON-RPC calls over a pool of nodes\n");
    println!("USAGE:");
    println!("    noderpc <COMMAND>\n");
    println!("COMMANDS:");
    println!("    call       Call a method, failing over between nodes");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("CALL FLAGS:");
    println!("    --node <URL>           Node endpoint, repeatable (or {NODES_ENV}=url,url)");
    println!("    --method <NAME>        Method to call  [required]");
    println!("    --params <JSON>        Array (positional) or object (named) params");
    println!("    --api <NAME>           API namespace for plain envelopes");
    println!("    --no-default-api       Do not wrap the call in the default API");
    println!("    --config <FILE>        JSON connector config");
    println!("    --log-level <LEVEL>    Log filter when RUST_LOG is unset");
}

async fn cmd_call(args: &[String]) -> Result<()> {
    let mut config = match parse_flag(args, "--config") {
        Some(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            ConnectorConfig::from_json(&raw).with_context(|| format!("parsing {path}"))?
        }
        None => ConnectorConfig::default(),
    };

    let nodes = parse_flags(args, "--node");
    if !nodes.is_empty() {
        config.nodes = nodes;
    } else if config.nodes.is_empty() {
        if let Ok(list) = env::var(NODES_ENV) {
            config.nodes = split_nodes(&list);
        }
    }
    if config.nodes.is_empty() {
        bail!("no nodes given: pass --node or set {NODES_ENV}");
    }
    if let Some(level) = parse_flag(args, "--log-level") {
        config.log_level = level;
    }
    init_tracing(&config.log_level);

    let method = parse_flag(args, "--method").context("--method is required")?;
    let mut request = CallRequest::new(method);
    if let Some(params) = parse_flag(args, "--params") {
        match serde_json::from_str(&params).context("--params must be JSON")? {
            Value::Array(values) => request.args = values,
            Value::Object(map) => request.kwargs = Some(map),
            _ => bail!("--params must be a JSON array or object"),
        }
    }
    if let Some(api) = parse_flag(args, "--api") {
        request = request.api(api);
    }
    if args.iter().any(|a| a == "--no-default-api") {
        request = request.without_default_api();
    }

    let client = Connector::with_config(config)?;
    let outcome = client.call_with(request).await;

    if let Ok(result) = &outcome {
        println!("{}", serde_json::to_string_pretty(result)?);
        println!();
    }
    print_status(&client.status());
    outcome?;
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_status(status: &[NodeStatus]) {
    println!("{:<40} {:<10} {:<8} {:<8}", "NODE", "AVAILABLE", "BANNED", "API");
    for node in status {
        println!(
            "{:<40} {:<10} {:<8} {:<8}",
            node.hostname,
            node.available,
            node.banned,
            if node.full_api { "full" } else { "plain" }
        );
    }
}

fn split_nodes(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_flags(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|pair| pair[0] == flag)
        .map(|pair| pair[1].clone())
        .collect()
}
