use std::process;
use std::sync::Arc;

use anyhow::Context;
use lossim::{Simulation, SimulationConfig, TokioClock};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let format = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: lossim [--json]");
            eprintln!();
            eprintln!("Simulates an Erlang-B loss system with compiled-in parameters and");
            eprintln!("prints observed counts next to the analytic predictions.");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --json           Print the report as JSON");
            eprintln!();
            eprintln!("Environment:");
            eprintln!("  LOSSIM_LOG       Log level: debug, info, warn, error [default: info]");
            eprintln!("  LOG_FORMAT       Set to 'json' for JSON logs");
            process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(format) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<OutputFormat, String> {
    let mut format = OutputFormat::Text;

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--json" => format = OutputFormat::Json,
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
    }

    Ok(format)
}

/// Logs go to stderr. `RUST_LOG` wins over `LOSSIM_LOG`; `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("lossim={}", log_level(std::env::var("LOSSIM_LOG").ok())))
    });

    let json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");
    let (json_layer, text_layer) = if json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();
}

fn log_level(requested: Option<String>) -> &'static str {
    match requested.as_deref() {
        Some("debug") => "debug",
        Some("warn" | "warning") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

#[tokio::main]
async fn run(format: OutputFormat) -> anyhow::Result<()> {
    info!("lossim {}", env!("CARGO_PKG_VERSION"));

    let sim = Simulation::new(SimulationConfig::default(), Arc::new(TokioClock));

    let shutdown = sim.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted - stopping request generation");
            shutdown.cancel();
        }
    });

    let report = sim.run().await.context("simulation failed")?;

    match format {
        OutputFormat::Text => println!("{report}"),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("serializing report")?;
            println!("{json}");
        }
    }

    Ok(())
}
