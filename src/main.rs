//! pvcast entry point: CLI wiring and config-driven pipeline construction.

use std::path::Path;
use std::process;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing_subscriber::EnvFilter;

use pvcast::config::PvcastConfig;
use pvcast::engine::clock::{Interval, SystemDateSource};
use pvcast::engine::pipeline::ForecastPipeline;
use pvcast::engine::types::ClearskyRequest;
use pvcast::io::export::export_csv;
use pvcast::plant::ConfiguredRegistry;

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    plant: String,
    interval: Interval,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
    csv_out: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: Option<u16>,
}

fn print_help() {
    eprintln!("pvcast: clear-sky PV forecasts for one or many plants");
    eprintln!();
    eprintln!("Usage: pvcast [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load configuration from TOML file");
    eprintln!("  --plant <name|all>       Plant to forecast (default: all)");
    eprintln!("  --interval <interval>    1Min, 5Min, 15Min, 30Min, 1H, 1D or 1W (default: 1H)");
    eprintln!("  --start <rfc3339>        Window start (requires --end)");
    eprintln!("  --end <rfc3339>          Window end (requires --start)");
    eprintln!("  --csv-out <path>         Export the result table to CSV");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server instead of a single run");
        eprintln!("  --port <u16>             API server port (default: from config, 4557)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --config is given, the built-in demo configuration is used.");
}

/// Returns the value following flag `args[*i]`, or exits.
fn flag_value(args: &[String], i: &mut usize, what: &str) -> String {
    let flag = &args[*i];
    *i += 1;
    match args.get(*i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_timestamp(flag: &str, value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value).unwrap_or_else(|e| {
        eprintln!("error: {flag} value \"{value}\" is not an RFC 3339 timestamp: {e}");
        process::exit(1);
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        plant: "all".to_string(),
        interval: Interval::OneHour,
        start: None,
        end: None,
        csv_out: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                cli.config_path = Some(flag_value(&args, &mut i, "a path argument"));
            }
            "--plant" => {
                cli.plant = flag_value(&args, &mut i, "a plant name or \"all\"");
            }
            "--interval" => {
                let value = flag_value(&args, &mut i, "an interval argument");
                cli.interval = value.parse().unwrap_or_else(|e| {
                    eprintln!("error: {e}");
                    process::exit(1);
                });
            }
            "--start" => {
                let value = flag_value(&args, &mut i, "a timestamp argument");
                cli.start = Some(parse_timestamp("--start", &value));
            }
            "--end" => {
                let value = flag_value(&args, &mut i, "a timestamp argument");
                cli.end = Some(parse_timestamp("--end", &value));
            }
            "--csv-out" => {
                cli.csv_out = Some(flag_value(&args, &mut i, "a path argument"));
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                let value = flag_value(&args, &mut i, "a u16 argument");
                if let Ok(p) = value.parse::<u16>() {
                    cli.port = Some(p);
                } else {
                    eprintln!("error: --port value \"{value}\" is not a valid u16");
                    process::exit(1);
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Builds the registry and pipeline from a validated configuration.
fn build_pipeline(config: &PvcastConfig) -> ForecastPipeline {
    let registry = ConfiguredRegistry::from_config(config).unwrap_or_else(|errors| {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    });
    ForecastPipeline::new(
        Arc::new(registry),
        Arc::new(SystemDateSource::new()),
        config.general.forecast.workers,
        config.max_window(),
    )
    .unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();

    let config = if let Some(ref path) = cli.config_path {
        match PvcastConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        PvcastConfig::demo()
    };

    let pipeline = build_pipeline(&config);

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::time::Duration;

        let state = Arc::new(pvcast::api::AppState {
            pipeline: Arc::new(pipeline),
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
        });
        let port = cli.port.unwrap_or(config.server.port);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(pvcast::api::serve(state, addr)) {
            eprintln!("error: server failed on {addr}: {e}");
            process::exit(1);
        }
        return;
    }

    let request = ClearskyRequest {
        plant_name: cli.plant,
        interval: cli.interval,
        start: cli.start,
        end: cli.end,
    };

    let outcome = match pipeline.run_detailed(&request) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {e}");
            if let pvcast::error::PipelineError::Incomplete(ref inc) = e {
                eprintln!("{}", inc.table);
            }
            process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&outcome.envelope) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: failed to serialize response: {e}");
            process::exit(1);
        }
    }

    if let Some(ref path) = cli.csv_out {
        if let Err(e) = export_csv(&outcome.table, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Result table written to {path}");
    }
}
