//! Crosscall - runs call scenarios against the execution host.
//!
//! A scenario file seeds accounts with balances, storage and fixture
//! contracts, then performs one top-level call and prints a JSON report.

mod config;
mod report;
mod scenario;
mod telemetry;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crosscall_fixtures::{fixture, FIXTURE_NAMES};
use tracing::info;

use crate::config::RunnerConfig;
use crate::report::Report;
use crate::scenario::Scenario;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "crosscall")]
#[command(about = "Run cross-contract call scenarios")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario and print its report
    Run {
        /// Scenario file
        scenario: PathBuf,

        /// Also write the report to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// List the fixture contracts and their functions
    Fixtures,
    /// Print the effective configuration as TOML
    Config,
}

fn load_config(args: &Args) -> anyhow::Result<RunnerConfig> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::from_file(path)?,
        None => RunnerConfig::default(),
    };

    // Override with CLI args
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    if let Some(path) = &args.log_file {
        config.logging.log_file = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    match &config.logging.log_file {
        Some(path) => telemetry::init_telemetry_with_file(
            &config.logging.level,
            config.logging.is_json(),
            path,
        )?,
        None => telemetry::init_telemetry(&config.logging.level, config.logging.is_json())?,
    }

    match args.command {
        Command::Run { scenario, output } => run(&config, &scenario, output.as_deref()),
        Command::Fixtures => {
            list_fixtures();
            Ok(())
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run(
    config: &RunnerConfig,
    path: &std::path::Path,
    output_path: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    info!(scenario = %path.display(), "Loading scenario");
    let scenario = Scenario::from_file(path)?;
    let mut host = scenario.build_host(config.vm.clone())?;

    let input = scenario.call_input()?;
    let output = if scenario.call.init {
        host.run_init(input)?
    } else {
        host.run_call(input)?
    };
    info!(
        code = %output.return_code,
        gas_used = output.gas_used,
        "Scenario finished"
    );

    let json = Report::new(&output, &host, &scenario.reported_addresses()).to_json()?;
    println!("{}", json);
    if let Some(output_path) = output_path {
        std::fs::write(output_path, &json)?;
    }
    Ok(())
}

fn list_fixtures() {
    for name in FIXTURE_NAMES {
        if let Some(contract) = fixture(name) {
            println!("{}: {}", name, contract.function_names().join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_args() {
        let args = Args::parse_from([
            "crosscall",
            "--log-level",
            "debug",
            "--json-logs",
            "run",
            "demos/async_call.toml",
        ]);

        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert!(matches!(args.command, Command::Run { ref scenario, .. } if scenario.ends_with("async_call.toml")));
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"info\"\nformat = \"pretty\"").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let args = Args::parse_from(["crosscall", "--config", path.as_str(), "--json-logs", "fixtures"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_run_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let scenario_path = dir.path().join("dest.toml");
        std::fs::write(
            &scenario_path,
            r#"
[[accounts]]
address = "parentSC"
balance = "1000"
fixture = "exec-dest-ctx-parent"

[[accounts]]
address = "childSC"
fixture = "exec-dest-ctx-child"

[call]
caller = "user"
recipient = "parentSC"
function = "parentFunctionChildCall"
gas_limit = 1000000
"#,
        )
        .unwrap();
        let report_path = dir.path().join("report.json");

        run(&RunnerConfig::default(), &scenario_path, Some(&report_path)).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["return_code"], 0);
        assert_eq!(report["return_data"].as_array().unwrap().len(), 5);
        assert_eq!(report["return_data"][4]["text"], "succ");
    }
}
