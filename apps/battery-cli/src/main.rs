use anyhow::{Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

use battery_core::{self as devcore, Api, OutputFormat, OutputWriter, ReadOutput, WriteOutcome};

const DEFAULT_CONFIG: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "battery",
    version,
    about = "Read from and write to devices attached to a single-board computer",
    disable_help_subcommand = true
)]
struct Cli {
    /// Device configuration file (YAML or JSON)
    #[arg(long, short = 'c', global = true, env = "BATTERY_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print collected metrics to stderr before exiting
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read data from one or more devices
    Read {
        /// Devices to read
        #[arg(required = true, num_args = 1..)]
        devices: Vec<String>,
        /// Output format
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
    /// Write a value to a device
    Write {
        /// Device to write to
        #[arg(index = 1)]
        device: String,
        /// Value to write
        #[arg(index = 2)]
        value: String,
    },
    /// List configured devices
    List,
    /// List available device types
    ListTypes,
    /// List the board's GPIO pins and the devices using them
    ListGpio,
}

/// Device names accepted by `read` and `write`.
struct Choices {
    readable: Vec<String>,
    writable: Vec<String>,
}

fn build_command(choices: Option<&Choices>) -> clap::Command {
    let cmd = Cli::command();
    let Some(choices) = choices else {
        return cmd;
    };
    let readable = choices.readable.clone();
    let writable = choices.writable.clone();
    cmd.mut_subcommand("read", |sub| {
        sub.mut_arg("devices", |arg| {
            arg.value_parser(PossibleValuesParser::new(readable))
        })
    })
    .mut_subcommand("write", |sub| {
        sub.mut_arg("device", |arg| {
            arg.value_parser(PossibleValuesParser::new(writable))
        })
    })
}

/// Extract the global options needed before the configuration is loaded.
fn preparse(args: &[OsString]) -> (PathBuf, u8) {
    match Cli::command().ignore_errors(true).try_get_matches_from(args) {
        Ok(m) => (
            m.get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG)),
            m.get_count("verbose"),
        ),
        Err(_) => (PathBuf::from(DEFAULT_CONFIG), 0),
    }
}

fn main() -> Result<ExitCode> {
    let args: Vec<OsString> = std::env::args_os().collect();
    let (config_path, verbose) = preparse(&args);
    setup_tracing(verbose);

    let registry = device_types::list_device_types();
    let config = match devcore::load_config_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            // Let --help and usage errors through before failing on the config.
            let _ = build_command(None).get_matches_from(&args);
            return Err(e).with_context(|| {
                format!("loading device configuration {}", config_path.display())
            });
        }
    };
    debug!(path = %config_path.display(), devices = config.devices.len(), "configuration loaded");

    let mut api = Api::new(config, registry);
    let choices = Choices {
        readable: api.readable_names(),
        writable: api.writable_names(),
    };
    let matches = build_command(Some(&choices)).get_matches_from(&args);
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let code = match cli.command {
        None => {
            build_command(Some(&choices)).print_help()?;
            println!();
            ExitCode::SUCCESS
        }
        Some(Commands::Read { devices, format }) => read_devices(&mut api, &devices, format)?,
        Some(Commands::Write { device, value }) => write_device(&mut api, &device, &value)?,
        Some(Commands::List) => {
            list_devices(&api);
            ExitCode::SUCCESS
        }
        Some(Commands::ListTypes) => {
            list_types(&api);
            ExitCode::SUCCESS
        }
        Some(Commands::ListGpio) => {
            list_gpio(&api);
            ExitCode::SUCCESS
        }
    };

    if cli.metrics {
        if let Some(m) = api.metrics() {
            eprint!("{}", m.encode_text());
        }
    }
    Ok(code)
}

fn setup_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_devices(api: &mut Api<'_>, devices: &[String], format: OutputFormat) -> Result<ExitCode> {
    let report = api.read(devices)?;
    if !matches!(report.output, ReadOutput::Single(None)) {
        OutputWriter::new(format).write(&report.output, &mut io::stdout().lock())?;
    }
    for name in &report.no_data {
        eprintln!("no data from {name}");
    }
    for failure in &report.failures {
        eprintln!("error: {failure}");
    }
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn write_device(api: &mut Api<'_>, device: &str, value: &str) -> Result<ExitCode> {
    match api.write(device, value)? {
        WriteOutcome::Written => Ok(ExitCode::SUCCESS),
        WriteOutcome::Failed(e) => {
            eprintln!("error: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn list_devices(api: &Api<'_>) {
    println!("Available devices:");
    for name in api.all_names() {
        let description = api.devices().description(&name).unwrap_or_default();
        println!("- {name}: {description}");
    }
    for u in api.unresolved() {
        eprintln!("warning: {u}");
    }
}

fn list_types(api: &Api<'_>) {
    println!("Available device types:");
    for t in api.device_types().iter() {
        println!("- {}: {}", t.name(), t.description());
    }
}

fn list_gpio(api: &Api<'_>) {
    let used = api.gpio_usage();
    match device_types::hal::board_info() {
        Ok(board) => {
            println!("Board identified as: {}", board.model);
            println!("Available GPIO pins:");
            for pin in board.gpio_lines {
                match used.get(&pin) {
                    Some(device) => println!("- GPIO{pin} (used by {device})"),
                    None => println!("- GPIO{pin}"),
                }
            }
        }
        Err(e) => {
            println!("Board GPIO pins cannot be listed: {e}");
            if !used.is_empty() {
                println!("Pins used by configured devices:");
                for (pin, device) in &used {
                    println!("- GPIO{pin} (used by {device})");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn choices() -> Choices {
        Choices {
            readable: vec!["test-reader".into(), "test-reader-writer".into()],
            writable: vec!["test-reader-writer".into(), "test-writer".into()],
        }
    }

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let m = build_command(Some(&choices())).try_get_matches_from(args)?;
        Cli::from_arg_matches(&m)
    }

    #[test]
    fn test_read_defaults_to_yaml() {
        let cli = parse(&["battery", "read", "test-reader"]).unwrap();
        match cli.command {
            Some(Commands::Read { devices, format }) => {
                assert_eq!(devices, vec!["test-reader"]);
                assert_eq!(format, OutputFormat::Yaml);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_read_many_with_json() {
        let cli = parse(&[
            "battery",
            "read",
            "test-reader",
            "test-reader-writer",
            "-f",
            "json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Read { ref devices, format: OutputFormat::Json }) if devices.len() == 2
        ));
    }

    #[test]
    fn test_read_rejects_unknown_format() {
        let err = parse(&["battery", "read", "test-reader", "-f", "toml"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_read_rejects_non_readable_device() {
        let err = parse(&["battery", "read", "test-writer"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_write_rejects_non_writable_device() {
        let err = parse(&["battery", "write", "test-reader", "some-value"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(parse(&["battery", "write", "test-writer", "some-value"]).is_ok());
    }

    #[test]
    fn test_list_commands() {
        assert!(matches!(
            parse(&["battery", "list-types"]).unwrap().command,
            Some(Commands::ListTypes)
        ));
        assert!(matches!(
            parse(&["battery", "list-gpio"]).unwrap().command,
            Some(Commands::ListGpio)
        ));
        assert!(parse(&["battery"]).unwrap().command.is_none());
    }

    #[test]
    fn test_help_exits_early() {
        let err = parse(&["battery", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_preparse_reads_config_and_verbosity() {
        let args: Vec<OsString> = ["battery", "--config", "devices.json", "-vv", "list"]
            .iter()
            .map(OsString::from)
            .collect();
        let (path, verbose) = preparse(&args);
        assert_eq!(path, PathBuf::from("devices.json"));
        assert_eq!(verbose, 2);
    }

    #[test]
    fn test_command_definition_is_valid() {
        build_command(Some(&choices())).debug_assert();
    }
}
