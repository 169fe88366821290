use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info};
use wifiprov_core::{ConfigEdit, ProvisionConfig, ProvisionSession, ProvisioningError};

#[derive(Parser, Debug)]
#[command(author, version, about = "Wi-Fi provisioning over a serial REPL", long_about = None)]
struct Args {
    /// Serial port the device is attached to (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long)]
    port: String,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the serial bit rate
    #[arg(long)]
    baud: Option<u32>,

    /// Give up waiting for the config dump after this many seconds
    #[arg(long)]
    dump_timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a network, or replace its credential
    AddWifi {
        #[arg(long)]
        ssid: String,
        #[arg(long)]
        password: String,
    },
    /// Forget a network
    RemoveWifi {
        #[arg(long)]
        ssid: String,
    },
    /// Print the device config
    Show,
    /// List the networks the device can see
    Scan,
    /// Set a top-level config key. VALUE is parsed as JSON, else taken as a string.
    Set { key: String, value: String },
}

fn load_config(args: &Args) -> Result<ProvisionConfig> {
    let mut config = match &args.config {
        Some(path) => ProvisionConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ProvisionConfig::default(),
    };
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    if args.dump_timeout.is_some() {
        config.dump_timeout_secs = args.dump_timeout;
    }
    config.validate()?;
    Ok(config)
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let session = ProvisionSession::new(config);

    match args.command {
        Command::AddWifi { ssid, password } => {
            session.provision(&args.port, &ssid, &password)?;
            info!(ssid = %ssid, "Network stored");
        }
        Command::RemoveWifi { ssid } => {
            session.apply(&args.port, ConfigEdit::RemoveWifi { network: ssid })?;
        }
        Command::Show => {
            let doc = session.read_config(&args.port)?;
            println!("{}", doc.to_pretty_string()?);
        }
        Command::Scan => {
            let ssids = session.scan_networks(&args.port)?;
            if ssids.is_empty() {
                info!("No networks in range");
            }
            for ssid in ssids {
                println!("{ssid}");
            }
        }
        Command::Set { key, value } => {
            let value = parse_value(&value);
            session.apply(&args.port, ConfigEdit::SetField { key, value })?;
        }
    }
    Ok(())
}

fn remediation(err: &anyhow::Error) -> Option<&'static str> {
    let err = err.downcast_ref::<ProvisioningError>()?;
    if err.is_transport_problem() {
        Some("Check the cable, reconnect the device and try again.")
    } else if err.is_device_state_problem() {
        Some("The config file on the device needs manual repair before it can be provisioned.")
    } else {
        None
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    info!(port = %args.port, "Starting wifiprov");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        if let Some(hint) = remediation(&e) {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_prefers_json() {
        assert_eq!(parse_value("42"), Value::from(42));
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("plain"), Value::String("plain".into()));
    }

    #[test]
    fn test_args_parse_add_wifi() {
        let args = Args::try_parse_from([
            "wifiprov",
            "--port",
            "/dev/ttyUSB0",
            "add-wifi",
            "--ssid",
            "office",
            "--password",
            "secret",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::AddWifi { .. }));
    }

    #[test]
    fn test_args_parse_scan() {
        let args = Args::try_parse_from(["wifiprov", "-p", "COM3", "scan"]).unwrap();
        assert_eq!(args.port, "COM3");
        assert!(matches!(args.command, Command::Scan));
    }

    #[test]
    fn test_remediation_for_timeout() {
        let err = anyhow::Error::from(ProvisioningError::ProtocolTimeout { waited_ms: 5 });
        assert!(remediation(&err).is_some_and(|h| h.contains("reconnect")));
    }
}
