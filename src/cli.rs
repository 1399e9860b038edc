// src/cli.rs
//
// Command line entry point: parses arguments, opens the serial port, and
// runs the WebSocket listener until Ctrl-C or a fatal device fault.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::bridge::BridgeConfig;
use crate::io::serial::{open_port, LINE_IDLE_TIMEOUT};
use crate::logging;
use crate::server::run_server;

/// WebSocket to serial bridge for robot arm servo control
#[derive(Parser)]
#[command(name = "armlink", version)]
pub struct Cli {
    /// Serial port the controller is attached to (e.g. /dev/ttyUSB0, COM3)
    pub serial_port: String,

    /// Serial baud rate; must match what the attached firmware uses
    #[arg(long, default_value_t = 115200)]
    pub baud: u32,

    /// Listen address for the control UI WebSocket
    #[arg(long, default_value = "127.0.0.1:8765")]
    pub listen: String,

    /// Maximum outbound frame rate in messages per second. The UI emits one
    /// message per rendered frame; messages above this rate are skipped.
    #[arg(long, default_value_t = 50)]
    pub rate: u32,

    /// Also write logs to timestamped files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Some(ref dir) = cli.log_dir {
        if let Err(e) = logging::init_file_logging(dir) {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    if cli.rate == 0 {
        tlog!("[armlink] --rate must be at least 1 message per second");
        return ExitCode::FAILURE;
    }

    let device = match open_port(&cli.serial_port, cli.baud) {
        Ok(d) => d,
        Err(e) => {
            tlog!("[armlink] {}", e);
            return ExitCode::FAILURE;
        }
    };
    tlog!(
        "[armlink] Connected to serial port {} at {} baud",
        cli.serial_port,
        cli.baud
    );

    let listener = match TcpListener::bind(&cli.listen).await {
        Ok(l) => l,
        Err(e) => {
            tlog!("[armlink] Failed to bind {}: {}", cli.listen, e);
            return ExitCode::FAILURE;
        }
    };
    tlog!("[armlink] Listening on ws://{}", cli.listen);
    tlog!("[armlink] Press CTRL+C to exit");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tlog!("[armlink] Shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let config = BridgeConfig {
        messages_per_second: cli.rate,
        idle_timeout: LINE_IDLE_TIMEOUT,
    };

    match run_server(listener, device, config, shutdown_rx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tlog!("[armlink] {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["armlink", "/dev/ttyUSB0"]);
        assert_eq!(cli.serial_port, "/dev/ttyUSB0");
        assert_eq!(cli.baud, 115200);
        assert_eq!(cli.listen, "127.0.0.1:8765");
        assert_eq!(cli.rate, 50);
        assert!(cli.log_dir.is_none());
    }

    #[test]
    fn test_cli_requires_serial_port() {
        assert!(Cli::try_parse_from(["armlink"]).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "armlink",
            "COM3",
            "--baud",
            "19200",
            "--listen",
            "0.0.0.0:9000",
            "--rate",
            "25",
        ]);
        assert_eq!(cli.baud, 19200);
        assert_eq!(cli.listen, "0.0.0.0:9000");
        assert_eq!(cli.rate, 25);
    }
}
