use std::path::PathBuf;

use mate_server_lib::app::config::{config_path, load_config_from_path};
use mate_server_lib::app::logging::init_logging;
use tracing::error;

#[derive(Debug, Clone, Default)]
struct Args {
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--config requires a value".to_string())?;
                args.config = Some(PathBuf::from(value));
            }
            "--host" => {
                args.host = Some(
                    it.next()
                        .ok_or_else(|| "--host requires a value".to_string())?,
                );
            }
            "--port" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--port requires a value".to_string())?;
                let port = value
                    .parse::<u16>()
                    .map_err(|_| format!("invalid --port value: {value}"))?;
                args.port = Some(port);
            }
            "-h" | "--help" => {
                return Err(
                    "usage: mate_server [--config <path>] [--host <addr>] [--port <n>]".to_string(),
                );
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(args)
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    let path = args.config.clone().unwrap_or_else(config_path);
    let mut config = match load_config_from_path(&path, "startup") {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port.filter(|port| *port != 0) {
        config.server.port = port;
    }

    init_logging(&config.logging.level);
    if let Err(err) = mate_server_lib::run(config) {
        error!(code = %err.code, error = %err.error, "server stopped");
        std::process::exit(1);
    }
}
