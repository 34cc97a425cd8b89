use clap::Parser;
use log::{error, info};
use server::network::Server;
use server::settings::GameSettings;
use shared::DEFAULT_PORT;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// JSON file with game settings and walls
    #[clap(short, long)]
    settings: Option<PathBuf>,
    /// Overrides the tick duration from the settings file
    #[clap(short, long)]
    ms_per_frame: Option<u64>,
}

/// Parses arguments, loads settings and runs the server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => GameSettings::from_file(path)?,
        None => {
            info!("No settings file given, using defaults");
            GameSettings::default()
        }
    };
    if let Some(ms) = args.ms_per_frame {
        settings.ms_per_frame = ms;
    }

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, settings).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
