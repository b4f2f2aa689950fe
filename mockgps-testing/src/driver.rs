use clap::{Parser, Subcommand};
use interprocess::local_socket::{tokio::Stream, traits::tokio::Stream as _};
use mockgps_logic::UiState;
use mockgps_test_shared::{
    HostRequest, HostResponse, encode_line, get_socket_name, prelude::*,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
struct Cli {
    /// Name of the local socket the daemon is listening on
    socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start mocking at the given coordinates, or move an active mock there
    Start {
        /// Latitude in degrees, -90 to 90
        #[arg(allow_hyphen_values = true)]
        latitude: String,
        /// Longitude in degrees, -180 to 180
        #[arg(allow_hyphen_values = true)]
        longitude: String,
    },
    /// Stop mocking and remove the mock provider
    Stop,
    /// Show what the daemon is doing
    Status,
    /// Dismiss the last error / success message
    Clear,
}

impl From<Commands> for HostRequest {
    fn from(value: Commands) -> Self {
        match value {
            Commands::Start {
                latitude,
                longitude,
            } => HostRequest::Start {
                latitude,
                longitude,
            },
            Commands::Stop => HostRequest::Stop,
            Commands::Status => HostRequest::Status,
            Commands::Clear => HostRequest::ClearMessages,
        }
    }
}

fn print_state(state: &UiState) {
    if state.is_mocking {
        println!("Mocking: yes ({}, {})", state.latitude, state.longitude);
    } else {
        println!("Mocking: no");
    }
    if let Some(msg) = &state.success_message {
        println!("{msg}");
    }
    if let Some(msg) = &state.error_message {
        eprintln!("Error: {msg}");
    }
}

#[tokio::main]
async fn main() -> Result {
    let cli = Cli::parse();

    let socket_name = get_socket_name(cli.socket.clone()).context("Failed to get socket name")?;

    let stream = Stream::connect(socket_name)
        .await
        .context("Failed to connect to socket")?;

    let request = HostRequest::from(cli.command);
    let mut send = &stream;
    send.write_all(&encode_line(&request)?)
        .await
        .context("Failed to send request")?;

    let mut lines = BufReader::new(&stream).lines();
    let line = lines
        .next_line()
        .await
        .context("Failed to read response")?
        .ok_or_else(|| anyhow!("Daemon closed the connection"))?;

    let resp = serde_json::from_str::<HostResponse>(&line).context("Failed to parse response")?;

    match resp {
        HostResponse::State(state) => {
            print_state(&state);
            Ok(())
        }
        HostResponse::Error(why) => bail!(why),
    }
}
