use std::path::PathBuf;

use clap::Parser;
use interprocess::local_socket::{
    ListenerOptions,
    tokio::{Stream, prelude::*},
};
use log::{error, info, warn};
use mockgps_logic::{MockCoordinate, MockLocationController, PersistentTaskHost, StatusNotifier};
use mockgps_test_shared::*;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::watch,
};

#[derive(Parser)]
/// Host process that keeps a mock location alive over a simulated location registry
struct Cli {
    /// Name of the local socket to listen on
    socket: String,

    /// JSON file with host settings, defaults are used for anything missing
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Act like a device with Developer Options turned off
    #[arg(long)]
    developer_mode_off: bool,

    /// Act like this app isn't the selected mock location app
    #[arg(long)]
    unauthorized: bool,
}

/// Stands in for the foreground notification
struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn mocking_started(&self, coord: &MockCoordinate) {
        info!(
            "[notice] Mock GPS active at {}, {}. Run `mockgps-driver SOCKET stop` to stop.",
            coord.latitude, coord.longitude
        );
    }

    fn mocking_stopped(&self) {
        info!("[notice] Mock GPS stopped");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(why) => {
                warn!("Couldn't listen for SIGTERM: {why}");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.ok();
}

async fn send_resp(stream: &Stream, resp: impl Into<HostResponse>) -> Result {
    let mut send = stream;
    let encoded = encode_line(&resp.into())?;
    send.write_all(&encoded).await.context("Failed to send")
}

/// Serve one driver connection, answering each request with exactly one
/// line. Every connection shares the daemon's controller, so messages a
/// driver cleared stay cleared for the next one.
///
/// Returns whether the daemon should shut down.
async fn serve_client(
    stream: Stream,
    controller: &MockLocationController,
    stop: &mut watch::Receiver<bool>,
) -> Result<bool> {
    let mut lines = BufReader::new(&stream).lines();

    loop {
        let line = tokio::select! {
            _ = stop.wait_for(|s| *s) => {
                return Ok(true);
            }
            res = lines.next_line() => match res {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("Driver disconnected");
                    return Ok(false);
                }
                Err(why) => {
                    error!("Read Error: {why:?}");
                    return Ok(false);
                }
            },
        };

        let resp = match serde_json::from_str::<HostRequest>(&line) {
            Ok(req) => {
                tokio::select! {
                    _ = stop.wait_for(|s| *s) => {
                        return Ok(true);
                    }
                    resp = handle_request(controller, req) => resp,
                }
            }
            Err(why) => {
                warn!("Bad request from driver: {why}");
                HostResponse::Error(format!("Bad request: {why}"))
            }
        };

        send_resp(&stream, resp).await?;
    }
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_deref())?;
    let socket_name = get_socket_name(cli.socket)?;
    let opts = ListenerOptions::new().name(socket_name);
    let listener = opts.create_tokio().context("Failed to bind to socket")?;

    let backend = SimulatedLocationBackend::new(!cli.developer_mode_off, !cli.unauthorized);
    let (host, runtime) = PersistentTaskHost::spawn(backend, LogNotifier, settings.clone());
    let controller = MockLocationController::new(host, &settings);

    let (stop_tx, mut stop) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        stop_tx.send(true).ok();
    });

    info!(
        "Mock location daemon {} ready",
        env!("CARGO_PKG_VERSION")
    );

    'server: loop {
        let res = tokio::select! {
            res = listener.accept() => res,
            _ = stop.wait_for(|s| *s) => {
                break 'server;
            }
        };

        match res {
            Ok(stream) => match serve_client(stream, &controller, &mut stop).await {
                Ok(true) => break 'server,
                Ok(false) => {}
                Err(why) => error!("Error serving driver: {why:?}"),
            },
            Err(why) => error!("Error from connection: {why:?}"),
        }
    }

    info!("Shutting down, removing mock provider");
    drop(controller);
    runtime.shutdown().await?;

    Ok(())
}
