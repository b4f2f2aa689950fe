use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot, watch,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    coordinate::MockCoordinate,
    error::MockError,
    prelude::*,
    provider::{LocationBackend, ProviderLifecycleManager},
    scheduler::RefreshScheduler,
    service_state::{self, ServiceState, ServiceStatePublisher, ServiceStateReceiver},
    settings::MockSettings,
};

/// Something that tells the user mocking is running, the foreground
/// notification on a phone.
pub trait StatusNotifier: Send + 'static {
    fn mocking_started(&self, coord: &MockCoordinate);
    fn mocking_stopped(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
pub enum HostPhase {
    Idle,
    Starting,
    Mocking,
    Stopping,
}

type Reply = Option<oneshot::Sender<Result<(), MockError>>>;

enum HostCommand {
    Start {
        coordinate: MockCoordinate,
        reply: Reply,
    },
    Stop {
        reply: Reply,
    },
}

enum HostEvent {
    Shutdown,
    Command(HostCommand),
    /// Every [HostHandle] is gone, keep mocking until shutdown
    Detached,
    Refresh(MockCoordinate),
}

const COMMAND_QUEUE_SIZE: usize = 8;

fn host_gone() -> MockError {
    MockError::Unknown("the mock location host is not running".to_string())
}

/// Long-running owner of the lifecycle manager and the refresh scheduler.
/// It lives in its own task and is driven through [HostHandle] messages, so
/// nothing a UI does to its own objects can cancel it. Only
/// [HostRuntime::shutdown] or the task being dropped tears it down.
pub struct PersistentTaskHost<B: LocationBackend, N: StatusNotifier> {
    settings: MockSettings,
    manager: ProviderLifecycleManager<B>,
    scheduler: RefreshScheduler,
    state: ServiceStatePublisher,
    phase: watch::Sender<HostPhase>,
    notifier: N,
    commands: mpsc::Receiver<HostCommand>,
    commands_open: bool,
    cancel: CancellationToken,
}

impl<B: LocationBackend, N: StatusNotifier> PersistentTaskHost<B, N> {
    /// Spawn the host on the current runtime
    pub fn spawn(backend: B, notifier: N, settings: MockSettings) -> (HostHandle, HostRuntime) {
        let (state, state_rx) = service_state::channel();
        let (phase, phase_rx) = watch::channel(HostPhase::Idle);
        let (commands_tx, commands) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let cancel = CancellationToken::new();

        let host = Self {
            manager: ProviderLifecycleManager::new(backend, &settings),
            scheduler: RefreshScheduler::new(settings.refresh_interval()),
            settings,
            state,
            phase,
            notifier,
            commands,
            commands_open: true,
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(host.main_loop());

        let handle = HostHandle {
            commands: commands_tx,
            state: state_rx,
            phase: phase_rx,
        };

        (handle, HostRuntime { cancel, task })
    }

    fn set_phase(&self, phase: HostPhase) {
        debug!("Host phase -> {phase:?}");
        self.phase.send_replace(phase);
    }

    async fn main_loop(mut self) {
        info!("Mock location host running");

        loop {
            let event = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => HostEvent::Shutdown,

                cmd = self.commands.recv(), if self.commands_open => match cmd {
                    Some(cmd) => HostEvent::Command(cmd),
                    None => HostEvent::Detached,
                },

                coord = self.scheduler.next_tick() => HostEvent::Refresh(coord),
            };

            match event {
                HostEvent::Shutdown => {
                    info!("Mock location host shutting down");
                    if let Err(why) = self.teardown() {
                        error!("Teardown during shutdown failed: {why}");
                    }
                    self.state.publish(ServiceState::idle());
                    self.set_phase(HostPhase::Idle);
                    break;
                }
                HostEvent::Command(HostCommand::Start { coordinate, reply }) => {
                    let res = self.start_mocking(coordinate);
                    Self::reply(reply, res);
                }
                HostEvent::Command(HostCommand::Stop { reply }) => {
                    let res = self.stop_mocking();
                    Self::reply(reply, res);
                }
                HostEvent::Detached => {
                    debug!("All host handles dropped, mocking continues until shutdown");
                    self.commands_open = false;
                }
                HostEvent::Refresh(coord) => self.refresh(&coord),
            }
        }
    }

    fn reply(reply: Reply, res: Result<(), MockError>) {
        if let Some(reply) = reply {
            // Requester may have stopped waiting, that's fine
            reply.send(res).ok();
        }
    }

    fn start_mocking(&mut self, coordinate: MockCoordinate) -> Result<(), MockError> {
        if let Err(why) = coordinate.check() {
            warn!("Rejected start request: {why}");
            let mut state = self.state.current();
            state.error_message = Some(why.to_string());
            self.state.publish(state);
            return Err(why);
        }

        let coordinate = coordinate.with_attributes(&self.settings);
        let was_mocking = self.manager.is_active();

        self.set_phase(HostPhase::Starting);
        self.scheduler.disarm();

        let res = self
            .manager
            .start()
            .and_then(|_| self.manager.set_location(&coordinate));

        match res {
            Ok(()) => {
                self.scheduler.arm(coordinate);
                self.state
                    .publish(ServiceState::mocking(coordinate.latitude, coordinate.longitude));
                self.notifier.mocking_started(&coordinate);
                self.set_phase(HostPhase::Mocking);
                info!(
                    "Mocking location at {}, {}",
                    coordinate.latitude, coordinate.longitude
                );
                Ok(())
            }
            Err(why) => {
                warn!("Failed to start mocking: {why}");
                if let Err(stop_err) = self.manager.stop() {
                    error!("Failed to undo partial start: {stop_err}");
                }
                if was_mocking {
                    self.notifier.mocking_stopped();
                }
                self.state.publish(ServiceState::failed(&why));
                self.set_phase(HostPhase::Idle);
                Err(why)
            }
        }
    }

    fn stop_mocking(&mut self) -> Result<(), MockError> {
        self.set_phase(HostPhase::Stopping);
        let res = self.teardown();
        self.state.publish(ServiceState::idle());
        self.set_phase(HostPhase::Idle);
        res
    }

    /// Disarm the scheduler, then remove the provider. Unconditional.
    fn teardown(&mut self) -> Result<(), MockError> {
        let had_session = self.manager.is_active();
        self.scheduler.disarm();
        let res = self.manager.stop();
        if had_session {
            self.notifier.mocking_stopped();
            info!("Stopped mocking location");
        }
        res
    }

    fn refresh(&mut self, coord: &MockCoordinate) {
        match self.manager.set_location(&coord.refreshed()) {
            Ok(()) => debug!("Refreshed mock location"),
            Err(why) => warn!("Failed to refresh mock location: {why}"),
        }
    }
}

#[derive(Clone)]
/// Cheap handle for talking to a running [PersistentTaskHost]. Dropping
/// every handle does not stop the host.
pub struct HostHandle {
    commands: mpsc::Sender<HostCommand>,
    state: ServiceStateReceiver,
    phase: watch::Receiver<HostPhase>,
}

impl HostHandle {
    /// Start (or move) the mock location and wait for the outcome
    pub async fn start(&self, coordinate: MockCoordinate) -> Result<(), MockError> {
        let (tx, rx) = oneshot::channel();
        self.send(HostCommand::Start {
            coordinate,
            reply: Some(tx),
        })
        .await?;
        rx.await.unwrap_or_else(|_| Err(host_gone()))
    }

    /// Stop mocking and wait for teardown to finish
    pub async fn stop(&self) -> Result<(), MockError> {
        let (tx, rx) = oneshot::channel();
        self.send(HostCommand::Stop { reply: Some(tx) }).await?;
        rx.await.unwrap_or_else(|_| Err(host_gone()))
    }

    /// Queue a start without waiting, the outcome shows up in the service state
    pub fn request_start(&self, coordinate: MockCoordinate) -> Result<(), MockError> {
        self.try_send(HostCommand::Start {
            coordinate,
            reply: None,
        })
    }

    /// Queue a stop without waiting, the outcome shows up in the service state
    pub fn request_stop(&self) -> Result<(), MockError> {
        self.try_send(HostCommand::Stop { reply: None })
    }

    async fn send(&self, cmd: HostCommand) -> Result<(), MockError> {
        self.commands.send(cmd).await.map_err(|_| host_gone())
    }

    fn try_send(&self, cmd: HostCommand) -> Result<(), MockError> {
        self.commands.try_send(cmd).map_err(|why| match why {
            TrySendError::Full(_) => {
                MockError::Unknown("the mock location host is busy, try again".to_string())
            }
            TrySendError::Closed(_) => host_gone(),
        })
    }

    pub fn subscribe(&self) -> ServiceStateReceiver {
        self.state.clone()
    }

    pub fn state(&self) -> ServiceState {
        self.state.current()
    }

    pub fn phase(&self) -> HostPhase {
        *self.phase.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// Owner side of a spawned host, used to shut it down
pub struct HostRuntime {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl HostRuntime {
    /// Tear down any live session and wait for the host task to exit
    pub async fn shutdown(self) -> Result {
        self.cancel.cancel();
        self.task.await.context("Mock location host task failed")
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
