// ── Gateway facade ──
//
// Full lifecycle of one gateway connection: spawns the sync engine and
// the pending-table janitor, routes commands and ReCom requests through
// the dispatcher, and exposes the device model reactively.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use greennet_api::{Function, Topics, Transport, TransportEvents};

use crate::command::{
    Command, Dispatcher, PendingCommand, PendingRequest, PendingTable, Request, RequestOutcome,
    Resolution,
};
use crate::config::GatewayConfig;
use crate::error::{CommandError, CoreError};
use crate::model::{Device, DeviceId, Event};
use crate::store::DeviceModel;
use crate::stream::DeviceStream;
use crate::sync::{Control, SyncEngine, SyncState};

const CONTROL_CHANNEL_SIZE: usize = 8;
const MIN_PURGE_PERIOD: Duration = Duration::from_secs(1);

/// Handles owned until `start()` moves them into the engine task.
struct Startup {
    events: TransportEvents,
    control_rx: mpsc::Receiver<Control>,
    state_tx: watch::Sender<SyncState>,
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<GatewayInner>`. Ingestion runs on its own
/// task; commands are published from the caller's task and never wait on
/// ingestion.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    model: Arc<DeviceModel>,
    table: Arc<PendingTable>,
    dispatcher: Dispatcher,
    sync_state: watch::Receiver<SyncState>,
    control_tx: mpsc::Sender<Control>,
    startup: Mutex<Option<Startup>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Gateway {
    /// Wire a gateway to a transport. Does not start ingestion; call
    /// [`start()`](Self::start).
    pub fn new(config: GatewayConfig, transport: Arc<dyn Transport>, events: TransportEvents) -> Self {
        let model = Arc::new(DeviceModel::new());
        let table = Arc::new(PendingTable::new(config.late_answer_grace));
        let (state_tx, sync_state) = watch::channel(SyncState::Disconnected);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_SIZE);

        let dispatcher = Dispatcher::new(
            Topics::new(&config.topic_base, &config.gateway_id),
            Arc::clone(&transport),
            Arc::clone(&model),
            Arc::clone(&table),
            sync_state.clone(),
        );

        Self {
            inner: Arc::new(GatewayInner {
                config,
                transport,
                model,
                table,
                dispatcher,
                sync_state,
                control_tx,
                startup: Mutex::new(Some(Startup {
                    events,
                    control_rx,
                    state_tx,
                })),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// The device model this gateway keeps in sync.
    pub fn model(&self) -> &Arc<DeviceModel> {
        &self.inner.model
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the ingestion task. Calling it twice is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShuttingDown);
        }
        let Some(startup) = self.inner.startup.lock().await.take() else {
            debug!("gateway already started");
            return Ok(());
        };

        let engine = SyncEngine::new(
            &self.inner.config,
            Arc::clone(&self.inner.transport),
            Arc::clone(&self.inner.model),
            Arc::clone(&self.inner.table),
            startup.state_tx,
        );
        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(engine.run(
            startup.events,
            startup.control_rx,
            self.inner.cancel.clone(),
        )));

        let period = (self.inner.config.late_answer_grace / 2).max(MIN_PURGE_PERIOD);
        handles.push(tokio::spawn(purge_task(
            Arc::clone(&self.inner.table),
            period,
            self.inner.cancel.clone(),
        )));

        info!(gateway = %self.inner.config.gateway_id, "gateway started");
        Ok(())
    }

    /// Stop background tasks and resolve every pending command as cancelled.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "gateway task ended abnormally");
            }
        }
        self.inner.table.fail_all(&Resolution::Cancelled);
        debug!("gateway shut down");
    }

    /// Re-request the device snapshot. A retry already queued absorbs
    /// this one.
    pub fn retry_bootstrap(&self) -> Result<(), CoreError> {
        match self.inner.control_tx.try_send(Control::RetryBootstrap) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(CoreError::ShuttingDown),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Validate and publish `functions` as one command.
    ///
    /// Returns once published; await [`PendingCommand::outcome`] for the
    /// gateway's answer.
    pub fn send_command(
        &self,
        device: &DeviceId,
        functions: &[Function],
        timeout: Duration,
    ) -> Result<PendingCommand, CommandError> {
        self.inner.dispatcher.send_command(device, functions, timeout)
    }

    /// Publish a typed command with the configured timeout.
    pub fn execute(&self, device: &DeviceId, command: &Command) -> Result<PendingCommand, CommandError> {
        let profile = self
            .inner
            .model
            .device(device.as_str())
            .map(|d| d.profile)
            .ok_or_else(|| CommandError::UnknownDevice {
                device: device.clone(),
            })?;
        self.send_command(
            device,
            &command.functions(profile),
            self.inner.config.command_timeout,
        )
    }

    /// Publish a ReCom request with the configured timeout.
    pub fn request(&self, request: &Request) -> Result<PendingRequest, CommandError> {
        self.inner
            .dispatcher
            .send_request(request, self.inner.config.command_timeout)
    }

    // ── ReCom shortcuts ──────────────────────────────────────────────

    pub async fn get_device_configuration(&self, device: &DeviceId) -> Result<RequestOutcome, CommandError> {
        self.round_trip(Request::GetConfiguration {
            device: device.clone(),
        })
        .await
    }

    pub async fn set_device_configuration(
        &self,
        device: &DeviceId,
        body: Value,
    ) -> Result<RequestOutcome, CommandError> {
        self.round_trip(Request::SetConfiguration {
            device: device.clone(),
            body,
        })
        .await
    }

    pub async fn get_device_parameters(&self, device: &DeviceId) -> Result<RequestOutcome, CommandError> {
        self.round_trip(Request::GetParameters {
            device: device.clone(),
        })
        .await
    }

    pub async fn get_link_tables(&self, device: &DeviceId) -> Result<RequestOutcome, CommandError> {
        self.round_trip(Request::GetLinkTables {
            device: device.clone(),
        })
        .await
    }

    pub async fn get_system_info(&self) -> Result<RequestOutcome, CommandError> {
        self.round_trip(Request::SystemInfo).await
    }

    pub async fn get_system_uptime(&self) -> Result<RequestOutcome, CommandError> {
        self.round_trip(Request::SystemUptime).await
    }

    async fn round_trip(&self, request: Request) -> Result<RequestOutcome, CommandError> {
        Ok(self.request(&request)?.outcome().await)
    }

    // ── Device model access ──────────────────────────────────────────

    /// Current state of one device.
    pub fn query_device_state(&self, device: &str) -> Option<Arc<Device>> {
        self.inner.model.device(device)
    }

    pub fn devices(&self) -> DeviceStream {
        self.inner.model.subscribe()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.inner.model.snapshot()
    }

    pub fn events(&self) -> broadcast::Receiver<Arc<Event>> {
        self.inner.model.events()
    }

    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.inner.sync_state.clone()
    }

    /// Forget a device locally; its pending commands resolve as removed.
    pub fn remove_device(&self, device: &DeviceId) -> bool {
        let removed = self.inner.model.remove_device(device).is_some();
        if removed {
            self.inner.table.fail_device(device);
        }
        removed
    }
}

/// Periodically drop orphaned answer slots past their grace period.
async fn purge_task(table: Arc<PendingTable>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => table.purge_expired(),
        }
    }
}
