//! Client Facade
//!
//! The async face of the worker: load archives, generate images, and listen
//! for catalog events.
//!
//! # Design Philosophy
//!
//! The client never touches the transport directly. A single pump task owns
//! it, forwarding posted requests out and routing every inbound envelope:
//!
//! ```text
//!   load_file / create_*            pump task                 worker
//!   ────────────────────            ─────────                 ──────
//!   router.register ──┐
//!   gate (buffer until Ready) ──► outbound ──► transport.send ──►
//!                                  dispatch ◄── transport.recv ◄──
//!                                     │
//!            ┌────────────────────────┼─────────────────────┐
//!            ▼                        ▼                     ▼
//!     router.settle(seq)     relay.relay(seq, ..)   subscribers.publish
//! ```
//!
//! Requests issued before the worker is ready are buffered and flushed in
//! issue order once `Ready` arrives. If the worker goes away every pending
//! request is rejected with [`ClientError::TransportLost`].
//!
//! # Usage
//!
//! ```ignore
//! let (client, _worker) = SpingenClient::start(engine, &config.worker)?;
//! let mut events = client.subscribe();
//!
//! let summary = client.load_file(archive).await?;
//! let thumbnail = client.create_skin_thumbnail(&skin, None).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;

use crate::config::WorkerConfig;
use crate::engine::{Discovery, RenderEngine};
use crate::error::ClientError;
use crate::image::{ImageHandle, ImageStore};
use crate::messages::{Seq, WorkerMessage};
use crate::model::{ArchiveFile, GenerationOptions, Skin, Spray};
use crate::relay::{DiscoveryObserver, EventRelay, LoadSummary};
use crate::requests::{GenerateOp, RequestKind, WorkerRequest};
use crate::router::{Outcome, Reply, RequestRouter, Settled};
use crate::subscribers::{CatalogEvent, Subscribers, Subscription, SubscriptionId};
use crate::transport::{ClientTransport, InProcessTransport, TransportError};
use crate::worker::WorkerHost;

/// Worker readiness as seen by the client
#[derive(Clone, Debug, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready(Vec<Spray>),
    Lost,
}

/// Holds requests back until the worker is ready
#[derive(Default)]
struct Gate {
    ready: bool,
    closed: bool,
    backlog: Vec<WorkerRequest>,
}

/// State shared between the client handles and the pump
struct Shared {
    router: RequestRouter,
    relay: EventRelay,
    subscribers: Subscribers,
    images: ImageStore,
    gate: Mutex<Gate>,
    outbound: mpsc::UnboundedSender<WorkerRequest>,
    readiness: watch::Sender<Readiness>,
}

impl Shared {
    /// Hand a registered request to the pump, or buffer it until ready
    fn post(&self, request: WorkerRequest) -> Result<(), ClientError> {
        let seq = request.seq();
        let mut gate = self.gate.lock();

        if gate.closed {
            drop(gate);
            self.router.forget(seq);
            self.relay.close(seq);
            return Err(ClientError::TransportLost);
        }
        if !gate.ready {
            tracing::debug!(%seq, "Worker not ready, buffering request");
            gate.backlog.push(request);
            return Ok(());
        }

        if self.outbound.send(request).is_err() {
            drop(gate);
            self.router.forget(seq);
            self.relay.close(seq);
            return Err(ClientError::TransportLost);
        }
        Ok(())
    }

    fn dispatch(&self, msg: WorkerMessage) {
        tracing::trace!(kind = msg.kind(), seq = ?msg.seq(), "Inbound message");

        match msg {
            WorkerMessage::Ready { default_sprays } => self.on_ready(default_sprays),
            WorkerMessage::SprayDiscovered { seq, spray } => {
                self.on_discovery(seq, Discovery::Spray(spray));
            }
            WorkerMessage::SkinDiscovered { seq, skin } => {
                self.on_discovery(seq, Discovery::Skin(skin));
            }
            WorkerMessage::LoadComplete { seq } => {
                let summary = self.relay.close(seq).unwrap_or_default();
                let _ = self.router.settle(seq, Reply::Loaded(summary));
            }
            WorkerMessage::LoadError { seq, message } => {
                self.relay.close(seq);
                let _ = self.router.settle(seq, Reply::LoadFailed(message));
            }
            // No scope to close unless a load got a generate reply
            WorkerMessage::GenerateResult { seq, image } => {
                self.relay.close(seq);
                let _ = self.router.settle(seq, Reply::Image(image));
            }
            WorkerMessage::GenerateError { seq, message } => {
                self.relay.close(seq);
                let _ = self.router.settle(seq, Reply::GenerateFailed(message));
            }
        }
    }

    /// Fail one request that the transport could not carry
    fn reject(&self, seq: Seq, reason: &str) {
        self.relay.close(seq);
        self.router.reject(
            seq,
            ClientError::ProtocolViolation(format!("request {seq} could not be sent: {reason}")),
        );
    }

    fn on_ready(&self, default_sprays: Vec<Spray>) {
        let mut gate = self.gate.lock();
        if gate.ready {
            tracing::warn!("Worker announced readiness twice");
            return;
        }
        gate.ready = true;

        let backlog = std::mem::take(&mut gate.backlog);
        tracing::info!(
            default_sprays = default_sprays.len(),
            buffered = backlog.len(),
            "Worker ready"
        );
        for request in backlog {
            // The pump holds the receiver for as long as it runs
            let _ = self.outbound.send(request);
        }
        drop(gate);

        self.subscribers.ready(&default_sprays);
        self.readiness.send_replace(Readiness::Ready(default_sprays));
    }

    fn on_discovery(&self, seq: Seq, discovery: Discovery) {
        if !self.relay.relay(seq, &discovery) {
            return;
        }
        self.subscribers.publish(match discovery {
            Discovery::Spray(spray) => CatalogEvent::Spray(spray),
            Discovery::Skin(skin) => CatalogEvent::Skin(skin),
        });
    }

    /// Worker gone: reject everything still waiting
    fn shutdown(&self) {
        let buffered = {
            let mut gate = self.gate.lock();
            gate.closed = true;
            std::mem::take(&mut gate.backlog).len()
        };
        self.relay.clear();
        let failed = self.router.fail_all(&ClientError::TransportLost);
        self.readiness.send_modify(|state| {
            if *state == Readiness::Pending {
                *state = Readiness::Lost;
            }
        });
        tracing::info!(failed, buffered, "Client disconnected from worker");
    }
}

/// Aborts the pump when the last client handle goes away
struct PumpGuard(AbortHandle);

impl Drop for PumpGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to a worker
///
/// Cheap to clone; all clones talk to the same worker. The connection closes
/// when the last clone is dropped.
#[derive(Clone)]
pub struct SpingenClient {
    shared: Arc<Shared>,
    _pump: Arc<PumpGuard>,
}

impl SpingenClient {
    /// Attach to a worker over `transport`
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect<T: ClientTransport + 'static>(transport: T) -> Self {
        Self::connect_with_store(transport, ImageStore::new())
    }

    /// Attach to a worker, registering generated images in `images`
    pub fn connect_with_store<T: ClientTransport + 'static>(
        transport: T,
        images: ImageStore,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (readiness, _) = watch::channel(Readiness::Pending);

        let shared = Arc::new(Shared {
            router: RequestRouter::new(),
            relay: EventRelay::new(),
            subscribers: Subscribers::new(),
            images,
            gate: Mutex::new(Gate::default()),
            outbound,
            readiness,
        });

        let pump = tokio::spawn(run_pump(transport, Arc::clone(&shared), outbound_rx));

        Self {
            shared,
            _pump: Arc::new(PumpGuard(pump.abort_handle())),
        }
    }

    /// Start `engine` on a worker thread and connect to it in-process
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the worker thread can't be spawned.
    pub fn start<E: RenderEngine>(
        engine: E,
        config: &WorkerConfig,
    ) -> std::io::Result<(Self, WorkerHost)> {
        let (transport, endpoint) = InProcessTransport::new_pair_with_capacity(config.channel_capacity);
        let worker = WorkerHost::spawn(engine, endpoint, config)?;
        Ok((Self::connect(transport), worker))
    }

    // ============================================
    // Readiness & catalog events
    // ============================================

    /// Wait for the worker; returns its default sprays
    ///
    /// # Errors
    ///
    /// Returns `ClientError::TransportLost` if the worker went away first.
    pub async fn ready(&self) -> Result<Vec<Spray>, ClientError> {
        let mut rx = self.shared.readiness.subscribe();
        let state = rx
            .wait_for(|state| *state != Readiness::Pending)
            .await
            .map_err(|_| ClientError::TransportLost)?;

        match &*state {
            Readiness::Ready(sprays) => Ok(sprays.clone()),
            Readiness::Pending | Readiness::Lost => Err(ClientError::TransportLost),
        }
    }

    /// Whether `Ready` has been received
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.shared.readiness.borrow(), Readiness::Ready(_))
    }

    /// Default sprays, once ready
    #[must_use]
    pub fn default_sprays(&self) -> Option<Vec<Spray>> {
        match &*self.shared.readiness.borrow() {
            Readiness::Ready(sprays) => Some(sprays.clone()),
            Readiness::Pending | Readiness::Lost => None,
        }
    }

    /// Listen for readiness and every discovery
    pub fn subscribe(&self) -> Subscription {
        self.shared.subscribers.subscribe()
    }

    /// Stop a subscription; returns whether it was active
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscribers.unsubscribe(id)
    }

    // ============================================
    // Requests
    // ============================================

    /// Scan an archive; discoveries go to subscribers
    ///
    /// # Errors
    ///
    /// `ClientError::Engine` if the engine can't read the archive,
    /// `ClientError::TransportLost` if the worker goes away.
    pub async fn load_file(&self, file: ArchiveFile) -> Result<LoadSummary, ClientError> {
        self.load(file, None).await
    }

    /// Scan an archive, also reporting this load's discoveries to `observer`
    ///
    /// `observer` runs on the pump task, once per discovery, and never after
    /// the load settles.
    ///
    /// # Errors
    ///
    /// Same as [`load_file`](Self::load_file).
    pub async fn load_file_with<F>(
        &self,
        file: ArchiveFile,
        observer: F,
    ) -> Result<LoadSummary, ClientError>
    where
        F: FnMut(&Discovery) + Send + 'static,
    {
        self.load(file, Some(Box::new(observer))).await
    }

    async fn load(
        &self,
        file: ArchiveFile,
        observer: Option<DiscoveryObserver>,
    ) -> Result<LoadSummary, ClientError> {
        let name = file.name.clone();
        let (seq, rx) = self.shared.router.register(RequestKind::LoadFile);
        self.shared.relay.open(seq, observer);
        tracing::debug!(%seq, file = %name, bytes = file.bytes.len(), "Loading archive");

        self.shared.post(WorkerRequest::file_submitted(seq, file))?;

        match settled(rx).await? {
            Settled::Loaded(summary) => {
                tracing::info!(%seq, file = %name, %summary, "Archive loaded");
                Ok(summary)
            }
            Settled::Image(_) => Err(ClientError::ProtocolViolation(format!(
                "image in reply to load {seq}"
            ))),
        }
    }

    /// Render the spray can icon for `spray`
    ///
    /// # Errors
    ///
    /// `ClientError::Engine` for unknown sprays, `TransportLost` if the worker
    /// goes away.
    pub async fn create_spray_image(&self, spray: &Spray) -> Result<ImageHandle, ClientError> {
        self.generate(GenerateOp::SprayImage {
            spray_id: spray.id.clone(),
        })
        .await
    }

    /// Render an animation of `skin`, optionally painted with `spray`
    ///
    /// # Errors
    ///
    /// `ClientError::Engine` if the skin lacks the sprite or frame.
    pub async fn create_skin_animation(
        &self,
        skin: &Skin,
        spray: Option<&Spray>,
        options: &GenerationOptions,
    ) -> Result<ImageHandle, ClientError> {
        self.generate(GenerateOp::SkinAnimation {
            skin: skin.name.clone(),
            spray_id: spray.map(|s| s.id.clone()),
            options: options.clone(),
        })
        .await
    }

    /// Render the thumbnail of `skin`, optionally painted with `spray`
    ///
    /// # Errors
    ///
    /// `ClientError::Engine` for unknown skins or sprays.
    pub async fn create_skin_thumbnail(
        &self,
        skin: &Skin,
        spray: Option<&Spray>,
    ) -> Result<ImageHandle, ClientError> {
        self.generate(GenerateOp::SkinThumbnail {
            skin: skin.name.clone(),
            spray_id: spray.map(|s| s.id.clone()),
        })
        .await
    }

    async fn generate(&self, op: GenerateOp) -> Result<ImageHandle, ClientError> {
        let (seq, rx) = self.shared.router.register(op.kind());
        self.shared.post(WorkerRequest::Generate { seq, op })?;

        match settled(rx).await? {
            Settled::Image(image) => Ok(self.shared.images.register(image)),
            Settled::Loaded(_) => Err(ClientError::ProtocolViolation(format!(
                "load completion in reply to generate {seq}"
            ))),
        }
    }

    // ============================================
    // Introspection
    // ============================================

    /// Requests awaiting a reply (buffered ones included)
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.router.in_flight()
    }

    /// Store holding every image this client issued
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.shared.images
    }

    /// Whether the worker is still reachable
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.shared.gate.lock().closed
    }
}

impl fmt::Debug for SpingenClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpingenClient")
            .field("ready", &self.is_ready())
            .field("in_flight", &self.in_flight())
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn settled(rx: oneshot::Receiver<Outcome>) -> Outcome {
    // A dropped completion means the router went away with the pump
    rx.await.unwrap_or(Err(ClientError::TransportLost))
}

async fn run_pump<T: ClientTransport>(
    mut transport: T,
    shared: Arc<Shared>,
    mut outbound: mpsc::UnboundedReceiver<WorkerRequest>,
) {
    loop {
        tokio::select! {
            Some(request) = outbound.recv() => {
                let seq = request.seq();
                match transport.send(request).await {
                    Ok(()) => {}
                    Err(TransportError::SerializationError(reason)) => {
                        shared.reject(seq, &reason);
                    }
                    Err(e) => {
                        tracing::warn!(%seq, error = %e, "Failed to post request");
                        break;
                    }
                }
            }
            msg = transport.recv() => match msg {
                Ok(msg) => shared.dispatch(msg),
                Err(e) => {
                    tracing::warn!(error = %e, "Worker connection lost");
                    break;
                }
            }
        }
    }

    shared.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ImageData;
    use crate::model::SprayId;
    use crate::transport::HostEndpoint;

    /// Client plus a hand-driven worker endpoint
    fn manual() -> (SpingenClient, HostEndpoint) {
        let (transport, endpoint) = InProcessTransport::new_pair();
        (SpingenClient::connect(transport), endpoint)
    }

    /// Run blocking endpoint calls off the runtime
    async fn on_host<R: Send + 'static>(
        endpoint: HostEndpoint,
        f: impl FnOnce(&mut HostEndpoint) -> R + Send + 'static,
    ) -> (HostEndpoint, R) {
        tokio::task::spawn_blocking(move || {
            let mut endpoint = endpoint;
            let r = f(&mut endpoint);
            (endpoint, r)
        })
        .await
        .unwrap()
    }

    fn ready() -> WorkerMessage {
        WorkerMessage::Ready {
            default_sprays: vec![Spray::new("default", "Default")],
        }
    }

    #[tokio::test]
    async fn test_requests_before_ready_are_buffered_in_order() {
        let (client, endpoint) = manual();

        let c1 = client.clone();
        let first = tokio::spawn(async move { c1.create_spray_image(&Spray::new("a", "A")).await });
        let c2 = client.clone();
        let second = tokio::spawn(async move { c2.create_spray_image(&Spray::new("b", "B")).await });

        // Both registered but nothing posted yet
        while client.in_flight() < 2 {
            tokio::task::yield_now().await;
        }

        let (_endpoint, seen) = on_host(endpoint, |endpoint| {
            endpoint.blocking_send(ready()).unwrap();
            let mut seen = Vec::new();
            for _ in 0..2 {
                let request = endpoint.blocking_recv().unwrap();
                let seq = request.seq();
                seen.push(request);
                endpoint
                    .blocking_send(WorkerMessage::GenerateResult {
                        seq,
                        image: ImageData::new(vec![seq.as_u64() as u8], "image/png"),
                    })
                    .unwrap();
            }
            seen
        })
        .await;

        let seqs: Vec<Seq> = seen.iter().map(WorkerRequest::seq).collect();
        assert!(seqs[0] < seqs[1]);

        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_ready_returns_default_sprays() {
        let (client, endpoint) = manual();
        assert!(!client.is_ready());
        assert!(client.default_sprays().is_none());

        let (_endpoint, ()) = on_host(endpoint, |endpoint| {
            endpoint.blocking_send(ready()).unwrap();
        })
        .await;

        assert_eq!(
            client.ready().await.unwrap(),
            vec![Spray::new("default", "Default")]
        );
        assert!(client.is_ready());
    }

    #[tokio::test]
    async fn test_worker_loss_rejects_pending_and_future_requests() {
        let (client, endpoint) = manual();
        let (endpoint, ()) = on_host(endpoint, |endpoint| {
            endpoint.blocking_send(ready()).unwrap();
        })
        .await;
        client.ready().await.unwrap();

        let c = client.clone();
        let pending = tokio::spawn(async move {
            c.create_spray_image(&Spray::new("red", "Red")).await
        });

        // Wait until the request reached the worker, then hang up
        let (endpoint, request) = on_host(endpoint, |endpoint| endpoint.blocking_recv()).await;
        assert!(request.is_some());
        drop(endpoint);

        assert_eq!(pending.await.unwrap().unwrap_err(), ClientError::TransportLost);
        assert_eq!(client.in_flight(), 0);

        // Pump has shut down once the pending request was rejected
        let late = client
            .create_skin_thumbnail(
                &Skin {
                    name: "sonic".to_string(),
                    realname: "Sonic".to_string(),
                    kartspeed: 8,
                    kartweight: 2,
                    sprites: Default::default(),
                },
                None,
            )
            .await;
        assert_eq!(late.unwrap_err(), ClientError::TransportLost);
        assert!(!client.is_connected());
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_ready_fails_when_worker_never_starts() {
        let (client, endpoint) = manual();
        drop(endpoint);
        assert_eq!(client.ready().await, Err(ClientError::TransportLost));
    }

    #[tokio::test]
    async fn test_generate_result_registers_image() {
        let (client, endpoint) = manual();
        let c = client.clone();
        let task = tokio::spawn(async move {
            c.create_spray_image(&Spray::new("blue", "Blue")).await
        });

        let (_endpoint, op) = on_host(endpoint, |endpoint| {
            endpoint.blocking_send(ready()).unwrap();
            let request = endpoint.blocking_recv().unwrap();
            let seq = request.seq();
            endpoint
                .blocking_send(WorkerMessage::GenerateResult {
                    seq,
                    image: ImageData::new(vec![1, 2, 3], "image/png"),
                })
                .unwrap();
            request
        })
        .await;

        assert_eq!(
            op,
            WorkerRequest::Generate {
                seq: Seq(1),
                op: GenerateOp::SprayImage {
                    spray_id: SprayId::new("blue"),
                },
            }
        );

        let handle = task.await.unwrap().unwrap();
        assert_eq!(handle.bytes(), &[1, 2, 3]);
        assert_eq!(client.images().stats().live, 1);
        handle.release();
        assert_eq!(client.images().stats().live, 0);
    }
}
