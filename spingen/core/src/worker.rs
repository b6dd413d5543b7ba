//! Worker Host
//!
//! Runs the rendering engine in its own execution context and answers
//! requests one at a time.
//!
//! # Design Philosophy
//!
//! The engine is slow and not reentrant, so it lives on a dedicated OS thread
//! that owns it outright. The thread blocks on its [`HostEndpoint`], handles
//! one request to completion, posts the reply tagged with the request's seq,
//! and moves on. The host validates nothing: whatever the engine says (result
//! or error message) goes back verbatim.
//!
//! An engine panic is caught and reported as the failure of the request that
//! caused it; the host keeps serving.
//!
//! # Lifecycle
//!
//! 1. `fetch_default_sprays()` then `Ready` (always the first message)
//! 2. Serve requests until the client hangs up

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;

use crate::config::WorkerConfig;
use crate::engine::{Discovery, EngineError, RenderEngine};
use crate::messages::{Seq, WorkerMessage};
use crate::model::ArchiveFile;
use crate::requests::{GenerateOp, WorkerRequest};
use crate::transport::{HostEndpoint, TransportError};

/// Counters reported when the host stops
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Requests handled
    pub requests: u64,
    /// Requests answered with an error
    pub failures: u64,
    /// Engine panics caught
    pub panics: u64,
}

/// Handle to a worker thread
#[derive(Debug)]
pub struct WorkerHost {
    thread: JoinHandle<WorkerStats>,
}

impl WorkerHost {
    /// Start the engine on a new named thread
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread can't be spawned.
    pub fn spawn<E: RenderEngine>(
        engine: E,
        endpoint: HostEndpoint,
        config: &WorkerConfig,
    ) -> std::io::Result<Self> {
        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let mut engine = engine;
                serve(&mut engine, endpoint)
            })?;

        tracing::info!(thread = %config.thread_name, "Worker started");
        Ok(Self { thread })
    }

    /// Whether the worker thread has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker to stop; blocks the calling thread
    ///
    /// Returns `None` if the thread died outside the engine's panic guard.
    pub fn join(self) -> Option<WorkerStats> {
        self.thread.join().ok()
    }
}

/// Run the host loop on the current thread until the client hangs up
pub fn serve<E: RenderEngine + ?Sized>(engine: &mut E, mut endpoint: HostEndpoint) -> WorkerStats {
    let mut stats = WorkerStats::default();

    let default_sprays = match guard(|| Ok(engine.fetch_default_sprays())) {
        Ok(sprays) => sprays,
        Err(e) => {
            stats.panics += 1;
            tracing::error!(error = %e, "Default sprays unavailable");
            Vec::new()
        }
    };
    tracing::debug!(count = default_sprays.len(), "Engine ready");
    if endpoint
        .blocking_send(WorkerMessage::Ready { default_sprays })
        .is_err()
    {
        tracing::debug!("Client gone before ready");
        return stats;
    }

    while let Some(request) = endpoint.blocking_recv() {
        let seq = request.seq();
        let kind = request.kind();
        stats.requests += 1;

        match handle(engine, &endpoint, request) {
            Ok(handled) => {
                if !handled.ok {
                    stats.failures += 1;
                }
                if handled.panicked {
                    stats.panics += 1;
                }
                tracing::debug!(%seq, %kind, ok = handled.ok, "Request handled");
            }
            Err(e) => {
                tracing::debug!(%seq, error = %e, "Client gone, stopping worker");
                break;
            }
        }
    }

    tracing::info!(
        requests = stats.requests,
        failures = stats.failures,
        panics = stats.panics,
        "Worker stopped"
    );
    stats
}

struct Handled {
    ok: bool,
    panicked: bool,
}

fn handle<E: RenderEngine + ?Sized>(
    engine: &mut E,
    endpoint: &HostEndpoint,
    request: WorkerRequest,
) -> Result<Handled, TransportError> {
    match request {
        WorkerRequest::FileSubmitted { seq, name, file } => {
            load(engine, endpoint, seq, &ArchiveFile::new(name, file))
        }
        WorkerRequest::Generate { seq, op } => {
            let result = guard(|| match &op {
                GenerateOp::SprayImage { spray_id } => engine.generate_spray_image(spray_id),
                GenerateOp::SkinAnimation {
                    skin,
                    spray_id,
                    options,
                } => engine.generate_skin_animation(
                    skin,
                    spray_id.as_ref(),
                    &options.sprite,
                    &options.frame,
                    options.scale,
                ),
                GenerateOp::SkinThumbnail { skin, spray_id } => {
                    engine.generate_skin_thumbnail(skin, spray_id.as_ref())
                }
            });

            let handled = outcome(&result);
            let reply = match result {
                Ok(image) => WorkerMessage::GenerateResult { seq, image },
                Err(e) => {
                    tracing::debug!(%seq, op = %op.kind(), error = %e, "Generation failed");
                    WorkerMessage::GenerateError {
                        seq,
                        message: e.message,
                    }
                }
            };
            endpoint.blocking_send(reply)?;
            Ok(handled)
        }
    }
}

fn load<E: RenderEngine + ?Sized>(
    engine: &mut E,
    endpoint: &HostEndpoint,
    seq: Seq,
    archive: &ArchiveFile,
) -> Result<Handled, TransportError> {
    let mut send_error = None;
    let mut discovered = 0usize;

    let result = guard(|| {
        engine.fetch_all(archive, &mut |discovery| {
            if send_error.is_some() {
                return;
            }
            let msg = match discovery {
                Discovery::Spray(spray) => WorkerMessage::SprayDiscovered { seq, spray },
                Discovery::Skin(skin) => WorkerMessage::SkinDiscovered { seq, skin },
            };
            match endpoint.blocking_send(msg) {
                Ok(()) => discovered += 1,
                Err(e) => send_error = Some(e),
            }
        })
    });

    if let Some(e) = send_error {
        return Err(e);
    }

    let handled = outcome(&result);
    let reply = match result {
        Ok(()) => {
            tracing::debug!(%seq, file = %archive.name, discovered, "Archive scanned");
            WorkerMessage::LoadComplete { seq }
        }
        Err(e) => {
            tracing::debug!(%seq, file = %archive.name, error = %e, "Archive rejected");
            WorkerMessage::LoadError {
                seq,
                message: e.message,
            }
        }
    };
    endpoint.blocking_send(reply)?;
    Ok(handled)
}

/// Prefix of the message reported for a caught engine panic
const PANIC_PREFIX: &str = "engine panicked: ";

fn outcome<T>(result: &Result<T, EngineError>) -> Handled {
    Handled {
        ok: result.is_ok(),
        panicked: matches!(result, Err(e) if e.message.starts_with(PANIC_PREFIX)),
    }
}

/// Run an engine call, turning a panic into an `EngineError`
fn guard<T>(call: impl FnOnce() -> Result<T, EngineError>) -> Result<T, EngineError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(panic = %message, "Engine panicked");
        Err(EngineError::new(format!("{PANIC_PREFIX}{message}")))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ImageData;
    use crate::model::{GenerationOptions, Skin, SpriteScale, SpriteSet, Spray, SprayId};
    use crate::transport::{ClientTransport, InProcessTransport};

    /// Minimal engine: one archive, one image, panics on request
    struct ScriptedEngine;

    impl RenderEngine for ScriptedEngine {
        fn fetch_default_sprays(&mut self) -> Vec<Spray> {
            vec![Spray::new("default", "Default")]
        }

        fn fetch_all(
            &mut self,
            archive: &ArchiveFile,
            on_discovery: &mut dyn FnMut(Discovery),
        ) -> Result<(), EngineError> {
            if archive.bytes.is_empty() {
                return Err(EngineError::new("empty archive"));
            }
            on_discovery(Discovery::Spray(Spray::new("red", "Red")));
            on_discovery(Discovery::Skin(Skin {
                name: "sonic".to_string(),
                realname: "Sonic".to_string(),
                kartspeed: 8,
                kartweight: 2,
                sprites: SpriteSet::default(),
            }));
            Ok(())
        }

        fn generate_spray_image(&mut self, spray_id: &SprayId) -> Result<ImageData, EngineError> {
            if spray_id.as_str() == "boom" {
                panic!("kaboom");
            }
            Ok(ImageData::new(spray_id.as_str().as_bytes().to_vec(), "image/png"))
        }

        fn generate_skin_animation(
            &mut self,
            _skin: &str,
            _spray_id: Option<&SprayId>,
            sprite: &str,
            _frame: &str,
            _scale: SpriteScale,
        ) -> Result<ImageData, EngineError> {
            Err(EngineError::new(format!("no sprite {sprite}")))
        }

        fn generate_skin_thumbnail(
            &mut self,
            skin: &str,
            _spray_id: Option<&SprayId>,
        ) -> Result<ImageData, EngineError> {
            Ok(ImageData::new(skin.as_bytes().to_vec(), "image/png"))
        }
    }

    fn spray_request(seq: u64, id: &str) -> WorkerRequest {
        WorkerRequest::Generate {
            seq: Seq(seq),
            op: GenerateOp::SprayImage {
                spray_id: SprayId::new(id),
            },
        }
    }

    #[tokio::test]
    async fn test_ready_is_first_message() {
        let (mut transport, endpoint) = InProcessTransport::new_pair();
        let host = WorkerHost::spawn(ScriptedEngine, endpoint, &WorkerConfig::default()).unwrap();

        assert_eq!(
            transport.recv().await.unwrap(),
            WorkerMessage::Ready {
                default_sprays: vec![Spray::new("default", "Default")],
            }
        );

        drop(transport);
        let stats = tokio::task::spawn_blocking(move || host.join())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.requests, 0);
    }

    #[tokio::test]
    async fn test_load_streams_discoveries_then_completes() {
        let (mut transport, endpoint) = InProcessTransport::new_pair();
        let _host = WorkerHost::spawn(ScriptedEngine, endpoint, &WorkerConfig::default()).unwrap();
        transport.recv().await.unwrap();

        transport
            .send(WorkerRequest::file_submitted(
                Seq(1),
                ArchiveFile::new("kart.pk3", vec![1]),
            ))
            .await
            .unwrap();

        let kinds: Vec<&str> = vec![
            transport.recv().await.unwrap().kind(),
            transport.recv().await.unwrap().kind(),
            transport.recv().await.unwrap().kind(),
        ];
        assert_eq!(kinds, vec!["spray_discovered", "skin_discovered", "load_complete"]);
    }

    #[tokio::test]
    async fn test_engine_errors_are_forwarded_verbatim() {
        let (mut transport, endpoint) = InProcessTransport::new_pair();
        let _host = WorkerHost::spawn(ScriptedEngine, endpoint, &WorkerConfig::default()).unwrap();
        transport.recv().await.unwrap();

        transport
            .send(WorkerRequest::file_submitted(
                Seq(1),
                ArchiveFile::new("broken.pk3", vec![]),
            ))
            .await
            .unwrap();
        assert_eq!(
            transport.recv().await.unwrap(),
            WorkerMessage::LoadError {
                seq: Seq(1),
                message: "empty archive".to_string(),
            }
        );

        transport
            .send(WorkerRequest::Generate {
                seq: Seq(2),
                op: GenerateOp::SkinAnimation {
                    skin: "sonic".to_string(),
                    spray_id: None,
                    options: GenerationOptions::new("XXXX", "A", SpriteScale::X1),
                },
            })
            .await
            .unwrap();
        assert_eq!(
            transport.recv().await.unwrap(),
            WorkerMessage::GenerateError {
                seq: Seq(2),
                message: "no sprite XXXX".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_host_keeps_serving() {
        let (mut transport, endpoint) = InProcessTransport::new_pair();
        let host = WorkerHost::spawn(ScriptedEngine, endpoint, &WorkerConfig::default()).unwrap();
        transport.recv().await.unwrap();

        transport.send(spray_request(1, "boom")).await.unwrap();
        transport.send(spray_request(2, "red")).await.unwrap();

        match transport.recv().await.unwrap() {
            WorkerMessage::GenerateError { seq, message } => {
                assert_eq!(seq, Seq(1));
                assert!(message.contains("kaboom"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(matches!(
            transport.recv().await.unwrap(),
            WorkerMessage::GenerateResult { seq: Seq(2), .. }
        ));

        drop(transport);
        let stats = tokio::task::spawn_blocking(move || host.join())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stats,
            WorkerStats {
                requests: 2,
                failures: 1,
                panics: 1,
            }
        );
    }

    #[test]
    fn test_worker_thread_is_named() {
        let (transport, endpoint) = InProcessTransport::new_pair();
        let config = WorkerConfig {
            thread_name: "render-test".to_string(),
            ..WorkerConfig::default()
        };
        let host = WorkerHost::spawn(ScriptedEngine, endpoint, &config).unwrap();
        assert_eq!(host.thread.thread().name(), Some("render-test"));

        drop(transport);
        assert!(host.join().is_some());
    }
}
