use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};
use tokio::sync::{mpsc, oneshot};

use crate::player::{ControlOp, SourceArbiter, TrackSnapshot};

enum SourceRequest {
    Poll(oneshot::Sender<Option<TrackSnapshot>>),
    Control(ControlOp, oneshot::Sender<bool>),
}

/// Async handle to the source worker thread.
#[derive(Clone)]
pub struct SourceHandle {
    tx: mpsc::Sender<SourceRequest>,
}

impl SourceHandle {
    /// Runs one arbitration cycle. `None` also when the worker is gone.
    pub async fn poll(&self) -> Option<TrackSnapshot> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SourceRequest::Poll(reply)).await.is_err() {
            error!("Source worker is not running");
            return None;
        }
        rx.await.unwrap_or(None)
    }

    /// Routes a control request to the authoritative source.
    pub async fn control(&self, op: ControlOp) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SourceRequest::Control(op, reply)).await.is_err() {
            error!("Source worker is not running");
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

/// Starts the thread that owns every source adapter.
///
/// Adapters do blocking IO (HTTP, D-Bus, subprocesses), so they live on a
/// dedicated OS thread and are built there by `build`. Demoted sources are
/// re-probed every `reinit_interval`.
pub fn spawn_source_worker<F>(build: F, reinit_interval: Duration) -> std::io::Result<SourceHandle>
where
    F: FnOnce() -> SourceArbiter + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<SourceRequest>(16);

    thread::Builder::new()
        .name("source-worker".to_string())
        .spawn(move || {
            let mut arbiter = build();
            let available = arbiter.initialize();
            info!("Source worker started, {} source(s) available", available);

            let mut last_reinit = Instant::now();
            while let Some(request) = rx.blocking_recv() {
                if !reinit_interval.is_zero() && last_reinit.elapsed() >= reinit_interval {
                    let recovered = arbiter.reinitialize_unavailable();
                    if recovered > 0 {
                        info!("{} source(s) became available", recovered);
                    }
                    last_reinit = Instant::now();
                }

                match request {
                    SourceRequest::Poll(reply) => {
                        let _ = reply.send(arbiter.poll());
                    }
                    SourceRequest::Control(op, reply) => {
                        let ok = arbiter.control(op);
                        debug!(
                            "{:?} via {}: {}",
                            op,
                            arbiter.current_source().unwrap_or("<none>"),
                            if ok { "ok" } else { "rejected" }
                        );
                        let _ = reply.send(ok);
                    }
                }
            }

            debug!("Source worker exiting");
        })?;

    Ok(SourceHandle { tx })
}
