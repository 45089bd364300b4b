//! Serial host worker.
//!
//! The host capability is one shared in-process environment, so every
//! dispatch from every connection is funnelled through one dedicated
//! thread that owns the [`Dispatcher`]. Connection I/O stays concurrent;
//! host calls never overlap.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::Dispatcher;
use crate::error::{BridgeError, DispatchError};
use crate::host::HostCapability;
use crate::protocol::Command;

/// One queued dispatch and the channel its outcome goes back on.
#[derive(Debug)]
struct Job {
    command: Command,
    reply: oneshot::Sender<Result<Value, DispatchError>>,
}

/// Handle for submitting commands to the serial host thread.
///
/// Cheap to clone. The thread exits once every handle is dropped.
#[derive(Debug, Clone)]
pub struct HostWorker {
    sender: mpsc::Sender<Job>,
}

impl HostWorker {
    /// Moves `host` onto a new dedicated thread and returns its handle.
    ///
    /// `queue` bounds how many commands may wait for the host at once;
    /// submitters wait for space when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Worker`] if the OS refuses to spawn the
    /// thread.
    pub fn spawn<H: HostCapability>(host: H, queue: usize) -> Result<Self, BridgeError> {
        let (sender, receiver) = mpsc::channel(queue.max(1));
        std::thread::Builder::new()
            .name("scene-link-host".to_string())
            .spawn(move || run_worker(Dispatcher::new(host), receiver))
            .map_err(BridgeError::Worker)?;
        Ok(Self { sender })
    }

    /// Queues `command` and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Returns whatever the dispatcher returned, or
    /// [`DispatchError::WorkerUnavailable`] if the worker thread is gone.
    pub async fn submit(&self, command: Command) -> Result<Value, DispatchError> {
        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(Job { command, reply })
            .await
            .map_err(|_| DispatchError::WorkerUnavailable)?;
        outcome.await.map_err(|_| DispatchError::WorkerUnavailable)?
    }
}

fn run_worker<H: HostCapability>(mut dispatcher: Dispatcher<H>, mut jobs: mpsc::Receiver<Job>) {
    tracing::debug!("host worker started");
    while let Some(Job { command, reply }) = jobs.blocking_recv() {
        let outcome = catch_unwind(AssertUnwindSafe(|| dispatcher.dispatch(&command)))
            .unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(command = %command.label(), %message, "host capability panicked");
                Err(DispatchError::HostPanicked(message))
            });
        // The submitter may have given up (e.g. its connection closed).
        let _ = reply.send(outcome);
    }
    tracing::debug!("host worker stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::host::fake::FakeHost;
    use crate::host::{HostError, ScriptContext, StatusSnapshot};
    use crate::protocol::CommandBody;
    use serde_json::json;

    fn script(code: &str) -> Command {
        Command::new(CommandBody::Script {
            code: code.to_string(),
        })
    }

    #[tokio::test]
    async fn submit_returns_dispatch_result() {
        let Ok(worker) = HostWorker::spawn(FakeHost::default(), 4) else {
            panic!("worker should spawn");
        };
        assert_eq!(worker.submit(script("x")).await.ok(), Some(json!("ran: x")));
    }

    #[tokio::test]
    async fn worker_survives_host_panic() {
        let Ok(worker) = HostWorker::spawn(FakeHost::default(), 4) else {
            panic!("worker should spawn");
        };
        assert!(matches!(
            worker.submit(script("panic")).await,
            Err(DispatchError::HostPanicked(m)) if m == "host blew up"
        ));
        assert_eq!(worker.submit(script("y")).await.ok(), Some(json!("ran: y")));
    }

    /// Host that records how many script calls are in flight at once.
    #[derive(Debug, Default)]
    struct OverlapProbe {
        in_flight: Arc<Mutex<(u32, u32)>>,
    }

    impl HostCapability for OverlapProbe {
        fn run_script(&mut self, _: &str, _: ScriptContext) -> Result<String, HostError> {
            if let Ok(mut g) = self.in_flight.lock() {
                g.0 += 1;
                g.1 = g.1.max(g.0);
            }
            std::thread::sleep(Duration::from_millis(5));
            if let Ok(mut g) = self.in_flight.lock() {
                g.0 -= 1;
            }
            Ok("done".to_string())
        }
        fn write_text(&mut self, _: &str, _: &str) -> Result<(), HostError> {
            Ok(())
        }
        fn resolve_property(&self, _: &str) -> Result<Option<String>, HostError> {
            Ok(None)
        }
        fn status(&self) -> Result<StatusSnapshot, HostError> {
            Err(HostError::ContextUnavailable)
        }
        fn select_object(&mut self, _: &str) -> Result<bool, HostError> {
            Ok(false)
        }
        fn create_mesh(&mut self, name: &str) -> Result<String, HostError> {
            Ok(name.to_string())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_never_overlap_in_host() {
        let probe = OverlapProbe::default();
        let counters = Arc::clone(&probe.in_flight);
        let Ok(worker) = HostWorker::spawn(probe, 16) else {
            panic!("worker should spawn");
        };

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let worker = worker.clone();
            tasks.spawn(async move { worker.submit(script(&format!("job {i}"))).await });
        }
        while let Some(joined) = tasks.join_next().await {
            assert!(matches!(joined, Ok(Ok(_))));
        }

        let Ok(g) = counters.lock() else {
            panic!("counter poisoned");
        };
        assert_eq!(g.1, 1, "host calls overlapped");
    }
}
