//! Run manager for executing runs in the background.
//!
//! The RunManager spawns each run as a tokio task, forwards its events into
//! a channel and keeps a cancellation token per active run.

use crate::engine::Orchestrator;
use anyhow::Result;
use ce_protocol::AgentState;
use ce_protocol::RunConfiguration;
use ce_protocol::RunEvent;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Manages all active runs.
pub struct RunManager {
    orchestrator: Arc<Orchestrator>,

    /// Cancellation tokens of active runs, indexed by run id.
    runs: Arc<Mutex<HashMap<String, CancellationToken>>>,

    /// Channel receiving the events of every run.
    events_tx: mpsc::Sender<RunEvent>,
}

impl RunManager {
    /// Create a new RunManager.
    ///
    /// # Arguments
    ///
    /// * `orchestrator` - Executes the runs
    /// * `events_tx` - Channel for run events
    pub fn new(orchestrator: Arc<Orchestrator>, events_tx: mpsc::Sender<RunEvent>) -> Self {
        Self {
            orchestrator,
            runs: Arc::new(Mutex::new(HashMap::new())),
            events_tx,
        }
    }

    /// Start a run in the background and return its id.
    ///
    /// The run is registered before this returns, so it can be cancelled
    /// immediately. It is removed once its terminal event has been sent.
    ///
    /// # Errors
    ///
    /// Returns an error if a run with the same id is still active.
    pub async fn start_run(&self, state: AgentState, config: RunConfiguration) -> Result<String> {
        let run_id = config.run_id.clone();
        let cancel = CancellationToken::new();
        match self.runs.lock().await.entry(run_id.clone()) {
            Entry::Occupied(_) => return Err(anyhow::anyhow!("Run {run_id} is already active")),
            Entry::Vacant(slot) => {
                slot.insert(cancel.clone());
            }
        }

        let mut stream = self
            .orchestrator
            .run_with_cancellation(state, config, cancel);
        let runs = Arc::clone(&self.runs);
        let events_tx = self.events_tx.clone();
        let id = run_id.clone();

        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if events_tx.send(event).await.is_err() {
                    debug!(run_id = %id, "event receiver dropped, stopping run");
                    break;
                }
            }
            runs.lock().await.remove(&id);
        });

        Ok(run_id)
    }

    /// Cancel a running run.
    ///
    /// In-flight model calls, sleeps and snippets observe the cancellation;
    /// the run then ends with a `RunFailed` event.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is not active.
    pub async fn cancel_run(&self, run_id: &str) -> Result<()> {
        let runs = self.runs.lock().await;
        match runs.get(run_id) {
            Some(cancel) => {
                cancel.cancel();
                Ok(())
            }
            None => Err(anyhow::anyhow!("Run {run_id} is not active")),
        }
    }

    /// Ids of the active runs, sorted.
    pub async fn active_runs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.runs.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn run_count(&self) -> usize {
        self.runs.lock().await.len()
    }
}
