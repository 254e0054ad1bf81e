//! Shared test fixtures for integration tests.
//!
//! [`ScriptedSource`] is a [`Source`] whose load results, delays and pushed
//! updates are driven by the test through a [`ScriptHandle`].

#![allow(
    dead_code,
    reason = "each integration test binary uses a different subset of helpers"
)]

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hotconf::{
    HotconfResult, HotconfResultExt, Manager, ShutdownSignal, Snapshot, Source,
    UPDATE_CHANNEL_CAPACITY, Updates,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Build a snapshot from literal pairs.
pub fn snap(pairs: &[(&str, &str)]) -> Snapshot {
    pairs.iter().copied().collect()
}

#[derive(Default)]
struct Script {
    snapshot: Snapshot,
    load_error: Option<String>,
    load_delay: Option<Duration>,
    watch_error: Option<String>,
    loads: usize,
    sender: Option<mpsc::Sender<Snapshot>>,
}

/// Test double implementing [`Source`].
pub struct ScriptedSource {
    name: String,
    script: Arc<Mutex<Script>>,
}

/// Controls a [`ScriptedSource`] after it has been handed to a manager.
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    /// Source named `name` whose loads return `initial`.
    pub fn new(name: &str, initial: Snapshot) -> (Self, ScriptHandle) {
        let script = Arc::new(Mutex::new(Script {
            snapshot: initial,
            ..Script::default()
        }));
        let handle = ScriptHandle {
            script: Arc::clone(&script),
        };
        (
            Self {
                name: name.to_owned(),
                script,
            },
            handle,
        )
    }
}

impl ScriptHandle {
    /// Replace the backing state and push it to the watcher.
    ///
    /// Returns `false` when nothing is watching any more.
    pub async fn push(&self, snapshot: Snapshot) -> bool {
        let sender = {
            let mut script = self.script.lock();
            script.snapshot = snapshot.clone();
            script.sender.clone()
        };
        match sender {
            Some(tx) => tx.send(snapshot).await.is_ok(),
            None => false,
        }
    }

    /// Replace the backing state without notifying the watcher.
    pub fn set(&self, snapshot: Snapshot) {
        self.script.lock().snapshot = snapshot;
    }

    /// Make every subsequent load fail with `message`.
    pub fn fail_loads(&self, message: &str) {
        self.script.lock().load_error = Some(message.to_owned());
    }

    /// Delay every subsequent load by `delay`.
    pub fn stall_loads(&self, delay: Duration) {
        self.script.lock().load_delay = Some(delay);
    }

    /// Let subsequent loads complete immediately again.
    ///
    /// Loads already sleeping keep their delay.
    pub fn resume_loads(&self) {
        self.script.lock().load_delay = None;
    }

    /// Make `watch` fail with `message`.
    pub fn fail_watch(&self, message: &str) {
        self.script.lock().watch_error = Some(message.to_owned());
    }

    /// Number of completed or attempted loads.
    pub fn loads(&self) -> usize {
        self.script.lock().loads
    }

    /// Indicates whether a watcher currently holds the update channel.
    pub fn is_watched(&self) -> bool {
        self.script
            .lock()
            .sender
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait]
impl Source for ScriptedSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn load(&self) -> HotconfResult<Snapshot> {
        let (delay, outcome) = {
            let mut script = self.script.lock();
            script.loads += 1;
            let outcome = match &script.load_error {
                Some(message) => {
                    Err::<Snapshot, _>(io::Error::other(message.clone())).into_hotconf()
                }
                None => Ok(script.snapshot.clone()),
            };
            (script.load_delay, outcome)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn watch(&self, signal: ShutdownSignal) -> HotconfResult<Updates> {
        if let Some(message) = self.script.lock().watch_error.clone() {
            return Err::<Updates, _>(io::Error::other(message)).into_hotconf();
        }
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        self.script.lock().sender = Some(tx);
        let script = Arc::clone(&self.script);
        tokio::spawn(async move {
            signal.cancelled().await;
            script.lock().sender = None;
        });
        Ok(rx)
    }
}

/// Sleep in small steps until `manager` has published `generation`.
///
/// Returns `false` when `limit` elapses first.
pub async fn wait_for_generation(manager: &Manager, generation: u64, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while manager.generation() < generation {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    true
}

/// Let spawned delivery tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
