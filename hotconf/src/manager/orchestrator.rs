//! Startup aggregation, per-source debounce loops and re-merging.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::time::{Instant, sleep, timeout};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    HotconfError, HotconfResult, Shutdown, ShutdownSignal, Snapshot, Updates, merge_snapshots,
};

use super::options::{ManagerBuilder, RemergeStrategy, WatchFailurePolicy};
use super::registry::Registry;
use super::{Inner, Manager, MergeState};

impl Manager {
    pub(super) async fn start(
        builder: ManagerBuilder,
        signal: ShutdownSignal,
    ) -> HotconfResult<Self> {
        let span = builder
            .span
            .clone()
            .unwrap_or_else(|| info_span!("hotconf"));
        let settings = builder.settings();
        let ManagerBuilder {
            sources,
            load_timeout,
            watch_failure,
            ..
        } = builder;
        let names: Vec<String> = sources.iter().map(|source| source.name()).collect();

        let mut last_known = Vec::with_capacity(sources.len());
        for (source, name) in sources.iter().zip(&names) {
            let loaded = match timeout(load_timeout, source.load())
                .instrument(span.clone())
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Arc::new(HotconfError::timeout(name, "load", load_timeout))),
            };
            let snapshot =
                loaded.map_err(|err| Arc::new(HotconfError::source_load(name, err)))?;
            span.in_scope(|| debug!(source = %name, keys = snapshot.len(), "source loaded"));
            last_known.push(snapshot);
        }

        let merged = merge_snapshots(&last_known);
        span.in_scope(|| {
            info!(
                sources = names.len(),
                keys = merged.len(),
                generation = 0,
                "configuration merged"
            );
        });

        // Sources observe a manager-local signal so that watches started
        // before a fatal watch failure are torn down with it.
        let local = Shutdown::new();
        let mut streams = Vec::with_capacity(sources.len());
        for (index, (source, name)) in sources.iter().zip(&names).enumerate() {
            match source.watch(local.signal()).instrument(span.clone()).await {
                Ok(updates) => streams.push((index, name.clone(), updates)),
                Err(err) => match watch_failure {
                    WatchFailurePolicy::Fatal => {
                        local.trigger();
                        return Err(Arc::new(HotconfError::source_watch(name, err)));
                    }
                    WatchFailurePolicy::Degrade => span.in_scope(|| {
                        warn!(source = %name, error = %err, "watch failed; source stays static");
                    }),
                },
            }
        }

        let versions = vec![0; sources.len()];
        let applied = vec![0; sources.len()];
        let inner = Arc::new(Inner {
            sources,
            names,
            current: ArcSwap::from_pointee(merged),
            state: Mutex::new(MergeState {
                last_known,
                versions,
                applied,
                generation: 0,
            }),
            generation: AtomicU64::new(0),
            registry: Arc::new(Registry::default()),
            settings,
            span: span.clone(),
        });

        let link = signal.clone();
        tokio::spawn(
            async move {
                link.cancelled().await;
                local.trigger();
            }
            .instrument(span.clone()),
        );
        for (index, name, updates) in streams {
            tokio::spawn(
                watch_source(Arc::clone(&inner), index, name, updates, signal.clone())
                    .instrument(span.clone()),
            );
        }

        Ok(Self { inner })
    }
}

/// Consume one source's update stream, coalescing bursts.
///
/// Each delivery replaces the pending snapshot and re-arms the timer; when it
/// fires, the latest snapshot is handed to a re-merge task stamped with a
/// per-source sequence number. Re-merges may finish out of order, so the
/// stamp decides which delivery a slot ends up holding.
async fn watch_source(
    inner: Arc<Inner>,
    index: usize,
    name: String,
    mut updates: Updates,
    signal: ShutdownSignal,
) {
    let debounce = inner.settings.debounce;
    info!(source = %name, "watching source");

    let timer = sleep(debounce);
    tokio::pin!(timer);
    let mut pending: Option<Snapshot> = None;
    let mut sequence: u64 = 0;
    loop {
        tokio::select! {
            () = signal.cancelled() => break,
            update = updates.recv() => {
                let Some(snapshot) = update else {
                    if let Some(latest) = pending.take() {
                        sequence += 1;
                        spawn_remerge(&inner, index, &name, sequence, latest);
                    }
                    break;
                };
                debug!(source = %name, keys = snapshot.len(), "update received; debouncing");
                pending = Some(snapshot);
                timer.as_mut().reset(Instant::now() + debounce);
            }
            () = &mut timer, if pending.is_some() => {
                if let Some(latest) = pending.take() {
                    debug!(source = %name, "debounce elapsed");
                    sequence += 1;
                    spawn_remerge(&inner, index, &name, sequence, latest);
                }
            }
        }
    }
    info!(source = %name, "source watch stopped");
}

fn spawn_remerge(
    inner: &Arc<Inner>,
    index: usize,
    name: &str,
    sequence: u64,
    snapshot: Snapshot,
) {
    let task_inner = Arc::clone(inner);
    let delivery = Delivery {
        source: index,
        name: name.to_owned(),
        sequence,
        snapshot,
    };
    tokio::spawn(
        async move { task_inner.remerge(delivery).await }.instrument(inner.span.clone()),
    );
}

/// A debounced snapshot from one source.
struct Delivery {
    source: usize,
    name: String,
    /// Position of this delivery in the source's stream, starting at 1.
    sequence: u64,
    snapshot: Snapshot,
}

impl Inner {
    /// Merge a delivered snapshot with every other source and publish the
    /// result.
    ///
    /// A delivery older than the one its slot already holds is discarded;
    /// reloaded snapshots only land in slots nobody replaced meanwhile.
    async fn remerge(&self, delivery: Delivery) {
        let Delivery {
            source: trigger,
            name: trigger_name,
            sequence,
            snapshot,
        } = delivery;
        let started = self.state.lock().versions.clone();
        let reloaded = match self.settings.remerge {
            RemergeStrategy::ReloadOthers => self.reload_others(trigger).await,
            RemergeStrategy::Cached => vec![None; self.sources.len()],
        };

        let (merged, generation) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let mut delivered = match state.applied.get_mut(trigger) {
                Some(applied) if *applied < sequence => {
                    *applied = sequence;
                    Some(snapshot)
                }
                _ => {
                    debug!(source = %trigger_name, sequence, "delivery superseded; not applied");
                    None
                }
            };
            let slots = state
                .last_known
                .iter_mut()
                .zip(state.versions.iter_mut())
                .zip(&started)
                .zip(reloaded);
            for (index, (((slot, version), seen), fresh)) in slots.enumerate() {
                let replacement = if index == trigger {
                    delivered.take()
                } else if *version == *seen {
                    fresh
                } else {
                    // Replaced by a delivery or another merge while reloading.
                    None
                };
                if let Some(replacement) = replacement {
                    *slot = replacement;
                    *version += 1;
                }
            }
            let published = Arc::new(merge_snapshots(&state.last_known));
            state.generation += 1;
            self.current.store(Arc::clone(&published));
            self.generation.store(state.generation, Ordering::Release);
            (published, state.generation)
        };

        info!(
            source = %trigger_name,
            generation,
            keys = merged.len(),
            "configuration re-merged"
        );
        self.registry.notify(&merged, &self.span);
    }

    /// Reload every source except `trigger`; failed slots are `None`.
    async fn reload_others(&self, trigger: usize) -> Vec<Option<Snapshot>> {
        let reload_timeout = self.settings.reload_timeout;
        let reloads = self
            .sources
            .iter()
            .zip(&self.names)
            .enumerate()
            .map(|(index, (source, name))| async move {
                if index == trigger {
                    return None;
                }
                let err = match timeout(reload_timeout, source.load()).await {
                    Ok(Ok(snapshot)) => return Some(snapshot),
                    Ok(Err(err)) => err,
                    Err(_) => Arc::new(HotconfError::timeout(name, "reload", reload_timeout)),
                };
                warn!(source = %name, error = %err, "reload failed; keeping last-known snapshot");
                None
            });
        join_all(reloads).await
    }
}
