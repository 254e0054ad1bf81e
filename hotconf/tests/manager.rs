//! Tests for aggregation, hot reload and subscriber delivery.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow, ensure};
use common::{ScriptedSource, settle, snap, wait_for_generation};
use hotconf::{
    Bind, HotconfError, Manager, RemergeStrategy, Shutdown, Snapshot, WatchFailurePolicy,
};
use parking_lot::Mutex;
use rstest::rstest;
use tracing_test::traced_test;

const LIMIT: Duration = Duration::from_secs(30);

fn counter() -> (Arc<AtomicUsize>, impl Fn(Arc<Snapshot>) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&count);
    (count, move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test(start_paused = true)]
async fn later_sources_take_precedence() -> Result<()> {
    let (env, _) = ScriptedSource::new("env", snap(&[("K", "env"), ("ONLY_ENV", "1")]));
    let (remote, _) = ScriptedSource::new("remote", snap(&[("K", "remote")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(env)
        .source(remote)
        .build(shutdown.signal())
        .await?;

    ensure!(manager.value("K").as_deref() == Some("remote"), "later source should win");
    ensure!(manager.value("ONLY_ENV").as_deref() == Some("1"), "earlier key missing");
    ensure!(manager.generation() == 0, "initial merge is generation 0");
    ensure!(
        manager.source_names() == ["env", "remote"],
        "unexpected names {:?}",
        manager.source_names()
    );
    Ok(())
}

#[rstest]
#[case::empty_later_value_is_suppressed(&[("K", "1")], &[("K", "")], Some("1"))]
#[case::empty_only_value_is_kept(&[], &[("K", "")], Some(""))]
#[case::non_empty_later_value_wins(&[("K", "")], &[("K", "2")], Some("2"))]
#[tokio::test(start_paused = true)]
async fn empty_values_do_not_blank_earlier_sources(
    #[case] first: &[(&str, &str)],
    #[case] second: &[(&str, &str)],
    #[case] expected: Option<&str>,
) -> Result<()> {
    let (a, _) = ScriptedSource::new("a", snap(first));
    let (b, _) = ScriptedSource::new("b", snap(second));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(a)
        .source(b)
        .build(shutdown.signal())
        .await?;
    ensure!(
        manager.value("K").as_deref() == expected,
        "unexpected value {:?}",
        manager.value("K")
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn bursts_are_coalesced_into_one_merge() -> Result<()> {
    let (source, handle) = ScriptedSource::new("burst", snap(&[("N", "0")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(source)
        .debounce(Duration::from_millis(200))
        .build(shutdown.signal())
        .await?;
    let (notifications, callback) = counter();
    let _subscription = manager.on_update(callback);

    for n in 1..=5 {
        let value = n.to_string();
        ensure!(handle.push(snap(&[("N", value.as_str())])).await, "push {n} failed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    ensure!(manager.generation() == 0, "merged before the debounce window closed");

    tokio::time::sleep(Duration::from_secs(1)).await;
    ensure!(manager.generation() == 1, "expected one merge, got {}", manager.generation());
    ensure!(manager.value("N").as_deref() == Some("5"), "latest update not applied");
    ensure!(notifications.load(Ordering::SeqCst) == 1, "expected one notification");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reload_picks_up_changes_in_other_sources() -> Result<()> {
    let (file, file_handle) = ScriptedSource::new("file", snap(&[("A", "1")]));
    let (env, env_handle) = ScriptedSource::new("env", snap(&[("B", "1")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(file)
        .source(env)
        .build(shutdown.signal())
        .await?;

    file_handle.set(snap(&[("A", "2")]));
    ensure!(env_handle.push(snap(&[("B", "2")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "no merge published");

    ensure!(manager.value("A").as_deref() == Some("2"), "other source not reloaded");
    ensure!(manager.value("B").as_deref() == Some("2"), "trigger update not applied");
    ensure!(file_handle.loads() == 2, "expected startup plus one reload");
    ensure!(env_handle.loads() == 1, "trigger source must not be reloaded");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cached_strategy_skips_reloads() -> Result<()> {
    let (file, file_handle) = ScriptedSource::new("file", snap(&[("A", "1")]));
    let (env, env_handle) = ScriptedSource::new("env", snap(&[("B", "1")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(file)
        .source(env)
        .remerge(RemergeStrategy::Cached)
        .build(shutdown.signal())
        .await?;

    file_handle.set(snap(&[("A", "2")]));
    ensure!(env_handle.push(snap(&[("B", "2")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "no merge published");

    ensure!(manager.value("A").as_deref() == Some("1"), "cached value expected");
    ensure!(manager.value("B").as_deref() == Some("2"), "trigger update not applied");
    ensure!(file_handle.loads() == 1, "cached merges must not reload");
    Ok(())
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn failed_reload_keeps_last_known_snapshot() -> Result<()> {
    let (flaky, flaky_handle) = ScriptedSource::new("flaky", snap(&[("A", "kept")]));
    let (healthy, healthy_handle) = ScriptedSource::new("healthy", snap(&[("B", "1")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(flaky)
        .source(healthy)
        .build(shutdown.signal())
        .await?;

    flaky_handle.fail_loads("backend unavailable");
    ensure!(healthy_handle.push(snap(&[("B", "2")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "reload failure blocked merge");

    ensure!(manager.value("A").as_deref() == Some("kept"), "last-known value lost");
    ensure!(manager.value("B").as_deref() == Some("2"), "healthy update not applied");
    ensure!(logs_contain("reload failed"), "reload failure not logged");
    ensure!(logs_contain("backend unavailable"), "reload error not logged");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_reload_times_out_and_keeps_last_known_snapshot() -> Result<()> {
    let (slow, slow_handle) = ScriptedSource::new("slow", snap(&[("A", "old")]));
    let (fast, fast_handle) = ScriptedSource::new("fast", snap(&[("B", "1")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(slow)
        .source(fast)
        .reload_timeout(Duration::from_secs(1))
        .build(shutdown.signal())
        .await?;

    slow_handle.set(snap(&[("A", "new")]));
    slow_handle.stall_loads(Duration::from_secs(60));
    ensure!(fast_handle.push(snap(&[("B", "2")])).await, "push failed");
    ensure!(
        wait_for_generation(&manager, 1, Duration::from_secs(10)).await,
        "timed-out reload blocked merge"
    );
    ensure!(manager.value("A").as_deref() == Some("old"), "stalled value applied");
    Ok(())
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn overlapping_remerges_keep_the_newest_delivery() -> Result<()> {
    let (other, other_handle) = ScriptedSource::new("other", snap(&[("B", "1")]));
    let (live, live_handle) = ScriptedSource::new("live", snap(&[("K", "v0")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(other)
        .source(live)
        .debounce(Duration::from_millis(10))
        .build(shutdown.signal())
        .await?;
    let last_seen = Arc::new(Mutex::new(None::<String>));
    let sink = Arc::clone(&last_seen);
    let _subscription = manager.on_update(move |snapshot| {
        *sink.lock() = snapshot.get("K").map(str::to_owned);
    });

    // The first re-merge parks on a slow reload of `other`.
    other_handle.stall_loads(Duration::from_secs(2));
    ensure!(live_handle.push(snap(&[("K", "v1")])).await, "push failed");
    tokio::time::sleep(Duration::from_millis(50)).await;
    other_handle.resume_loads();

    // The second re-merge overtakes it.
    ensure!(live_handle.push(snap(&[("K", "v2")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "newer merge not published");
    ensure!(manager.value("K").as_deref() == Some("v2"), "newer delivery not applied");

    ensure!(wait_for_generation(&manager, 2, LIMIT).await, "stalled merge never finished");
    settle().await;
    ensure!(
        manager.value("K").as_deref() == Some("v2"),
        "older delivery overwrote the newer one"
    );
    ensure!(
        last_seen.lock().as_deref() == Some("v2"),
        "subscribers last saw a superseded value"
    );
    ensure!(logs_contain("delivery superseded"), "discarded delivery not logged");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_reload_does_not_overwrite_a_newer_delivery() -> Result<()> {
    let (other, other_handle) = ScriptedSource::new("other", snap(&[("B", "1")]));
    let (live, live_handle) = ScriptedSource::new("live", snap(&[("K", "v0")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(other)
        .source(live)
        .debounce(Duration::from_millis(10))
        .build(shutdown.signal())
        .await?;

    // A merge triggered by `other` reloads `live` and reads `v0` slowly.
    live_handle.stall_loads(Duration::from_secs(2));
    ensure!(other_handle.push(snap(&[("B", "2")])).await, "push failed");
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Meanwhile `live` delivers `v1` directly.
    ensure!(live_handle.push(snap(&[("K", "v1")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "delivery not merged");
    ensure!(manager.value("K").as_deref() == Some("v1"), "delivery not applied");

    ensure!(wait_for_generation(&manager, 2, LIMIT).await, "slow merge never finished");
    ensure!(
        manager.value("K").as_deref() == Some("v1"),
        "stale reload overwrote a newer delivery"
    );
    ensure!(manager.value("B").as_deref() == Some("2"), "trigger update lost");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_startup_load_names_the_source() -> Result<()> {
    let (good, _) = ScriptedSource::new("good", Snapshot::new());
    let (bad, bad_handle) = ScriptedSource::new("bad", Snapshot::new());
    bad_handle.fail_loads("unreadable");
    let shutdown = Shutdown::new();
    let err = Manager::builder()
        .source(good)
        .source(bad)
        .build(shutdown.signal())
        .await
        .err()
        .ok_or_else(|| anyhow!("construction should fail"))?;
    match err.as_ref() {
        HotconfError::SourceLoad { source_name, .. } => {
            ensure!(source_name == "bad", "wrong source {source_name}");
        }
        other => return Err(anyhow!("unexpected error: {other}")),
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_startup_load_times_out() -> Result<()> {
    let (slow, handle) = ScriptedSource::new("slow", Snapshot::new());
    handle.stall_loads(Duration::from_secs(120));
    let shutdown = Shutdown::new();
    let err = Manager::builder()
        .source(slow)
        .load_timeout(Duration::from_secs(1))
        .build(shutdown.signal())
        .await
        .err()
        .ok_or_else(|| anyhow!("construction should time out"))?;
    let HotconfError::SourceLoad { error, .. } = err.as_ref() else {
        return Err(anyhow!("unexpected error: {err}"));
    };
    ensure!(
        matches!(error.as_ref(), HotconfError::Timeout { operation: "load", .. }),
        "expected a load timeout, got {error}"
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fatal_watch_failure_aborts_and_stops_started_watches() -> Result<()> {
    let (first, first_handle) = ScriptedSource::new("first", Snapshot::new());
    let (broken, broken_handle) = ScriptedSource::new("broken", Snapshot::new());
    broken_handle.fail_watch("no watch support");
    let shutdown = Shutdown::new();
    let err = Manager::builder()
        .source(first)
        .source(broken)
        .build(shutdown.signal())
        .await
        .err()
        .ok_or_else(|| anyhow!("construction should fail"))?;
    ensure!(
        matches!(
            err.as_ref(),
            HotconfError::SourceWatch { source_name, .. } if source_name == "broken"
        ),
        "unexpected error: {err}"
    );
    settle().await;
    ensure!(!first_handle.is_watched(), "earlier watch left running");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn degraded_watch_failure_keeps_source_static() -> Result<()> {
    let (fixed, fixed_handle) = ScriptedSource::new("fixed", snap(&[("A", "1")]));
    let (live, live_handle) = ScriptedSource::new("live", snap(&[("B", "1")]));
    fixed_handle.fail_watch("no watch support");
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(fixed)
        .source(live)
        .watch_failure(WatchFailurePolicy::Degrade)
        .build(shutdown.signal())
        .await?;
    ensure!(manager.value("A").as_deref() == Some("1"), "static source missing");

    ensure!(live_handle.push(snap(&[("B", "2")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "no merge published");
    ensure!(manager.value("A").as_deref() == Some("1"), "static source lost");
    ensure!(manager.value("B").as_deref() == Some("2"), "live source not applied");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_callbacks_stop_receiving() -> Result<()> {
    let (source, handle) = ScriptedSource::new("src", snap(&[("N", "0")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(source)
        .build(shutdown.signal())
        .await?;
    let (kept_count, kept) = counter();
    let (gone_count, gone) = counter();
    let _kept = manager.on_update(kept);
    let removed = manager.on_update(gone);
    ensure!(manager.subscriber_count() == 2, "expected two subscribers");

    removed.unsubscribe();
    removed.unsubscribe();
    ensure!(manager.subscriber_count() == 1, "unsubscribe did not remove entry");

    ensure!(handle.push(snap(&[("N", "1")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "no merge published");
    settle().await;
    ensure!(kept_count.load(Ordering::SeqCst) == 1, "kept subscriber not notified");
    ensure!(gone_count.load(Ordering::SeqCst) == 0, "removed subscriber notified");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_the_published_snapshot() -> Result<()> {
    let (source, handle) = ScriptedSource::new("src", snap(&[("N", "0")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(source)
        .build(shutdown.signal())
        .await?;
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let reader = manager.clone();
    let _subscription = manager.on_update(move |snapshot| {
        // The swap happens before notification.
        let published = reader.current();
        sink.lock().push((
            snapshot.get("N").map(str::to_owned),
            published.get("N").map(str::to_owned),
        ));
    });

    ensure!(handle.push(snap(&[("N", "1")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "no merge published");
    settle().await;
    let seen = observed.lock().clone();
    ensure!(
        seen == [(Some(String::from("1")), Some(String::from("1")))],
        "unexpected deliveries {seen:?}"
    );
    Ok(())
}

#[derive(Debug, Default, Bind)]
struct Limits {
    #[bind(key = "MAX_CONNECTIONS", default = "10")]
    max_connections: u32,
}

#[tokio::test(start_paused = true)]
async fn on_bind_delivers_typed_values_and_skips_bad_ones() -> Result<()> {
    let (source, handle) = ScriptedSource::new("src", Snapshot::new());
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(source)
        .build(shutdown.signal())
        .await?;
    ensure!(manager.bind::<Limits>()?.max_connections == 10, "default not applied");

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let _subscription =
        manager.on_bind(move |limits: Limits| sink.lock().push(limits.max_connections));

    ensure!(handle.push(snap(&[("MAX_CONNECTIONS", "many")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "first merge missing");
    ensure!(handle.push(snap(&[("MAX_CONNECTIONS", "64")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 2, LIMIT).await, "second merge missing");
    settle().await;

    ensure!(*received.lock() == [64], "unexpected deliveries {:?}", received.lock());
    let mut existing = Limits { max_connections: 1 };
    manager.bind_into(&mut existing)?;
    ensure!(existing.max_connections == 64, "bind_into did not update value");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_freezes_configuration() -> Result<()> {
    let (source, handle) = ScriptedSource::new("src", snap(&[("N", "0")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(source)
        .build(shutdown.signal())
        .await?;

    shutdown.trigger();
    settle().await;
    ensure!(!handle.is_watched(), "watch still running after shutdown");
    ensure!(!handle.push(snap(&[("N", "1")])).await, "push accepted after shutdown");

    tokio::time::sleep(Duration::from_secs(1)).await;
    ensure!(manager.generation() == 0, "merge after shutdown");
    ensure!(manager.value("N").as_deref() == Some("0"), "snapshot changed after shutdown");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn snapshot_copies_are_independent_of_later_merges() -> Result<()> {
    let (source, handle) = ScriptedSource::new("src", snap(&[("N", "0")]));
    let shutdown = Shutdown::new();
    let manager = Manager::builder()
        .source(source)
        .build(shutdown.signal())
        .await?;
    let before = manager.snapshot();
    let shared = manager.current();

    ensure!(handle.push(snap(&[("N", "1")])).await, "push failed");
    ensure!(wait_for_generation(&manager, 1, LIMIT).await, "no merge published");
    ensure!(before.get("N") == Some("0"), "copy mutated");
    ensure!(shared.get("N") == Some("0"), "shared snapshot mutated");
    ensure!(manager.current().get("N") == Some("1"), "new snapshot not published");
    Ok(())
}
