use super::*;
use restock_watcher::models::StockStatus;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_sessions_are_never_shared() -> anyhow::Result<()> {
    let store = PageStore::new();
    for n in 0..12 {
        store.set(&item_url(n), SOLD_OUT_PAGE);
        // Uneven load times so later items catch up with slower ones.
        store.set_delay(&item_url(n), Duration::from_millis(100 + 150 * (n as u64 % 4)));
    }
    let monitor = build_monitor(12, 3, store.clone(), RecordingNotifier::new())?;

    for cycle in 1..=3 {
        let report = monitor.scheduler.run_cycle(cycle).await;
        assert_eq!(report.records.len(), 12);
    }

    assert_eq!(store.opens(), 36);
    assert_eq!(store.overlaps(), 0);
    assert!(store.max_in_flight() <= 3);
    println!("✓ 36 checks over 3 sessions without overlap");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_page_does_not_idle_other_session() -> anyhow::Result<()> {
    let store = PageStore::new();
    // Slot 0 gets items 0, 2, 4 and slot 1 gets 1, 3, 5: 1.2s of work each.
    let delays = [1000, 100, 100, 100, 100, 1000];
    for (n, ms) in delays.iter().enumerate() {
        store.set(&item_url(n), SOLD_OUT_PAGE);
        store.set_delay(&item_url(n), Duration::from_millis(*ms));
    }
    let monitor = build_monitor(6, 2, store.clone(), RecordingNotifier::new())?;

    let report = monitor.scheduler.run_cycle(1).await;

    assert_eq!(report.records.len(), 6);
    assert_eq!(report.out_of_stock(), 6);
    assert_eq!(store.overlaps(), 0);
    assert!(report.elapsed >= Duration::from_millis(1200));
    assert!(report.elapsed < Duration::from_millis(1300), "cycle took {:?}", report.elapsed);
    println!("✓ Uneven cycle finished in {:?}", report.elapsed);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failures_do_not_disturb_other_items() -> anyhow::Result<()> {
    let store = PageStore::new();
    store.set(&item_url(0), SOLD_OUT_PAGE);
    store.set(&item_url(1), SOLD_OUT_PAGE);
    let notifier = RecordingNotifier::new();
    let monitor = build_monitor(2, 2, store.clone(), notifier.clone())?;

    monitor.scheduler.run_cycle(1).await;

    // Item 0 fails to load while item 1 restocks.
    store.remove(&item_url(0));
    store.set(&item_url(1), restock_page("$9.99", "Limited stock"));
    let report = monitor.scheduler.run_cycle(2).await;

    assert_eq!(report.errors(), 1);
    assert!(report.records[0].error.as_deref().unwrap_or_default().contains("ERR_TIMED_OUT"));
    assert_eq!(monitor.registry.last_status(0), Some(StockStatus::OutOfStock));
    assert_eq!(notifier.item_ids(), vec!["1".to_string()]);
    assert_eq!(notifier.last().map(|a| a.stock), Some("Limited".to_string()));

    // Item 0 comes back in stock; the earlier failure did not reset its history.
    store.set(&item_url(0), restock_page("$19.99", ""));
    monitor.scheduler.run_cycle(3).await;
    assert_eq!(notifier.item_ids(), vec!["1".to_string(), "0".to_string()]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_items_in_stock_at_startup_are_not_alerted() -> anyhow::Result<()> {
    let store = PageStore::new();
    store.set(&item_url(0), restock_page("$5.00", ""));
    let notifier = RecordingNotifier::new();
    let monitor = build_monitor(1, 1, store, notifier.clone())?;

    monitor.scheduler.run_cycle(1).await;
    monitor.scheduler.run_cycle(2).await;

    assert_eq!(notifier.count(), 0);
    assert_eq!(monitor.registry.last_status(0), Some(StockStatus::InStock));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_run_keeps_cadence_and_stops_on_cancel() -> anyhow::Result<()> {
    let store = PageStore::new();
    for n in 0..4 {
        store.set(&item_url(n), SOLD_OUT_PAGE);
        store.set_delay(&item_url(n), Duration::from_millis(500));
    }
    let monitor = Arc::new(build_monitor(4, 2, store.clone(), RecordingNotifier::new())?);
    let cancel = CancellationToken::new();

    let handle = {
        let monitor = Arc::clone(&monitor);
        let cancel = cancel.clone();
        tokio::spawn(async move { monitor.scheduler.run(cancel).await })
    };

    // Each cycle takes 1s (two waves of 500ms) and starts every 2s: 0s, 2s, 4s.
    tokio::time::sleep(Duration::from_millis(5500)).await;
    cancel.cancel();
    let stats = handle.await?;

    assert_eq!(stats.cycles_completed, 3);
    assert_eq!(stats.checks, 12);
    assert_eq!(store.opens(), 12);
    assert_eq!(stats.average_cycle(), Duration::from_secs(1));

    monitor.pool.release_all().await;
    assert!(monitor.pool.is_released());
    println!("✓ Scheduler stopped cleanly after {} cycles", stats.cycles_completed);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_cycle_starts_next_immediately() -> anyhow::Result<()> {
    let store = PageStore::new();
    store.set(&item_url(0), SOLD_OUT_PAGE);
    store.set_delay(&item_url(0), Duration::from_millis(3000));
    let monitor = Arc::new(build_monitor(1, 1, store.clone(), RecordingNotifier::new())?);
    let cancel = CancellationToken::new();

    let handle = {
        let monitor = Arc::clone(&monitor);
        let cancel = cancel.clone();
        tokio::spawn(async move { monitor.scheduler.run(cancel).await })
    };

    // 3s cycles back to back: cycles end at 3s and 6s, the third is in flight.
    tokio::time::sleep(Duration::from_millis(6500)).await;
    cancel.cancel();
    let stats = handle.await?;

    // The in-flight cycle completes before the loop notices the cancel.
    assert_eq!(stats.cycles_completed, 3);
    assert_eq!(store.opens(), 3);

    Ok(())
}
