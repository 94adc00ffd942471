use super::*;
use deal_watcher::product_manager::CheckOutcome;
use deal_watcher::scheduler::{shutdown_channel, SchedulerState};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_single_run_checks_once_and_releases_session() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    browser.serve(WIDGET_URL, product_page("₹480.00", true));
    let catalog = Arc::new(ScriptedCatalog::fixed(widget_catalog(None)));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));
    let notifier = Arc::new(RecordingNotifier::default());

    let mut scheduler = build_scheduler(catalog.clone(), launcher, notifier.clone()).single_run(true);
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    let (_handle, shutdown) = shutdown_channel();
    scheduler.run(shutdown).await?;

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(scheduler.cycles_completed(), 1);
    assert_eq!(catalog.loads(), 1);
    assert_eq!(browser.renders(), 1);
    assert_eq!(browser.launches(), 1);
    assert_eq!(browser.closed(), 1);
    assert_eq!(notifier.sent().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_catalog_never_launches_browser() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    let catalog = Arc::new(ScriptedCatalog::fixed(Catalog::default()));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));
    let notifier = Arc::new(RecordingNotifier::default());

    let mut scheduler = build_scheduler(catalog, launcher.clone(), notifier).single_run(true);
    let (_handle, shutdown) = shutdown_channel();
    scheduler.run(shutdown).await?;

    assert_eq!(launcher.attempts(), 0);
    assert_eq!(scheduler.cycles_completed(), 1);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_launch_is_retried_at_fixed_interval() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    browser.serve(WIDGET_URL, product_page("₹480", true));
    let catalog = Arc::new(ScriptedCatalog::fixed(widget_catalog(None)));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)).failing(2));
    let notifier = Arc::new(RecordingNotifier::default());

    let mut scheduler = build_scheduler(catalog, launcher.clone(), notifier.clone()).single_run(true);
    let (_handle, shutdown) = shutdown_channel();
    let started = Instant::now();
    scheduler.run(shutdown).await?;

    assert_eq!(launcher.attempts(), 3);
    assert_eq!(browser.launches(), 1);
    assert!(started.elapsed() >= LAUNCH_RETRY_DELAY * 2);
    assert_eq!(notifier.sent().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_launch_retry() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    let catalog = Arc::new(ScriptedCatalog::fixed(widget_catalog(None)));
    let (handle, shutdown) = shutdown_channel();
    let launcher = Arc::new(
        FakeLauncher::new(Arc::clone(&browser))
            .failing(usize::MAX)
            .stop_after_attempts(3, handle),
    );
    let notifier = Arc::new(RecordingNotifier::default());

    let mut scheduler = build_scheduler(catalog, launcher.clone(), notifier);
    scheduler.run(shutdown).await?;

    assert_eq!(launcher.attempts(), 3);
    assert_eq!(browser.renders(), 0);
    assert_eq!(scheduler.cycles_completed(), 0);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_sleep_releases_session() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    browser.serve(WIDGET_URL, product_page("₹480", true));
    let (handle, shutdown) = shutdown_channel();
    let catalog = Arc::new(ScriptedCatalog::fixed(widget_catalog(None)).stop_on_load(3, handle));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));
    let notifier = Arc::new(RecordingNotifier::default());

    let mut scheduler = build_scheduler(catalog.clone(), launcher, notifier.clone());
    scheduler.run(shutdown).await?;

    // The third cycle still completes; the sleep after it is cut short.
    assert_eq!(scheduler.cycles_completed(), 3);
    assert_eq!(catalog.loads(), 3);
    assert_eq!(browser.launches(), 1);
    assert_eq!(browser.closed(), 1);
    // Same price every cycle: one alert only.
    assert_eq!(notifier.sent().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sleeps_for_catalog_interval() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    browser.serve(WIDGET_URL, product_page("₹900", true));
    let (handle, shutdown) = shutdown_channel();
    let catalog = Arc::new(ScriptedCatalog::fixed(widget_catalog(Some(600))).stop_on_load(2, handle));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));

    let mut scheduler = build_scheduler(catalog, launcher, Arc::new(RecordingNotifier::default()));
    let started = Instant::now();
    scheduler.run(shutdown).await?;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(600));
    assert!(elapsed < Duration::from_secs(1800));
    assert_eq!(scheduler.poll_interval(), Duration::from_secs(600));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_default_interval_when_catalog_has_none() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    let (handle, shutdown) = shutdown_channel();
    let catalog = Arc::new(ScriptedCatalog::fixed(Catalog::default()).stop_on_load(2, handle));
    let launcher = Arc::new(FakeLauncher::new(browser));

    let mut scheduler = build_scheduler(catalog, launcher, Arc::new(RecordingNotifier::default()));
    let started = Instant::now();
    scheduler.run(shutdown).await?;

    assert!(started.elapsed() >= Duration::from_secs(1800));
    assert_eq!(scheduler.poll_interval(), Duration::from_secs(1800));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unusable_catalog_interval_falls_back_to_default() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    browser.serve(WIDGET_URL, product_page("₹480", true));
    let mut value = serde_json::to_value(widget_catalog(None))?;
    value["check_interval_seconds"] = serde_json::json!(-30);
    let (handle, shutdown) = shutdown_channel();
    let catalog =
        Arc::new(ScriptedCatalog::fixed(serde_json::from_value(value)?).stop_on_load(2, handle));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));

    let mut scheduler = build_scheduler(catalog, launcher, Arc::new(RecordingNotifier::default()));
    scheduler.run(shutdown).await?;

    assert_eq!(browser.renders(), 1);
    assert_eq!(scheduler.poll_interval(), Duration::from_secs(1800));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reload_failure_keeps_previous_catalog() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    browser.serve(WIDGET_URL, product_page("₹480", true));
    let (handle, shutdown) = shutdown_channel();
    let catalog = Arc::new(
        ScriptedCatalog::new(vec![Some(widget_catalog(None)), None, None]).stop_on_load(3, handle),
    );
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));

    let mut scheduler = build_scheduler(catalog, launcher, Arc::new(RecordingNotifier::default()));
    scheduler.run(shutdown).await?;

    assert_eq!(scheduler.cycles_completed(), 3);
    assert_eq!(browser.renders(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_catalog_edits_apply_without_restart() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    browser.serve(WIDGET_URL, product_page("₹480", true));
    let (handle, shutdown) = shutdown_channel();
    let catalog = Arc::new(
        ScriptedCatalog::new(vec![Some(Catalog::default()), Some(widget_catalog(None))])
            .stop_on_load(2, handle),
    );
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));
    let notifier = Arc::new(RecordingNotifier::default());

    let mut scheduler = build_scheduler(catalog, launcher, notifier.clone());
    scheduler.run(shutdown).await?;

    assert_eq!(scheduler.cycles_completed(), 2);
    assert_eq!(browser.launches(), 1);
    assert_eq!(notifier.sent().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unhealthy_session_is_relaunched() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    browser.serve(WIDGET_URL, product_page("₹900", true));
    browser.unhealthy.store(true, std::sync::atomic::Ordering::SeqCst);
    let (handle, shutdown) = shutdown_channel();
    let catalog = Arc::new(ScriptedCatalog::fixed(widget_catalog(None)).stop_on_load(3, handle));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));

    let mut scheduler = build_scheduler(catalog, launcher, Arc::new(RecordingNotifier::default()));
    scheduler.run(shutdown).await?;

    assert_eq!(browser.launches(), 3);
    assert_eq!(browser.closed(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_session_lost_while_idle_is_replaced_before_checking() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    browser.serve(WIDGET_URL, product_page("₹480", true));
    let (handle, shutdown) = shutdown_channel();
    let catalog = Arc::new(ScriptedCatalog::fixed(widget_catalog(Some(60))).stop_on_load(2, handle));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));

    let mut scheduler = build_scheduler(catalog, launcher, Arc::new(RecordingNotifier::default()));
    let crash = async {
        // Dies during the sleep after a healthy first cycle.
        tokio::time::sleep(Duration::from_secs(30)).await;
        browser.crash();
    };
    let (run, ()) = tokio::join!(scheduler.run(shutdown), crash);
    run?;

    assert_eq!(scheduler.cycles_completed(), 2);
    assert_eq!(browser.launches(), 2);
    assert_eq!(browser.closed(), 2);
    let report = scheduler.last_report().expect("a cycle ran");
    assert!(matches!(report.results[0].outcome, CheckOutcome::Checked { .. }));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_initial_catalog_failure_is_fatal() {
    let browser = Arc::new(Browser::default());
    let catalog = Arc::new(ScriptedCatalog::new(vec![None]));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));

    let mut scheduler = build_scheduler(catalog, launcher.clone(), Arc::new(RecordingNotifier::default()));
    let (_handle, shutdown) = shutdown_channel();
    let result = scheduler.run(shutdown).await;

    assert!(matches!(result, Err(AppError::Catalog { .. })));
    assert_eq!(launcher.attempts(), 0);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_start_runs_nothing() -> anyhow::Result<()> {
    let browser = Arc::new(Browser::default());
    let catalog = Arc::new(ScriptedCatalog::fixed(widget_catalog(None)));
    let launcher = Arc::new(FakeLauncher::new(Arc::clone(&browser)));

    let mut scheduler = build_scheduler(catalog, launcher.clone(), Arc::new(RecordingNotifier::default()));
    let (handle, shutdown) = shutdown_channel();
    handle.trigger();
    scheduler.run(shutdown).await?;

    assert_eq!(scheduler.cycles_completed(), 0);
    assert_eq!(launcher.attempts(), 0);
    Ok(())
}
