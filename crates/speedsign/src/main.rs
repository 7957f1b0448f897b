mod bootstrap;
mod capture;
mod commands;
mod hardware;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use speedsign_core::settings::Settings;
use speedsign_data::event_log::EventLog;
use speedsign_data::policy_store::PolicyStore;
use speedsign_data::report::collect_report;
use speedsign_runtime::cleanup::{CleanupOutcome, CleanupScheduler};
use speedsign_runtime::collaborators::{
    Display, NoCapture, NoDisplay, NoRelay, Relay, SystemClock, VideoCapture,
};
use speedsign_runtime::orchestrator::{Collaborators, OrchestratorConfig, RecordingOrchestrator};
use speedsign_ui::app::{App, TuiDisplay};
use speedsign_ui::console::ConsoleDisplay;
use speedsign_ui::report_view;
use speedsign_ui::themes::Theme;

use crate::capture::FfmpegCapture;
use crate::hardware::{open_serial, SysfsGpioRelay};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();
    let data_dir = settings.data_dir();

    bootstrap::ensure_data_dir(&data_dir)?;
    let log_file = bootstrap::resolve_log_file(
        settings.log_file.as_ref(),
        settings.display == "tui",
        &data_dir,
    );
    bootstrap::setup_logging(&settings.log_level, log_file.as_ref())?;

    tracing::info!("speedsign v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        station = %settings.station_id,
        data_dir = %data_dir.display(),
        view = %settings.view,
        "configuration loaded"
    );

    let store = Arc::new(PolicyStore::new(settings.policy_path()));
    let log = Arc::new(EventLog::new(settings.event_log_path()));

    if settings.clear {
        log.clear().context("failed to clear the speed log")?;
        tracing::info!(path = %log.path().display(), "speed log cleared");
        return Ok(());
    }

    if let Some(update) = settings.policy_update() {
        let status = commands::update_policy(&store, &update)?;
        println!("{:#}", status.to_json());
        return Ok(());
    }

    match settings.view.as_str() {
        "report" => run_report(&settings, &data_dir, log).await,
        "status" => {
            println!("{:#}", commands::current_status(&store, &log).to_json());
            Ok(())
        }
        _ => run_sign(&settings, &data_dir, store, log).await,
    }
}

// ── Sign ──────────────────────────────────────────────────────────────────────

async fn run_sign(
    settings: &Settings,
    data_dir: &Path,
    store: Arc<PolicyStore>,
    log: Arc<EventLog>,
) -> Result<()> {
    let frames = open_serial(&settings.device, settings.baud_rate, settings.read_timeout())
        .context("radar unavailable")?;

    let relay: Box<dyn Relay> = match settings.relay_gpio {
        Some(pin) => Box::new(SysfsGpioRelay::new(pin)),
        None => Box::new(NoRelay),
    };
    let capture: Box<dyn VideoCapture> = match &settings.camera_url {
        Some(url) => Box::new(FfmpegCapture::new(url.clone(), data_dir)),
        None => {
            tracing::warn!("no camera URL configured; sessions will not be recorded");
            Box::new(NoCapture)
        }
    };

    let collaborators = Collaborators {
        frames: Box::new(frames),
        relay,
        capture,
        display: Box::new(NoDisplay),
        clock: Arc::new(SystemClock::new()),
    };
    let mut orchestrator = RecordingOrchestrator::new(
        OrchestratorConfig::from_settings(settings),
        collaborators,
        store,
        log,
    );

    let mut quit_flag = None;
    let display: Box<dyn Display> = match settings.display.as_str() {
        "tui" => {
            let tui = TuiDisplay::enter(orchestrator.status_handle(), Theme::auto_detect())
                .context("cannot start the terminal display")?;
            quit_flag = Some(tui.quit_flag());
            Box::new(tui)
        }
        "console" => Box::new(ConsoleDisplay::stdout()),
        _ => Box::new(NoDisplay),
    };
    orchestrator.set_display(display);

    let handle = orchestrator.start();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; stopping");
        }
        _ = wait_for_quit(quit_flag) => {
            tracing::info!("quit requested from the display; stopping");
        }
    }

    let summary = handle.shutdown().await.context("control loop failed")?;
    tracing::info!(
        cycles = summary.cycles,
        sessions = summary.sessions_started,
        "speedsign stopped"
    );
    Ok(())
}

/// Resolve once `flag` is raised; never resolves without a flag.
async fn wait_for_quit(flag: Option<Arc<AtomicBool>>) {
    let Some(flag) = flag else {
        return std::future::pending().await;
    };
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

async fn run_report(settings: &Settings, data_dir: &Path, log: Arc<EventLog>) -> Result<()> {
    let report = collect_report(data_dir, &log);

    if settings.display == "tui" {
        App::new("auto").run_report(&report)?;
    } else {
        print!("{}", report_view::format_plain(&report));
    }

    if !settings.purge {
        return Ok(());
    }

    let artifacts = report.artifacts();
    let scheduler = CleanupScheduler::new(log, settings.cleanup_delay());
    tracing::info!(
        videos = artifacts.len(),
        delay_secs = scheduler.delay().as_secs(),
        "purge scheduled; new log entries before then cancel it"
    );
    let pending = scheduler.schedule(artifacts);

    tokio::select! {
        outcome = pending => match outcome.context("purge task failed")? {
            CleanupOutcome::Completed { deleted } => {
                tracing::info!(deleted, "purge completed");
            }
            CleanupOutcome::Cancelled => {
                tracing::warn!("speed log changed; purge skipped");
            }
            CleanupOutcome::Failed(reason) => {
                anyhow::bail!("purge failed: {reason}");
            }
        },
        _ = tokio::signal::ctrl_c() => {
            scheduler.cancel();
            tracing::info!("Ctrl+C received; purge cancelled");
        }
    }
    Ok(())
}
