use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use campaign_wizard::api::{CampaignApi, HttpCampaignApi};
use campaign_wizard::config::WizardConfig;
use campaign_wizard::connectivity::ConnectivityProbe;
use campaign_wizard::driver::{CampaignPlan, DriveEvent, WizardDriver};
use campaign_wizard::wizard::{SessionFile, WizardSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WizardConfig::from_env().context("Invalid configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config);

    let plan_path = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: campaign-wizard <plan.json>");
        eprintln!("  CAMPAIGN_WIZARD_API_URL=http://localhost:8000 campaign-wizard plan.json");
        std::process::exit(2);
    });
    let plan: CampaignPlan = serde_json::from_str(
        &tokio::fs::read_to_string(&plan_path)
            .await
            .with_context(|| format!("Failed to read plan {plan_path}"))?,
    )
    .with_context(|| format!("Failed to parse plan {plan_path}"))?;

    eprintln!("📋 Campaign Wizard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api.base_url);
    eprintln!("   Session: {}", config.session_path.display());
    eprintln!("   Plan: {}", plan_path);

    let api: Arc<dyn CampaignApi> =
        Arc::new(HttpCampaignApi::new(&config.api).context("Failed to build API client")?);
    let probe = ConnectivityProbe::from_api(
        Arc::clone(&api),
        config.api.health_timeout,
        config.probe_ttl,
    );
    let session = WizardSession::resume(
        Arc::clone(&api),
        probe.clone(),
        SessionFile::new(&config.session_path),
    )
    .await
    .context("Failed to load session file")?;

    if let Some(step) = session.current_step() {
        eprintln!("   Starting at: {}\n", step.title());
    }

    let mut driver =
        WizardDriver::new(session, api, probe, config.operations.clone()).on_event(print_event);
    driver.run(&plan).await.context("Campaign plan did not complete")?;

    match driver.session().campaign_id() {
        Some(id) => eprintln!("\n✅ Campaign {id} is ready to launch"),
        None => eprintln!("\n✅ Wizard finished"),
    }
    Ok(())
}

fn init_tracing(config: &WizardConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "campaign-wizard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

fn print_event(event: &DriveEvent) {
    match event {
        DriveEvent::Hydrated(report) if !report.skipped => {
            eprintln!("   Restored {} step(s) from the backend", report.restored.len());
            for (step, reason) in &report.failed {
                eprintln!("   ⚠️  Could not restore {step}: {reason}");
            }
        }
        DriveEvent::Hydrated(_) => {}
        DriveEvent::StepStarted(step) => {
            eprintln!("▶ {} ({}/6)", step.title(), step.index() + 1);
        }
        DriveEvent::TargetsImported(report) => {
            eprintln!("   {} target(s) imported", report.accepted);
            for row in &report.rejected {
                eprintln!("   ⚠️  Row {} ({}): {}", row.row, row.email, row.reason);
            }
        }
        DriveEvent::OperationSucceeded { kind, attempt } => {
            eprintln!("   {kind} done (attempt {attempt})");
        }
        DriveEvent::OperationFailed {
            kind,
            error,
            retry_label,
        } => {
            eprintln!("   ❌ {kind}: {}", error.message);
            if let Some(label) = retry_label {
                eprintln!("   ↻ {label}");
            }
        }
        DriveEvent::StepSubmitted { step, next } => match next {
            Some(next) => eprintln!("   ✓ {step} saved, next: {}", next.title()),
            None => eprintln!("   ✓ {step} saved"),
        },
    }
}
