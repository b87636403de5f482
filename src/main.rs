use std::sync::Arc;

use anyhow::Context;
use paytrust_harness::config::LogFormat;
use paytrust_harness::orchestrator::TestOrchestrator;
use paytrust_harness::payments::{payment_dependency, payment_suite, PaymentApiSubject};
use paytrust_harness::provisioner::services::backend_from_config;
use paytrust_harness::provisioner::DependencyProvisioner;
use paytrust_harness::HarnessConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = HarnessConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_tracing(&config);

    tracing::info!("Starting PayTrust integration harness");
    tracing::info!("Environment: {}", config.app.env);

    let backend = backend_from_config(&config.provisioner)
        .context("Failed to initialise dependency backend")?;
    let provisioner = Arc::new(DependencyProvisioner::new(
        backend,
        config.provisioner.clone(),
    ));

    let orchestrator = TestOrchestrator::new(
        provisioner,
        Arc::new(PaymentApiSubject::new()),
        config.orchestrator.clone(),
    )
    .context("Invalid orchestrator configuration")?
    .with_mock_config(config.mock_server.clone())
    .with_dependency(payment_dependency());

    let report = orchestrator
        .run_suite(paytrust_harness::payments::suite::SUITE_NAME, &payment_suite())
        .await;

    tracing::info!("\n{}", report.render_text());

    if let Some(path) = &config.report_path {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    std::process::exit(report.exit_code());
}

fn init_tracing(config: &HarnessConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "paytrust_harness={},actix_web=info",
            config.app.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
