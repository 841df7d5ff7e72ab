use acupuncture_report_service::{LogFormat, ServiceConfig, create_app};
use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing in the format selected by `LOG_FORMAT`
fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "acupuncture_report_service=debug,wizard_flow=debug,tower_http=debug".into()
    });

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();
    init_tracing(config.log_format);
    config.warn_on_gaps();

    let port = config.port;
    info!(
        model = %config.gemini.model,
        timeout_secs = config.gemini.timeout.as_secs(),
        "Configuration loaded"
    );

    let app = create_app(config).context("failed to build generation client")?;
    let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    let addr = listener.local_addr()?;

    info!("Acupuncture Report Service starting on {}", addr);
    info!("API description available at http://{}/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
