use anyhow::Result;
use sevmeter::config::Config;
use sevmeter::logging::init_logging;
use sevmeter::service::MeterService;
#[cfg(feature = "web")]
use sevmeter::web::{self, AppState};
use sevmeter::SevClient;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional explicit config path, otherwise the default locations
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let mut cfg = Config::from_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path, e))?;
            cfg.apply_env_overrides();
            cfg
        }
        None => Config::load()?,
    };

    init_logging(&config.logging)?;
    config.validate()?;
    info!(
        "sevmeter {} starting, user: {}",
        env!("APP_VERSION"),
        config.api.user_name
    );

    let client = Arc::new(SevClient::from_config(&config.api)?);
    let service = Arc::new(MeterService::discover(client, &config).await?);

    let config = Arc::new(config);
    #[cfg(feature = "web")]
    let web_task = config.web.enabled.then(|| {
        let state = AppState {
            service: Arc::clone(&service),
            config: Arc::clone(&config),
        };
        let host = config.web.host.clone();
        let port = config.web.port;
        tokio::spawn(async move {
            if let Err(e) = web::serve(state, &host, port).await {
                error!("{}", e);
            }
        })
    });

    service
        .run(config.polling.scan_interval(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    #[cfg(feature = "web")]
    if let Some(task) = web_task {
        task.abort();
    }
    info!("sevmeter stopped");
    Ok(())
}
