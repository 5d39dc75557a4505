use interview_prep_backend::{
    config::{Config, LogFormat},
    database::{pool, ExamStore, MemoryExamStore, PgExamStore},
    routes,
    services::inference_service::OllamaClient,
    AppState,
};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let store: Arc<dyn ExamStore> = match &config.database_url {
        Some(url) => {
            let pool = pool::create_pool(url).await?;
            pool::run_migrations(&pool).await?;
            info!("connected to PostgreSQL, migrations applied");
            Arc::new(PgExamStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, exams are kept in memory and lost on restart");
            Arc::new(MemoryExamStore::new())
        }
    };

    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let generator = Arc::new(OllamaClient::new(
        http_client,
        config.ollama_base_url.clone(),
        config.ollama_model.clone(),
        Duration::from_secs(config.ollama_timeout_secs),
        config.max_retries,
    ));

    info!(
        ollama = %config.ollama_base_url,
        model = %config.ollama_model,
        grading_mode = ?config.grading_mode,
        "inference backend configured"
    );

    let addr: SocketAddr = config.server_address.parse()?;
    let app = routes::router(AppState::new(store, generator, config));

    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
