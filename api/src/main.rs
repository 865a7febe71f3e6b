use std::{net::SocketAddr, path::Path, sync::Arc};

use dotenv::dotenv;
use eyre::WrapErr;
use mimalloc::MiMalloc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lunakraft_api::{
    App,
    config::{AuthConfig, Env, ServerConfig},
    identity::{FirebaseVerifier, SharedSecretVerifier, TokenVerifier},
    moderation::{ModerationService, posts::start_background_cleanup},
    store::{DocumentStore, MemoryStore, PgStore},
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const MAX_DB_CONNECTIONS: usize = 10;

fn init_tracing(env: Env) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match env {
        Env::Dev => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        Env::Staging | Env::Production => {
            registry.with(tracing_subscriber::fmt::layer().json()).init()
        }
    }
}

async fn open_store(config: &ServerConfig) -> eyre::Result<Arc<dyn DocumentStore>> {
    if let Some(url) = &config.database_url {
        let store = PgStore::connect(url, MAX_DB_CONNECTIONS)?;
        tracing::info!("Using the Postgres document store");
        return Ok(Arc::new(store));
    }

    let store = match &config.seed_file {
        Some(path) => MemoryStore::load_fixture(Path::new(path))
            .await
            .wrap_err_with(|| format!("couldn't load seed file {path}"))?,
        None => MemoryStore::new(),
    };
    tracing::warn!("DATABASE_URL is not set, using the in-memory document store");
    Ok(Arc::new(store))
}

fn token_verifier(config: &ServerConfig) -> Arc<dyn TokenVerifier> {
    match &config.auth {
        AuthConfig::Firebase { project_id } => {
            tracing::info!(%project_id, "Verifying Firebase ID tokens");
            Arc::new(FirebaseVerifier::new(project_id.as_str()))
        }
        AuthConfig::SharedSecret { secret } => {
            tracing::warn!("Verifying tokens with the shared secret");
            Arc::new(SharedSecretVerifier::new(secret))
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    init_tracing(Env::from_env());

    let config = ServerConfig::new_from_env();
    let store = open_store(&config).await?;
    let moderation = Arc::new(ModerationService::new(store));

    start_background_cleanup(moderation.clone(), config.post_cleanup_interval);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = App {
        verifier: token_verifier(&config),
        config: Arc::new(config),
        moderation,
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("couldn't bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app.router()).await?;

    Ok(())
}
