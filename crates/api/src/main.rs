use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use inkwell_api::app::{self, AppState};
use inkwell_api::config::ApiConfig;
use inkwell_api::oauth::OAuthClient;
use inkwell_auth::{
    AuthService, InMemoryUserDirectory, PasswordHashConfig, PasswordHasher, RevocationRegistry,
    TokenCodec, UserDirectory, bootstrap_admin, spawn_sweeper,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    inkwell_observability::init();

    let mut config = ApiConfig::from_env().context("invalid configuration")?;
    info!(?config, "configuration loaded");

    let users = user_directory(config.database_url.as_deref()).await?;
    let hasher = PasswordHasher::new(PasswordHashConfig::default())
        .context("invalid password hashing parameters")?;

    let outcome = bootstrap_admin(config.admin.take(), &*users, &hasher)
        .await
        .context("admin bootstrap failed")?;
    info!(?outcome, "admin bootstrap finished");

    let revocations = Arc::new(RevocationRegistry::new());
    let sweeper = spawn_sweeper(revocations.clone(), config.sweep_interval);

    let auth = AuthService::new(
        TokenCodec::new(&config.jwt_secret, config.token_lifetime),
        revocations,
        users,
        hasher,
    );
    let mut state = AppState::new(auth, config.cookie_key.clone(), config.cookie_secure);
    if let Some(oauth) = config.oauth.clone() {
        info!(provider = %oauth.provider, "external login enabled");
        state = state.with_provider(Arc::new(OAuthClient::new(oauth)));
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app::build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.shutdown().await;
    info!("shut down");
    Ok(())
}

#[cfg(feature = "postgres")]
async fn user_directory(database_url: Option<&str>) -> anyhow::Result<Arc<dyn UserDirectory>> {
    use inkwell_api::directory::PgUserDirectory;

    let Some(url) = database_url else {
        tracing::warn!("DATABASE_URL not set; accounts are kept in memory");
        return Ok(Arc::new(InMemoryUserDirectory::new()));
    };
    let directory = PgUserDirectory::connect(url)
        .await
        .context("failed to connect to postgres")?;
    directory.ensure_schema().await.context("failed to prepare schema")?;
    info!("using postgres user directory");
    Ok(Arc::new(directory))
}

#[cfg(not(feature = "postgres"))]
async fn user_directory(database_url: Option<&str>) -> anyhow::Result<Arc<dyn UserDirectory>> {
    if database_url.is_some() {
        tracing::warn!("DATABASE_URL ignored; built without the postgres feature");
    }
    Ok(Arc::new(InMemoryUserDirectory::new()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
