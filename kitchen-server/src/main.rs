use anyhow::{Context, Result};
use clap::Parser;
use kitchen::{dictation::Dictation, preferences::PreferencesHandle};
use kitchen_server::{
    app::{router, AppState},
    auth::Authenticator,
    cache::new_cache,
    config::Config,
    cooking::CookingSessions,
    database::Database,
    editing::EditorSessions,
    images::ImageSearch,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Path to the YAML configuration file
    #[clap(long, default_value = "config.yml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // Parse command line arguments
    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Loading configuration from {}", args.config))?;

    // initialize tracing
    let file_appender = tracing_appender::rolling::daily(
        match &config.server.log_dir {
            Some(dir) => std::path::PathBuf::from(dir),
            None => std::env::current_dir()?,
        },
        "access.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .json()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // connect to the database
    let db = Database::connect(&config.database.path)
        .await
        .context("Connecting to database")?;
    let auth =
        Authenticator::from_config(db.clone(), &config.auth, config.server.tls.is_some()).await;
    let cache = new_cache();
    let cooking = CookingSessions::default();
    cooking.spawn_sweeper();
    let editors = EditorSessions::default();
    editors.spawn_sweeper();
    let dictation = config.dictation.as_ref().map(|d| {
        tracing::info!(recorder = %d.recorder, whisper = %d.whisper, "Dictation enabled");
        Arc::new(d.command()) as Arc<dyn Dictation>
    });
    let state = AppState {
        images: ImageSearch::from_config(&config.images, cache.clone()),
        preferences: PreferencesHandle::load(&config.preferences.path),
        cooking,
        editors,
        dictation,
        db,
        auth,
        cache,
    };
    let app = router(state);

    // In development, use HTTP. In production, use HTTPS.
    if let Some(tls) = &config.server.tls {
        rustls::crypto::ring::default_provider()
            .install_default()
            .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;
        let tls_config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .context("Loading TLS certificate")?;

        let addr = config.server.address.parse()?;
        tracing::info!("Listening on {}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .context("Starting TLS server")?;
    } else {
        let listener = tokio::net::TcpListener::bind(&config.server.address).await?;
        tracing::info!("Listening on {}", config.server.address);
        axum::serve(listener, app).await?;
    }
    Ok(())
}
