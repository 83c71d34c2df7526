pub mod api;
pub mod models;
pub mod services;

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use services::{
    AppConfig, ClientOptions, ConfigCredentials, ConfigError, ConfigStore, CorpusPaths, CorpusStore,
    DetectionClient, DetectionError, LanguageService, ScoringPolicy,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_flag(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok("1") | Ok("true") | Ok("TRUE"))
}

/// Initialize logging: console plus one log file per session.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if env_flag("LANGCHECK_DISABLE_FILE_LOG") {
        init_console_only_logging(env_filter);
        info!("File logging disabled via LANGCHECK_DISABLE_FILE_LOG");
        return;
    }

    let logs_dir = match std::env::var("LANGCHECK_LOG_DIR") {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => get_logs_dir(),
    };

    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Failed to create logs directory: {}", e);
        init_console_only_logging(env_filter);
        info!("Falling back to console-only logging (log dir not writable)");
        return;
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_filename = format!("langcheck_{}.log", timestamp);

    let file_appender = rolling::never(&logs_dir, &log_filename);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(file_guard);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    info!("Log file: {}/{}", logs_dir.display(), log_filename);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if !env_flag("LANGCHECK_DISABLE_LOG_CLEANUP") {
        std::thread::spawn(move || {
            cleanup_old_logs(&logs_dir, 30);
        });
    }
}

fn get_logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("langcheck").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

fn cleanup_old_logs(logs_dir: &Path, keep: usize) {
    let mut entries: Vec<_> = match fs::read_dir(logs_dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(_) => return,
    };

    entries.retain(|e| {
        let name = e.file_name().to_string_lossy().to_string();
        name.starts_with("langcheck_") && name.ends_with(".log")
    });

    if entries.len() <= keep {
        return;
    }

    entries.sort_by_key(|e| {
        e.metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });

    let remove_count = entries.len().saturating_sub(keep);
    for entry in entries.into_iter().take(remove_count) {
        let _ = fs::remove_file(entry.path());
    }
}

fn init_console_only_logging(env_filter: EnvFilter) {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}

/// Config store for an explicit file, else the platform config directory.
pub fn config_store(path: Option<PathBuf>) -> ConfigStore {
    match path {
        Some(file) => ConfigStore::at_file(file),
        None => ConfigStore::new(
            ConfigStore::default_config_dir().unwrap_or_else(|| PathBuf::from(".langcheck")),
        ),
    }
}

/// Load the config file and overlay the process environment.
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let store = config_store(path);
    let mut config = store.load()?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    info!(config = %store.config_file().display(), "config.loaded");
    Ok(config)
}

/// Wire the production service from a loaded config.
pub fn build_service(config: &AppConfig) -> Result<LanguageService<DetectionClient>, DetectionError> {
    let credentials = ConfigCredentials::new(config.service.clone());
    let client = DetectionClient::new(&credentials, ClientOptions::from(&config.service))?;
    let corpus = CorpusStore::new(CorpusPaths::from(&config.corpus));
    info!(
        endpoint = client.url(),
        sentences = %corpus.paths().sentences.display(),
        labels = %corpus.paths().labels.display(),
        "service.ready"
    );
    Ok(LanguageService::new(corpus, client, ScoringPolicy::from(&config.evaluation)))
}

/// Serve the HTTP routes until the process is stopped.
pub async fn serve(config: &AppConfig, bind: Option<&str>) -> anyhow::Result<()> {
    let service = Arc::new(build_service(config)?);
    let addr = bind.unwrap_or(config.server.bind.as_str());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %listener.local_addr()?, "server.listening");

    axum::serve(listener, api::router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("=== LangCheck Shutting Down ===");
        })
        .await?;
    Ok(())
}
