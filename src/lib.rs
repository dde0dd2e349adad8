pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod entities;
pub mod filestore;
pub mod models;
pub mod scheduler;
pub mod services;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use clap::Parser;
pub use config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use services::autoupdate::{AutoupdateContext, resume_autoupdates};
use services::user_service::{CreateUserInput, UserService};

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key, value)?;
        }
        let (layer, task) = builder.extra_field("env", "production")?.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Serve) => run_daemon(config, prometheus_handle).await,

        Some(Commands::Init) => {
            if Config::create_default_if_missing()? {
                println!("Config file created. Edit config.toml and run again.");
            } else {
                println!("Config file already exists.");
            }
            Ok(())
        }

        Some(Commands::CheckConfig) => {
            println!("Configuration is valid.");
            Ok(())
        }

        Some(Commands::UserAdd {
            username,
            password,
            admin,
        }) => cmd_user_add(&config, &username, &password, admin).await,
    }
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "Stackarr v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let state = api::create_app_state(config.clone(), prometheus_handle).await?;

    // Autoupdate handles are process-local; re-register any that were live
    // before the last shutdown.
    let ctx = AutoupdateContext {
        store: state.store.clone(),
        git: Arc::clone(&state.git),
        deployer: Arc::clone(&state.deployer),
        workspace: state.file_store.clone(),
    };
    match resume_autoupdates(&state.scheduler, &ctx).await {
        Ok(0) => {}
        Ok(n) => info!("Resumed {n} autoupdate jobs"),
        Err(e) => error!("Failed to resume autoupdate jobs: {e:#}"),
    }

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("Starting Web API on port {}", port);

        let app = api::router(state);
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        Some(tokio::spawn(async move {
            info!("Web Server running at http://0.0.0.0:{port}");
            if let Err(e) = axum::serve(listener, app).await {
                error!("Web server error: {e}");
            }
        }))
    } else {
        None
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {e}");
        }
    }

    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!("Daemon stopped");

    Ok(())
}

async fn cmd_user_add(
    config: &Config,
    username: &str,
    password: &str,
    admin: bool,
) -> anyhow::Result<()> {
    let store = db::Store::new(&config.general.database_path).await?;
    let service = services::user_service_impl::StoreUserService::new(store);

    let role = if admin {
        constants::roles::ADMINISTRATOR
    } else {
        constants::roles::REGULAR
    };

    let user = service
        .create_user(CreateUserInput {
            username: username.to_string(),
            password: password.to_string(),
            role,
        })
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("Created user '{}' (id {})", user.username, user.id);
    Ok(())
}
