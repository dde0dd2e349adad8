use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::clients::git::{Git2Service, GitService};
use crate::clients::kube::KubeClientFactory;
use crate::config::Config;
use crate::db::Store;
use crate::filestore::FileStore;
use crate::scheduler::Scheduler;
use crate::services::deploy::{KubeDeployer, KubectlDeployer};
use crate::services::stack_update::StackUpdateService;
use crate::services::user_service::UserService;
use crate::services::user_service_impl::StoreUserService;

pub mod auth;
mod error;
mod observability;
mod stacks;
mod system;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

pub struct AppState {
    pub store: Store,

    pub file_store: FileStore,

    pub scheduler: Arc<Scheduler>,

    pub git: Arc<dyn GitService>,

    pub deployer: Arc<dyn KubeDeployer>,

    pub stack_updater: StackUpdateService,

    pub user_service: Arc<dyn UserService>,

    pub config: Config,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn stack_updater(&self) -> &StackUpdateService {
        &self.stack_updater
    }

    #[must_use]
    pub const fn user_service(&self) -> &Arc<dyn UserService> {
        &self.user_service
    }
}

pub async fn create_app_state(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let git: Arc<dyn GitService> = Arc::new(Git2Service::new(std::time::Duration::from_secs(
        config.git.timeout_seconds,
    )));
    let factory = KubeClientFactory::new(config.kubernetes.endpoints.clone());
    let deployer: Arc<dyn KubeDeployer> = Arc::new(KubectlDeployer::new(factory.clone()));

    create_app_state_with(config, git, deployer, factory, prometheus_handle).await
}

/// Assembly seam used by both the daemon and the integration tests; tests
/// inject stub git and deploy collaborators here.
pub async fn create_app_state_with(
    config: Config,
    git: Arc<dyn GitService>,
    deployer: Arc<dyn KubeDeployer>,
    kube_factory: KubeClientFactory,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;
    let file_store = FileStore::new(&config.general.data_dir)?;
    let scheduler = Arc::new(Scheduler::new().await?);

    let stack_updater = StackUpdateService::new(
        store.clone(),
        file_store.clone(),
        Arc::clone(&git),
        Arc::clone(&scheduler),
        Arc::clone(&deployer),
        kube_factory,
    );

    let user_service: Arc<dyn UserService> = Arc::new(StoreUserService::new(store.clone()));

    Ok(Arc::new(AppState {
        store,
        file_store,
        scheduler,
        git,
        deployer,
        stack_updater,
        user_service,
        config,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(60)));

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/stacks/{id}", get(stacks::get_stack))
        .route("/stacks/{id}/kubernetes", put(stacks::update_kubernetes_stack))
        .route("/users", post(users::create_user))
        .route("/system/status", get(system::get_status))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
