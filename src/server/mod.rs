//! Server initialization and routing

use crate::api;
use crate::cache::{AppCache, CacheManager, CacheOperations, NoOpCacheManager};
use crate::config::Config;
use crate::jwt::JwtManager;
use crate::middleware::ObservabilityLayer;
use crate::repository::{
    auth_identity::AuthIdentityRepositoryImpl, customer::CustomerRepositoryImpl,
    order::OrderRepositoryImpl,
};
use crate::service::{AuthService, CustomerService, IdentityReconciler};
use crate::state::{HasCache, HasServices};
use crate::telemetry;
use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: MySqlPool,
    pub identity_repo: Arc<AuthIdentityRepositoryImpl>,
    pub auth_service: Arc<AuthService<AuthIdentityRepositoryImpl>>,
    pub customer_service: Arc<CustomerService<CustomerRepositoryImpl, OrderRepositoryImpl>>,
    pub identity_reconciler:
        Arc<IdentityReconciler<AuthIdentityRepositoryImpl, CustomerRepositoryImpl>>,
    pub jwt_manager: JwtManager,
    pub cache: AppCache,
}

impl AppState {
    /// Wire repositories and services over an existing pool
    pub fn new(config: Config, db_pool: MySqlPool, cache: AppCache) -> Self {
        let identity_repo = Arc::new(AuthIdentityRepositoryImpl::new(db_pool.clone()));
        let customer_repo = Arc::new(CustomerRepositoryImpl::new(db_pool.clone()));
        let order_repo = Arc::new(OrderRepositoryImpl::new(db_pool.clone()));

        let jwt_manager = JwtManager::new(config.jwt.clone());

        Self {
            auth_service: Arc::new(AuthService::new(identity_repo.clone(), jwt_manager.clone())),
            customer_service: Arc::new(CustomerService::new(customer_repo.clone(), order_repo)),
            identity_reconciler: Arc::new(IdentityReconciler::new(
                identity_repo.clone(),
                customer_repo,
            )),
            identity_repo,
            jwt_manager,
            cache,
            config: Arc::new(config),
            db_pool,
        }
    }
}

/// Implement HasServices trait for production AppState
impl HasServices for AppState {
    type IdentityRepo = AuthIdentityRepositoryImpl;
    type CustomerRepo = CustomerRepositoryImpl;
    type OrderRepo = OrderRepositoryImpl;

    fn config(&self) -> &Config {
        &self.config
    }

    fn auth_service(&self) -> &AuthService<Self::IdentityRepo> {
        &self.auth_service
    }

    fn customer_service(&self) -> &CustomerService<Self::CustomerRepo, Self::OrderRepo> {
        &self.customer_service
    }

    fn identity_reconciler(&self) -> &IdentityReconciler<Self::IdentityRepo, Self::CustomerRepo> {
        &self.identity_reconciler
    }

    fn identity_repo(&self) -> &Self::IdentityRepo {
        &self.identity_repo
    }

    fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    async fn check_ready(&self) -> (bool, bool) {
        let db_ok = sqlx::query("SELECT 1").execute(&self.db_pool).await.is_ok();
        let cache_ok = self.cache.ping().await.is_ok();
        (db_ok, cache_ok)
    }
}

impl HasCache for AppState {
    type Cache = AppCache;

    fn cache(&self) -> &Self::Cache {
        &self.cache
    }
}

/// Connect to Redis when configured. An unreachable Redis disables dedup
/// rather than blocking startup.
async fn connect_cache(config: &Config) -> AppCache {
    let Some(redis) = &config.redis else {
        info!("REDIS_URL not set, event dedup disabled");
        return AppCache::NoOp(NoOpCacheManager::new());
    };

    match CacheManager::new(redis).await {
        Ok(manager) => {
            info!("Connected to Redis");
            AppCache::Redis(manager)
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, event dedup disabled");
            AppCache::NoOp(NoOpCacheManager::new())
        }
    }
}

/// Run the HTTP server until SIGINT/SIGTERM
pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    api::health::mark_started();

    let db_pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    info!("Connected to database");

    if prometheus_handle.is_some() {
        let pool = db_pool.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(15));
            loop {
                interval.tick().await;
                telemetry::metrics::record_pool_stats(pool.size(), pool.num_idle());
            }
        });
    }

    let cache = connect_cache(&config).await;
    let http_addr = config.http_addr();
    let worker_mode = config.worker_mode;

    let state = AppState::new(config, db_pool.clone(), cache);
    let app = build_router(state, prometheus_handle);

    let listener = TcpListener::bind(&http_addr).await?;
    info!(worker_mode = ?worker_mode, "HTTP server started on {}", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// CORS for one route group. `*` allows any origin without credentials.
pub fn build_cors(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Build the HTTP router with generic state type
///
/// Works with both the production `AppState` and test states. Route groups
/// are mounted according to `WORKER_MODE`.
pub fn build_router<S: HasServices + HasCache>(
    state: S,
    prometheus_handle: Option<PrometheusHandle>,
) -> Router {
    let config = state.config().clone();

    let mut router = Router::new()
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>));

    if config.worker_mode.serves_http_api() {
        let store = Router::new()
            .route("/store/customers", post(api::customer::create::<S>))
            .route(
                "/store/customers/me",
                get(api::customer::me::<S>).post(api::customer::update_me::<S>),
            )
            .route(
                "/store/customers/me/orders",
                get(api::customer::my_orders::<S>),
            )
            .layer(build_cors(&config.http.store_cors));

        let auth = Router::new()
            .route("/auth/customer/emailpass", post(api::auth::login::<S>))
            .route(
                "/auth/customer/emailpass/register",
                post(api::auth::register::<S>),
            )
            .layer(build_cors(&config.http.auth_cors));

        router = router.merge(store).merge(auth);
    }

    if config.worker_mode.serves_events() {
        router = router.route("/hooks/events", post(api::identity_event::receive::<S>));
    }

    let metrics_router = Router::new()
        .route("/metrics", get(api::metrics::metrics_handler))
        .with_state(Arc::new(prometheus_handle));

    router
        .layer(TraceLayer::new_for_http())
        .layer(ObservabilityLayer)
        .with_state(state)
        .merge(metrics_router)
}
