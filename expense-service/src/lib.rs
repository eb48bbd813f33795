pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ExpenseConfig;
use crate::middleware::{metrics_middleware, CookiePolicy};
use crate::services::{
    Authenticator, CategoryService, ExpenseStore, GroupService, JwtService, SessionService,
    TransactionService, UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: ExpenseConfig,
    pub store: Arc<dyn ExpenseStore>,
    pub authenticator: Authenticator,
    pub cookies: CookiePolicy,
    pub sessions: SessionService,
    pub users: UserService,
    pub groups: GroupService,
    pub categories: CategoryService,
    pub transactions: TransactionService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wires every service onto `store`. The signing key comes from the
    /// configuration and is only held by the authenticator.
    pub fn new(config: ExpenseConfig, store: Arc<dyn ExpenseStore>) -> Self {
        let authenticator = Authenticator::new(JwtService::new(&config.jwt));
        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let register_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.register_attempts,
            config.rate_limit.register_window_seconds,
        );

        Self {
            cookies: CookiePolicy::from(&config.cookies),
            authenticator,
            sessions: SessionService::new(store.clone()),
            users: UserService::new(store.clone()),
            groups: GroupService::new(store.clone()),
            categories: CategoryService::new(store.clone()),
            transactions: TransactionService::new(store.clone()),
            store,
            config,
            login_rate_limiter,
            register_rate_limiter,
        }
    }
}

fn api_routes(state: &AppState) -> Router<AppState> {
    use handlers::{auth, categories, groups, transactions, users};

    let login_route = Router::new()
        .route("/login", post(auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/register", post(auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    Router::new()
        .merge(login_route)
        .merge(register_route)
        .route("/admin", post(auth::register_admin))
        .route("/logout", get(auth::logout).post(auth::logout))
        // Users
        .route("/users", get(users::list_users).delete(users::delete_user))
        .route("/users/:username", get(users::get_user))
        .route(
            "/users/:username/transactions",
            post(transactions::create_transaction)
                .get(transactions::list_user_transactions)
                .delete(transactions::delete_transaction),
        )
        .route(
            "/users/:username/transactions/category/:category",
            get(transactions::list_user_category_transactions),
        )
        // Groups
        .route(
            "/groups",
            post(groups::create_group)
                .get(groups::list_groups)
                .delete(groups::delete_group),
        )
        .route("/groups/:name", get(groups::get_group))
        .route("/groups/:name/add", patch(groups::add_to_group))
        .route("/groups/:name/insert", patch(groups::insert_into_group))
        .route("/groups/:name/remove", patch(groups::remove_from_group))
        .route("/groups/:name/pull", patch(groups::pull_from_group))
        .route(
            "/groups/:name/transactions",
            get(transactions::list_group_transactions),
        )
        .route(
            "/groups/:name/transactions/category/:category",
            get(transactions::list_group_category_transactions),
        )
        // Categories
        .route(
            "/categories",
            post(categories::create_category)
                .get(categories::list_categories)
                .delete(categories::delete_categories),
        )
        .route("/categories/:type", patch(categories::update_category))
        // Transactions (admin views)
        .route(
            "/transactions",
            get(transactions::list_transactions).delete(transactions::delete_transactions),
        )
        .route(
            "/transactions/users/:username",
            get(transactions::admin_list_user_transactions),
        )
        .route(
            "/transactions/users/:username/category/:category",
            get(transactions::admin_list_user_category_transactions),
        )
        .route(
            "/transactions/groups/:name",
            get(transactions::admin_list_group_transactions),
        )
        .route(
            "/transactions/groups/:name/category/:category",
            get(transactions::admin_list_group_category_transactions),
        )
}

fn cors_layer(config: &ExpenseConfig) -> CorsLayer {
    let origins = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(origin) => Some(origin),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::COOKIE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness))
        .route("/metrics", get(handlers::metrics::metrics))
        .nest("/api", api_routes(&state))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}
