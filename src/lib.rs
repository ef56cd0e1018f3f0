pub mod authentication;
pub mod config;
pub mod crud_ops;
pub mod entities;
pub mod error;
pub mod guard;
pub mod store;
pub mod token;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::{Config, ConfigError},
    guard::AuthorizationGuard,
    store::{SqliteStore, StoreSetupError},
    token::{TokenCodec, TokenIssuer},
};

#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub issuer: TokenIssuer,
    pub guard: AuthorizationGuard,
}

impl AppState {
    pub fn new(store: SqliteStore, config: &Config) -> Self {
        let codec = TokenCodec::new(&config.jwt_secret);
        Self {
            store,
            issuer: TokenIssuer::new(codec.clone(), config.cookie.clone()),
            guard: AuthorizationGuard::new(codec),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreSetupError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn cors_layer(frontend_url: Option<&str>) -> Result<CorsLayer, ConfigError> {
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match frontend_url {
        Some(url) => {
            let origin = HeaderValue::from_str(url).map_err(|_| ConfigError::Invalid {
                key: "FRONTEND_URL",
                value: url.to_string(),
            })?;
            Ok(cors.allow_origin(AllowOrigin::exact(origin)))
        }
        None => Ok(cors),
    }
}

pub fn router(state: AppState, frontend_url: Option<&str>) -> Result<Router, ConfigError> {
    let users = Router::new()
        .route("/signup", post(authentication::sign_up))
        .route("/login", post(authentication::sign_in))
        .route("/logout", get(authentication::sign_out).post(authentication::sign_out))
        .route("/me", get(authentication::me));

    let todos = Router::new()
        .route("/create", post(crud_ops::create_todo))
        .route("/fetch", get(crud_ops::get_todos))
        .route("/update/{id}", put(crud_ops::update_todo))
        .route("/delete/{id}", delete(crud_ops::delete_todo));

    Ok(Router::new()
        .nest("/user", users)
        .nest("/todo", todos)
        .layer(cors_layer(frontend_url)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serves on an already bound listener until the process is stopped.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

pub async fn run_server(config: Config) -> Result<(), ServerError> {
    let store = SqliteStore::connect(&config.database_url, config.db_max_connections).await?;
    let app = router(AppState::new(store, &config), config.frontend_url.as_deref())?;

    let listener = TcpListener::bind(config.bind_addr()?).await?;
    serve(listener, app).await?;

    Ok(())
}
