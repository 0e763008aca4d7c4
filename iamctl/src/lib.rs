//! # iamctl: Identity and Access Management Control Plane
//!
//! `iamctl` is the backend for an organisation's employee directory. It keeps track of who works
//! where, what they are allowed to do, and who changed what. It exposes a cookie-authenticated
//! REST API for managing employees, roles, permissions and departments, together with the
//! login, refresh and password-reset flows that guard it.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer.
//! Persistence goes through the [`db::Store`] trait, backed either by PostgreSQL (via `sqlx`)
//! or by an in-process store used for local development and tests.
//!
//! ### Request Flow
//!
//! Requests to `/auth/*` handle credentials: login issues an access and a refresh token as
//! `HttpOnly` cookies, and the refresh token is bound to a single stored session per employee.
//!
//! Requests to `/api/v1/*` first pass through [`auth::middleware::authenticate`]. It accepts a
//! valid access cookie, or falls back to the refresh cookie and reissues the access cookie on
//! the way out. Handlers then authorize with [`auth::authorization::RequiresRole`], which
//! compares the caller's role against a fixed policy and, for Department Managers, the
//! department named in the path.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) holds the request/response models and the handlers.
//!
//! The **integrity layer** ([`integrity`]) keeps the denormalized membership lists stored on
//! roles and departments in step with the employee records, and can reconcile them when they
//! drift.
//!
//! The **audit trail** ([`audit`]) records every mutation with the acting employee, and is
//! readable through the API.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use iamctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = iamctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     iamctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod integrity;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{self, HeaderValue},
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use bon::Builder;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers::{audit_logs, auth as auth_handlers, departments, integrity as integrity_handlers, permissions, roles, users},
    audit::AuditRecorder,
    auth::{
        middleware::authenticate,
        password::{self, Argon2Params},
    },
    config::{CorsOrigin, DatabaseConfig},
    db::{
        Store,
        memory::MemoryStore,
        models::{
            departments::DepartmentCreateDBRequest,
            roles::RoleCreateDBRequest,
            users::{UserCreateDBRequest, UserUpdateDBRequest},
        },
        postgres::PostgresStore,
    },
    email::{CredentialContext, EmailService},
    integrity::{Integrity, run_reconciliation_loop},
    openapi::ApiDoc,
    types::roles as role_names,
};

pub use config::Config;
pub use types::{AuditLogId, DepartmentId, EmployeeId, PermissionId, RoleId};

/// Application state shared across all request handlers.
///
/// Everything here is cheap to clone: the store and mail service sit behind `Arc`, and
/// [`Integrity`] and [`AuditRecorder`] are thin handles over the same store.
#[derive(Clone, Builder)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub integrity: Integrity,
    pub audit: AuditRecorder,
    pub email: Arc<EmailService>,
}

impl AppState {
    /// Wire every component onto a single store.
    pub fn from_store(config: Config, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let email = EmailService::new(&config).context("Failed to create email service")?;
        Ok(AppState::builder()
            .integrity(Integrity::new(store.clone()))
            .audit(AuditRecorder::new(store.clone()))
            .email(Arc::new(email))
            .store(store)
            .config(config)
            .build())
    }
}

/// Create the built-in roles, the bootstrap department and the initial Super Admin.
///
/// Safe to run on every startup: existing records are left alone, except that a configured
/// bootstrap password is re-applied when it no longer matches.
#[instrument(skip_all, err)]
pub async fn seed(state: &AppState) -> anyhow::Result<()> {
    let store = state.store.as_ref();

    for name in role_names::BUILTIN {
        if store.get_role_by_name(name).await?.is_none() {
            store
                .create_role(&RoleCreateDBRequest {
                    name: name.to_string(),
                    description: format!("Built-in {name} role"),
                    permissions: vec![],
                })
                .await?;
            debug!(role = name, "Seeded built-in role");
        }
    }

    let bootstrap = &state.config.bootstrap;
    let department = match store.get_department_by_name(&bootstrap.department).await? {
        Some(department) => department,
        None => {
            store
                .create_department(&DepartmentCreateDBRequest {
                    name: bootstrap.department.clone(),
                    description: format!("{} department", bootstrap.department),
                })
                .await?
        }
    };

    let argon2 = Argon2Params::from(&state.config.auth.password);

    if let Some(existing) = store.get_user_by_email(&bootstrap.admin_email).await? {
        if let Some(configured) = bootstrap.admin_password.as_deref()
            && !password::verify_password(configured, &existing.password_hash).await?
        {
            let hash = password::hash_password(configured, argon2).await?;
            store
                .update_user(
                    existing.id,
                    &UserUpdateDBRequest {
                        password_hash: Some(hash),
                        ..Default::default()
                    },
                )
                .await?;
            info!("Bootstrap Super Admin password updated from configuration");
        }
        return Ok(());
    }

    let role = store
        .get_role_by_name(role_names::SUPER_ADMIN)
        .await?
        .context("Super Admin role missing after seeding")?;

    let (initial_password, generated) = match bootstrap.admin_password.clone() {
        Some(configured) => (configured, false),
        None => {
            let length = state.config.auth.password.generated_length.max(state.config.auth.password.min_length);
            (password::generate_password(length), true)
        }
    };

    let user = store
        .create_user(&UserCreateDBRequest {
            first_name: bootstrap.admin_first_name.clone(),
            last_name: bootstrap.admin_last_name.clone(),
            email: bootstrap.admin_email.clone(),
            role: role.name.clone(),
            role_id: role.id,
            department: department.name.clone(),
            department_id: department.id,
            password_hash: password::hash_password(&initial_password, argon2).await?,
        })
        .await?;
    state.integrity.attach(&user).await?;
    info!(emp_id = %user.id, "Bootstrap Super Admin created");

    if generated {
        let context = CredentialContext {
            name: user.full_name(),
            username: user.username.clone(),
            password: initial_password,
            role: role.name,
            department: department.name,
        };
        if let Err(e) = state.email.send_credential_email(&user.email, &context).await {
            warn!(error = %e, "Failed to deliver bootstrap credentials; use the password reset flow");
        }
    }

    Ok(())
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PUT, http::Method::DELETE])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.cors.allow_credentials);

    if let Some(max_age) = config.auth.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

async fn healthz(State(state): State<AppState>) -> errors::Result<&'static str> {
    state.store.ping().await?;
    Ok("OK")
}

/// Build the application router.
///
/// - `/auth/*`: login, refresh and password reset are public; logout, profile and password
///   change require authentication
/// - `/api/v1/*`: the directory, behind [`authenticate`]
/// - `/healthz` and the API reference at `/docs`
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let public_auth = Router::new()
        .route("/login", post(auth_handlers::login))
        .route("/refresh", post(auth_handlers::refresh))
        .route("/forgot-password", post(auth_handlers::forgot_password))
        .route("/reset-password", put(auth_handlers::reset_password));

    let protected_auth = Router::new()
        .route("/logout", post(auth_handlers::logout))
        .route("/me", get(auth_handlers::me))
        .route("/change-password", post(auth_handlers::change_password))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let directory = Router::new()
        // Employees
        .route("/users", post(users::create_employee))
        .route("/users/search", post(users::search_employees))
        .route(
            "/users/{emp_id}",
            get(users::get_employee).put(users::update_employee).delete(users::delete_employee),
        )
        // Roles
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route("/roles/search", post(roles::search_roles))
        .route(
            "/roles/{role_id}",
            get(roles::get_role).put(roles::update_role).delete(roles::delete_role),
        )
        // Permissions
        .route("/permissions", get(permissions::list_permissions).post(permissions::create_permission))
        .route("/permissions/search", post(permissions::search_permissions))
        .route(
            "/permissions/{perm_id}",
            get(permissions::get_permission)
                .put(permissions::update_permission)
                .delete(permissions::delete_permission),
        )
        // Departments and their employees
        .route("/departments", get(departments::list_departments).post(departments::create_department))
        .route("/departments/search", post(departments::search_departments))
        .route(
            "/departments/{dep_id}",
            get(departments::get_department)
                .put(departments::update_department)
                .delete(departments::delete_department),
        )
        .route(
            "/departments/{dep_id}/emp",
            get(departments::list_department_employees).post(departments::create_department_employee),
        )
        .route(
            "/departments/{dep_id}/emp/{emp_id}",
            get(departments::get_department_employee)
                .put(departments::update_department_employee)
                .delete(departments::delete_department_employee),
        )
        // Audit and maintenance
        .route("/audit-logs/search", post(audit_logs::search_audit_logs))
        .route("/audit-logs/{log_id}", get(audit_logs::get_audit_log))
        .route("/integrity/reconcile", post(integrity_handlers::reconcile))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let cors = create_cors_layer(&state.config)?;

    let router = Router::new()
        .nest("/auth", public_auth.merge(protected_auth))
        .nest("/api/v1", directory)
        .route("/healthz", get(healthz))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct that owns the router and the background tasks.
///
/// ```no_run
/// # use iamctl::{Application, Config};
/// # async fn example(config: Config) -> anyhow::Result<()> {
/// let app = Application::new(config).await?;
/// app.serve(async { let _ = tokio::signal::ctrl_c().await; }).await?;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    shutdown_token: CancellationToken,
    background_tasks: Vec<JoinHandle<()>>,
}

impl Application {
    /// Connect to the configured store, seed it and start background tasks.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match &config.database {
            DatabaseConfig::Memory => {
                warn!("Using the in-memory store; all data is lost on shutdown");
                Arc::new(MemoryStore::new())
            }
            DatabaseConfig::Postgres { url, pool } => {
                Arc::new(PostgresStore::connect(url, pool).await.context("Failed to connect to PostgreSQL")?)
            }
        };
        Self::with_store(config, store).await
    }

    /// Build the application on an existing store.
    pub async fn with_store(config: Config, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let app_state = AppState::from_store(config.clone(), store)?;
        seed(&app_state).await?;

        let shutdown_token = CancellationToken::new();
        let mut background_tasks = Vec::new();
        if config.reconciliation.enabled {
            info!(interval = ?config.reconciliation.interval, "Starting membership reconciliation");
            background_tasks.push(tokio::spawn(run_reconciliation_loop(
                app_state.integrity.clone(),
                app_state.audit.clone(),
                config.reconciliation.interval,
                shutdown_token.clone(),
            )));
        }

        let router = build_router(app_state.clone())?;

        Ok(Self {
            router,
            app_state,
            config,
            shutdown_token,
            background_tasks,
        })
    }

    /// Shared state, for callers that need to reach the store directly.
    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "IAM control plane listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
