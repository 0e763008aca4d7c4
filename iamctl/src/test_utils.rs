//! Test utilities: an in-memory application, seeding helpers and cookie sessions.

use std::{path::PathBuf, sync::Arc, sync::OnceLock};

use axum_test::TestServer;
use chrono::Utc;

use crate::{
    AppState, Application,
    auth::{
        password::{self, Argon2Params},
        tokens,
    },
    config::{Config, EmailTransportConfig},
    db::{
        DepartmentStore, PermissionStore, ResetTokenStore, RoleStore, UserStore,
        memory::MemoryStore,
        models::{
            PermissionRef,
            departments::{DepartmentCreateDBRequest, DepartmentDBResponse},
            permissions::{PermissionCreateDBRequest, PermissionDBResponse},
            reset_tokens::ResetTokenCreateDBRequest,
            roles::{RoleCreateDBRequest, RoleDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    integrity::Integrity,
};

/// Password given to every seeded employee.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Department seeded employees land in unless told otherwise. Same as the bootstrap department.
pub const TEST_DEPARTMENT: &str = "Administration";

/// Per-process directory the file mail transport writes to.
pub fn test_mail_dir() -> PathBuf {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("iamctl-test-emails-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("Failed to create test mail directory");
        dir
    })
    .clone()
}

/// Low-cost argon2 parameters for tests
pub fn test_argon2_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 128,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;

    config.auth.tokens.access_secret = Some("test-access-secret-for-testing-only".to_string());
    config.auth.tokens.refresh_secret = Some("test-refresh-secret-for-testing-only".to_string());

    let argon2 = test_argon2_params();
    config.auth.password.argon2_memory_kib = argon2.memory_kib;
    config.auth.password.argon2_iterations = argon2.iterations;
    config.auth.password.argon2_parallelism = argon2.parallelism;

    config.email.transport = EmailTransportConfig::File {
        path: test_mail_dir().to_string_lossy().into_owned(),
    };

    config.bootstrap.admin_email = "bootstrap@example.com".to_string();
    config.bootstrap.admin_password = Some("bootstrap-password".to_string());
    config.bootstrap.department = TEST_DEPARTMENT.to_string();

    config
}

/// Seeded state over a fresh in-memory store.
pub async fn create_test_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::from_store(create_test_config(), store.clone()).expect("Failed to build test state");
    crate::seed(&state).await.expect("Failed to seed test state");
    (state, store)
}

pub async fn create_test_app() -> (TestServer, Arc<MemoryStore>) {
    create_test_app_with_config(create_test_config()).await
}

pub async fn create_test_app_with_config(config: Config) -> (TestServer, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let app = Application::with_store(config, store.clone())
        .await
        .expect("Failed to create application");
    (app.into_test_server(), store)
}

pub async fn seed_department(store: &Arc<MemoryStore>, name: &str) -> DepartmentDBResponse {
    store
        .create_department(&DepartmentCreateDBRequest {
            name: name.to_string(),
            description: format!("{name} department"),
        })
        .await
        .expect("Failed to seed department")
}

pub async fn seed_permission(store: &Arc<MemoryStore>, name: &str) -> PermissionDBResponse {
    store
        .create_permission(&PermissionCreateDBRequest {
            name: name.to_string(),
            description: format!("Allows {name}"),
        })
        .await
        .expect("Failed to seed permission")
}

pub async fn seed_role(store: &Arc<MemoryStore>, name: &str, permissions: &[&PermissionDBResponse]) -> RoleDBResponse {
    store
        .create_role(&RoleCreateDBRequest {
            name: name.to_string(),
            description: format!("{name} role"),
            permissions: permissions
                .iter()
                .map(|p| PermissionRef {
                    permission_id: p.id,
                    permission_name: p.name.clone(),
                })
                .collect(),
        })
        .await
        .expect("Failed to seed role")
}

async fn insert_employee(
    store: &Arc<MemoryStore>,
    email: &str,
    role_name: &str,
    department: &DepartmentDBResponse,
    password: &str,
) -> UserDBResponse {
    let role = store
        .get_role_by_name(role_name)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("role {role_name} is not seeded"));
    let local = email.split('@').next().unwrap_or(email);

    let user = store
        .create_user(&UserCreateDBRequest {
            first_name: "Test".to_string(),
            last_name: local.to_string(),
            email: email.to_string(),
            role: role.name.clone(),
            role_id: role.id,
            department: department.name.clone(),
            department_id: department.id,
            password_hash: password::hash_string_with_params(password, test_argon2_params()).unwrap(),
        })
        .await
        .expect("Failed to seed employee");
    Integrity::new(store.clone()).attach(&user).await.expect("Failed to attach employee");
    user
}

async fn test_department(store: &Arc<MemoryStore>) -> DepartmentDBResponse {
    match store.get_department_by_name(TEST_DEPARTMENT).await.unwrap() {
        Some(department) => department,
        None => seed_department(store, TEST_DEPARTMENT).await,
    }
}

/// Employee in [`TEST_DEPARTMENT`] with [`TEST_PASSWORD`], attached to its role and department.
pub async fn seed_employee(store: &Arc<MemoryStore>, email: &str, role: &str) -> UserDBResponse {
    seed_employee_with_password(store, email, role, TEST_PASSWORD).await
}

pub async fn seed_employee_with_password(store: &Arc<MemoryStore>, email: &str, role: &str, password: &str) -> UserDBResponse {
    let department = test_department(store).await;
    insert_employee(store, email, role, &department, password).await
}

pub async fn seed_employee_in(store: &Arc<MemoryStore>, email: &str, role: &str, department: &DepartmentDBResponse) -> UserDBResponse {
    insert_employee(store, email, role, department, TEST_PASSWORD).await
}

/// Cookies captured from a login response.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub access: String,
    pub refresh: String,
}

impl TestSession {
    /// `Cookie` header value carrying both tokens
    pub fn header(&self) -> String {
        format!("{}; {}", self.access, self.refresh)
    }

    pub fn access_only(&self) -> String {
        self.access.clone()
    }

    pub fn refresh_only(&self) -> String {
        self.refresh.clone()
    }
}

/// Log in through the API and keep the issued cookies.
pub async fn login(server: &TestServer, username: &str, password: &str) -> TestSession {
    let response = server
        .post("/auth/login")
        .json(&serde_json::json!({"username": username, "password": password}))
        .await;
    response.assert_status_ok();

    let mut access = None;
    let mut refresh = None;
    for value in response.headers().get_all("set-cookie") {
        let pair = value.to_str().unwrap().split(';').next().unwrap().trim().to_string();
        if pair.starts_with("accessToken=") {
            access = Some(pair);
        } else if pair.starts_with("refreshToken=") {
            refresh = Some(pair);
        }
    }

    TestSession {
        access: access.expect("login did not set the access cookie"),
        refresh: refresh.expect("login did not set the refresh cookie"),
    }
}

pub async fn login_as(server: &TestServer, store: &Arc<MemoryStore>, email: &str, role: &str) -> (UserDBResponse, TestSession) {
    let user = seed_employee(store, email, role).await;
    let session = login(server, email, TEST_PASSWORD).await;
    (user, session)
}

pub async fn login_as_in(
    server: &TestServer,
    store: &Arc<MemoryStore>,
    email: &str,
    role: &str,
    department: &DepartmentDBResponse,
) -> (UserDBResponse, TestSession) {
    let user = seed_employee_in(store, email, role, department).await;
    let session = login(server, email, TEST_PASSWORD).await;
    (user, session)
}

/// Store a reset token for `email` expiring after `ttl` (negative for an already expired one)
/// and return the raw token.
pub async fn store_reset_token(store: &Arc<MemoryStore>, email: &str, ttl: chrono::Duration) -> String {
    let token = password::generate_reset_token();
    store
        .create_reset_token(&ResetTokenCreateDBRequest {
            email: email.to_string(),
            token_digest: tokens::token_digest(&token),
            expires_at: Utc::now() + ttl,
        })
        .await
        .expect("Failed to store reset token");
    token
}
