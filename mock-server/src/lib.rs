use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

pub const MAX_TITLE_LEN: usize = 500;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Deserialize)]
pub struct CreateTask {
    #[serde(default)]
    pub title: String,
}

#[derive(Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Debug)]
struct Account {
    user: PublicUser,
    password: String,
}

#[derive(Debug, Default)]
pub struct Store {
    accounts: Vec<Account>,
    /// token -> user id
    sessions: HashMap<String, String>,
    /// oldest first
    tasks: Vec<Task>,
}

pub type Db = Arc<RwLock<Store>>;

/// Non-2xx answer carrying `{ "message": ... }`.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    message: String,
}

impl Failure {
    fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Task not found")
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// Id of the user behind the request's bearer token.
pub struct AuthUser(pub String);

impl FromRequestParts<Db> for AuthUser {
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, db: &Db) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "Not authorized, no token"))?;

        let store = db.read().await;
        store
            .sessions
            .get(token)
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "Not authorized, token failed"))
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/todos", get(list_tasks).post(create_task))
        .route("/api/todos/{id}", put(update_task).delete(delete_task))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn check_title(raw: &str) -> Result<String, Failure> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(Failure::new(StatusCode::BAD_REQUEST, "Title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Failure::new(
            StatusCode::BAD_REQUEST,
            "Title cannot exceed 500 characters",
        ));
    }
    Ok(title.to_string())
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn start_session(store: &mut Store, user: &PublicUser) -> AuthResponse {
    let token = Uuid::new_v4().to_string();
    store.sessions.insert(token.clone(), user.id.clone());
    AuthResponse {
        token,
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
    }
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), Failure> {
    let name = input.name.trim();
    let email = input.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || input.password.is_empty() {
        return Err(Failure::new(
            StatusCode::BAD_REQUEST,
            "Please provide name, email and password",
        ));
    }

    let mut store = db.write().await;
    if store.accounts.iter().any(|a| a.user.email == email) {
        return Err(Failure::new(StatusCode::BAD_REQUEST, "User already exists"));
    }
    let user = PublicUser {
        id: new_id(),
        name: name.to_string(),
        email,
    };
    store.accounts.push(Account {
        user: user.clone(),
        password: input.password,
    });
    info!(user = %user.id, "registered");
    let auth = start_session(&mut store, &user);
    Ok((StatusCode::CREATED, Json(auth)))
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, Failure> {
    let email = input.email.trim().to_lowercase();
    let mut store = db.write().await;
    let user = store
        .accounts
        .iter()
        .find(|a| a.user.email == email && a.password == input.password)
        .map(|a| a.user.clone())
        .ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;
    Ok(Json(start_session(&mut store, &user)))
}

async fn me(State(db): State<Db>, AuthUser(user_id): AuthUser) -> Result<Json<PublicUser>, Failure> {
    let store = db.read().await;
    store
        .accounts
        .iter()
        .find(|a| a.user.id == user_id)
        .map(|a| Json(a.user.clone()))
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "User not found"))
}

/// Newest first.
async fn list_tasks(State(db): State<Db>, AuthUser(user_id): AuthUser) -> Json<Vec<Task>> {
    let store = db.read().await;
    Json(
        store
            .tasks
            .iter()
            .rev()
            .filter(|t| t.user == user_id)
            .cloned()
            .collect(),
    )
}

async fn create_task(
    State(db): State<Db>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), Failure> {
    let title = check_title(&input.title)?;
    let now = Utc::now();
    let task = Task {
        id: new_id(),
        title,
        completed: false,
        user: user_id,
        created_at: now,
        updated_at: now,
    };
    db.write().await.tasks.push(task.clone());
    debug!(id = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(db): State<Db>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateTask>,
) -> Result<Json<Task>, Failure> {
    let title = input.title.as_deref().map(check_title).transpose()?;
    let mut store = db.write().await;
    let task = store
        .tasks
        .iter_mut()
        .find(|t| t.id == id && t.user == user_id)
        .ok_or_else(Failure::not_found)?;
    if let Some(title) = title {
        task.title = title;
    }
    if let Some(completed) = input.completed {
        task.completed = completed;
    }
    task.updated_at = Utc::now();
    Ok(Json(task.clone()))
}

async fn delete_task(
    State(db): State<Db>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, Failure> {
    let mut store = db.write().await;
    let index = store
        .tasks
        .iter()
        .position(|t| t.id == id && t.user == user_id)
        .ok_or_else(Failure::not_found)?;
    store.tasks.remove(index);
    debug!(id = %id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}
