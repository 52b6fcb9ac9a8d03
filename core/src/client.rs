//! Stateless HTTP request builder and response parser for the task API.
//!
//! # Design
//! `ApiClient` holds the `base_url` and a handle to the credential provider;
//! it keeps no state between calls. Each operation is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that consumes
//! an `HttpResponse`. The credential is read at build time, so a token set or
//! cleared between two calls is honoured by the next request.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::credentials::{CredentialProvider, MemoryCredentials};
use crate::error::{ApiError, ApiResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    validate_title, AuthResponse, CreateTask, ErrorBody, LoginRequest, RegisterRequest, Task,
    UpdateTask, User,
};

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, credentials: impl CredentialProvider + 'static) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: Arc::new(credentials),
        }
    }

    /// Client with its own empty in-memory credential slot.
    pub fn anonymous(base_url: &str) -> Self {
        Self::new(base_url, MemoryCredentials::new())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &dyn CredentialProvider {
        self.credentials.as_ref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url)
    }

    fn task_url(&self, id: &str) -> String {
        self.url(&format!("/todos/{}", urlencoding::encode(id)))
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(token) = self.credentials.token() {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    fn request(&self, method: HttpMethod, path: String, body: Option<String>) -> HttpRequest {
        HttpRequest {
            method,
            path,
            headers: self.headers(),
            body,
        }
    }

    fn json_request<B: Serialize>(
        &self,
        method: HttpMethod,
        path: String,
        body: &B,
    ) -> ApiResult<HttpRequest> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        Ok(self.request(method, path, Some(body)))
    }

    // ---- auth ----

    pub fn build_register(&self, input: &RegisterRequest) -> ApiResult<HttpRequest> {
        self.json_request(HttpMethod::Post, self.url("/auth/register"), input)
    }

    pub fn build_login(&self, input: &LoginRequest) -> ApiResult<HttpRequest> {
        self.json_request(HttpMethod::Post, self.url("/auth/login"), input)
    }

    pub fn build_current_user(&self) -> HttpRequest {
        self.request(HttpMethod::Get, self.url("/auth/me"), None)
    }

    pub fn parse_auth(&self, response: HttpResponse) -> ApiResult<AuthResponse> {
        parse_json(response)
    }

    pub fn parse_current_user(&self, response: HttpResponse) -> ApiResult<User> {
        parse_json(response)
    }

    // ---- tasks ----

    pub fn build_list_tasks(&self) -> HttpRequest {
        self.request(HttpMethod::Get, self.url("/todos"), None)
    }

    /// Fails with `ApiError::Validation` for a blank or oversized title.
    pub fn build_create_task(&self, title: &str) -> ApiResult<HttpRequest> {
        let input = CreateTask {
            title: validate_title(title)?,
        };
        self.json_request(HttpMethod::Post, self.url("/todos"), &input)
    }

    /// A `title` in `changes` is validated and sent trimmed.
    pub fn build_update_task(&self, id: &str, changes: &UpdateTask) -> ApiResult<HttpRequest> {
        let changes = UpdateTask {
            title: changes.title.as_deref().map(validate_title).transpose()?,
            completed: changes.completed,
        };
        self.json_request(HttpMethod::Put, self.task_url(id), &changes)
    }

    pub fn build_delete_task(&self, id: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, self.task_url(id), None)
    }

    pub fn parse_list_tasks(&self, response: HttpResponse) -> ApiResult<Vec<Task>> {
        parse_json(response)
    }

    /// Parses the body of a successful create or update.
    pub fn parse_task(&self, response: HttpResponse) -> ApiResult<Task> {
        parse_json(response)
    }

    /// Any body of a successful delete is ignored.
    pub fn parse_delete_task(&self, response: HttpResponse) -> ApiResult<()> {
        check_status(&response)
    }
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> ApiResult<T> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Map a non-2xx response to `ApiError::Remote`, preferring the server's own
/// message over the generic one.
fn check_status(response: &HttpResponse) -> ApiResult<()> {
    if response.is_success() {
        return Ok(());
    }
    let message = serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP error, status {}", response.status));
    Err(ApiError::Remote {
        status: response.status,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const BASE: &str = "http://localhost:3000";

    fn client() -> ApiClient {
        ApiClient::anonymous(BASE)
    }

    const TASK_JSON: &str = r#"{"_id":"t1","title":"New","completed":false,"user":"u1","createdAt":"2024-06-04T10:00:00Z","updatedAt":"2024-06-04T10:00:00Z"}"#;

    #[test]
    fn build_list_tasks_produces_correct_request() {
        let req = client().build_list_tasks();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/api/todos");
        assert!(req.body.is_none());
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn debug_output_does_not_read_the_credential() {
        struct Untouchable;

        impl CredentialProvider for Untouchable {
            fn token(&self) -> Option<String> {
                panic!("token read while formatting");
            }
            fn set(&self, _token: &str) {}
            fn clear(&self) {}
        }

        let rendered = format!("{:?}", ApiClient::new(BASE, Untouchable));
        assert!(rendered.contains(BASE), "{rendered}");
    }

    #[test]
    fn bearer_header_follows_the_credential() {
        let creds = MemoryCredentials::new();
        let client = ApiClient::new(BASE, creds.clone());
        assert_eq!(client.build_list_tasks().header("authorization"), None);

        creds.set("tok-1");
        let req = client.build_delete_task("t1");
        assert_eq!(req.header("authorization"), Some("Bearer tok-1"));
        assert_eq!(req.header("content-type"), Some("application/json"));

        creds.clear();
        assert_eq!(client.build_current_user().header("authorization"), None);
    }

    #[test]
    fn build_create_task_trims_title() {
        let req = client().build_create_task("  Buy milk ").unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/api/todos");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "title": "Buy milk" }));
    }

    #[test]
    fn build_create_task_rejects_blank_title() {
        let err = client().build_create_task("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn build_update_task_sends_only_present_fields() {
        let req = client()
            .build_update_task("t1", &UpdateTask::completed(true))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, "http://localhost:3000/api/todos/t1");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "completed": true }));
    }

    #[test]
    fn task_ids_are_escaped_in_paths() {
        let req = client().build_delete_task("a/b c");
        assert_eq!(req.path, "http://localhost:3000/api/todos/a%2Fb%20c");
    }

    #[test]
    fn auth_requests() {
        let req = client()
            .build_login(&LoginRequest {
                email: "a@b.c".to_string(),
                password: "pw".to_string(),
            })
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/api/auth/login");

        let req = client().build_current_user();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/api/auth/me");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let req = ApiClient::anonymous("http://localhost:3000/").build_list_tasks();
        assert_eq!(req.path, "http://localhost:3000/api/todos");
    }

    #[test]
    fn parse_task_success() {
        let task = client().parse_task(HttpResponse::new(201, TASK_JSON)).unwrap();
        assert_eq!(task.id, "t1");
        assert_eq!(task.title, "New");
    }

    #[test]
    fn parse_list_tasks_bad_json() {
        let err = client()
            .parse_list_tasks(HttpResponse::new(200, "not json"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn non_success_uses_server_message() {
        let err = client()
            .parse_task(HttpResponse::new(400, r#"{"message":"Duplicate"}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::Remote { status: 400, ref message } if message == "Duplicate"));
    }

    #[test]
    fn non_success_without_body_falls_back() {
        let err = client()
            .parse_delete_task(HttpResponse::new(502, "<html>bad gateway</html>"))
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP error, status 502");
    }

    #[test]
    fn delete_ignores_success_body() {
        assert!(client().parse_delete_task(HttpResponse::new(204, "")).is_ok());
        assert!(client()
            .parse_delete_task(HttpResponse::new(200, r#"{"success":true}"#))
            .is_ok());
    }

    #[test]
    fn parse_current_user() {
        let user = client()
            .parse_current_user(HttpResponse::new(
                200,
                r#"{"_id":"u1","name":"Ada","email":"ada@example.com"}"#,
            ))
            .unwrap();
        assert_eq!(user.name, "Ada");
    }
}
