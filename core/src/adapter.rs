//! Remote access adapter: typed async operations over a `Transport`.
//!
//! Each call builds its request with `ApiClient`, hands it to the transport,
//! and parses the answer. No retries, no caching, no timeouts.

use tracing::{debug, info};

use crate::client::ApiClient;
use crate::credentials::CredentialProvider;
use crate::error::{ApiError, ApiResult};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{AuthResponse, LoginRequest, RegisterRequest, Task, UpdateTask, User};

#[derive(Debug, Clone)]
pub struct RemoteAdapter<T> {
    client: ApiClient,
    transport: T,
}

impl RemoteAdapter<ReqwestTransport> {
    pub fn over_http(base_url: &str, credentials: impl CredentialProvider + 'static) -> Self {
        Self::new(ApiClient::new(base_url, credentials), ReqwestTransport::new())
    }
}

impl<T: Transport> RemoteAdapter<T> {
    pub fn new(client: ApiClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn send(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        self.transport
            .execute(request)
            .await
            .map_err(ApiError::Network)
    }

    pub async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        let response = self.send(self.client.build_list_tasks()).await?;
        self.client.parse_list_tasks(response)
    }

    pub async fn create_task(&self, title: &str) -> ApiResult<Task> {
        let response = self.send(self.client.build_create_task(title)?).await?;
        self.client.parse_task(response)
    }

    pub async fn update_task(&self, id: &str, changes: &UpdateTask) -> ApiResult<Task> {
        let response = self.send(self.client.build_update_task(id, changes)?).await?;
        self.client.parse_task(response)
    }

    pub async fn delete_task(&self, id: &str) -> ApiResult<()> {
        let response = self.send(self.client.build_delete_task(id)).await?;
        self.client.parse_delete_task(response)
    }

    pub async fn current_user(&self) -> ApiResult<User> {
        let response = self.send(self.client.build_current_user()).await?;
        self.client.parse_current_user(response)
    }

    /// Create an account. Does not touch the stored credential.
    pub async fn register(&self, input: &RegisterRequest) -> ApiResult<AuthResponse> {
        let response = self.send(self.client.build_register(input)?).await?;
        self.client.parse_auth(response)
    }

    /// Exchange email and password for a token. Does not touch the stored
    /// credential.
    pub async fn login(&self, input: &LoginRequest) -> ApiResult<AuthResponse> {
        let response = self.send(self.client.build_login(input)?).await?;
        self.client.parse_auth(response)
    }

    // ---- authentication flow ----

    /// `login`, then store the returned token for subsequent calls.
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<User> {
        let auth = self
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.client.credentials().set(&auth.token);
        info!(user = %auth.id, "signed in");
        Ok(auth.user())
    }

    /// `register`, then store the returned token for subsequent calls.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> ApiResult<User> {
        let auth = self
            .register(&RegisterRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.client.credentials().set(&auth.token);
        info!(user = %auth.id, "registered");
        Ok(auth.user())
    }

    pub fn sign_out(&self) {
        self.client.credentials().clear();
        debug!("credential cleared");
    }

    pub fn is_signed_in(&self) -> bool {
        self.client.credentials().token().is_some()
    }
}
