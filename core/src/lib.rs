//! Client-side task synchronization for the taskflow API.
//!
//! # Overview
//! Two layers:
//! - the remote access adapter (`ApiClient` + `Transport` = `RemoteAdapter`)
//!   turns typed operations into authenticated HTTP calls and every failure
//!   into an `ApiError`;
//! - `TaskController` owns the task list shown to the user, applies changes
//!   optimistically, and reverts them when the remote call fails.
//!
//! # Design
//! - `ApiClient` is stateless: `build_*` produces plain-data requests and
//!   `parse_*` consumes plain-data responses, so request construction and
//!   error normalization are tested without a network.
//! - The bearer token comes from a `CredentialProvider` handed to the client,
//!   never from ambient storage.
//! - Controller operations come in `begin_*` / `finish` halves so several can
//!   be in flight; the async wrappers chain them for the common case.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod adapter;
pub mod client;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod http;
pub mod state;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::RemoteAdapter;
pub use client::ApiClient;
pub use config::ClientConfig;
pub use controller::{Mutation, OpId, RemoteCall, TaskController};
pub use credentials::{CredentialProvider, FileCredentials, MemoryCredentials};
pub use error::{ApiError, ApiResult, ErrorKind, SyncError, TransportError, ValidationError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use state::{LoadState, Notice, PendingEdit, TaskCounts};
pub use transport::{ReqwestTransport, Transport};
pub use types::{AuthResponse, CreateTask, LoginRequest, RegisterRequest, Task, UpdateTask, User};
