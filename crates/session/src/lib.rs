//! StagPower authenticated HTTP session client
//!
//! This crate wraps a `reqwest` client with the session protocol spoken by the
//! StagPower REST API: bearer credentials are attached to every request, tokens
//! rotated by the server are persisted, and an expired access token is refreshed
//! once before the original request is replayed.

#[macro_use]
extern crate tracing;

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod refresh;
pub mod request;
pub mod store;
pub mod types;

pub use client::{SessionClient, SessionClientBuilder};
pub use config::ClientConfig;
pub use error::{ClientError, Result, StoreError};
pub use events::{SessionEvent, SessionEvents};
pub use request::{ApiRequest, RequestInterceptor};
pub use reqwest::{Method, StatusCode};
pub use store::{CredentialPair, FileTokenStore, MemoryTokenStore, Session, TokenStore};
