//! Core library for the nutritrack client.
//!
//! This crate provides the `AuthClient` for talking to a nutritrack API
//! server: login with email/password, authenticated GET requests with
//! transparent token refresh, and local logout.
//!
//! The API uses JWT bearer token authentication. The server issues an
//! access/refresh token pair on login; expired access tokens are renewed
//! through the `/auth/refresh` endpoint.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{AuthClient, AuthError};
pub use auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, StoreError, TokenKey, TokenStore};
pub use config::Config;
pub use models::{LoginOutcome, TokenPair, User};
