//! REST API client module for the nutritrack server.
//!
//! This module provides the `AuthClient` for logging in, making
//! authenticated requests with transparent token refresh, and logging out.
//!
//! The server issues a JWT access/refresh token pair through the `/login`
//! endpoint; expired access tokens are renewed through `/auth/refresh`.

pub mod client;
pub mod error;

pub use client::{AuthClient, AuthClientBuilder};
pub use error::AuthError;
