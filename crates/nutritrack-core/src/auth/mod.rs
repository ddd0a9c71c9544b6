//! Token storage for managing the issued token pair.
//!
//! This module provides:
//! - `TokenStore`: the storage abstraction the client writes tokens through
//! - `MemoryTokenStore`: in-process storage, the default and test double
//! - `FileTokenStore`: JSON file persistence in a cache directory
//! - `KeyringTokenStore`: OS-level secure storage via keyring
//!
//! Which backend to use (and therefore whether tokens survive a restart)
//! is the integrating application's choice.

pub mod store;

pub use store::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, StoreError, TokenKey, TokenStore,
};
