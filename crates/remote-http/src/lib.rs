//! HTTP remote for the upload engine.
//!
//! Talks to backends that wrap every response in a `{code, message, data}`
//! envelope and accept chunk bodies as raw octet streams.

pub mod client;
pub mod token;

pub use client::{HttpRemote, HttpRemoteError};
pub use token::ClientCredentialsSource;
