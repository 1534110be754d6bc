#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Core functionality of AuthKit: federated authentication-state
//! reconciliation for mobile apps.
//!
//! The SDK reconciles three external signal sources (the identity backend's
//! change stream, Apple credential-state queries, and Google silent restore)
//! into one published [`AuthState`], and sequences sign-in, credential
//! linking, re-authentication, revocation, and account deletion against an
//! injected [`IdentityGateway`]. The identity backend and both platform
//! sign-in flows are opaque collaborators supplied by the host app.

mod apple;
pub use apple::*;

mod controller;
pub use controller::*;

mod defaults;
pub use defaults::*;

mod error;
pub use error::*;

mod gateway;
pub use gateway::*;

mod google;
pub use google::*;

mod logger;
pub use logger::*;

mod nonce;
pub use nonce::*;

mod types;
pub use types::*;

uniffi::setup_scaffolding!("authkit_core");
