//! Boundary to the remote identity backend.
//!
//! The backend is an opaque collaborator: the host app supplies an
//! [`IdentityGateway`] implementation over FFI (or a native Rust one in
//! tests) and the controller drives every account operation through it. One
//! inbound change stream (gateway to [`IdentityListener`]) and one outbound
//! state stream (controller to its observers) keep transport separate from
//! policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::AuthError;
use crate::types::{ProviderCredential, UserRecord};

/// Reasons the backend may refuse to link a credential that are recoverable
/// by signing in with that credential instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum, strum::Display)]
pub enum LinkConflictReason {
    /// The credential is already associated with a different identity.
    #[strum(serialize = "credential-already-in-use")]
    CredentialAlreadyInUse,
    /// The credential's email already belongs to a different identity.
    #[strum(serialize = "email-already-in-use")]
    EmailAlreadyInUse,
    /// The provider is already linked to the current identity.
    #[strum(serialize = "provider-already-linked")]
    ProviderAlreadyLinked,
}

/// Failures reported by the identity backend.
#[derive(Debug, Error, uniffi::Error)]
pub enum GatewayError {
    /// A link attempt hit a recoverable conflict. The backend may attach an
    /// updated credential usable for a sign-in retry; today only the Apple
    /// provider ever populates it.
    #[error("link_conflict: {reason}")]
    LinkConflict {
        /// What the conflict was.
        reason: LinkConflictReason,
        /// Backend-supplied replacement credential, when available.
        updated_credential: Option<ProviderCredential>,
    },

    /// Any other backend failure.
    #[error("remote_error[{code}]: {message}")]
    Remote {
        /// Machine-readable backend error code.
        code: String,
        /// Human-readable backend message.
        message: String,
    },

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {reason}")]
    UnexpectedCallback {
        /// Reason reported by the bindings layer.
        reason: String,
    },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for GatewayError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedCallback {
            reason: error.reason,
        }
    }
}

impl From<GatewayError> for AuthError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::LinkConflict { reason, .. } => Self::Backend {
                code: "link_conflict".to_owned(),
                message: reason.to_string(),
            },
            GatewayError::Remote { code, message } => Self::Backend { code, message },
            GatewayError::UnexpectedCallback { reason } => Self::Backend {
                code: "unexpected_callback".to_owned(),
                message: reason,
            },
        }
    }
}

/// Receives identity-change notifications from the backend.
///
/// Implemented by the SDK and handed to [`IdentityGateway::subscribe`]. Each
/// notification carries the full current record (or `None` when signed out)
/// and is the single source of truth for the cached identity.
#[uniffi::export(with_foreign)]
pub trait IdentityListener: Send + Sync {
    /// Delivers the backend's current identity.
    fn identity_changed(&self, user: Option<UserRecord>);
}

/// Operations of the remote identity backend.
///
/// Errors carry a machine-readable distinction between the recoverable link
/// conflict and everything else; see [`GatewayError`].
#[uniffi::export(with_foreign)]
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Opens a subscription to the identity-change stream.
    ///
    /// The gateway must deliver the current identity to `listener`
    /// synchronously before returning, then again after every change, in
    /// order, never concurrently. Returns an opaque token for
    /// [`IdentityGateway::unsubscribe`].
    fn subscribe(&self, listener: Arc<dyn IdentityListener>) -> u64;

    /// Closes a subscription opened with [`IdentityGateway::subscribe`].
    /// Unknown tokens are ignored.
    fn unsubscribe(&self, token: u64);

    /// Establishes an identity from `credential` alone.
    async fn sign_in(
        &self,
        credential: ProviderCredential,
    ) -> Result<UserRecord, GatewayError>;

    /// Creates a fresh anonymous identity.
    async fn sign_in_anonymously(&self) -> Result<UserRecord, GatewayError>;

    /// Attaches `credential` to the identity `uid` as an additional login
    /// method.
    async fn link(
        &self,
        uid: String,
        credential: ProviderCredential,
    ) -> Result<UserRecord, GatewayError>;

    /// Re-proves ownership of the identity `uid` with a fresh credential.
    async fn reauthenticate(
        &self,
        uid: String,
        credential: ProviderCredential,
    ) -> Result<(), GatewayError>;

    /// Ends the backend session for the identity `uid`.
    async fn sign_out(&self, uid: String) -> Result<(), GatewayError>;

    /// Permanently deletes the identity `uid`.
    async fn delete_account(&self, uid: String) -> Result<(), GatewayError>;

    /// Revokes an Apple authorization code server-side.
    async fn revoke_token(&self, authorization_code: String) -> Result<(), GatewayError>;
}

/// Live handle to one backend subscription.
///
/// Closing is idempotent; dropping the handle closes it.
pub struct SubscriptionHandle {
    gateway: Arc<dyn IdentityGateway>,
    token: u64,
    closed: AtomicBool,
}

impl SubscriptionHandle {
    pub(crate) fn new(gateway: Arc<dyn IdentityGateway>, token: u64) -> Self {
        Self {
            gateway,
            token,
            closed: AtomicBool::new(false),
        }
    }

    /// Closes the subscription. Subsequent calls are no-ops.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.gateway.unsubscribe(self.token);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}
