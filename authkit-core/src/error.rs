use thiserror::Error;

use crate::types::ProviderId;

/// Error outputs from AuthKit.
///
/// The deletion-protocol variants (`ReauthenticateApple`, `ReauthenticateGoogle`,
/// `RevokeAppleId`, `RevokeGoogle`) each name the exact step of
/// account deletion that failed, so the host can pick the right user-facing
/// message and re-drive the flow.
#[derive(Debug, Error, uniffi::Error)]
pub enum AuthError {
    /// The secure random source could not produce bytes for a nonce.
    /// Not retried; treated as unrecoverable.
    #[error("entropy_unavailable: {reason}")]
    Entropy {
        /// Description of the underlying source failure.
        reason: String,
    },

    /// A federated provider failed to produce a credential.
    #[error("credential_error[{provider}]: {reason}")]
    Credential {
        /// Provider whose flow failed.
        provider: ProviderId,
        /// Platform-supplied failure description, passed through unmodified.
        reason: String,
    },

    /// An interactive sign-in flow was requested without a visible host surface.
    #[error("no_presentation_surface")]
    NoPresentationSurface,

    /// The backend rejected re-authentication with a fresh Apple credential.
    #[error("reauthenticate_apple")]
    ReauthenticateApple,

    /// Obtaining a fresh Google credential or re-authenticating with it failed.
    #[error("reauthenticate_google")]
    ReauthenticateGoogle,

    /// Server-side revocation of the Apple authorization code failed.
    #[error("revoke_apple_id")]
    RevokeAppleId,

    /// Revoking the Google authorization (disconnect) failed.
    #[error("revoke_google")]
    RevokeGoogle,

    /// Any other identity-backend failure, surfaced unmodified.
    #[error("backend_error[{code}]: {message}")]
    Backend {
        /// Machine-readable backend error code.
        code: String,
        /// Human-readable backend message.
        message: String,
    },

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {reason}")]
    UnexpectedUniFfiCallback {
        /// Reason reported by the bindings layer.
        reason: String,
    },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for AuthError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFfiCallback {
            reason: error.reason,
        }
    }
}
