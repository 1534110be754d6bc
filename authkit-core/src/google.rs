//! Google Sign-In: silent session restore with interactive fallback.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::AuthError;
use crate::types::{ProviderCredential, ProviderId};

/// A previously established Google session restored without UI.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct GoogleSession {
    /// Google's stable user id.
    pub user_id: String,
    /// Email of the signed-in account, when known.
    pub email: Option<String>,
}

/// Token bundle for one Google sign-in.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct GoogleTokens {
    /// Signed identity token (JWT) to exchange with the backend.
    pub id_token: String,
    /// OAuth access token accompanying the identity token.
    pub access_token: String,
}

/// Platform half of the Google sign-in flow, implemented by the host app.
#[uniffi::export(with_foreign)]
#[async_trait]
pub trait GooglePlatform: Send + Sync {
    /// Whether a previous successful sign-in exists locally.
    fn has_previous_sign_in(&self) -> bool;

    /// Restores the previous session without showing UI.
    ///
    /// Fails when the stored grant was revoked externally.
    async fn restore_previous_sign_in(&self) -> Result<GoogleSession, AuthError>;

    /// Refreshes the session's tokens if they are stale and returns them.
    async fn refresh_if_needed(
        &self,
        session: GoogleSession,
    ) -> Result<GoogleTokens, AuthError>;

    /// Runs the interactive sign-in flow.
    ///
    /// Fails with [`AuthError::NoPresentationSurface`] when no visible host
    /// surface is available to present from.
    async fn sign_in_interactive(&self) -> Result<GoogleTokens, AuthError>;

    /// Invalidates the locally cached session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Fully revokes the app's authorization with Google.
    async fn disconnect(&self) -> Result<(), AuthError>;
}

/// Drives the restore-then-interactive Google flow.
#[derive(uniffi::Object)]
pub struct GoogleAuthCoordinator {
    platform: Arc<dyn GooglePlatform>,
}

#[uniffi::export(async_runtime = "tokio")]
impl GoogleAuthCoordinator {
    /// Creates a coordinator over the platform implementation.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(platform: Arc<dyn GooglePlatform>) -> Self {
        Self { platform }
    }

    /// Obtains a Google credential.
    ///
    /// A restorable previous session is refreshed and reused silently; a
    /// failed restore or refresh (the grant was revoked externally) falls
    /// back to the interactive flow, as does the absence of any previous
    /// sign-in.
    ///
    /// # Errors
    /// Surfaces the interactive-flow error unmodified, including
    /// [`AuthError::NoPresentationSurface`].
    pub async fn sign_in(&self) -> Result<ProviderCredential, AuthError> {
        if self.platform.has_previous_sign_in() {
            match self.restore_refreshed().await {
                Ok(tokens) => return Ok(credential_from(tokens)),
                Err(err) => {
                    warn!("silent google sign-in failed, falling back to interactive: {err}");
                }
            }
        } else {
            debug!("no previous google sign-in, starting interactive flow");
        }

        let tokens = self.platform.sign_in_interactive().await?;
        Ok(credential_from(tokens))
    }

    /// Invalidates the locally cached session.
    ///
    /// Best-effort and idempotent: a platform failure is logged, not
    /// surfaced. Backend authorization is left untouched.
    pub async fn sign_out(&self) {
        if let Err(err) = self.platform.sign_out().await {
            warn!("local google sign-out failed: {err}");
        }
    }

    /// Fully revokes the app's authorization with Google. Used only while
    /// deleting the account.
    ///
    /// # Errors
    /// [`AuthError::RevokeGoogle`] on platform failure.
    pub async fn disconnect(&self) -> Result<(), AuthError> {
        self.platform.disconnect().await.map_err(|err| {
            warn!("google disconnect failed: {err}");
            AuthError::RevokeGoogle
        })
    }
}

impl GoogleAuthCoordinator {
    async fn restore_refreshed(&self) -> Result<GoogleTokens, AuthError> {
        let session = self.platform.restore_previous_sign_in().await?;
        self.platform.refresh_if_needed(session).await
    }

    /// Probes whether the stored grant is still silently restorable. Used by
    /// startup verification; never shows UI.
    pub(crate) async fn restore_previous(&self) -> Result<GoogleSession, AuthError> {
        if !self.platform.has_previous_sign_in() {
            return Err(AuthError::Credential {
                provider: ProviderId::Google,
                reason: "no previous google sign-in".to_owned(),
            });
        }
        self.platform.restore_previous_sign_in().await
    }
}

fn credential_from(tokens: GoogleTokens) -> ProviderCredential {
    ProviderCredential {
        provider: ProviderId::Google,
        id_token: tokens.id_token,
        access_token: Some(tokens.access_token),
        authorization_code: None,
        raw_nonce: None,
    }
}
