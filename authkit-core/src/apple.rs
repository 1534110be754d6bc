//! Sign in with Apple: the request/response handshake with the platform
//! authorization UI.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::defaults::NONCE_LENGTH;
use crate::error::AuthError;
use crate::nonce::Nonce;
use crate::types::{ProviderCredential, ProviderId};

/// Scopes requested from the Apple authorization UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum AppleScope {
    /// The user's full name.
    FullName,
    /// The user's email address.
    Email,
}

/// One authorization request handed to the platform.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AppleAuthRequest {
    /// Correlates platform callbacks with the issuing flow in logs.
    pub request_id: String,
    /// SHA-256 hex digest of the raw nonce bound to this request. The raw
    /// value never leaves the SDK.
    pub hashed_nonce: String,
    /// Scopes the UI should request.
    pub scopes: Vec<AppleScope>,
}

/// Payload of a completed Apple authorization.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AppleAuthorization {
    /// Apple's stable user id for this app.
    pub user_id: String,
    /// Signed identity token (JWT) to exchange with the backend.
    pub identity_token: String,
    /// Short-lived code for server-side token revocation, when present.
    pub authorization_code: Option<String>,
    /// Full name, only delivered on the first authorization.
    pub full_name: Option<String>,
    /// Email, only delivered on the first authorization.
    pub email: Option<String>,
}

/// Validity of a previously issued Apple credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum AppleCredentialState {
    /// The credential is still authorized.
    Authorized,
    /// The user revoked the app's authorization.
    Revoked,
    /// Apple has no credential on record for the queried id.
    NotFound,
}

type AppleAuthResult = Result<AppleAuthorization, AuthError>;

/// Single-shot resolution point for one in-flight authorization request.
///
/// Each [`AppleAuthCoordinator::request_authorization`] call creates its own
/// responder, so overlapping requests cannot clobber each other. The first
/// resolution wins; later calls are logged and dropped, never undefined
/// behavior.
#[derive(uniffi::Object)]
pub struct AppleAuthResponder {
    request_id: String,
    tx: Mutex<Option<oneshot::Sender<AppleAuthResult>>>,
}

#[uniffi::export]
impl AppleAuthResponder {
    /// Resolves the pending request with a completed authorization.
    pub fn authorized(&self, authorization: AppleAuthorization) {
        self.finish(Ok(authorization));
    }

    /// Resolves the pending request with the platform failure `reason`.
    pub fn failed(&self, reason: String) {
        self.finish(Err(AuthError::Credential {
            provider: ProviderId::Apple,
            reason,
        }));
    }
}

impl AppleAuthResponder {
    fn pair(request_id: String) -> (Arc<Self>, oneshot::Receiver<AppleAuthResult>) {
        let (tx, rx) = oneshot::channel();
        let responder = Arc::new(Self {
            request_id,
            tx: Mutex::new(Some(tx)),
        });
        (responder, rx)
    }

    fn finish(&self, result: AppleAuthResult) {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            warn!(
                "apple authorization {} already resolved, dropping duplicate resolution",
                self.request_id
            );
            return;
        };
        if sender.send(result).is_err() {
            warn!(
                "apple authorization {} resolved after the caller stopped waiting",
                self.request_id
            );
        }
    }
}

/// Platform half of the Apple sign-in flow, implemented by the host app.
#[uniffi::export(with_foreign)]
#[async_trait]
pub trait ApplePlatform: Send + Sync {
    /// Starts the platform authorization UI for `request`.
    ///
    /// The platform must eventually resolve `responder` exactly once, from
    /// whatever thread its delegate callbacks arrive on.
    fn perform_authorization(
        &self,
        request: AppleAuthRequest,
        responder: Arc<AppleAuthResponder>,
    );

    /// Queries the validity of the credential issued to `provider_user_id`.
    async fn credential_state(
        &self,
        provider_user_id: String,
    ) -> Result<AppleCredentialState, AuthError>;
}

/// Drives the Apple handshake and shapes the result into a backend credential.
#[derive(uniffi::Object)]
pub struct AppleAuthCoordinator {
    platform: Arc<dyn ApplePlatform>,
}

#[uniffi::export(async_runtime = "tokio")]
impl AppleAuthCoordinator {
    /// Creates a coordinator over the platform implementation.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(platform: Arc<dyn ApplePlatform>) -> Self {
        Self { platform }
    }

    /// Runs one full authorization flow and returns the resulting credential.
    ///
    /// A fresh nonce is generated per request; its hashed form rides on the
    /// platform request and its raw form is carried in the returned
    /// credential for the backend exchange.
    ///
    /// # Errors
    /// [`AuthError::Entropy`] if nonce generation fails, otherwise
    /// [`AuthError::Credential`] carrying the platform failure, including the
    /// case where the request is dropped without ever being resolved.
    pub async fn request_authorization(&self) -> Result<ProviderCredential, AuthError> {
        let nonce = Nonce::generate(NONCE_LENGTH)?;
        let (raw_nonce, hashed_nonce) = nonce.into_parts();

        let request_id = Uuid::new_v4().to_string();
        let (responder, resolution) = AppleAuthResponder::pair(request_id.clone());
        let request = AppleAuthRequest {
            request_id: request_id.clone(),
            hashed_nonce,
            scopes: vec![AppleScope::FullName, AppleScope::Email],
        };

        debug!("issuing apple authorization request {request_id}");
        self.platform.perform_authorization(request, responder);

        let authorization = resolution.await.map_err(|_| AuthError::Credential {
            provider: ProviderId::Apple,
            reason: "authorization request was abandoned without a resolution".to_owned(),
        })??;

        Ok(ProviderCredential {
            provider: ProviderId::Apple,
            id_token: authorization.identity_token,
            access_token: None,
            authorization_code: authorization.authorization_code,
            raw_nonce: Some(raw_nonce),
        })
    }

    /// Queries the validity of the credential issued to `provider_user_id`.
    ///
    /// # Errors
    /// Surfaces the platform error unmodified.
    pub async fn credential_state(
        &self,
        provider_user_id: String,
    ) -> Result<AppleCredentialState, AuthError> {
        self.platform.credential_state(provider_user_id).await
    }
}
