//! Core data model: identities, credentials, and the derived auth state.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::AuthError;

/// A federated identity provider recognized by the SDK.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    uniffi::Enum,
    Display,
    EnumString,
)]
pub enum ProviderId {
    /// Sign in with Apple (`apple.com`).
    #[serde(rename = "apple.com")]
    #[strum(serialize = "apple.com")]
    Apple,
    /// Google Sign-In (`google.com`).
    #[serde(rename = "google.com")]
    #[strum(serialize = "google.com")]
    Google,
}

/// One provider linked to an identity, with the provider-scoped user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct LinkedProvider {
    /// The provider this entry belongs to.
    pub provider: ProviderId,
    /// User id assigned by the provider, used to query credential validity.
    pub provider_user_id: String,
}

/// Cached copy of the backend-owned user record.
///
/// The identity backend owns the authoritative record; this snapshot is
/// replaced wholesale on every backend notification and on explicit sign-in
/// and link results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct UserRecord {
    /// Backend-assigned unique id.
    pub uid: String,
    /// Display name, when a provider supplied one.
    pub display_name: Option<String>,
    /// Email address, when a provider supplied one.
    pub email: Option<String>,
    /// Whether this is an anonymous (provider-less, upgradeable) identity.
    pub is_anonymous: bool,
    /// Providers currently linked to this identity.
    pub linked_providers: Vec<LinkedProvider>,
    /// Unix timestamp (seconds) of the most recent authentication.
    pub last_sign_in_at: u64,
}

impl UserRecord {
    /// Whether `provider` is among the linked providers.
    #[must_use]
    pub fn has_provider(&self, provider: ProviderId) -> bool {
        self.linked_providers
            .iter()
            .any(|linked| linked.provider == provider)
    }

    /// Provider-scoped user id for `provider`, if linked.
    #[must_use]
    pub fn provider_user_id(&self, provider: ProviderId) -> Option<&str> {
        self.linked_providers
            .iter()
            .find(|linked| linked.provider == provider)
            .map(|linked| linked.provider_user_id.as_str())
    }
}

/// UI-facing authentication state.
///
/// Always a pure function of the last-observed [`UserRecord`], never stored
/// independently of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum AuthState {
    /// No identity.
    SignedOut,
    /// An anonymous identity, upgradeable by linking a provider credential.
    Authenticated,
    /// A non-anonymous identity with at least one linked provider.
    SignedIn,
}

impl AuthState {
    /// Derives the state for a cached user record.
    #[must_use]
    pub const fn for_user(user: Option<&UserRecord>) -> Self {
        match user {
            None => Self::SignedOut,
            Some(user) if user.is_anonymous => Self::Authenticated,
            Some(_) => Self::SignedIn,
        }
    }
}

/// Opaque token bundle produced by a provider flow.
///
/// Single-use: a credential is consumed by at most one authenticate, link,
/// re-authenticate, or revoke call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct ProviderCredential {
    /// Issuing provider.
    pub provider: ProviderId,
    /// Signed identity token to exchange with the backend.
    pub id_token: String,
    /// OAuth access token, when the provider issues one (Google).
    pub access_token: Option<String>,
    /// Authorization code for server-side revocation (Apple).
    pub authorization_code: Option<String>,
    /// Raw (unhashed) nonce the identity token was minted against (Apple).
    pub raw_nonce: Option<String>,
}

/// Deserializes a [`ProviderCredential`] from a JSON string.
///
/// Hosts that persist a pending credential across process restarts can
/// rebuild it through this entry point.
///
/// # Errors
/// Returns [`AuthError::Backend`] with code `invalid_credential_json` if the
/// payload cannot be parsed.
#[uniffi::export]
pub fn credential_from_json(json: &str) -> Result<ProviderCredential, AuthError> {
    serde_json::from_str(json).map_err(|e| AuthError::Backend {
        code: "invalid_credential_json".to_owned(),
        message: format!("failed to deserialize credential: {e}"),
    })
}

/// Serializes a [`ProviderCredential`] to a JSON string.
///
/// # Errors
/// Returns [`AuthError::Backend`] with code `credential_json` if
/// serialization fails.
#[uniffi::export]
#[allow(clippy::needless_pass_by_value)]
pub fn credential_to_json(credential: ProviderCredential) -> Result<String, AuthError> {
    serde_json::to_string(&credential).map_err(|e| AuthError::Backend {
        code: "credential_json".to_owned(),
        message: format!("failed to serialize credential: {e}"),
    })
}
