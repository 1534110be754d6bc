//! Common test doubles shared across integration tests.
#![allow(missing_docs)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use authkit_core::{
    AppleAuthRequest, AppleAuthResponder, AppleAuthorization, AppleCredentialState,
    ApplePlatform, AuthError, AuthState, AuthStateObserver, GatewayError, GooglePlatform,
    GoogleSession, GoogleTokens, IdentityGateway, IdentityListener, LinkedProvider,
    ProviderCredential, ProviderId, UserRecord,
};

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

pub fn user_with(
    uid: &str,
    anonymous: bool,
    providers: &[ProviderId],
    last_sign_in_at: u64,
) -> UserRecord {
    UserRecord {
        uid: uid.to_owned(),
        display_name: None,
        email: None,
        is_anonymous: anonymous,
        linked_providers: providers
            .iter()
            .map(|provider| LinkedProvider {
                provider: *provider,
                provider_user_id: format!("{provider}-uid"),
            })
            .collect(),
        last_sign_in_at,
    }
}

pub fn apple_credential(tag: &str) -> ProviderCredential {
    ProviderCredential {
        provider: ProviderId::Apple,
        id_token: format!("apple-jwt-{tag}"),
        access_token: None,
        authorization_code: Some(format!("apple-code-{tag}")),
        raw_nonce: Some(format!("nonce-{tag}")),
    }
}

pub fn google_credential(tag: &str) -> ProviderCredential {
    ProviderCredential {
        provider: ProviderId::Google,
        id_token: format!("google-jwt-{tag}"),
        access_token: Some(format!("google-access-{tag}")),
        authorization_code: None,
        raw_nonce: None,
    }
}

/// One recorded call against the mock gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    SignIn(ProviderCredential),
    SignInAnonymously,
    Link {
        uid: String,
        credential: ProviderCredential,
    },
    Reauthenticate {
        uid: String,
        credential: ProviderCredential,
    },
    SignOut(String),
    DeleteAccount(String),
    RevokeToken(String),
}

/// Scriptable in-memory identity backend.
///
/// Unscripted operations succeed with sensible defaults. The gateway never
/// notifies the listener on its own; tests push notifications explicitly
/// through [`MockGateway::notify`].
#[derive(Default)]
pub struct MockGateway {
    pub initial_user: Mutex<Option<UserRecord>>,
    pub calls: Mutex<Vec<GatewayCall>>,
    pub listener: Mutex<Option<Arc<dyn IdentityListener>>>,
    pub unsubscribes: AtomicU64,
    pub sign_in_result: Mutex<Option<Result<UserRecord, GatewayError>>>,
    pub sign_in_anonymously_result: Mutex<Option<Result<UserRecord, GatewayError>>>,
    pub link_result: Mutex<Option<Result<UserRecord, GatewayError>>>,
    pub reauthenticate_results: Mutex<VecDeque<Result<(), GatewayError>>>,
    pub sign_out_result: Mutex<Option<Result<(), GatewayError>>>,
    pub delete_result: Mutex<Option<Result<(), GatewayError>>>,
    pub revoke_result: Mutex<Option<Result<(), GatewayError>>>,
}

impl MockGateway {
    pub fn with_initial_user(user: UserRecord) -> Self {
        let gateway = Self::default();
        *gateway.initial_user.lock().expect("initial user") = Some(user);
        gateway
    }

    /// Pushes a backend identity-change notification to the subscriber.
    pub fn notify(&self, user: Option<UserRecord>) {
        let listener = self
            .listener
            .lock()
            .expect("listener")
            .clone()
            .expect("subscribed");
        listener.identity_changed(user);
    }

    pub fn recorded_calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().expect("calls").clone()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().expect("calls").push(call);
    }

    fn default_user_for(credential: &ProviderCredential) -> UserRecord {
        user_with(
            "backend-uid",
            false,
            &[credential.provider],
            unix_now(),
        )
    }
}

#[async_trait]
impl IdentityGateway for MockGateway {
    fn subscribe(&self, listener: Arc<dyn IdentityListener>) -> u64 {
        listener.identity_changed(self.initial_user.lock().expect("initial user").clone());
        *self.listener.lock().expect("listener") = Some(listener);
        1
    }

    fn unsubscribe(&self, _token: u64) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
    }

    async fn sign_in(
        &self,
        credential: ProviderCredential,
    ) -> Result<UserRecord, GatewayError> {
        self.record(GatewayCall::SignIn(credential.clone()));
        self.sign_in_result
            .lock()
            .expect("sign in result")
            .take()
            .unwrap_or_else(|| Ok(Self::default_user_for(&credential)))
    }

    async fn sign_in_anonymously(&self) -> Result<UserRecord, GatewayError> {
        self.record(GatewayCall::SignInAnonymously);
        self.sign_in_anonymously_result
            .lock()
            .expect("anonymous result")
            .take()
            .unwrap_or_else(|| Ok(user_with("anon-uid", true, &[], unix_now())))
    }

    async fn link(
        &self,
        uid: String,
        credential: ProviderCredential,
    ) -> Result<UserRecord, GatewayError> {
        self.record(GatewayCall::Link {
            uid: uid.clone(),
            credential: credential.clone(),
        });
        self.link_result
            .lock()
            .expect("link result")
            .take()
            .unwrap_or_else(|| {
                let mut user = Self::default_user_for(&credential);
                user.uid = uid;
                Ok(user)
            })
    }

    async fn reauthenticate(
        &self,
        uid: String,
        credential: ProviderCredential,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::Reauthenticate { uid, credential });
        self.reauthenticate_results
            .lock()
            .expect("reauthenticate results")
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn sign_out(&self, uid: String) -> Result<(), GatewayError> {
        self.record(GatewayCall::SignOut(uid));
        self.sign_out_result
            .lock()
            .expect("sign out result")
            .take()
            .unwrap_or(Ok(()))
    }

    async fn delete_account(&self, uid: String) -> Result<(), GatewayError> {
        self.record(GatewayCall::DeleteAccount(uid));
        self.delete_result
            .lock()
            .expect("delete result")
            .take()
            .unwrap_or(Ok(()))
    }

    async fn revoke_token(&self, authorization_code: String) -> Result<(), GatewayError> {
        self.record(GatewayCall::RevokeToken(authorization_code));
        self.revoke_result
            .lock()
            .expect("revoke result")
            .take()
            .unwrap_or(Ok(()))
    }
}

/// Apple platform double that resolves every request immediately.
#[derive(Default)]
pub struct MockApplePlatform {
    pub requests: Mutex<Vec<AppleAuthRequest>>,
    /// Scripted authorization outcome; `Err` is the platform failure reason.
    pub authorization_result: Mutex<Option<Result<AppleAuthorization, String>>>,
    pub credential_state_result: Mutex<Option<Result<AppleCredentialState, AuthError>>>,
    pub state_queries: AtomicU64,
}

impl MockApplePlatform {
    pub fn default_authorization() -> AppleAuthorization {
        AppleAuthorization {
            user_id: "apple.com-uid".to_owned(),
            identity_token: "fresh-apple-jwt".to_owned(),
            authorization_code: Some("fresh-apple-code".to_owned()),
            full_name: None,
            email: None,
        }
    }
}

#[async_trait]
impl ApplePlatform for MockApplePlatform {
    fn perform_authorization(
        &self,
        request: AppleAuthRequest,
        responder: Arc<AppleAuthResponder>,
    ) {
        self.requests.lock().expect("requests").push(request);
        let result = self
            .authorization_result
            .lock()
            .expect("authorization result")
            .take()
            .unwrap_or_else(|| Ok(Self::default_authorization()));
        match result {
            Ok(authorization) => responder.authorized(authorization),
            Err(reason) => responder.failed(reason),
        }
    }

    async fn credential_state(
        &self,
        _provider_user_id: String,
    ) -> Result<AppleCredentialState, AuthError> {
        self.state_queries.fetch_add(1, Ordering::SeqCst);
        self.credential_state_result
            .lock()
            .expect("credential state result")
            .take()
            .unwrap_or(Ok(AppleCredentialState::Authorized))
    }
}

/// Google platform double with scripted results and call counters.
#[derive(Default)]
pub struct MockGooglePlatform {
    pub has_previous: bool,
    pub restore_result: Mutex<Option<Result<GoogleSession, AuthError>>>,
    pub refresh_result: Mutex<Option<Result<GoogleTokens, AuthError>>>,
    pub interactive_result: Mutex<Option<Result<GoogleTokens, AuthError>>>,
    pub disconnect_result: Mutex<Option<Result<(), AuthError>>>,
    pub interactive_calls: AtomicU64,
    pub sign_outs: AtomicU64,
    pub disconnects: AtomicU64,
}

impl MockGooglePlatform {
    pub fn with_previous_sign_in() -> Self {
        Self {
            has_previous: true,
            ..Self::default()
        }
    }

    pub fn default_tokens() -> GoogleTokens {
        GoogleTokens {
            id_token: "fresh-google-jwt".to_owned(),
            access_token: "fresh-google-access".to_owned(),
        }
    }

    fn default_session() -> GoogleSession {
        GoogleSession {
            user_id: "google.com-uid".to_owned(),
            email: None,
        }
    }
}

#[async_trait]
impl GooglePlatform for MockGooglePlatform {
    fn has_previous_sign_in(&self) -> bool {
        self.has_previous
    }

    async fn restore_previous_sign_in(&self) -> Result<GoogleSession, AuthError> {
        self.restore_result
            .lock()
            .expect("restore result")
            .take()
            .unwrap_or_else(|| Ok(Self::default_session()))
    }

    async fn refresh_if_needed(
        &self,
        _session: GoogleSession,
    ) -> Result<GoogleTokens, AuthError> {
        self.refresh_result
            .lock()
            .expect("refresh result")
            .take()
            .unwrap_or_else(|| Ok(Self::default_tokens()))
    }

    async fn sign_in_interactive(&self) -> Result<GoogleTokens, AuthError> {
        self.interactive_calls.fetch_add(1, Ordering::SeqCst);
        self.interactive_result
            .lock()
            .expect("interactive result")
            .take()
            .unwrap_or_else(|| Ok(Self::default_tokens()))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AuthError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.disconnect_result
            .lock()
            .expect("disconnect result")
            .take()
            .unwrap_or(Ok(()))
    }
}

/// Observer double recording every published transition.
#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(AuthState, Option<UserRecord>)>>,
}

impl AuthStateObserver for RecordingObserver {
    fn auth_state_changed(&self, state: AuthState, user: Option<UserRecord>) {
        self.transitions
            .lock()
            .expect("transitions")
            .push((state, user));
    }
}
