//! Authentication-state reconciliation against the identity backend.
//!
//! [`AuthController`] owns the cached identity and everything derived from
//! it. Three external signal sources (the backend change stream, the Apple
//! credential-state query, and the Google silent restore) are reconciled into
//! one published [`AuthState`], and every credential-lifecycle operation
//! (sign-in, linking, re-authentication, revocation, deletion) is sequenced
//! here.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::apple::{AppleAuthCoordinator, AppleCredentialState};
use crate::defaults::REAUTH_WINDOW_SECS;
use crate::error::AuthError;
use crate::gateway::{
    GatewayError, IdentityGateway, IdentityListener, SubscriptionHandle,
};
use crate::google::GoogleAuthCoordinator;
use crate::types::{AuthState, ProviderCredential, ProviderId, UserRecord};

/// Receives a push notification after every published state transition.
#[uniffi::export(with_foreign)]
pub trait AuthStateObserver: Send + Sync {
    /// Called with the new state and the user snapshot it was derived from.
    fn auth_state_changed(&self, state: AuthState, user: Option<UserRecord>);
}

/// Owner of the authenticated identity and the auth state machine.
///
/// All mutating operations are serialized through one internal operation
/// guard, so no two of them ever interleave and readers never observe a
/// half-updated state. The backend subscription stays open for the
/// controller's whole lifetime until [`AuthController::close`] is called.
#[derive(uniffi::Object)]
pub struct AuthController {
    gateway: Arc<dyn IdentityGateway>,
    apple: Arc<AppleAuthCoordinator>,
    google: Arc<GoogleAuthCoordinator>,
    user: Mutex<Option<UserRecord>>,
    observers: Mutex<Vec<Arc<dyn AuthStateObserver>>>,
    state_tx: watch::Sender<AuthState>,
    subscription: Mutex<Option<SubscriptionHandle>>,
    op_guard: tokio::sync::Mutex<()>,
}

struct RemoteChangeListener {
    controller: Weak<AuthController>,
}

impl IdentityListener for RemoteChangeListener {
    fn identity_changed(&self, user: Option<UserRecord>) {
        if let Some(controller) = self.controller.upgrade() {
            debug!(
                "backend identity change: present={}, anonymous={}",
                user.is_some(),
                user.as_ref().is_some_and(|u| u.is_anonymous)
            );
            controller.apply_user(user);
        }
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl AuthController {
    /// Opens the backend subscription and verifies linked provider
    /// credentials before returning.
    ///
    /// The gateway delivers the current identity during `subscribe`, so the
    /// controller starts from live state rather than a stale default. The
    /// verification pass then signs the user out if every linked provider
    /// reports its grant revoked or missing; failures of the probes
    /// themselves never end a session.
    #[uniffi::constructor]
    pub async fn start(
        gateway: Arc<dyn IdentityGateway>,
        apple: Arc<AppleAuthCoordinator>,
        google: Arc<GoogleAuthCoordinator>,
    ) -> Arc<Self> {
        let (state_tx, _state_rx) = watch::channel(AuthState::SignedOut);
        let controller = Arc::new(Self {
            gateway: Arc::clone(&gateway),
            apple,
            google,
            user: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
            state_tx,
            subscription: Mutex::new(None),
            op_guard: tokio::sync::Mutex::new(()),
        });

        let listener = Arc::new(RemoteChangeListener {
            controller: Arc::downgrade(&controller),
        });
        let token = gateway.subscribe(listener);
        *lock(&controller.subscription) = Some(SubscriptionHandle::new(gateway, token));

        controller.verify_linked_credentials().await;
        controller
    }

    /// Exchanges a provider credential for an authenticated identity.
    ///
    /// The central branch of the whole system: with an identity already
    /// cached (anonymous or not) the credential is linked to it as an
    /// additional login method; with no identity it establishes a new
    /// session. A recoverable link conflict is retried once as a sign-in,
    /// using the backend-supplied updated credential when the attempted
    /// provider is Apple and the payload carries one, and the original
    /// credential otherwise.
    ///
    /// # Errors
    /// Backend failures surface as [`AuthError::Backend`], unmodified apart
    /// from the one-shot conflict retry described above.
    pub async fn authenticate(
        &self,
        credential: ProviderCredential,
    ) -> Result<UserRecord, AuthError> {
        let _op = self.op_guard.lock().await;
        match self.current_uid() {
            Some(uid) => self.link(&uid, credential).await,
            None => self.sign_in(credential).await,
        }
    }

    /// Runs the full Apple authorization flow, then authenticates with the
    /// resulting credential.
    ///
    /// # Errors
    /// Provider failures surface as [`AuthError::Credential`]; backend
    /// failures as in [`AuthController::authenticate`].
    pub async fn sign_in_with_apple(&self) -> Result<UserRecord, AuthError> {
        let credential = self.apple.request_authorization().await?;
        self.authenticate(credential).await
    }

    /// Runs the Google sign-in flow (silent restore when possible), then
    /// authenticates with the resulting credential.
    ///
    /// # Errors
    /// Provider failures surface unmodified, including
    /// [`AuthError::NoPresentationSurface`]; backend failures as in
    /// [`AuthController::authenticate`].
    pub async fn sign_in_with_google(&self) -> Result<UserRecord, AuthError> {
        let credential = self.google.sign_in().await?;
        self.authenticate(credential).await
    }

    /// Establishes an anonymous identity.
    ///
    /// The new state is published synchronously with this call's completion
    /// rather than waiting for the subscription notification, so the UI never
    /// reads stale state in between.
    ///
    /// # Errors
    /// Backend failures surface as [`AuthError::Backend`].
    pub async fn sign_in_anonymously(&self) -> Result<UserRecord, AuthError> {
        let _op = self.op_guard.lock().await;
        let user = self.gateway.sign_in_anonymously().await?;
        info!("anonymous sign-in established uid {}", user.uid);
        self.apply_user(Some(user.clone()));
        Ok(user)
    }

    /// Ends the current session.
    ///
    /// No-op when signed out. Local provider sessions are cleared first
    /// (best-effort, failures swallowed); backend authorization is not
    /// revoked. The backend sign-out failure, if any, is surfaced and the
    /// cached identity is kept.
    ///
    /// # Errors
    /// Backend failures surface as [`AuthError::Backend`].
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let _op = self.op_guard.lock().await;
        let Some(user) = self.current_user() else {
            return Ok(());
        };
        self.sign_out_current(&user).await
    }

    /// Deletes the current account after provider-specific re-authentication
    /// and revocation.
    ///
    /// No-op when signed out. Re-authentication is required when the last
    /// sign-in is at least one minute old. Linked providers are processed in
    /// the order Apple, Google: Apple re-runs its full interactive flow,
    /// re-authenticates when required, and revokes the authorization code
    /// server-side; Google re-authenticates when required and then fully
    /// disconnects. The backend deletion runs only after every provider step
    /// succeeded.
    ///
    /// Any failure aborts the remaining steps without deleting the account
    /// and leaves the published state unchanged. There is no compensating
    /// rollback for provider grants already revoked by earlier steps.
    ///
    /// # Errors
    /// [`AuthError::ReauthenticateApple`], [`AuthError::ReauthenticateGoogle`],
    /// [`AuthError::RevokeAppleId`] and [`AuthError::RevokeGoogle`] name the
    /// failed step; credential acquisition and backend failures surface
    /// unmodified.
    pub async fn delete_account(&self) -> Result<(), AuthError> {
        let _op = self.op_guard.lock().await;
        let Some(user) = self.current_user() else {
            return Ok(());
        };

        let needs_reauth = needs_reauth(user.last_sign_in_at, unix_now());
        debug!(
            "deleting account {}: needs_reauth={needs_reauth}, providers={}",
            user.uid,
            user.linked_providers.len()
        );

        if user.has_provider(ProviderId::Apple) {
            let credential = self.apple.request_authorization().await?;
            if needs_reauth {
                self.gateway
                    .reauthenticate(user.uid.clone(), credential.clone())
                    .await
                    .map_err(|err| {
                        warn!("apple re-authentication failed: {err}");
                        AuthError::ReauthenticateApple
                    })?;
            }
            if let Some(code) = credential.authorization_code {
                self.gateway.revoke_token(code).await.map_err(|err| {
                    warn!("apple token revocation failed: {err}");
                    AuthError::RevokeAppleId
                })?;
            }
        }

        if user.has_provider(ProviderId::Google) {
            if needs_reauth {
                let credential = self.google.sign_in().await.map_err(|err| {
                    warn!("google credential for re-authentication failed: {err}");
                    AuthError::ReauthenticateGoogle
                })?;
                self.gateway
                    .reauthenticate(user.uid.clone(), credential)
                    .await
                    .map_err(|err| {
                        warn!("google re-authentication failed: {err}");
                        AuthError::ReauthenticateGoogle
                    })?;
            }
            self.google.disconnect().await?;
        }

        self.gateway.delete_account(user.uid.clone()).await?;
        info!("account {} deleted", user.uid);
        self.apply_user(None);
        Ok(())
    }

    /// Closes the backend subscription. Idempotent; the controller keeps its
    /// last published state afterwards.
    pub fn close(&self) {
        if let Some(subscription) = lock(&self.subscription).as_ref() {
            subscription.close();
        }
    }

    /// Snapshot of the cached identity.
    #[must_use]
    pub fn current_user(&self) -> Option<UserRecord> {
        lock(&self.user).clone()
    }

    /// The currently published auth state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        *self.state_tx.borrow()
    }

    /// Registers an observer for subsequent state transitions.
    pub fn add_observer(&self, observer: Arc<dyn AuthStateObserver>) {
        lock(&self.observers).push(observer);
    }
}

impl AuthController {
    /// Watch channel mirroring the published state, for Rust consumers.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    fn current_uid(&self) -> Option<String> {
        lock(&self.user).as_ref().map(|user| user.uid.clone())
    }

    async fn sign_in(
        &self,
        credential: ProviderCredential,
    ) -> Result<UserRecord, AuthError> {
        let provider = credential.provider;
        let user = self.gateway.sign_in(credential).await?;
        info!("signed in uid {} via {provider}", user.uid);
        self.apply_user(Some(user.clone()));
        Ok(user)
    }

    async fn link(
        &self,
        uid: &str,
        credential: ProviderCredential,
    ) -> Result<UserRecord, AuthError> {
        match self
            .gateway
            .link(uid.to_owned(), credential.clone())
            .await
        {
            Ok(user) => {
                info!("linked {} to uid {}", credential.provider, user.uid);
                self.apply_user(Some(user.clone()));
                Ok(user)
            }
            Err(GatewayError::LinkConflict {
                reason,
                updated_credential,
            }) => {
                // Only Apple conflicts ever carry a usable replacement.
                let retry = match (credential.provider, updated_credential) {
                    (ProviderId::Apple, Some(updated)) => updated,
                    _ => credential,
                };
                info!("link conflict ({reason}), retrying once as sign-in");
                self.sign_in(retry).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn sign_out_current(&self, user: &UserRecord) -> Result<(), AuthError> {
        for linked in &user.linked_providers {
            match linked.provider {
                // The Apple platform keeps no local session to clear.
                ProviderId::Apple => {}
                ProviderId::Google => self.google.sign_out().await,
            }
        }
        self.gateway.sign_out(user.uid.clone()).await?;
        info!("signed out uid {}", user.uid);
        self.apply_user(None);
        Ok(())
    }

    /// Probes every linked provider and ends the session only when all of
    /// them report their grant gone. Probe failures count as still-valid so a
    /// flaky network never signs a user out.
    async fn verify_linked_credentials(&self) {
        let Some(user) = self.current_user() else {
            return;
        };
        if user.linked_providers.is_empty() {
            return;
        }

        let mut any_valid = false;
        for linked in &user.linked_providers {
            let valid = match linked.provider {
                ProviderId::Apple => {
                    match self
                        .apple
                        .credential_state(linked.provider_user_id.clone())
                        .await
                    {
                        Ok(AppleCredentialState::Authorized) => true,
                        Ok(state) => {
                            info!(
                                "apple credential for {} reported {state:?}",
                                linked.provider_user_id
                            );
                            false
                        }
                        Err(err) => {
                            warn!("apple credential-state query failed: {err}");
                            true
                        }
                    }
                }
                ProviderId::Google => match self.google.restore_previous().await {
                    Ok(_) => true,
                    Err(err) => {
                        info!("google session not restorable: {err}");
                        false
                    }
                },
            };
            any_valid = any_valid || valid;
        }

        if !any_valid {
            info!("all linked provider credentials are invalid, signing out");
            if let Err(err) = self.sign_out_current(&user).await {
                warn!("sign-out after credential verification failed: {err}");
            }
        }
    }

    fn apply_user(&self, user: Option<UserRecord>) {
        let state = AuthState::for_user(user.as_ref());
        *lock(&self.user) = user.clone();
        self.publish(state, user);
    }

    fn publish(&self, state: AuthState, user: Option<UserRecord>) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!("auth state changed: {previous:?} -> {state:?}");
        }
        let observers = lock(&self.observers).clone();
        for observer in observers {
            observer.auth_state_changed(state, user.clone());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Whether a destructive operation must re-prove ownership first.
const fn needs_reauth(last_sign_in_at: u64, now: u64) -> bool {
    now.saturating_sub(last_sign_in_at) >= REAUTH_WINDOW_SECS
}
