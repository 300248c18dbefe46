//! Session gate: who is allowed to see task data right now.
//!
//! The gate is a three-state machine (`Loading`, `Authenticated`,
//! `Unauthenticated`) wrapped around an external identity provider. It is an
//! explicit object owned by the application root, not ambient global state.
//! While loading, no task data may be requested; leaving the authenticated
//! state discards the prior identity's data before anything else happens.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lock;

/// An opaque reference to an authenticated (or guest) principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub kind: IdentityKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    Federated,
    Anonymous,
}

impl Identity {
    pub fn federated(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: IdentityKind::Federated,
        }
    }

    pub fn anonymous(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: IdentityKind::Anonymous,
        }
    }
}

/// Session gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Identity not yet determined; no task data may be shown.
    Loading,
    Authenticated(Identity),
    Unauthenticated,
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// External identity provider contract.
///
/// All operations may fail; failures surface as [`Error::Auth`] and never
/// crash the gate.
pub trait IdentityProvider {
    /// The currently signed-in principal, if any.
    fn current_identity(&self) -> Result<Option<Identity>>;

    /// Federated sign-in through the configured provider.
    fn sign_in_federated(&mut self) -> Result<Identity>;

    /// Anonymous/guest sign-in producing a transient identity.
    fn sign_in_anonymous(&mut self) -> Result<Identity>;

    /// Sign the current principal out.
    fn sign_out(&mut self) -> Result<()>;
}

/// The session gate owned by the application root.
pub struct SessionGate<P: IdentityProvider> {
    provider: P,
    state: SessionState,
    changes: watch::Sender<SessionState>,
}

impl<P: IdentityProvider> SessionGate<P> {
    /// A new gate starts in `Loading` until [`resolve`](Self::resolve) runs.
    pub fn new(provider: P) -> Self {
        let (changes, _) = watch::channel(SessionState::Loading);
        Self {
            provider,
            state: SessionState::Loading,
            changes,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Watch state transitions. The receiver always starts with the
    /// current state.
    pub fn changes(&self) -> watch::Receiver<SessionState> {
        self.changes.subscribe()
    }

    /// The authenticated identity, or [`Error::NotSignedIn`].
    pub fn identity(&self) -> Result<&Identity> {
        self.state.identity().ok_or(Error::NotSignedIn)
    }

    /// Leave `Loading` by asking the provider for the signed-in principal.
    ///
    /// An unreachable or misconfigured provider lands in `Unauthenticated`,
    /// never in a crash.
    pub fn resolve(&mut self) -> &SessionState {
        let next = match self.provider.current_identity() {
            Ok(Some(identity)) => SessionState::Authenticated(identity),
            Ok(None) => SessionState::Unauthenticated,
            Err(err) => {
                tracing::warn!(error = %err, "identity provider unavailable");
                SessionState::Unauthenticated
            }
        };
        self.transition(next);
        &self.state
    }

    pub fn sign_in_federated(&mut self) -> Result<Identity> {
        match self.provider.sign_in_federated() {
            Ok(identity) => {
                self.transition(SessionState::Authenticated(identity.clone()));
                Ok(identity)
            }
            Err(err) => {
                self.transition(SessionState::Unauthenticated);
                Err(auth_error(err))
            }
        }
    }

    pub fn sign_in_anonymous(&mut self) -> Result<Identity> {
        match self.provider.sign_in_anonymous() {
            Ok(identity) => {
                self.transition(SessionState::Authenticated(identity.clone()));
                Ok(identity)
            }
            Err(err) => {
                self.transition(SessionState::Unauthenticated);
                Err(auth_error(err))
            }
        }
    }

    /// Sign out. The gate ends up `Unauthenticated` even when the provider
    /// reports a failure; the failure is still reported to the caller.
    pub fn sign_out(&mut self) -> Result<()> {
        let outcome = self.provider.sign_out();
        self.transition(SessionState::Unauthenticated);
        outcome.map_err(auth_error)
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next.clone();
        let _ = self.changes.send(next);
    }
}

fn auth_error(err: Error) -> Error {
    match err {
        err @ Error::Auth(_) => err,
        other => Error::Auth(other.to_string()),
    }
}

/// File-backed identity provider.
///
/// The session lives in `session.json` under the data dir. Guest sign-in
/// mints a transient uid; federated sign-in consumes a pre-issued provider
/// token (issuance itself happens outside this program).
pub struct FileIdentityProvider {
    session_file: PathBuf,
    token: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SessionRecord {
    identity: Identity,
}

impl FileIdentityProvider {
    pub fn new(data_dir: impl AsRef<Path>, token: Option<String>) -> Self {
        Self {
            session_file: data_dir.as_ref().join("session.json"),
            token,
        }
    }

    fn persist(&self, identity: &Identity) -> Result<()> {
        let record = SessionRecord {
            identity: identity.clone(),
        };
        let data = serde_json::to_vec_pretty(&record)?;
        lock::write_atomic(&self.session_file, &data)?;
        Ok(())
    }
}

impl IdentityProvider for FileIdentityProvider {
    fn current_identity(&self) -> Result<Option<Identity>> {
        let data = match fs::read(&self.session_file) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::Io(err)),
        };
        match serde_json::from_slice::<SessionRecord>(&data) {
            Ok(record) => Ok(Some(record.identity)),
            Err(err) => {
                // A damaged session file means nobody is signed in.
                tracing::warn!(error = %err, "discarding unreadable session file");
                Ok(None)
            }
        }
    }

    fn sign_in_federated(&mut self) -> Result<Identity> {
        let token = self
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Auth(
                    "no federated token available (set TASKZEN_TOKEN or auth.token)".to_string(),
                )
            })?;
        let identity = Identity::federated(token);
        self.persist(&identity)?;
        Ok(identity)
    }

    fn sign_in_anonymous(&mut self) -> Result<Identity> {
        let identity = Identity::anonymous(format!("guest-{}", Uuid::new_v4()));
        self.persist(&identity)?;
        Ok(identity)
    }

    fn sign_out(&mut self) -> Result<()> {
        match fs::remove_file(&self.session_file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }
}
