//! tz login / logout / whoami command implementations.

use std::path::Path;

use serde::Serialize;

use crate::cli::open_context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::session::{Identity, IdentityKind, SessionState};

#[derive(Serialize)]
struct SessionInfo {
    uid: String,
    kind: IdentityKind,
}

impl From<&Identity> for SessionInfo {
    fn from(identity: &Identity) -> Self {
        Self {
            uid: identity.uid.clone(),
            kind: identity.kind,
        }
    }
}

fn kind_label(kind: IdentityKind) -> &'static str {
    match kind {
        IdentityKind::Federated => "federated",
        IdentityKind::Anonymous => "guest",
    }
}

pub fn login(config: Option<&Path>, guest: bool, options: OutputOptions) -> Result<()> {
    let mut ctx = open_context(config)?;

    let method = if guest {
        "anonymous".to_string()
    } else {
        ctx.config.auth.default_method.clone()
    };

    let identity = if method == "anonymous" {
        ctx.gate.sign_in_anonymous()?
    } else {
        ctx.gate.sign_in_federated()?
    };

    let mut human = HumanOutput::new(format!(
        "Signed in as {} ({})",
        identity.uid,
        kind_label(identity.kind)
    ));
    for warning in &ctx.warnings {
        human.push_warning(warning.clone());
    }
    human.push_next_step("tz add \"My first task\"".to_string());

    emit_success(options, "login", &SessionInfo::from(&identity), Some(&human))
}

pub fn logout(config: Option<&Path>, options: OutputOptions) -> Result<()> {
    let mut ctx = open_context(config)?;
    ctx.gate.sign_out()?;

    let human = HumanOutput::new("Signed out");
    #[derive(Serialize)]
    struct LogoutInfo {
        signed_in: bool,
    }
    emit_success(options, "logout", &LogoutInfo { signed_in: false }, Some(&human))
}

pub fn whoami(config: Option<&Path>, options: OutputOptions) -> Result<()> {
    let ctx = open_context(config)?;

    match ctx.gate.state() {
        SessionState::Authenticated(identity) => {
            let human = HumanOutput::new(format!(
                "{} ({})",
                identity.uid,
                kind_label(identity.kind)
            ));
            emit_success(options, "whoami", &SessionInfo::from(identity), Some(&human))
        }
        _ => Err(crate::error::Error::NotSignedIn),
    }
}
