use std::env;

use serde::{Deserialize, Serialize};

pub const OWNER_ENV: &str = "DATAREQ_OWNER";
pub const OWNER_GROUP_ENV: &str = "DATAREQ_OWNER_GROUP";
pub const SETUP_ENV: &str = "DATAREQ_SETUP";

/// Caller identity used to stamp owner fields on a fresh request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub owner: String,
    pub group: Option<String>,
    pub setup: Option<String>,
}

pub trait IdentitySource: Send + Sync {
    fn resolve(&self) -> Option<Identity>;
}

/// Resolves the identity from `DATAREQ_OWNER` / `DATAREQ_OWNER_GROUP` /
/// `DATAREQ_SETUP`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvIdentitySource;

impl IdentitySource for EnvIdentitySource {
    fn resolve(&self) -> Option<Identity> {
        let owner = non_empty(env::var(OWNER_ENV).ok()?)?;
        Some(Identity {
            owner,
            group: env::var(OWNER_GROUP_ENV).ok().and_then(non_empty),
            setup: env::var(SETUP_ENV).ok().and_then(non_empty),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StaticIdentitySource {
    identity: Identity,
}

impl StaticIdentitySource {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

impl IdentitySource for StaticIdentitySource {
    fn resolve(&self) -> Option<Identity> {
        Some(self.identity.clone())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
