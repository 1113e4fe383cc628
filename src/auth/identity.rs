use chrono::Utc;
use uuid::Uuid;

use super::CredentialHasher;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::User;

/// A resolved caller: the account plus the plaintext password it presented.
/// `is_new` marks an account constructed from the credentials but not yet
/// persisted; only handlers that complete a write may save it.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub password: String,
    pub is_new: bool,
}

impl Identity {
    #[must_use]
    pub fn username(&self) -> &str {
        &self.user.username
    }
}

/// Outcome of inspecting an `Authorization` header.
#[derive(Debug)]
pub enum Resolved {
    /// No header at all.
    Anonymous,
    /// The username matches a stored account. The password is carried along
    /// unverified; callers decide whether a mismatch is 401 or 403.
    Existing(Identity),
    /// No such account; a fully constructed but unsaved candidate.
    Candidate(Identity),
    /// Wrong scheme or credentials that would not parse.
    Invalid,
}

/// Decodes `Basic base64(username:password)`. Any deviation yields None.
pub fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, password) = credentials.split_once(':')?;

    if username.is_empty() {
        return None;
    }

    Some((username.to_string(), password.to_string()))
}

/// Resolves the caller's identity from an optional `Authorization` header.
/// Never writes: an unknown username produces an unsaved `Candidate`.
pub fn resolve_identity(
    store: &dyn Store,
    hasher: &CredentialHasher,
    auth_header: Option<&str>,
) -> Result<Resolved> {
    let Some(header) = auth_header.filter(|h| !h.is_empty()) else {
        return Ok(Resolved::Anonymous);
    };

    let Some((username, password)) = parse_basic_credentials(header) else {
        return Ok(Resolved::Invalid);
    };

    match store.get_user_by_username(&username)? {
        Some(user) => Ok(Resolved::Existing(Identity {
            user,
            password,
            is_new: false,
        })),
        None => {
            let user = User {
                id: Uuid::new_v4().to_string(),
                username,
                password_hash: hasher.hash(&password)?,
                created_at: Utc::now(),
            };
            Ok(Resolved::Candidate(Identity {
                user,
                password,
                is_new: true,
            }))
        }
    }
}

/// Saves a candidate account. A concurrent request may have created the same
/// username first; the unique index turns that into AlreadyExists and we
/// proceed with the stored account instead.
pub fn persist_candidate(store: &dyn Store, identity: &Identity) -> Result<User> {
    match store.create_user(&identity.user) {
        Ok(()) => Ok(identity.user.clone()),
        Err(Error::AlreadyExists) => store
            .get_user_by_username(&identity.user.username)?
            .ok_or(Error::NotFound),
        Err(e) => Err(e),
    }
}
