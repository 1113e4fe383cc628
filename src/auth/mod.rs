mod identity;
mod middleware;
mod password;

pub use identity::{Identity, Resolved, parse_basic_credentials, persist_candidate, resolve_identity};
pub use middleware::{AuthError, OptionalIdentity, RequireIdentity};
pub use password::CredentialHasher;
