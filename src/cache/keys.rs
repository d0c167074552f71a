//! Cache key definitions.
//!
//! Key format: `{namespace}:{identifier}`.

use std::fmt;

/// Namespace of per-user feed lists.
pub const FEED_NAMESPACE: &str = "newsfeeds";
/// Namespace of feature gate hashes.
pub const GATE_NAMESPACE: &str = "gatekeeper";
/// Namespace of cached following-id sets.
pub const FOLLOWINGS_NAMESPACE: &str = "followings";

/// Identifies one owner's cached list, e.g. `newsfeeds:42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListKey {
    namespace: &'static str,
    owner_id: i64,
}

impl ListKey {
    pub fn new(namespace: &'static str, owner_id: i64) -> Self {
        Self {
            namespace,
            owner_id,
        }
    }

    /// Feed list of `owner_id`.
    pub fn feed(owner_id: i64) -> Self {
        Self::new(FEED_NAMESPACE, owner_id)
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.owner_id)
    }
}

/// Hash key holding the state of gate `name`.
pub fn gate_key(name: &str) -> String {
    format!("{GATE_NAMESPACE}:{name}")
}

/// Key of the ids `user_id` follows, e.g. `followings:7`.
pub fn followings_key(user_id: i64) -> String {
    format!("{FOLLOWINGS_NAMESPACE}:{user_id}")
}
