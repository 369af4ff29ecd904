//! Session identity provider.
//!
//! Random identifiers are a process-wide service. They are injected where
//! needed instead of being read from global state, so callers and tests can
//! pin them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use uuid::Uuid;

/// Source of identifiers for playback sessions.
pub trait SessionIdentity: Send + Sync {
    /// Identifier shared by everything produced in this session.
    fn session_id(&self) -> &str;

    /// A fresh random identifier.
    fn random_id(&self) -> String;
}

/// Identity backed by random v4 UUIDs.
#[derive(Debug, Clone)]
pub struct RandomIdentity {
    session_id: String,
}

impl RandomIdentity {
    /// Creates an identity with a newly generated session id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Creates a new `RandomIdentity` wrapped in an Arc.
    #[must_use]
    pub fn arc() -> Arc<dyn SessionIdentity> {
        Arc::new(Self::new())
    }
}

impl Default for RandomIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdentity for RandomIdentity {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn random_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Stable track hash for `track` within the identity's session.
///
/// The same track in the same session always hashes identically; the same
/// track in another session does not, so a restarted stream counts as a
/// track change for the audio buffer.
pub fn track_hash(identity: &dyn SessionIdentity, track: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    identity.session_id().hash(&mut hasher);
    track.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedIdentity(&'static str);

    impl SessionIdentity for FixedIdentity {
        fn session_id(&self) -> &str {
            self.0
        }

        fn random_id(&self) -> String {
            "fixed".to_string()
        }
    }

    #[test]
    fn random_ids_are_uuid_formatted_and_distinct() {
        let identity = RandomIdentity::new();
        let a = identity.random_id();
        let b = identity.random_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(a.matches('-').count(), 4);
        assert_ne!(identity.session_id(), RandomIdentity::new().session_id());
    }

    #[test]
    fn track_hash_is_stable_within_a_session() {
        let session = FixedIdentity("session-a");
        let other = FixedIdentity("session-b");

        let url = "http://radio.example/live.aac";
        assert_eq!(track_hash(&session, url), track_hash(&session, url));
        assert_ne!(track_hash(&session, url), track_hash(&session, "http://radio.example/b"));
        assert_ne!(track_hash(&session, url), track_hash(&other, url));
    }
}
