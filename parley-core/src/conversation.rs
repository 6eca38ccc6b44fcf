//! Conversation identity
//!
//! Conversation keys use the canonical-order strategy: the key of an
//! unordered pair `{a, b}` is always `"{min}_{max}"`. Resolution is a pure
//! function, so concurrent first messages from either side converge on the
//! same partition without a lookup.

use crate::{ParleyError, ParleyResult, UserId, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable key of a two-party conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationKey {
    lo: UserId,
    hi: UserId,
}

impl ConversationKey {
    /// Key for the unordered pair `{a, b}`.
    pub fn resolve(a: UserId, b: UserId) -> Self {
        Self {
            lo: a.min(b),
            hi: a.max(b),
        }
    }

    /// Parse the canonical `"{lo}_{hi}"` form.
    ///
    /// Non-canonical spellings (swapped order, leading zeros, explicit `+`)
    /// are rejected so that one pair never maps to two partitions.
    pub fn parse(raw: &str) -> ParleyResult<Self> {
        let invalid = |reason: &str| {
            ParleyError::Validation(ValidationError::InvalidConversationKey {
                key: raw.to_string(),
                reason: reason.to_string(),
            })
        };

        let (lo, hi) = raw
            .split_once('_')
            .ok_or_else(|| invalid("expected \"{lo}_{hi}\""))?;
        let lo: UserId = lo.parse().map_err(|_| invalid("lower participant is not an integer"))?;
        let hi: UserId = hi.parse().map_err(|_| invalid("upper participant is not an integer"))?;
        if lo > hi {
            return Err(invalid("participants are not in canonical order"));
        }

        let key = Self { lo, hi };
        if key.to_string() != raw {
            return Err(invalid("key is not in canonical form"));
        }
        Ok(key)
    }

    /// Participants as `(lower, upper)`.
    pub fn participants(&self) -> (UserId, UserId) {
        (self.lo, self.hi)
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.lo == user || self.hi == user
    }

    /// The other participant, or `None` if `user` is not part of this conversation.
    pub fn peer_of(&self, user: UserId) -> Option<UserId> {
        if user == self.lo {
            Some(self.hi)
        } else if user == self.hi {
            Some(self.lo)
        } else {
            None
        }
    }
}

/// Resolve the conversation key for two participants.
pub fn resolve(a: UserId, b: UserId) -> ConversationKey {
    ConversationKey::resolve(a, b)
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.lo, self.hi)
    }
}

impl FromStr for ConversationKey {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ConversationKey {
    type Error = ParleyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConversationKey> for String {
    fn from(key: ConversationKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_sender_independent() {
        assert_eq!(resolve(7, 3).to_string(), "3_7");
        assert_eq!(resolve(3, 7).to_string(), "3_7");
    }

    #[test]
    fn test_resolve_handles_negative_and_equal_ids() {
        assert_eq!(resolve(5, -2).to_string(), "-2_5");
        assert_eq!(resolve(4, 4).to_string(), "4_4");
        assert_eq!(resolve(4, 4).peer_of(4), Some(4));
    }

    #[test]
    fn test_parse_accepts_canonical_keys() {
        let key = ConversationKey::parse("-2_5").unwrap();
        assert_eq!(key.participants(), (-2, 5));
        assert!(key.involves(5));
        assert_eq!(key.peer_of(-2), Some(5));
        assert_eq!(key.peer_of(9), None);
    }

    #[test]
    fn test_parse_rejects_non_canonical_keys() {
        for raw in ["5_2", "05_7", "+1_2", "1-2", "1_", "_2", "a_b", "1_2_3", ""] {
            let err = ConversationKey::parse(raw).unwrap_err();
            assert!(
                matches!(
                    err,
                    ParleyError::Validation(ValidationError::InvalidConversationKey { .. })
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serde_uses_string_form() {
        let key = resolve(12, 4);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"4_12\"");
        let back: ConversationKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<ConversationKey>("\"12_4\"").is_err());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Resolution is symmetric in its arguments.
        #[test]
        fn prop_resolve_is_symmetric(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(resolve(a, b), resolve(b, a));
        }

        /// Rendered keys parse back to the same key.
        #[test]
        fn prop_rendered_key_parses(a in any::<i64>(), b in any::<i64>()) {
            let key = resolve(a, b);
            prop_assert_eq!(ConversationKey::parse(&key.to_string()).unwrap(), key);
        }

        /// Both participants see each other as peers.
        #[test]
        fn prop_peers_are_mutual(a in any::<i64>(), b in any::<i64>()) {
            let key = resolve(a, b);
            prop_assert_eq!(key.peer_of(a), Some(b));
            prop_assert_eq!(key.peer_of(b), Some(a));
        }
    }
}
