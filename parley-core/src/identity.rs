//! Time-ordered message identifiers
//!
//! A [`MessageId`] is both the clustering key of a message row and its only
//! timestamp. Ordering is defined on the struct fields (time, counter, node),
//! never on a UUID's byte order, although the packed form uses the UUIDv7
//! bit layout so ids render as ordinary UUID strings on the wire.

use crate::{ParleyError, ParleyResult, Timestamp, ValidationError};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

const TIMESTAMP_BITS: u32 = 48;
const COUNTER_BITS: u32 = 12;
const NODE_BITS: u32 = 62;

/// Largest representable unix timestamp in milliseconds.
pub const MAX_TIMESTAMP_MS: u64 = (1 << TIMESTAMP_BITS) - 1;
/// Largest per-millisecond counter value.
pub const MAX_COUNTER: u16 = (1 << COUNTER_BITS) - 1;
/// Largest node value.
pub const MAX_NODE: u64 = (1 << NODE_BITS) - 1;

const VERSION: u128 = 0x7;
const VARIANT: u128 = 0b10;

/// Time-ordered, globally unique message identifier.
///
/// Field order matters: the derived `Ord` compares `timestamp_ms`, then
/// `counter`, then `node`, which is exactly the bit order of the packed
/// 128-bit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId {
    timestamp_ms: u64,
    counter: u16,
    node: u64,
}

impl MessageId {
    /// Smallest possible id.
    pub const MIN: MessageId = MessageId {
        timestamp_ms: 0,
        counter: 0,
        node: 0,
    };

    /// Largest possible id.
    pub const MAX: MessageId = MessageId {
        timestamp_ms: MAX_TIMESTAMP_MS,
        counter: MAX_COUNTER,
        node: MAX_NODE,
    };

    /// Build an id from its components. The timestamp saturates at
    /// [`MAX_TIMESTAMP_MS`]; `counter` and `node` are masked to their bit
    /// widths, so out-of-range values wrap.
    pub fn from_parts(timestamp_ms: u64, counter: u16, node: u64) -> Self {
        Self {
            timestamp_ms: timestamp_ms.min(MAX_TIMESTAMP_MS),
            counter: counter & MAX_COUNTER,
            node: node & MAX_NODE,
        }
    }

    /// Boundary id for wall-clock time `at`.
    ///
    /// For every id `x`, `x < MessageId::boundary(at)` holds exactly when
    /// `x.timestamp() < at`. Sub-millisecond remainders round the boundary
    /// up, because ids only carry millisecond precision.
    pub fn boundary(at: Timestamp) -> Self {
        let millis = at.timestamp_millis();
        let has_fraction = at.timestamp_subsec_nanos() % 1_000_000 != 0;
        let ceil = if has_fraction {
            millis.saturating_add(1)
        } else {
            millis
        };
        Self::from_parts(clamp_millis(ceil), 0, 0)
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn node(&self) -> u64 {
        self.node
    }

    /// Wall-clock time embedded in this id (millisecond precision).
    pub fn timestamp(&self) -> Timestamp {
        DateTime::from_timestamp_millis(self.timestamp_ms as i64).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Pack into 128 bits using the UUIDv7 layout.
    pub fn as_u128(&self) -> u128 {
        ((self.timestamp_ms as u128) << 80)
            | (VERSION << 76)
            | ((self.counter as u128) << 64)
            | (VARIANT << 62)
            | self.node as u128
    }

    /// Unpack a value produced by [`MessageId::as_u128`].
    pub fn from_u128(value: u128) -> ParleyResult<Self> {
        let version = (value >> 76) & 0xF;
        let variant = (value >> 62) & 0b11;
        if version != VERSION || variant != VARIANT {
            return Err(ParleyError::Validation(ValidationError::InvalidMessageId {
                value: Uuid::from_u128(value).to_string(),
            }));
        }
        Ok(Self {
            timestamp_ms: (value >> 80) as u64,
            counter: ((value >> 64) as u16) & MAX_COUNTER,
            node: (value as u64) & MAX_NODE,
        })
    }

    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_u128(self.as_u128())
    }

    pub fn from_uuid(uuid: Uuid) -> ParleyResult<Self> {
        Self::from_u128(uuid.as_u128())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_uuid().hyphenated(), f)
    }
}

impl FromStr for MessageId {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(|_| {
            ParleyError::Validation(ValidationError::InvalidMessageId {
                value: s.to_string(),
            })
        })?;
        Self::from_uuid(uuid)
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Boundary id for "messages before `at`" range queries.
pub fn id_from_time(at: Timestamp) -> MessageId {
    MessageId::boundary(at)
}

/// Wall-clock time embedded in `id`.
pub fn time_from_id(id: &MessageId) -> Timestamp {
    id.timestamp()
}

fn clamp_millis(millis: i64) -> u64 {
    if millis <= 0 {
        0
    } else {
        (millis as u64).min(MAX_TIMESTAMP_MS)
    }
}

// ============================================================================
// CLOCKS
// ============================================================================

/// Source of wall-clock time for id generation.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// GENERATOR
// ============================================================================

#[derive(Debug, Default)]
struct GeneratorState {
    last_ms: u64,
    counter: u16,
}

/// Mints strictly increasing [`MessageId`]s.
///
/// Each generator owns a random node value, so ids from different processes
/// never collide even when time and counter match. Within one generator the
/// `(last_ms, counter)` state only moves forward: a stalled or rewound clock
/// advances the counter, and a full counter advances the logical millisecond.
#[derive(Debug)]
pub struct MessageIdGenerator {
    node: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl MessageIdGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let node = rand::rng().random::<u64>() & MAX_NODE;
        Self::with_node(clock, node)
    }

    /// Generator on the system clock.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn with_node(clock: Arc<dyn Clock>, node: u64) -> Self {
        Self {
            node: node & MAX_NODE,
            clock,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    pub fn node(&self) -> u64 {
        self.node
    }

    /// Next id, strictly greater than every id this generator returned before.
    pub fn next_id(&self) -> MessageId {
        let now_ms = clamp_millis(self.clock.now().timestamp_millis());
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if now_ms > state.last_ms {
            state.last_ms = now_ms;
            state.counter = 0;
        } else if state.counter < MAX_COUNTER {
            state.counter += 1;
        } else {
            state.last_ms = (state.last_ms + 1).min(MAX_TIMESTAMP_MS);
            state.counter = 0;
        }

        MessageId::from_parts(state.last_ms, state.counter, self.node)
    }

    /// Id for an arbitrary point in time, for backfills and seed data.
    ///
    /// Counter and node are random, so these ids do not participate in the
    /// generator's monotonic sequence.
    pub fn id_at(&self, at: Timestamp) -> MessageId {
        let mut rng = rand::rng();
        MessageId::from_parts(
            clamp_millis(at.timestamp_millis()),
            rng.random::<u16>(),
            rng.random::<u64>(),
        )
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::system()
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_message_id() -> impl Strategy<Value = MessageId> {
        (0..=MAX_TIMESTAMP_MS, 0..=MAX_COUNTER, 0..=MAX_NODE)
            .prop_map(|(ts, counter, node)| MessageId::from_parts(ts, counter, node))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Packed and struct orderings agree.
        #[test]
        fn prop_packed_order_matches_struct_order(a in arb_message_id(), b in arb_message_id()) {
            prop_assert_eq!(a.cmp(&b), a.as_u128().cmp(&b.as_u128()));
        }

        /// Hyphenated strings sort like the ids they encode.
        #[test]
        fn prop_string_order_matches_struct_order(a in arb_message_id(), b in arb_message_id()) {
            prop_assert_eq!(a.cmp(&b), a.to_string().cmp(&b.to_string()));
        }

        /// Rebuilding an id from its own time never reorders it against others.
        #[test]
        fn prop_boundary_of_time_orders_consistently(a in arb_message_id(), b in arb_message_id()) {
            let ba = id_from_time(time_from_id(&a));
            let bb = id_from_time(time_from_id(&b));
            prop_assert!(ba <= a);
            if a <= b {
                prop_assert!(ba <= bb);
            }
        }

        /// `x < boundary(t)` iff `time(x) < t`.
        #[test]
        fn prop_boundary_is_strictly_before(
            id in arb_message_id(),
            t_ms in 0i64..(MAX_TIMESTAMP_MS as i64),
            sub_ms_nanos in 0u32..1_000_000,
        ) {
            let t = DateTime::from_timestamp_millis(t_ms).unwrap()
                + chrono::Duration::nanoseconds(sub_ms_nanos as i64);
            prop_assert_eq!(id < id_from_time(t), time_from_id(&id) < t);
        }

        /// Time extracted from sequential ids never goes backwards.
        #[test]
        fn prop_time_from_new_ids_is_non_decreasing(steps in prop::collection::vec(-5i64..5, 1..50)) {
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let generator = MessageIdGenerator::new(clock.clone());
            let mut previous = time_from_id(&generator.next_id());
            for step in steps {
                clock.advance(chrono::Duration::milliseconds(step));
                let current = time_from_id(&generator.next_id());
                prop_assert!(current >= previous);
                previous = current;
            }
        }
    }
}
