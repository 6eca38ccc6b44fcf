//! Parley Storage - Store Trait, Message Log and Conversation Index
//!
//! Defines the wide-column store abstraction and the two components built on
//! it: the per-conversation message log and the per-user conversation index.
//! `InMemoryStore` is the reference implementation used by tests, the seed
//! tool and the development server.

pub mod conversation_index;
pub mod memory;
pub mod message_store;
pub mod schema;
pub mod store;

pub use conversation_index::{fan_out_entries, ConversationIndex, UserConversations};
pub use memory::{FaultInjector, InMemoryStore, StoreStats};
pub use message_store::{MessageStore, MessageStream};
pub use store::{IndexCursor, WideColumnStore};

// ============================================================================
// PROPERTY TESTS
// ============================================================================
