//! Parley API - Messaging Service and HTTP Layer
//!
//! `MessagingService` composes the message log, the conversation index and
//! the pagination engine into the two-party messaging contract. The routes
//! module exposes that contract over Axum; `seed` populates a store with
//! realistic test data.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;
pub mod service;
pub mod telemetry;
pub mod types;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use seed::{seed, SeedConfig, SeedReport, SeededMessage, SeededUser};
pub use service::{FanOutStatus, MessagingService, PendingFanOut, SendOutcome};
pub use types::{
    BeforeParams, ConversationSummary, FanOutReport, MessageRecord, PageParams, ScrollParams,
    SendMessageRequest, SendMessageResponse,
};
