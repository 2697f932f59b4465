//! Chat conversation for ledgerbot.
//!
//! This crate provides:
//!
//! - **Session Store**: per-chat state with pending-auth expiry and
//!   single-device binding
//! - **Auth Negotiator**: email and password challenge
//! - **Conversation Engine**: the menu flow, driven by an explicit
//!   transition table
//! - **Media Intake**: receipt images into blob storage
//! - **Dispatcher**: one webhook delivery end to end

pub mod auth;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod input;
pub mod media;
pub mod memory;
pub mod reply;
pub mod session;
pub mod transition;

pub use auth::{AuthNegotiator, AuthTurn, DEFAULT_MAX_PASSWORD_ATTEMPTS};
pub use dispatcher::Dispatcher;
pub use engine::ConversationEngine;
pub use error::{ConversationError, SessionStoreError};
pub use input::{Input, MenuChoice};
pub use media::MediaIntake;
pub use memory::{
    InMemoryAccounts, InMemoryBlobStore, InMemorySessionBackend, RecordingMessenger, SentMessage,
};
pub use reply::Reply;
pub use session::{
    AuthStep, ChatSession, DEFAULT_PENDING_TTL_MINUTES, DraftEntry, MenuState, PaymentMethod,
    PendingAuth, SessionBackend, SessionState, SessionStore,
};
pub use transition::{Command, Notice, transition};
