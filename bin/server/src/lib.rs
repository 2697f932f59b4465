//! ledgerbot webhook server.
//!
//! Receives Telegram updates over HTTP and hands them to the conversation
//! dispatcher. Postgres repositories implement the library store traits.

pub mod config;
pub mod db;
pub mod webhook;
