//! External services used by the ledgerbot chat channel.
//!
//! This crate provides:
//!
//! - **Messenger**: outbound messages and file access on the messaging
//!   platform, with a Telegram Bot API client
//! - **Blob store**: receipt image uploads over HTTP
//! - **Updates**: the inbound webhook payload

pub mod blob;
pub mod error;
pub mod messenger;
pub mod telegram;
pub mod update;

pub use blob::{BlobStore, HttpBlobStore, StorageConfig};
pub use error::{BlobError, MessengerError};
pub use messenger::{DownloadedFile, Messenger, ReplyMarkup};
pub use telegram::{TelegramClient, TelegramConfig};
pub use update::{Chat, IncomingMessage, PhotoSize, Sender, Update};
