//! Telegram Bot API client.

use crate::error::MessengerError;
use crate::messenger::{DownloadedFile, Messenger, ReplyMarkup};
use async_trait::async_trait;
use ledgerbot_core::{ChatId, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration for the Telegram bot.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather.
    pub bot_token: String,
    /// API root. Overridable for a local Bot API server.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Expected value of the `X-Telegram-Bot-Api-Secret-Token` header.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

/// Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl TelegramClient {
    /// Creates a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &TelegramConfig, timeout: Duration) -> Result<Self, MessengerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MessengerError::Transport {
                method: "client".to_string(),
                reason: format!("HTTP client error: {e}"),
            })?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.bot_token, file_path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, MessengerError> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| MessengerError::Transport {
                method: method.to_string(),
                // The URL carries the token; keep it out of logs.
                reason: e.without_url().to_string(),
            })?;

        let parsed: ApiResponse<T> =
            response
                .json()
                .await
                .map_err(|e| MessengerError::InvalidResponse {
                    method: method.to_string(),
                    reason: e.without_url().to_string(),
                })?;

        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => Err(MessengerError::Rejected {
                method: method.to_string(),
                description: parsed
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }
            .into()),
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    #[instrument(skip(self, text, markup), fields(chat_id = %chat_id))]
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), MessengerError> {
        let mut body = json!({
            "chat_id": chat_id.get(),
            "text": text,
        });
        if let Some(markup) = markup {
            body["reply_markup"] = serde_json::to_value(markup.to_wire()).map_err(|e| {
                MessengerError::InvalidResponse {
                    method: "sendMessage".to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
        let _: serde_json::Value = self.call("sendMessage", body).await?;
        debug!("message sent");
        Ok(())
    }

    #[instrument(skip(self), fields(chat_id = %chat_id))]
    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: i64,
    ) -> Result<(), MessengerError> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({"chat_id": chat_id.get(), "message_id": message_id}),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn resolve_file(&self, file_ref: &str) -> Result<String, MessengerError> {
        let file: File = self.call("getFile", json!({"file_id": file_ref})).await?;
        let path = file.file_path.ok_or_else(|| MessengerError::InvalidResponse {
            method: "getFile".to_string(),
            reason: "file_path missing".to_string(),
        })?;
        Ok(self.file_url(&path))
    }

    #[instrument(skip(self, url))]
    async fn download(&self, url: &str) -> Result<DownloadedFile, MessengerError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| MessengerError::Transport {
                method: "download".to_string(),
                reason: e.without_url().to_string(),
            })?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MessengerError::Transport {
                method: "download".to_string(),
                reason: e.without_url().to_string(),
            })?;
        Ok(DownloadedFile {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;

    fn client() -> TelegramClient {
        TelegramClient::new(
            &TelegramConfig {
                bot_token: "123:abc".to_string(),
                api_base: "https://api.telegram.org/".to_string(),
                webhook_secret: None,
            },
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[test]
    fn method_and_file_urls() {
        let client = client();
        assert_eq!(
            client.method_url("getFile"),
            "https://api.telegram.org/bot123:abc/getFile"
        );
        assert_eq!(
            client.file_url("photos/file_1.jpg"),
            "https://api.telegram.org/file/bot123:abc/photos/file_1.jpg"
        );
    }

    #[test]
    fn api_response_error_envelope_parses() {
        let parsed: ApiResponse<File> = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: wrong file_id"}"#,
        )
        .expect("parse");
        assert!(!parsed.ok);
        assert!(parsed.result.is_none());
        assert_eq!(
            parsed.description.as_deref(),
            Some("Bad Request: wrong file_id")
        );
    }

    fn mocked(server: &MockServer) -> TelegramClient {
        TelegramClient::new(
            &TelegramConfig {
                bot_token: "test-token".to_string(),
                api_base: server.base_url(),
                webhook_secret: None,
            },
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn get_file_resolves_to_download_url() {
        let server = MockServer::start_async().await;
        let get_file = server
            .mock_async(|when, then| {
                when.method(POST).path("/bottest-token/getFile");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":{"file_id":"photo-abc","file_path":"photos/file_7.jpg"}}"#);
            })
            .await;

        let url = mocked(&server)
            .resolve_file("photo-abc")
            .await
            .expect("resolve");
        assert_eq!(
            url,
            format!("{}/file/bottest-token/photos/file_7.jpg", server.base_url())
        );
        get_file.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_call_carries_description() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bottest-token/sendMessage");
                then.status(400)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#);
            })
            .await;

        let err = mocked(&server)
            .send_message(ChatId::new(7), "hello", None)
            .await
            .expect_err("rejected");
        assert_eq!(
            err.current_context(),
            &MessengerError::Rejected {
                method: "sendMessage".to_string(),
                description: "Bad Request: chat not found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn get_file_without_path_is_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bottest-token/getFile");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":{"file_id":"photo-abc"}}"#);
            })
            .await;

        let err = mocked(&server)
            .resolve_file("photo-abc")
            .await
            .expect_err("no file_path");
        assert!(matches!(
            err.current_context(),
            MessengerError::InvalidResponse { .. }
        ));
    }

    #[tokio::test]
    async fn download_keeps_content_type() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/file/bottest-token/photos/file_7.png");
                then.status(200)
                    .header("content-type", "image/png")
                    .body([0x89, b'P', b'N', b'G']);
            })
            .await;

        let file = mocked(&server)
            .download(&server.url("/file/bottest-token/photos/file_7.png"))
            .await
            .expect("download");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.bytes, vec![0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn download_of_missing_file_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/file/bottest-token/photos/gone.jpg");
                then.status(404);
            })
            .await;

        let err = mocked(&server)
            .download(&server.url("/file/bottest-token/photos/gone.jpg"))
            .await
            .expect_err("missing");
        assert!(matches!(
            err.current_context(),
            MessengerError::Transport { method, .. } if method == "download"
        ));
    }

    #[test]
    fn telegram_config_defaults() {
        let config: TelegramConfig =
            serde_json::from_str(r#"{"bot_token": "t"}"#).expect("parse");
        assert_eq!(config.api_base, "https://api.telegram.org");
        assert!(config.webhook_secret.is_none());
    }
}
