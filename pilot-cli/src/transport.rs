//! Outbound messages. The daemon only needs "send text to chat X".

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telegram rejects longer messages.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const API_BASE: &str = "https://api.telegram.org";

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Telegram Bot API `sendMessage`, plain text.
pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramTransport {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            token: token.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.token)
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let body = SendMessage {
                chat_id,
                text: &chunk,
                disable_web_page_preview: true,
            };
            let resp = self
                .client
                .post(self.endpoint())
                .json(&body)
                .send()
                .await
                .context("telegram request")?;

            let status = resp.status();
            let out: ApiResponse = resp.json().await.context("parse telegram response")?;
            if !status.is_success() || !out.ok {
                bail!(
                    "telegram error: {status} {}",
                    out.description.unwrap_or_default()
                );
            }
        }
        tracing::debug!(chat_id, "message delivered");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

/// Prints to stdout. Used when no bot token is configured.
#[derive(Debug, Default)]
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        println!("── to {chat_id} ──\n{text}\n");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Split on line boundaries so each piece fits `limit` chars. A single line
/// longer than `limit` is cut hard.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0;
    for line in text.split('\n') {
        let mut line: Vec<char> = line.chars().collect();
        while line.len() > limit {
            if cur_len > 0 {
                out.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            let rest = line.split_off(limit);
            out.push(line.into_iter().collect());
            line = rest;
        }

        let extra = if cur_len == 0 { line.len() } else { line.len() + 1 };
        if cur_len + extra > limit {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        if cur_len > 0 {
            cur.push('\n');
            cur_len += 1;
        }
        cur.extend(line.iter());
        cur_len += line.len();
    }
    if cur_len > 0 {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_message() {
        assert_eq!(split_message("hello\nworld", 4096), vec!["hello\nworld"]);
    }

    #[test]
    fn splits_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 9), vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn long_line_is_cut() {
        let parts = split_message("абвгдеёжз\nx", 4);
        assert_eq!(parts, vec!["абвг", "деёж", "з\nx"]);
        assert!(parts.iter().all(|p| p.chars().count() <= 4));
    }

    #[test]
    fn endpoint_carries_token() {
        let t = TelegramTransport::new("123:abc").unwrap();
        assert_eq!(t.endpoint(), "https://api.telegram.org/bot123:abc/sendMessage");
        assert_eq!(t.name(), "telegram");
    }
}
