//! services/delivery_client.rs
//! Cliente de entrega: envía un mensaje a un grupo a través de una cuenta.
//! La implementación real habla con una API HTTP estilo Bot API (sendMessage / getChat).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Resultado de un intento de entrega
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub ok: bool,
    pub error: Option<String>,
    pub message_id: Option<i64>,
}

impl DeliveryResult {
    pub fn success(message_id: i64) -> Self {
        DeliveryResult {
            ok: true,
            error: None,
            message_id: Some(message_id),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        DeliveryResult {
            ok: false,
            error: Some(error.into()),
            message_id: None,
        }
    }
}

#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Nunca devuelve error: los fallos vienen como `ok = false`.
    async fn send(
        &self,
        account: &str,
        group_id: i64,
        text: &str,
        parse_mode: &str,
        disable_preview: bool,
    ) -> DeliveryResult;

    /// Best-effort; el llamador decide el fallback.
    async fn resolve_title(&self, account: &str, group_id: i64) -> Result<String>;
}

#[derive(Clone)]
pub struct BotApiClient {
    http_client: Client,
    base_url: String,
    accounts: HashMap<String, String>,
}

impl BotApiClient {
    pub fn new(base_url: &str, accounts: HashMap<String, String>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("No se pudo construir el cliente HTTP")?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            accounts,
        })
    }

    fn method_url(&self, account: &str, method: &str) -> Result<String> {
        let token = self
            .accounts
            .get(account)
            .ok_or_else(|| anyhow!("Cuenta no configurada: {}", account))?;
        Ok(format!("{}/bot{}/{}", self.base_url, token, method))
    }

    async fn call(&self, account: &str, method: &str, payload: Value) -> Result<Value> {
        let url = self.method_url(account, method)?;
        let resp = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Fallo al POST {}", method))?;

        let status = resp.status();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        let api_ok = body.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if !status.is_success() || !api_ok {
            let desc = body
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("sin descripción");
            return Err(anyhow!("{} -> {}: {}", method, status, desc));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// "plain" no manda parse_mode
fn api_parse_mode(parse_mode: &str) -> Option<&'static str> {
    match parse_mode.to_ascii_lowercase().as_str() {
        "html" => Some("HTML"),
        "markdown" | "md" => Some("Markdown"),
        "markdownv2" => Some("MarkdownV2"),
        _ => None,
    }
}

#[async_trait]
impl DeliveryClient for BotApiClient {
    async fn send(
        &self,
        account: &str,
        group_id: i64,
        text: &str,
        parse_mode: &str,
        disable_preview: bool,
    ) -> DeliveryResult {
        let mut payload = serde_json::json!({
            "chat_id": group_id,
            "text": text,
            "disable_web_page_preview": disable_preview,
        });
        if let Some(mode) = api_parse_mode(parse_mode) {
            payload["parse_mode"] = Value::from(mode);
        }

        match self.call(account, "sendMessage", payload).await {
            Ok(result) => match result.get("message_id").and_then(Value::as_i64) {
                Some(message_id) => DeliveryResult::success(message_id),
                None => DeliveryResult {
                    ok: true,
                    error: None,
                    message_id: None,
                },
            },
            Err(e) => {
                log::warn!("(send) Fallo enviando a group_id={}: {}", group_id, e);
                DeliveryResult::failure(e.to_string())
            }
        }
    }

    async fn resolve_title(&self, account: &str, group_id: i64) -> Result<String> {
        let chat = self
            .call(account, "getChat", serde_json::json!({ "chat_id": group_id }))
            .await?;

        ["title", "username", "first_name"]
            .iter()
            .find_map(|k| chat.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| anyhow!("getChat sin título para {}", group_id))
    }
}
