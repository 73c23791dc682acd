//! UseDesk API client.
//!
//! Every endpoint is a JSON `POST` carrying the API token in the body.
//! Failures are sometimes reported as `200` with an `error` field.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::HelpdeskConfig;

use super::types::{
    ClientId, CommentVisibility, Helpdesk, HelpdeskClient, HelpdeskError, NewTicket, SearchMode,
    TicketId, TicketStatus,
};

/// UseDesk API client.
pub struct UseDeskClient {
    client: Client,
    api_url: String,
    api_token: String,
}

impl UseDeskClient {
    pub fn new(config: &HelpdeskConfig) -> Result<Self, HelpdeskError> {
        if config.api_token.is_empty() {
            return Err(HelpdeskError::NotConfigured(
                "UseDesk API token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    /// POST `body` plus the API token to `endpoint` and return the JSON reply.
    async fn call(&self, endpoint: &str, body: Value) -> Result<Value, HelpdeskError> {
        let url = format!("{}/{}", self.api_url, endpoint);

        let mut payload = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        payload.insert("api_token".to_string(), Value::String(self.api_token.clone()));

        debug!(endpoint = endpoint, "UseDesk request");

        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HelpdeskError::ApiError {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let value: Value = response.json().await.map_err(|e| {
            HelpdeskError::ParseError(format!("Failed to parse {} response: {}", endpoint, e))
        })?;

        if let Some(error) = value.get("error") {
            return Err(HelpdeskError::ApiError {
                status: status.as_u16(),
                message: value_to_string(error),
            });
        }

        Ok(value)
    }
}

#[async_trait]
impl Helpdesk for UseDeskClient {
    fn name(&self) -> &str {
        "usedesk"
    }

    async fn search_clients(
        &self,
        query: &str,
        mode: SearchMode,
    ) -> Result<Vec<HelpdeskClient>, HelpdeskError> {
        let value = self
            .call(
                "clients",
                json!({ "query": query, "search_type": mode.as_str() }),
            )
            .await?;
        parse_clients(&value)
    }

    async fn update_client(
        &self,
        client_id: ClientId,
        name: &str,
        position: &str,
    ) -> Result<(), HelpdeskError> {
        self.call(
            "update/client",
            json!({ "client_id": client_id, "name": name, "position": position }),
        )
        .await?;
        Ok(())
    }

    async fn create_client(
        &self,
        name: &str,
        phone: &str,
        position: &str,
    ) -> Result<ClientId, HelpdeskError> {
        let value = self
            .call(
                "create/client",
                json!({ "name": name, "phone": phone, "position": position }),
            )
            .await?;
        id_field(&value, &["client_id", "id"])
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<TicketId, HelpdeskError> {
        let value = self
            .call(
                "create/ticket",
                json!({
                    "subject": ticket.subject,
                    "message": ticket.message,
                    "client_id": ticket.client_id,
                    "channel_id": ticket.channel_id,
                    "from": ticket.from,
                }),
            )
            .await?;
        id_field(&value, &["ticket_id", "id"])
    }

    async fn update_ticket(
        &self,
        ticket_id: TicketId,
        subject: &str,
        tag: Option<&str>,
    ) -> Result<(), HelpdeskError> {
        let mut body = json!({ "ticket_id": ticket_id, "subject": subject });
        if let Some(tag) = tag {
            body["tag"] = Value::String(tag.to_string());
        }
        self.call("update/ticket", body).await?;
        Ok(())
    }

    async fn create_comment(
        &self,
        ticket_id: TicketId,
        message: &str,
        visibility: CommentVisibility,
        from: &str,
    ) -> Result<(), HelpdeskError> {
        self.call(
            "create/comment",
            json!({
                "ticket_id": ticket_id,
                "message": message,
                "type": visibility.as_str(),
                "from": from,
            }),
        )
        .await?;
        Ok(())
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> Result<TicketStatus, HelpdeskError> {
        let value = self.call("ticket", json!({ "ticket_id": ticket_id })).await?;
        Ok(parse_ticket_status(&value))
    }
}

/// Client search replies come either as a bare array or as `{"clients": [...]}`.
fn parse_clients(value: &Value) -> Result<Vec<HelpdeskClient>, HelpdeskError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("clients") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(other) => {
                return Err(HelpdeskError::ParseError(format!(
                    "unexpected clients field: {}",
                    other
                )))
            }
        },
        other => {
            return Err(HelpdeskError::ParseError(format!(
                "unexpected client search reply: {}",
                other
            )))
        }
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let id = item.get("id").and_then(as_id)?;
            Some(HelpdeskClient {
                id,
                phones: item.get("phone").map(phones_from).unwrap_or_default(),
                tickets: item
                    .get("tickets")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(as_id).collect())
                    .unwrap_or_default(),
            })
        })
        .collect())
}

/// Phones arrive as a comma-joined string, a list of strings, or a list of
/// `{"phone": ...}` objects.
fn phones_from(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::Object(map) => map.get("phone").map(phones_from).unwrap_or_default(),
                other => phones_from(other),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_ticket_status(value: &Value) -> TicketStatus {
    let status_id = value
        .get("ticket")
        .and_then(|t| t.get("status_id"))
        .filter(|s| !s.is_null())
        .map(value_to_string);
    TicketStatus { status_id }
}

fn id_field(value: &Value, keys: &[&str]) -> Result<u64, HelpdeskError> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(as_id))
        .ok_or_else(|| HelpdeskError::ParseError(format!("no id in reply: {}", value)))
}

fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
