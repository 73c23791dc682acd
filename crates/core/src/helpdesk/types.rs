//! Types for the helpdesk integration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::normalize_phone;

pub type ClientId = u64;
pub type TicketId = u64;

/// A client record as returned by a helpdesk search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpdeskClient {
    pub id: ClientId,
    /// Phone numbers attached to the client, normalized.
    pub phones: Vec<String>,
    /// Ids of the client's tickets, in the order the helpdesk lists them.
    pub tickets: Vec<TicketId>,
}

impl HelpdeskClient {
    /// Exact match against one of the client's phones.
    pub fn has_phone(&self, phone: &str) -> bool {
        let phone = normalize_phone(phone);
        !phone.is_empty() && self.phones.iter().any(|p| normalize_phone(p) == phone)
    }
}

/// How the helpdesk should match a client search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    PartialMatch,
    FullMatch,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::PartialMatch => "partial_match",
            SearchMode::FullMatch => "full_match",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentVisibility {
    Public,
    Private,
}

impl CommentVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentVisibility::Public => "public",
            CommentVisibility::Private => "private",
        }
    }
}

/// Request to open a new ticket for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub subject: String,
    pub message: String,
    pub client_id: ClientId,
    pub channel_id: String,
    pub from: String,
}

/// Live status of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TicketStatus {
    /// Status id as reported; `None` when the helpdesk did not say.
    pub status_id: Option<String>,
}

impl TicketStatus {
    pub fn new(status_id: impl Into<String>) -> Self {
        Self {
            status_id: Some(status_id.into()),
        }
    }

    /// Open means a known status other than the closed one.
    pub fn is_open(&self, closed_status_id: &str) -> bool {
        self.status_id
            .as_deref()
            .is_some_and(|s| !s.is_empty() && s != closed_status_id)
    }
}

/// Errors that can occur talking to the helpdesk.
#[derive(Debug, Error)]
pub enum HelpdeskError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Client not configured (missing API token, etc.).
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

/// Operations the workflow needs from a helpdesk.
#[async_trait]
pub trait Helpdesk: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    async fn search_clients(
        &self,
        query: &str,
        mode: SearchMode,
    ) -> Result<Vec<HelpdeskClient>, HelpdeskError>;

    async fn update_client(
        &self,
        client_id: ClientId,
        name: &str,
        position: &str,
    ) -> Result<(), HelpdeskError>;

    async fn create_client(
        &self,
        name: &str,
        phone: &str,
        position: &str,
    ) -> Result<ClientId, HelpdeskError>;

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<TicketId, HelpdeskError>;

    async fn update_ticket(
        &self,
        ticket_id: TicketId,
        subject: &str,
        tag: Option<&str>,
    ) -> Result<(), HelpdeskError>;

    async fn create_comment(
        &self,
        ticket_id: TicketId,
        message: &str,
        visibility: CommentVisibility,
        from: &str,
    ) -> Result<(), HelpdeskError>;

    async fn get_ticket(&self, ticket_id: TicketId) -> Result<TicketStatus, HelpdeskError>;
}
