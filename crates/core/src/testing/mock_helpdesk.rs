//! Mock helpdesk for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::helpdesk::{
    ClientId, CommentVisibility, Helpdesk, HelpdeskClient, HelpdeskError, NewTicket, SearchMode,
    TicketId, TicketStatus,
};
use crate::ledger::normalize_phone;

/// A recorded helpdesk call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelpdeskCall {
    SearchClients {
        query: String,
        mode: SearchMode,
    },
    UpdateClient {
        client_id: ClientId,
        name: String,
        position: String,
    },
    CreateClient {
        name: String,
        phone: String,
        position: String,
    },
    CreateTicket(NewTicket),
    UpdateTicket {
        ticket_id: TicketId,
        subject: String,
        tag: Option<String>,
    },
    CreateComment {
        ticket_id: TicketId,
        message: String,
        visibility: CommentVisibility,
        from: String,
    },
    GetTicket(TicketId),
}

/// Mock implementation of the Helpdesk trait.
///
/// Provides controllable behavior for testing:
/// - Seed clients and ticket statuses
/// - Record every call, including calls that fail
/// - Fail searches for given phones, or fail every call
///
/// # Example
///
/// ```rust,ignore
/// use esfwatch_core::testing::MockHelpdesk;
///
/// let helpdesk = MockHelpdesk::new();
/// helpdesk.add_client(10, "77011112233", &[555]).await;
/// helpdesk.set_ticket_status(555, "1").await;
///
/// // ... run the workflow ...
///
/// assert_eq!(helpdesk.call_count().await, 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHelpdesk {
    clients: Arc<RwLock<Vec<HelpdeskClient>>>,
    tickets: Arc<RwLock<HashMap<TicketId, TicketStatus>>>,
    calls: Arc<RwLock<Vec<HelpdeskCall>>>,
    next_ticket_id: Arc<RwLock<TicketId>>,
    failing_phones: Arc<RwLock<HashSet<String>>>,
    failing_updates: Arc<RwLock<HashSet<TicketId>>>,
    fail_all: Arc<RwLock<bool>>,
}

impl MockHelpdesk {
    /// Create a mock helpdesk with no clients.
    pub fn new() -> Self {
        Self {
            next_ticket_id: Arc::new(RwLock::new(1000)),
            ..Default::default()
        }
    }

    /// Add a client with the given phone and ticket ids.
    pub async fn add_client(&self, id: ClientId, phone: &str, tickets: &[TicketId]) {
        self.clients.write().await.push(HelpdeskClient {
            id,
            phones: vec![normalize_phone(phone)],
            tickets: tickets.to_vec(),
        });
    }

    /// Set the live status of a ticket.
    pub async fn set_ticket_status(&self, ticket_id: TicketId, status_id: &str) {
        self.tickets
            .write()
            .await
            .insert(ticket_id, TicketStatus::new(status_id));
    }

    /// Id the next created ticket will get.
    pub async fn set_next_ticket_id(&self, id: TicketId) {
        *self.next_ticket_id.write().await = id;
    }

    /// Make client searches for `phone` fail.
    pub async fn fail_search_for(&self, phone: &str) {
        self.failing_phones
            .write()
            .await
            .insert(normalize_phone(phone));
    }

    /// Make ticket updates of `ticket_id` fail.
    pub async fn fail_update_of(&self, ticket_id: TicketId) {
        self.failing_updates.write().await.insert(ticket_id);
    }

    /// Make every call fail. Calls are still recorded.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// All calls so far.
    pub async fn calls(&self) -> Vec<HelpdeskCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Ticket creations recorded so far.
    pub async fn created_tickets(&self) -> Vec<NewTicket> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                HelpdeskCall::CreateTicket(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Record the call, then fail it if everything is set to fail.
    async fn record(&self, call: HelpdeskCall) -> Result<(), HelpdeskError> {
        self.calls.write().await.push(call);
        if *self.fail_all.read().await {
            return Err(HelpdeskError::ApiError {
                status: 503,
                message: "helpdesk unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Helpdesk for MockHelpdesk {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search_clients(
        &self,
        query: &str,
        mode: SearchMode,
    ) -> Result<Vec<HelpdeskClient>, HelpdeskError> {
        self.record(HelpdeskCall::SearchClients {
            query: query.to_string(),
            mode,
        })
        .await?;

        let query = normalize_phone(query);
        if self.failing_phones.read().await.contains(&query) {
            return Err(HelpdeskError::ParseError(
                "injected search failure".to_string(),
            ));
        }

        Ok(self
            .clients
            .read()
            .await
            .iter()
            .filter(|c| {
                c.phones.iter().any(|p| match mode {
                    SearchMode::PartialMatch => !query.is_empty() && p.contains(&query),
                    SearchMode::FullMatch => *p == query,
                })
            })
            .cloned()
            .collect())
    }

    async fn update_client(
        &self,
        client_id: ClientId,
        name: &str,
        position: &str,
    ) -> Result<(), HelpdeskError> {
        self.record(HelpdeskCall::UpdateClient {
            client_id,
            name: name.to_string(),
            position: position.to_string(),
        })
        .await
    }

    async fn create_client(
        &self,
        name: &str,
        phone: &str,
        position: &str,
    ) -> Result<ClientId, HelpdeskError> {
        self.record(HelpdeskCall::CreateClient {
            name: name.to_string(),
            phone: phone.to_string(),
            position: position.to_string(),
        })
        .await?;

        let mut clients = self.clients.write().await;
        let id = clients.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        clients.push(HelpdeskClient {
            id,
            phones: vec![normalize_phone(phone)],
            tickets: Vec::new(),
        });
        Ok(id)
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<TicketId, HelpdeskError> {
        self.record(HelpdeskCall::CreateTicket(ticket.clone()))
            .await?;

        let id = {
            let mut next = self.next_ticket_id.write().await;
            let id = *next;
            *next += 1;
            id
        };
        self.tickets.write().await.insert(id, TicketStatus::new("1"));
        if let Some(client) = self
            .clients
            .write()
            .await
            .iter_mut()
            .find(|c| c.id == ticket.client_id)
        {
            client.tickets.push(id);
        }
        Ok(id)
    }

    async fn update_ticket(
        &self,
        ticket_id: TicketId,
        subject: &str,
        tag: Option<&str>,
    ) -> Result<(), HelpdeskError> {
        self.record(HelpdeskCall::UpdateTicket {
            ticket_id,
            subject: subject.to_string(),
            tag: tag.map(str::to_string),
        })
        .await?;

        if self.failing_updates.read().await.contains(&ticket_id) {
            return Err(HelpdeskError::ApiError {
                status: 500,
                message: "injected update failure".to_string(),
            });
        }
        Ok(())
    }

    async fn create_comment(
        &self,
        ticket_id: TicketId,
        message: &str,
        visibility: CommentVisibility,
        from: &str,
    ) -> Result<(), HelpdeskError> {
        self.record(HelpdeskCall::CreateComment {
            ticket_id,
            message: message.to_string(),
            visibility,
            from: from.to_string(),
        })
        .await
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> Result<TicketStatus, HelpdeskError> {
        self.record(HelpdeskCall::GetTicket(ticket_id)).await?;
        Ok(self
            .tickets
            .read()
            .await
            .get(&ticket_id)
            .cloned()
            .unwrap_or_default())
    }
}
