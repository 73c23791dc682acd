//! Workflow driver implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::chat::{ChatTarget, Notifier};
use crate::config::{Config, WorkflowConfig};
use crate::helpdesk::{
    CommentVisibility, Helpdesk, HelpdeskClient, NewTicket, SearchMode, TicketId,
};
use crate::ledger::{extract_position, LedgerColumn, LedgerEntry, LedgerIndex, LedgerSchema};
use crate::metrics;
use crate::sheets::TableStore;

use super::selection::candidates;
use super::types::{
    EntryOutcome, SkipReason, StallReason, WorkflowError, WorkflowReport, WorkflowStage,
};

/// Drives ledger entries through client resolution, ticket resolution and
/// notification, recording progress in the ledger after each step.
pub struct WorkflowDriver {
    config: WorkflowConfig,
    ticket_base_url: String,
    chat_target: ChatTarget,
    store: Arc<dyn TableStore>,
    sheet: String,
    helpdesk: Arc<dyn Helpdesk>,
    notifier: Option<Arc<dyn Notifier>>,
    step_timeout: Duration,
}

impl WorkflowDriver {
    pub fn new(
        config: &Config,
        store: Arc<dyn TableStore>,
        helpdesk: Arc<dyn Helpdesk>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            config: config.workflow.clone(),
            ticket_base_url: format!("{}/tickets", config.helpdesk.web_url.trim_end_matches('/')),
            chat_target: ChatTarget::from(&config.chat),
            store,
            sheet: config.sheets.target_sheet.clone(),
            helpdesk,
            notifier,
            step_timeout: Duration::from_secs(config.workflow.step_timeout_secs as u64),
        }
    }

    /// Stage an entry starts from this run, or why it is skipped.
    ///
    /// An entry that already has a ticket link resumes at notification.
    pub fn check(&self, entry: &LedgerEntry) -> Result<WorkflowStage, SkipReason> {
        if entry.tax_id.is_empty() || entry.phone.is_empty() || entry.name.is_empty() {
            return Err(SkipReason::MissingFields);
        }
        if entry.status != self.config.triggering_status {
            return Err(SkipReason::StatusMismatch);
        }
        if entry.is_fully_processed() {
            return Err(SkipReason::AlreadyProcessed);
        }
        if entry.ticket_url.is_empty() {
            Ok(WorkflowStage::Eligible)
        } else {
            Ok(WorkflowStage::TicketResolved)
        }
    }

    /// Entries a run would process, with their starting stage. No I/O.
    pub fn plan<'a>(&self, index: &'a LedgerIndex) -> Vec<(&'a LedgerEntry, WorkflowStage)> {
        index
            .entries()
            .into_iter()
            .filter_map(|entry| self.check(entry).ok().map(|stage| (entry, stage)))
            .collect()
    }

    /// Process every ledger entry in sheet order.
    ///
    /// Each entry is independent: a failure is logged and the loop moves on.
    pub async fn run(&self, index: &LedgerIndex, schema: &LedgerSchema) -> WorkflowReport {
        let mut report = WorkflowReport::default();

        for entry in index.entries() {
            let outcome = self.process(entry, schema).await;
            metrics::WORKFLOW_OUTCOMES
                .with_label_values(&[outcome.label()])
                .inc();
            report.record(&outcome);
        }

        report
    }

    /// Run the workflow for a single entry.
    pub async fn process(&self, entry: &LedgerEntry, schema: &LedgerSchema) -> EntryOutcome {
        let mut stage = match self.check(entry) {
            Ok(stage) => stage,
            Err(reason) => {
                debug!(row = entry.position, tax_id = %entry.tax_id, reason = ?reason, "Skipping entry");
                return EntryOutcome::Skipped(reason);
            }
        };

        info!(
            row = entry.position,
            tax_id = %entry.tax_id,
            phone = %entry.phone,
            stage = stage.as_str(),
            "Processing entry"
        );

        match self.advance(entry, schema, &mut stage).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    row = entry.position,
                    tax_id = %entry.tax_id,
                    stage = stage.as_str(),
                    error = %e,
                    "Workflow step failed, entry will be retried next run"
                );
                EntryOutcome::Failed {
                    stage,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn advance(
        &self,
        entry: &LedgerEntry,
        schema: &LedgerSchema,
        stage: &mut WorkflowStage,
    ) -> Result<EntryOutcome, WorkflowError> {
        let ticket_url = if *stage < WorkflowStage::TicketResolved {
            let Some(client) = self.resolve_client(entry).await? else {
                warn!(tax_id = %entry.tax_id, phone = %entry.phone, "No helpdesk client with this phone");
                return Ok(EntryOutcome::Stalled {
                    stage: *stage,
                    reason: StallReason::ClientNotFound,
                });
            };
            *stage = WorkflowStage::ClientResolved;

            let Some(ticket_id) = self.resolve_ticket(&client).await? else {
                warn!(
                    tax_id = %entry.tax_id,
                    client_id = client.id,
                    tickets = client.tickets.len(),
                    "Client has no open ticket"
                );
                return Ok(EntryOutcome::Stalled {
                    stage: *stage,
                    reason: StallReason::NoOpenTicket,
                });
            };

            let url = self.ticket_url(ticket_id);
            self.write_cell(schema, entry, LedgerColumn::TicketUrl, &url)
                .await?;
            *stage = WorkflowStage::TicketResolved;
            info!(tax_id = %entry.tax_id, ticket_id = ticket_id, "Linked ticket");
            url
        } else {
            debug!(tax_id = %entry.tax_id, "Ticket already linked, resuming at notification");
            entry.ticket_url.clone()
        };

        let Some(notifier) = &self.notifier else {
            warn!(tax_id = %entry.tax_id, "Chat bot not configured, notification skipped");
            return Ok(EntryOutcome::Stalled {
                stage: *stage,
                reason: StallReason::NotifierDisabled,
            });
        };

        let text = self.notification_text(&entry.tax_id, &ticket_url);
        self.call(
            "chat",
            "send_message",
            notifier.send_message(&self.chat_target, &text),
        )
        .await?;
        self.write_cell(
            schema,
            entry,
            LedgerColumn::Notified,
            &self.config.notified_marker,
        )
        .await?;
        *stage = WorkflowStage::Notified;

        info!(tax_id = %entry.tax_id, ticket_url = %ticket_url, "Entry fully processed");
        Ok(EntryOutcome::Completed)
    }

    /// Find the client whose phone list holds the entry's phone exactly, and
    /// relabel it with the tax id. Never creates a client.
    async fn resolve_client(
        &self,
        entry: &LedgerEntry,
    ) -> Result<Option<HelpdeskClient>, WorkflowError> {
        let clients = self
            .call(
                "helpdesk",
                "search_clients",
                self.helpdesk
                    .search_clients(&entry.phone, SearchMode::PartialMatch),
            )
            .await?;

        let Some(client) = clients.into_iter().find(|c| c.has_phone(&entry.phone)) else {
            return Ok(None);
        };

        let name = format!("{} {}", self.config.client_name_prefix, entry.tax_id);
        let position = extract_position(&entry.name);
        self.call(
            "helpdesk",
            "update_client",
            self.helpdesk.update_client(client.id, &name, &position),
        )
        .await?;

        debug!(client_id = client.id, name = %name, position = %position, "Updated client");
        Ok(Some(client))
    }

    /// Pick an open ticket per the configured policy and touch it, or create
    /// one when the fallback is enabled.
    async fn resolve_ticket(
        &self,
        client: &HelpdeskClient,
    ) -> Result<Option<TicketId>, WorkflowError> {
        for ticket_id in candidates(&client.tickets, self.config.ticket_policy) {
            let status = self
                .call(
                    "helpdesk",
                    "get_ticket",
                    self.helpdesk.get_ticket(ticket_id),
                )
                .await?;
            debug!(ticket_id = ticket_id, status = ?status.status_id, "Ticket status");

            if status.is_open(&self.config.closed_status_id) {
                self.touch_ticket(ticket_id).await?;
                return Ok(Some(ticket_id));
            }
        }

        if !self.config.create_ticket_fallback {
            return Ok(None);
        }
        let Some(channel_id) = self.config.channel_id.clone() else {
            warn!("Ticket creation enabled without a channel id");
            return Ok(None);
        };

        let ticket = NewTicket {
            subject: self.config.ticket_subject.clone(),
            message: self.config.new_ticket_message.clone(),
            client_id: client.id,
            channel_id,
            from: self.config.sender.clone(),
        };
        let ticket_id = self
            .call(
                "helpdesk",
                "create_ticket",
                self.helpdesk.create_ticket(&ticket),
            )
            .await?;
        info!(client_id = client.id, ticket_id = ticket_id, "Created ticket");
        Ok(Some(ticket_id))
    }

    /// Rename a reused ticket and post the public comment on it.
    async fn touch_ticket(&self, ticket_id: TicketId) -> Result<(), WorkflowError> {
        self.call(
            "helpdesk",
            "update_ticket",
            self.helpdesk
                .update_ticket(ticket_id, &self.config.ticket_subject, None),
        )
        .await?;
        self.call(
            "helpdesk",
            "create_comment",
            self.helpdesk.create_comment(
                ticket_id,
                &self.config.comment_message,
                CommentVisibility::Public,
                &self.config.sender,
            ),
        )
        .await?;
        Ok(())
    }

    async fn write_cell(
        &self,
        schema: &LedgerSchema,
        entry: &LedgerEntry,
        column: LedgerColumn,
        value: &str,
    ) -> Result<(), WorkflowError> {
        let result = self
            .call(
                "sheets",
                "update_cell",
                self.store
                    .update_cell(&self.sheet, entry.position, schema.column(column), value),
            )
            .await;
        let label = if result.is_ok() { "ok" } else { "error" };
        metrics::LEDGER_WRITES
            .with_label_values(&[column.as_str(), label])
            .inc();
        result
    }

    pub fn ticket_url(&self, ticket_id: TicketId) -> String {
        format!("{}/{}", self.ticket_base_url, ticket_id)
    }

    pub fn notification_text(&self, tax_id: &str, ticket_url: &str) -> String {
        format!(
            "{}\nИИН: {}\nОшибка: {}\nТикет создан: {}",
            self.config.notification_header, tax_id, self.config.error_label, ticket_url
        )
    }

    /// Await an external call under the step timeout.
    async fn call<T, E, F>(
        &self,
        service: &'static str,
        operation: &'static str,
        fut: F,
    ) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<WorkflowError>,
    {
        let (result, label) = match tokio::time::timeout(self.step_timeout, fut).await {
            Ok(Ok(value)) => (Ok(value), "ok"),
            Ok(Err(e)) => (Err(e.into()), "error"),
            Err(_) => (
                Err(WorkflowError::Timeout {
                    operation,
                    secs: self.step_timeout.as_secs(),
                }),
                "timeout",
            ),
        };
        metrics::EXTERNAL_CALLS
            .with_label_values(&[service, label])
            .inc();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TicketPolicy;
    use crate::ledger::{HeaderIndex, Notified};
    use crate::testing::fixtures::{self, LEDGER_SHEET, TRIGGER};
    use crate::testing::{HelpdeskCall, MockHelpdesk, MockNotifier, MockTableStore};

    struct Harness {
        config: Config,
        store: MockTableStore,
        helpdesk: MockHelpdesk,
        notifier: MockNotifier,
        schema: LedgerSchema,
        header: HeaderIndex,
    }

    impl Harness {
        fn new() -> Self {
            let config = fixtures::test_config();
            let source = fixtures::source_header();
            let header = HeaderIndex::resolve(&source, &config.columns).unwrap();
            let schema = LedgerSchema::new(&source, &header);
            Self {
                config,
                store: MockTableStore::new(),
                helpdesk: MockHelpdesk::new(),
                notifier: MockNotifier::new(),
                schema,
                header,
            }
        }

        fn driver(&self) -> WorkflowDriver {
            WorkflowDriver::new(
                &self.config,
                Arc::new(self.store.clone()),
                Arc::new(self.helpdesk.clone()),
                Some(Arc::new(self.notifier.clone())),
            )
        }

        async fn seed(&self, rows: &[&[&str]]) -> LedgerIndex {
            let mut all = vec![self.schema.header().to_vec()];
            all.extend(rows.iter().map(|r| fixtures::strings(r)));
            self.store.set_rows(LEDGER_SHEET, all).await;
            self.index().await
        }

        async fn index(&self) -> LedgerIndex {
            LedgerIndex::build(
                &self.store.rows(LEDGER_SHEET).await,
                &self.header,
                &self.schema,
                &self.config.workflow.notified_marker,
            )
        }
    }

    const NAME: &str = "Aigerim Bolatovna Serikovna";
    const PHONE: &str = "77011112233";
    const URL_555: &str = "https://secure.usedesk.ru/tickets/555";

    #[tokio::test]
    async fn test_full_workflow_links_ticket_and_notifies() {
        let h = Harness::new();
        h.helpdesk.add_client(10, PHONE, &[612, 555]).await;
        h.helpdesk.set_ticket_status(555, "1").await;
        let index = h
            .seed(&[&["123456789012", NAME, PHONE, TRIGGER, "Almaty", "2024-05-01 10:00:00"]])
            .await;

        let report = h.driver().run(&index, &h.schema).await;
        assert_eq!(report.completed, 1);

        let entry = h.index().await.get("123456789012").cloned().unwrap();
        assert_eq!(entry.ticket_url, URL_555);
        assert_eq!(entry.notified, Notified::Sent);

        let calls = h.helpdesk.calls().await;
        assert_eq!(
            calls,
            vec![
                HelpdeskCall::SearchClients {
                    query: PHONE.to_string(),
                    mode: SearchMode::PartialMatch,
                },
                HelpdeskCall::UpdateClient {
                    client_id: 10,
                    name: "ИИН 123456789012".to_string(),
                    position: "Bolatovna Serikovna".to_string(),
                },
                HelpdeskCall::GetTicket(555),
                HelpdeskCall::UpdateTicket {
                    ticket_id: 555,
                    subject: "OscarSigmaIP".to_string(),
                    tag: None,
                },
                HelpdeskCall::CreateComment {
                    ticket_id: 555,
                    message: "SIGMA IP".to_string(),
                    visibility: CommentVisibility::Public,
                    from: "client".to_string(),
                },
            ]
        );

        let sent = h.notifier.attempts().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target.thread_id, Some(8282));
        assert!(sent[0].text.contains("ИИН: 123456789012"));
        assert!(sent[0].text.ends_with(&format!("Тикет создан: {}", URL_555)));
    }

    #[tokio::test]
    async fn test_ticket_url_written_before_notification() {
        let h = Harness::new();
        h.helpdesk.add_client(10, PHONE, &[555]).await;
        h.helpdesk.set_ticket_status(555, "1").await;
        h.notifier.set_fail_all(true).await;
        let index = h.seed(&[&["1", NAME, PHONE, TRIGGER]]).await;

        let report = h.driver().run(&index, &h.schema).await;
        assert_eq!(report.failed, 1);

        let entry = h.index().await.get("1").cloned().unwrap();
        assert_eq!(entry.ticket_url, URL_555);
        assert_eq!(entry.notified, Notified::Empty);
    }

    #[tokio::test]
    async fn test_partial_entry_resumes_at_notification() {
        let h = Harness::new();
        h.helpdesk.set_fail_all(true).await;
        let index = h
            .seed(&[&["1", NAME, PHONE, TRIGGER, "", "", "", URL_555, ""]])
            .await;

        let outcome = h.driver().process(index.get("1").unwrap(), &h.schema).await;
        assert_eq!(outcome, EntryOutcome::Completed);
        assert_eq!(h.helpdesk.call_count().await, 0);
        assert_eq!(h.notifier.attempt_count().await, 1);
        assert_eq!(h.index().await.get("1").unwrap().notified, Notified::Sent);
    }

    #[tokio::test]
    async fn test_skip_guards() {
        let h = Harness::new();
        let index = h
            .seed(&[
                &["1", NAME, PHONE, "OK"],
                &["2", "", PHONE, TRIGGER],
                &["3", NAME, PHONE, TRIGGER, "", "", "", URL_555, "Отправлено"],
            ])
            .await;
        let driver = h.driver();

        assert_eq!(
            driver.check(index.get("1").unwrap()),
            Err(SkipReason::StatusMismatch)
        );
        assert_eq!(
            driver.check(index.get("2").unwrap()),
            Err(SkipReason::MissingFields)
        );
        assert_eq!(
            driver.check(index.get("3").unwrap()),
            Err(SkipReason::AlreadyProcessed)
        );

        let report = driver.run(&index, &h.schema).await;
        assert_eq!(report.skipped, 3);
        assert_eq!(h.helpdesk.call_count().await, 0);
        assert_eq!(h.notifier.attempt_count().await, 0);
        assert!(driver.plan(&index).is_empty());
    }

    #[tokio::test]
    async fn test_client_not_found_stalls_without_creating() {
        let h = Harness::new();
        h.helpdesk.add_client(10, "77019999999", &[555]).await;
        let index = h.seed(&[&["1", NAME, PHONE, TRIGGER]]).await;

        let outcome = h.driver().process(index.get("1").unwrap(), &h.schema).await;
        assert_eq!(
            outcome,
            EntryOutcome::Stalled {
                stage: WorkflowStage::Eligible,
                reason: StallReason::ClientNotFound,
            }
        );
        assert!(!h
            .helpdesk
            .calls()
            .await
            .iter()
            .any(|c| matches!(c, HelpdeskCall::CreateClient { .. })));
    }

    #[tokio::test]
    async fn test_closed_oldest_ticket_stalls() {
        let h = Harness::new();
        h.helpdesk.add_client(10, PHONE, &[555, 700]).await;
        h.helpdesk.set_ticket_status(555, "3").await;
        h.helpdesk.set_ticket_status(700, "1").await;
        let index = h.seed(&[&["1", NAME, PHONE, TRIGGER]]).await;

        let outcome = h.driver().process(index.get("1").unwrap(), &h.schema).await;
        assert_eq!(
            outcome,
            EntryOutcome::Stalled {
                stage: WorkflowStage::ClientResolved,
                reason: StallReason::NoOpenTicket,
            }
        );
        assert_eq!(h.index().await.get("1").unwrap().ticket_url, "");
    }

    #[tokio::test]
    async fn test_latest_open_policy_reuses_newest_open_ticket() {
        let mut h = Harness::new();
        h.config.workflow.ticket_policy = TicketPolicy::LatestOpen;
        h.helpdesk.add_client(10, PHONE, &[555, 700, 800]).await;
        h.helpdesk.set_ticket_status(555, "1").await;
        h.helpdesk.set_ticket_status(700, "1").await;
        h.helpdesk.set_ticket_status(800, "3").await;
        let index = h.seed(&[&["1", NAME, PHONE, TRIGGER]]).await;

        h.driver().run(&index, &h.schema).await;
        assert_eq!(
            h.index().await.get("1").unwrap().ticket_url,
            "https://secure.usedesk.ru/tickets/700"
        );
    }

    #[tokio::test]
    async fn test_creation_fallback() {
        let mut h = Harness::new();
        h.config.workflow.create_ticket_fallback = true;
        h.helpdesk.add_client(10, PHONE, &[]).await;
        h.helpdesk.set_next_ticket_id(901).await;
        let index = h.seed(&[&["1", NAME, PHONE, TRIGGER]]).await;

        let outcome = h.driver().process(index.get("1").unwrap(), &h.schema).await;
        assert_eq!(outcome, EntryOutcome::Completed);

        let created = h.helpdesk.created_tickets().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].client_id, 10);
        assert_eq!(created[0].channel_id, "1");
        assert_eq!(
            h.index().await.get("1").unwrap().ticket_url,
            "https://secure.usedesk.ru/tickets/901"
        );
    }

    #[tokio::test]
    async fn test_missing_notifier_stalls_after_ticket() {
        let h = Harness::new();
        h.helpdesk.add_client(10, PHONE, &[555]).await;
        h.helpdesk.set_ticket_status(555, "1").await;
        let index = h.seed(&[&["1", NAME, PHONE, TRIGGER]]).await;
        let driver = WorkflowDriver::new(
            &h.config,
            Arc::new(h.store.clone()),
            Arc::new(h.helpdesk.clone()),
            None,
        );

        let outcome = driver.process(index.get("1").unwrap(), &h.schema).await;
        assert_eq!(
            outcome,
            EntryOutcome::Stalled {
                stage: WorkflowStage::TicketResolved,
                reason: StallReason::NotifierDisabled,
            }
        );
        let entry = h.index().await.get("1").cloned().unwrap();
        assert_eq!(entry.ticket_url, URL_555);
        assert_eq!(entry.notified, Notified::Empty);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_entry() {
        let h = Harness::new();
        h.helpdesk.add_client(10, PHONE, &[555]).await;
        h.helpdesk.add_client(11, "77020000000", &[556]).await;
        h.helpdesk.set_ticket_status(555, "1").await;
        h.helpdesk.set_ticket_status(556, "1").await;
        h.helpdesk.fail_search_for(PHONE).await;
        let index = h
            .seed(&[
                &["1", NAME, PHONE, TRIGGER],
                &["2", "Dana Ermekova", "+7 702 000 00 00", TRIGGER],
            ])
            .await;

        let report = h.driver().run(&index, &h.schema).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);

        let ledger = h.index().await;
        assert_eq!(ledger.get("1").unwrap().ticket_url, "");
        assert_eq!(
            ledger.get("2").unwrap().ticket_url,
            "https://secure.usedesk.ru/tickets/556"
        );
    }

    #[test]
    fn test_notification_text() {
        let h = Harness::new();
        let text = h.driver().notification_text("123", URL_555);
        assert_eq!(
            text,
            format!(
                "Ошибка у клиента:\nИИН: 123\nОшибка: NO_REQUIRED_TAXPAYER_STATE ( нет статус ИП )\nТикет создан: {}",
                URL_555
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_times_out() {
        use async_trait::async_trait;
        use crate::chat::ChatError;

        struct Hung;

        #[async_trait]
        impl Notifier for Hung {
            fn name(&self) -> &str {
                "hung"
            }

            async fn send_message(&self, _: &ChatTarget, _: &str) -> Result<(), ChatError> {
                std::future::pending().await
            }
        }

        let h = Harness::new();
        let index = h
            .seed(&[&["1", NAME, PHONE, TRIGGER, "", "", "", URL_555, ""]])
            .await;
        let driver = WorkflowDriver::new(
            &h.config,
            Arc::new(h.store.clone()),
            Arc::new(h.helpdesk.clone()),
            Some(Arc::new(Hung)),
        );

        let outcome = driver.process(index.get("1").unwrap(), &h.schema).await;
        assert!(matches!(
            outcome,
            EntryOutcome::Failed {
                stage: WorkflowStage::TicketResolved,
                ..
            }
        ));
    }
}
