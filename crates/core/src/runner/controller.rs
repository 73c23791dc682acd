//! Run controller implementation.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chat::Notifier;
use crate::clock::{CivilClock, Clock};
use crate::config::Config;
use crate::helpdesk::Helpdesk;
use crate::ledger::{CodecError, HeaderIndex, LedgerIndex, LedgerSchema, SourceRecord};
use crate::metrics;
use crate::reconcile::{Reconciler, SyncReport};
use crate::sheets::TableStore;
use crate::workflow::{WorkflowDriver, WorkflowReport};

use super::types::{RunError, RunSummary};

/// Sequences one run: source scan, ledger sync, workflow pass.
pub struct RunController {
    config: Config,
    store: Arc<dyn TableStore>,
    helpdesk: Arc<dyn Helpdesk>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Arc<dyn Clock>,
}

impl RunController {
    /// Create a controller using the configured civil-time offset.
    pub fn new(
        config: Config,
        store: Arc<dyn TableStore>,
        helpdesk: Arc<dyn Helpdesk>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Result<Self, RunError> {
        let offset = config.clock.utc_offset_hours;
        let clock = CivilClock::new(offset)
            .ok_or_else(|| RunError::Config(format!("invalid UTC offset: {}h", offset)))?;

        Ok(Self {
            config,
            store,
            helpdesk,
            notifier,
            clock: Arc::new(clock),
        })
    }

    /// Replace the clock (tests, replays).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute one full run.
    ///
    /// Only failures loading the source or the ledger are returned; per-entry
    /// problems are logged and counted in the summary.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        let started = Instant::now();

        let result = self.execute(run_id, started).instrument(span).await;

        metrics::RUN_DURATION.observe(started.elapsed().as_secs_f64());
        match &result {
            Ok(summary) => {
                metrics::RUNS_TOTAL.with_label_values(&["success"]).inc();
                metrics::LAST_SUCCESS.set(chrono::Utc::now().timestamp());
                info!(
                    run_id = %summary.run_id,
                    appended = summary.sync.appended,
                    completed = summary.workflow.completed,
                    failed = summary.workflow.failed,
                    duration_ms = summary.duration_ms,
                    "Run finished"
                );
            }
            Err(e) => {
                metrics::RUNS_TOTAL.with_label_values(&["fatal"]).inc();
                error!(error = %e, "Run aborted");
            }
        }

        if let Some(path) = &self.config.metrics.textfile_path {
            if let Err(e) = metrics::write_textfile(path) {
                warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
            }
        }

        result
    }

    async fn execute(&self, run_id: String, started: Instant) -> Result<RunSummary, RunError> {
        let sheets = &self.config.sheets;
        let dry_run = self.config.run.dry_run;
        let started_at = self.clock.stamp();

        info!(
            store = self.store.name(),
            helpdesk = self.helpdesk.name(),
            source = %sheets.source_sheet,
            ledger = %sheets.target_sheet,
            dry_run = dry_run,
            "Starting run"
        );

        // Source scan
        let source_rows = self.read(&sheets.source_sheet).await?;
        let Some(source_header) = source_rows.first() else {
            return Err(CodecError::EmptySheet(sheets.source_sheet.clone()).into());
        };
        let header = HeaderIndex::resolve(source_header, &self.config.columns)?;
        let schema = LedgerSchema::new(source_header, &header);
        let records: Vec<SourceRecord> = source_rows[1..]
            .iter()
            .map(|row| SourceRecord::decode(row, &header))
            .collect();
        info!(rows = records.len(), "Loaded source records");

        // Ledger load and header migration
        let mut ledger_rows = self.read(&sheets.target_sheet).await?;
        let header_migrated = if dry_run {
            let stale = !ledger_rows.first().is_some_and(|h| schema.matches(h));
            if stale {
                info!("Ledger header would be rewritten");
                match ledger_rows.first_mut() {
                    Some(first) => *first = schema.header().to_vec(),
                    None => ledger_rows.push(schema.header().to_vec()),
                }
            }
            stale
        } else {
            schema
                .ensure_header(self.store.as_ref(), &sheets.target_sheet, &mut ledger_rows)
                .await
                .map_err(RunError::Header)?
        };

        let marker = &self.config.workflow.notified_marker;
        let mut index = LedgerIndex::build(&ledger_rows, &header, &schema, marker);
        info!(entries = index.len(), rows = index.row_count(), "Indexed ledger");

        let reconciler = Reconciler::new(&self.config.workflow, &schema, self.clock.as_ref());
        let driver = WorkflowDriver::new(
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.helpdesk),
            self.notifier.clone(),
        );

        let mut summary = RunSummary {
            run_id,
            started_at,
            dry_run,
            source_rows: records.len(),
            header_migrated,
            sync: SyncReport::default(),
            planned_writes: 0,
            ledger_entries: 0,
            workflow: WorkflowReport::default(),
            pending_entries: 0,
            duration_ms: 0,
        };

        if dry_run {
            let writes = reconciler.reconcile(&records, &mut index);
            for write in &writes {
                info!(
                    tax_id = %write.tax_id(),
                    row = write.position(),
                    kind = write.kind(),
                    "Would write"
                );
            }
            let pending = driver.plan(&index);
            for (entry, stage) in &pending {
                info!(
                    tax_id = %entry.tax_id,
                    row = entry.position,
                    stage = stage.as_str(),
                    "Would process entry"
                );
            }
            summary.planned_writes = writes.len();
            summary.pending_entries = pending.len();
            summary.ledger_entries = index.len();
        } else {
            summary.sync = reconciler
                .sync(&records, &mut index, self.store.as_ref(), &sheets.target_sheet)
                .await;
            info!(
                appended = summary.sync.appended,
                status_updates = summary.sync.status_updates,
                timestamp_updates = summary.sync.timestamp_updates,
                failed = summary.sync.failed_writes,
                "Ledger synced"
            );

            // Positions may have shifted under concurrent edits; start the
            // workflow from what the store holds now.
            let ledger_rows = self.read(&sheets.target_sheet).await?;
            let index = LedgerIndex::build(&ledger_rows, &header, &schema, marker);
            summary.ledger_entries = index.len();

            summary.workflow = driver.run(&index, &schema).await;
            info!(
                entries = summary.workflow.entries,
                completed = summary.workflow.completed,
                stalled = summary.workflow.stalled,
                failed = summary.workflow.failed,
                already_processed = summary.workflow.already_processed,
                "Workflow pass done"
            );
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Log every ledger row with its sheet position. Returns the number of
    /// data rows.
    pub async fn dump_ledger(&self) -> Result<usize, RunError> {
        let sheet = &self.config.sheets.target_sheet;
        let rows = self.read(sheet).await?;
        let data_rows = rows.len().saturating_sub(1);

        info!(sheet = %sheet, rows = data_rows, "Ledger contents");
        if let Some(header) = rows.first() {
            info!(row = 1, cells = ?header, "Header");
        }
        for (offset, row) in rows.iter().enumerate().skip(1) {
            info!(row = offset + 1, cells = ?row, "Row");
        }
        Ok(data_rows)
    }

    async fn read(&self, sheet: &str) -> Result<Vec<Vec<String>>, RunError> {
        let rows = self
            .store
            .read_all_rows(sheet)
            .await
            .map_err(|source| RunError::Read {
                sheet: sheet.to_string(),
                source,
            })?;
        debug!(sheet = sheet, rows = rows.len(), "Read sheet");
        Ok(rows)
    }
}
