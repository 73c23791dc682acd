//! Reconciler implementation.

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{StatusChangePolicy, WorkflowConfig};
use crate::ledger::{LedgerColumn, LedgerEntry, LedgerIndex, LedgerSchema, Notified, SourceRecord};
use crate::metrics;
use crate::sheets::{StoreError, TableStore};

use super::types::{LedgerWrite, SyncReport};

/// Computes and applies ledger writes for a batch of source records.
pub struct Reconciler<'a> {
    triggering_status: &'a str,
    policy: StatusChangePolicy,
    schema: &'a LedgerSchema,
    clock: &'a dyn Clock,
}

impl<'a> Reconciler<'a> {
    pub fn new(workflow: &'a WorkflowConfig, schema: &'a LedgerSchema, clock: &'a dyn Clock) -> Self {
        Self {
            triggering_status: &workflow.triggering_status,
            policy: workflow.status_change_policy,
            schema,
            clock,
        }
    }

    /// Writes needed for one record against the current index.
    pub fn plan(&self, record: &SourceRecord, index: &LedgerIndex, now: &str) -> Vec<LedgerWrite> {
        if !record.is_eligible() {
            return Vec::new();
        }

        let triggering = record.status == self.triggering_status;
        let Some(entry) = index.get(&record.tax_id) else {
            if !triggering {
                return Vec::new();
            }
            return vec![LedgerWrite::Append {
                tax_id: record.tax_id.clone(),
                position: index.next_position(),
                row: self.schema.new_row(record, now),
            }];
        };

        if entry.status == record.status {
            return Vec::new();
        }

        let cell = |column: LedgerColumn, value: &str| LedgerWrite::Cell {
            tax_id: record.tax_id.clone(),
            position: entry.position,
            column,
            value: value.to_string(),
        };

        let rewrite_status = triggering || self.policy == StatusChangePolicy::OverwriteStatus;
        if rewrite_status {
            vec![
                cell(LedgerColumn::Status, &record.status),
                cell(LedgerColumn::UpdatedAt, now),
            ]
        } else {
            vec![cell(LedgerColumn::UpdatedAt, now)]
        }
    }

    /// Plan writes for every record in source order, projecting each one
    /// onto `index` so later records see earlier ones. No I/O.
    pub fn reconcile(&self, records: &[SourceRecord], index: &mut LedgerIndex) -> Vec<LedgerWrite> {
        let now = self.clock.stamp();
        let mut writes = Vec::new();

        for record in records {
            for write in self.plan(record, index, &now) {
                project(index, &write, record, None, &now);
                writes.push(write);
            }
        }
        writes
    }

    /// Plan and apply writes record by record.
    ///
    /// After each append the index is refreshed with the position the store
    /// reports, falling back to the running row count. A failed write skips
    /// the rest of that record's writes; other records still go through.
    pub async fn sync(
        &self,
        records: &[SourceRecord],
        index: &mut LedgerIndex,
        store: &dyn TableStore,
        sheet: &str,
    ) -> SyncReport {
        let now = self.clock.stamp();
        let mut report = SyncReport {
            records: records.len(),
            ..Default::default()
        };

        for record in records {
            if !record.is_eligible() {
                report.ineligible += 1;
                continue;
            }

            for write in self.plan(record, index, &now) {
                match self.apply(store, sheet, &write).await {
                    Ok(landed) => {
                        metrics::LEDGER_WRITES
                            .with_label_values(&[write.kind(), "ok"])
                            .inc();
                        match &write {
                            LedgerWrite::Append { .. } => report.appended += 1,
                            LedgerWrite::Cell {
                                column: LedgerColumn::Status,
                                ..
                            } => report.status_updates += 1,
                            LedgerWrite::Cell { .. } => report.timestamp_updates += 1,
                        }
                        project(index, &write, record, landed, &now);
                    }
                    Err(e) => {
                        metrics::LEDGER_WRITES
                            .with_label_values(&[write.kind(), "error"])
                            .inc();
                        warn!(
                            tax_id = %record.tax_id,
                            kind = write.kind(),
                            error = %e,
                            "Ledger write failed, skipping record"
                        );
                        report.failed_writes += 1;
                        break;
                    }
                }
            }
        }

        report
    }

    /// Returns the row an append landed on, when the store reports it.
    async fn apply(
        &self,
        store: &dyn TableStore,
        sheet: &str,
        write: &LedgerWrite,
    ) -> Result<Option<usize>, StoreError> {
        match write {
            LedgerWrite::Append {
                tax_id,
                position,
                row,
            } => {
                let landed = store.append_row(sheet, row).await?;
                if landed.is_some_and(|p| p != *position) {
                    debug!(
                        tax_id = %tax_id,
                        expected = position,
                        landed = ?landed,
                        "Appended row landed on a different position"
                    );
                }
                info!(tax_id = %tax_id, row = landed.unwrap_or(*position), "Added ledger entry");
                Ok(landed)
            }
            LedgerWrite::Cell {
                tax_id,
                position,
                column,
                value,
            } => {
                store
                    .update_cell(sheet, *position, self.schema.column(*column), value)
                    .await?;
                info!(
                    tax_id = %tax_id,
                    row = position,
                    column = column.as_str(),
                    value = %value,
                    "Updated ledger cell"
                );
                Ok(None)
            }
        }
    }
}

/// Reflect a write in the in-memory index.
fn project(
    index: &mut LedgerIndex,
    write: &LedgerWrite,
    record: &SourceRecord,
    landed: Option<usize>,
    now: &str,
) {
    match write {
        LedgerWrite::Append { position, .. } => index.insert(LedgerEntry {
            position: landed.unwrap_or(*position),
            tax_id: record.tax_id.clone(),
            name: record.name.clone(),
            phone: record.phone.clone(),
            status: record.status.clone(),
            added_at: now.to_string(),
            updated_at: String::new(),
            ticket_url: String::new(),
            notified: Notified::Empty,
        }),
        LedgerWrite::Cell {
            tax_id,
            column: LedgerColumn::Status,
            value,
            ..
        } => index.set_status(tax_id, value),
        LedgerWrite::Cell {
            tax_id,
            column: LedgerColumn::UpdatedAt,
            value,
            ..
        } => index.set_updated_at(tax_id, value),
        LedgerWrite::Cell { .. } => {}
    }
}
