use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};

use procura_core::access::AccessGrant;
use procura_core::audit::{AuditContext, AuditSink, TracingAuditSink};
use procura_core::domain::price_history::PriceHistoryEntry;
use procura_core::domain::quotation::{
    PriceUpdate, Quotation, QuotationId, QuotationStatus, QuoteItem, QuoteItemId,
};
use procura_core::errors::DomainError;
use procura_core::flows::{FlowAction, FlowEngine, FlowEvent, TransitionOutcome};

use super::ServiceError;
use crate::repositories::{price_history, quotation};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReceipt {
    pub quotation_id: QuotationId,
    pub code: String,
    pub from: QuotationStatus,
    pub to: QuotationStatus,
    pub version: i64,
    pub items_stamped: u64,
    pub history_written: usize,
}

/// Status transitions and line-item price edits.
///
/// Each call runs in one transaction. A transition re-reads the quotation,
/// validates the event against the flow, then moves the status with a version
/// compare-and-swap; approval stamps items and appends price history before the
/// commit, so either all of it is visible or none of it is.
pub struct WorkflowService<S = TracingAuditSink> {
    pool: DbPool,
    engine: FlowEngine,
    audit: S,
}

impl WorkflowService<TracingAuditSink> {
    pub fn new(pool: DbPool) -> Self {
        Self::with_audit_sink(pool, TracingAuditSink)
    }
}

impl<S> WorkflowService<S>
where
    S: AuditSink,
{
    pub fn with_audit_sink(pool: DbPool, audit: S) -> Self {
        Self { pool, engine: FlowEngine, audit }
    }

    /// `expected_version`, when given, must match the stored version or the call
    /// fails with a concurrent-modification error before anything is written.
    /// The applied audit event is emitted only after the commit; every failure
    /// past the lookup is audited as rejected.
    pub async fn transition(
        &self,
        grant: &AccessGrant,
        id: &QuotationId,
        event: FlowEvent,
        expected_version: Option<i64>,
        correlation_id: &str,
    ) -> Result<TransitionReceipt, ServiceError> {
        grant.require_manage()?;

        let mut tx = self.pool.begin().await?;
        let current = quotation::find_quotation_in(&mut tx, id)
            .await?
            .ok_or_else(|| DomainError::not_found("quotation", &id.0))?;
        let context = AuditContext::new(Some(id.clone()), correlation_id, &grant.actor);
        let reject = |error: ServiceError| {
            self.audit.emit(self.engine.rejected_event(&context, current.status, event, error.to_string()));
            error
        };

        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(reject(concurrent(&current.code, expected).into()));
            }
        }
        let outcome = self
            .engine
            .apply(current.status, event)
            .map_err(|error| reject(DomainError::from(error).into()))?;

        let (items_stamped, history_written) =
            write_transition(tx, &current, &outcome, &grant.actor).await.map_err(reject)?;
        self.audit.emit(self.engine.applied_event(&context, &outcome));

        tracing::info!(
            event_name = "quotation.status_committed",
            correlation_id,
            quotation_id = %id.0,
            from = %outcome.from,
            to = %outcome.to,
            items_stamped,
            history_written,
            "quotation status committed"
        );

        Ok(TransitionReceipt {
            quotation_id: id.clone(),
            code: current.code,
            from: outcome.from,
            to: outcome.to,
            version: current.version + 1,
            items_stamped,
            history_written,
        })
    }

    /// Edits one line item's prices under the parent quotation's status gate.
    pub async fn set_item_prices(
        &self,
        grant: &AccessGrant,
        item_id: &QuoteItemId,
        update: &PriceUpdate,
        correlation_id: &str,
    ) -> Result<QuoteItem, ServiceError> {
        grant.require_manage()?;

        let mut tx = self.pool.begin().await?;
        let mut item = quotation::find_item_in(&mut tx, item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("quote item", &item_id.0))?;
        let parent = quotation::find_quotation_in(&mut tx, &item.quotation_id)
            .await?
            .ok_or_else(|| DomainError::not_found("quotation", &item.quotation_id.0))?;

        item.apply_price_update(parent.status, update)?;
        if !quotation::update_item_prices(&mut tx, &item, parent.status).await? {
            return Err(concurrent(&parent.code, parent.version).into());
        }
        tx.commit().await?;

        tracing::info!(
            event_name = "quote_item.prices_updated",
            correlation_id,
            quotation_id = %parent.id.0,
            item_id = %item.id.0,
            status = %parent.status,
            negotiation_round = item.negotiation_round,
            "quote item prices updated"
        );
        Ok(item)
    }
}

/// Status compare-and-swap plus the approval side effects, committed together.
async fn write_transition(
    mut tx: Transaction<'static, Sqlite>,
    current: &Quotation,
    outcome: &TransitionOutcome,
    actor: &str,
) -> Result<(u64, usize), ServiceError> {
    let now = Utc::now();
    if !quotation::compare_and_set_status(&mut tx, &current.id, current.version, outcome.to, now).await? {
        return Err(concurrent(&current.code, current.version).into());
    }

    let items_stamped = if outcome.requires(FlowAction::StampApprovedItems) {
        quotation::stamp_approved_items(&mut tx, &current.id, actor, now).await?
    } else {
        0
    };

    let history_written = if outcome.requires(FlowAction::WritePriceHistory) {
        let items = quotation::items_in(&mut tx, &current.id).await?;
        let entries = PriceHistoryEntry::from_approval(current, &items, now);
        price_history::append(&mut tx, &entries).await?;
        entries.len()
    } else {
        0
    };

    tx.commit().await?;
    Ok((items_stamped, history_written))
}

fn concurrent(code: &str, expected_version: i64) -> DomainError {
    DomainError::ConcurrentModification { quotation: code.to_string(), expected_version }
}
