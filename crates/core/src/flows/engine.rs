use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome};
use crate::domain::quotation::QuotationStatus;
use crate::flows::states::{FlowAction, FlowEvent, TransitionOutcome};

/// pending -> negotiation -> approved, with cancellation from any non-terminal state
/// and from approved. Nothing leaves cancelled.
///
/// The engine only decides; the caller persists the outcome and reports it with
/// [`FlowEngine::applied_event`] once the write is durable, or with
/// [`FlowEngine::rejected_event`] when anything on the way fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlowEngine;

impl FlowEngine {
    pub fn initial_state(&self) -> QuotationStatus {
        QuotationStatus::Pending
    }

    pub fn apply(
        &self,
        current: QuotationStatus,
        event: FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let to = event.target();
        if !current.can_transition_to(to) {
            return Err(FlowTransitionError::InvalidTransition { state: current, event });
        }

        let actions = match event {
            FlowEvent::Approve => vec![FlowAction::StampApprovedItems, FlowAction::WritePriceHistory],
            FlowEvent::StartNegotiation | FlowEvent::Cancel => Vec::new(),
        };
        Ok(TransitionOutcome { from: current, to, event, actions })
    }

    pub fn applied_event(&self, audit: &AuditContext, outcome: &TransitionOutcome) -> AuditEvent {
        AuditEvent::new(
            audit,
            "quotation.transition_applied",
            AuditCategory::Workflow,
            AuditOutcome::Success,
        )
        .with_metadata("from", outcome.from.as_str())
        .with_metadata("to", outcome.to.as_str())
        .with_metadata("event", outcome.event.as_str())
    }

    pub fn rejected_event(
        &self,
        audit: &AuditContext,
        current: QuotationStatus,
        event: FlowEvent,
        reason: impl Into<String>,
    ) -> AuditEvent {
        AuditEvent::new(
            audit,
            "quotation.transition_rejected",
            AuditCategory::Workflow,
            AuditOutcome::Rejected,
        )
        .with_metadata("from", current.as_str())
        .with_metadata("event", event.as_str())
        .with_metadata("error", reason)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state} using event {event}")]
    InvalidTransition { state: QuotationStatus, event: FlowEvent },
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, AuditOutcome};
    use crate::domain::quotation::{QuotationId, QuotationStatus};
    use crate::flows::engine::{FlowEngine, FlowTransitionError};
    use crate::flows::states::{FlowAction, FlowEvent};

    #[test]
    fn negotiation_then_approval_happy_path() {
        let engine = FlowEngine;
        let mut state = engine.initial_state();
        assert_eq!(state, QuotationStatus::Pending);

        let negotiating = engine.apply(state, FlowEvent::StartNegotiation).expect("pending -> negotiation");
        assert!(negotiating.actions.is_empty());
        state = negotiating.to;
        let approved = engine.apply(state, FlowEvent::Approve).expect("negotiation -> approved");

        assert_eq!(approved.to, QuotationStatus::Approved);
        assert!(approved.requires(FlowAction::WritePriceHistory));
        assert!(approved.requires(FlowAction::StampApprovedItems));
    }

    #[test]
    fn pending_can_be_approved_directly() {
        let outcome = FlowEngine
            .apply(QuotationStatus::Pending, FlowEvent::Approve)
            .expect("pending -> approved");
        assert_eq!(outcome.from, QuotationStatus::Pending);
        assert_eq!(outcome.to, QuotationStatus::Approved);
    }

    #[test]
    fn approved_rejects_everything_but_cancel() {
        let engine = FlowEngine;
        for event in [FlowEvent::StartNegotiation, FlowEvent::Approve] {
            let error = engine.apply(QuotationStatus::Approved, event).expect_err("locked");
            assert_eq!(
                error,
                FlowTransitionError::InvalidTransition { state: QuotationStatus::Approved, event }
            );
        }

        let cancelled =
            engine.apply(QuotationStatus::Approved, FlowEvent::Cancel).expect("approved -> cancelled");
        assert!(!cancelled.requires(FlowAction::WritePriceHistory));
    }

    #[test]
    fn cancelling_twice_is_an_error_not_a_second_state_change() {
        let error = FlowEngine
            .apply(QuotationStatus::Cancelled, FlowEvent::Cancel)
            .expect_err("already cancelled");
        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition { state: QuotationStatus::Cancelled, .. }
        ));
    }

    #[test]
    fn audit_events_describe_the_transition() {
        let engine = FlowEngine;
        let context =
            AuditContext::new(Some(QuotationId("qt-9".to_owned())), "req-42", "buyer:minh");

        let outcome = engine
            .apply(QuotationStatus::Pending, FlowEvent::StartNegotiation)
            .expect("transition should succeed");
        let applied = engine.applied_event(&context, &outcome);
        assert_eq!(applied.event_type, "quotation.transition_applied");
        assert_eq!(applied.metadata.get("to").map(String::as_str), Some("negotiation"));

        let error = engine
            .apply(QuotationStatus::Cancelled, FlowEvent::Approve)
            .expect_err("cancelled is terminal");
        let rejected =
            engine.rejected_event(&context, QuotationStatus::Cancelled, FlowEvent::Approve, error.to_string());
        assert_eq!(rejected.event_type, "quotation.transition_rejected");
        assert_eq!(rejected.outcome, AuditOutcome::Rejected);
        assert_eq!(rejected.correlation_id, "req-42");
        assert_eq!(rejected.metadata.get("from").map(String::as_str), Some("cancelled"));
    }
}
