use uuid::Uuid;

/// What a "checkout completed" delivery asks the reconciliation handler to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationInput {
    pub user_id: Uuid,
    pub bundle_id: String,
    pub intended_credits: i32,
    pub session_id: String,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Credits were granted and recorded on the transaction.
    Credited {
        transaction_id: Uuid,
        credits_added: i32,
    },
    /// Replay: the transaction already carries every intended credit.
    AlreadyCredited { transaction_id: Uuid },
    /// Status is `succeeded` but the credit RPC failed; `missing_credits` are owed
    /// to the user and left for the repair sweep.
    PartialSuccess {
        transaction_id: Uuid,
        missing_credits: i32,
        reason: String,
    },
    /// Another delivery holds the reconciliation lease for this transaction.
    InProgress { transaction_id: Uuid },
    /// No local transaction for the session (payment link or out-of-band session).
    NotFound { session_id: String },
    Skipped { reason: String },
}

impl ReconciliationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationOutcome::Credited { .. } => "credited",
            ReconciliationOutcome::AlreadyCredited { .. } => "already_credited",
            ReconciliationOutcome::PartialSuccess { .. } => "partial_success",
            ReconciliationOutcome::InProgress { .. } => "in_progress",
            ReconciliationOutcome::NotFound { .. } => "not_found",
            ReconciliationOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// Computes how many credits still have to be granted, clamped so that the
/// applied counter can never exceed what was purchased.
pub fn credits_to_add(intended_credits: i32, credits_purchased: i32, credits_added: i32) -> i32 {
    let target = intended_credits.min(credits_purchased).max(0);
    (target - credits_added).max(0)
}
