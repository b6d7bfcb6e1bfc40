use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Sent { message_name: Option<String> },
    Failed { reason: String },
}

/// One push request for one token.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub token: String,
    pub outcome: DeliveryOutcome,
}

impl DeliveryAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Sent { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub success_count: usize,
    pub failure_count: usize,
}

impl AggregateResult {
    pub fn attempted(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// At least one delivery was attempted, whatever its outcome.
    pub fn processed(&self) -> bool {
        self.attempted() > 0
    }
}
