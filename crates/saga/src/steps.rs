//! Named checkout steps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Steps of the checkout saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    Validate,
    Snapshot,
    MaterializeItems,
    PersistHeader,
    RequestPayment,
    RecordOutcome,
}

impl CheckoutStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStep::Validate => "validate",
            CheckoutStep::Snapshot => "snapshot",
            CheckoutStep::MaterializeItems => "materialize_items",
            CheckoutStep::PersistHeader => "persist_header",
            CheckoutStep::RequestPayment => "request_payment",
            CheckoutStep::RecordOutcome => "record_outcome",
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
