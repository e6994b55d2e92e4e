//! Effect counter and firing records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current value of one effect counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectCount {
    pub effect: String,
    pub count: u64,
}

/// One effect firing, as pushed to viewers and effect subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiringRecord {
    /// Effect name, e.g. `"Burst"`.
    pub effect: String,
    /// Counter value for `effect` right after this firing.
    pub count: u64,
    /// Address of the event that caused the firing.
    pub address: String,
    /// Channel whose module fired.
    pub channel_id: Uuid,
    /// Module that fired.
    pub module_id: Uuid,
    /// Unix timestamp in milliseconds.
    pub fired_at_ms: i64,
}
