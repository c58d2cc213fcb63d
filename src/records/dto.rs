use serde::{Deserialize, Serialize};
use time::Date;

/// Create payload for a training record. `pace` is intentionally absent:
/// the server computes it and ignores anything the caller submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    pub date: Date,
    pub distance_km: f64,
    pub duration: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}
