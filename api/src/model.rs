use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::features::FeatureRow;

#[derive(Debug, Clone, Serialize)]
pub struct PricePrediction {
    pub price: f64,
    pub formatted: String, // e.g. "ARS 12,345.67"
    pub barrio: String,
    pub barrio_encoded: i64,
    pub barrio_known: bool,
    pub features: FeatureRow,
    pub predicted_at: DateTime<Utc>,
}
