use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::encoder::{CategoryEncoder, Encoded};
use crate::error::{AppError, AppResult};
use crate::features::{assemble, matches_schema, FeatureRow, FEATURES};
use crate::gbdt::Booster;
use crate::model::PricePrediction;
use crate::presenter::format_currency;
use crate::schema::FormValues;

/// Runs encode → assemble → predict → format against the loaded artifacts.
pub struct Predictor {
    model: Arc<Booster>,
    encoder: Arc<CategoryEncoder>,
    currency: String,
}

impl Predictor {
    pub fn new(model: Arc<Booster>, encoder: Arc<CategoryEncoder>, currency: &str) -> Self {
        Predictor {
            model,
            encoder,
            currency: currency.to_string(),
        }
    }

    pub fn encode_barrio(&self, label: &str) -> Encoded {
        let encoded = self.encoder.encode(label);
        if !encoded.is_known() {
            // the model may never have seen the sentinel during training
            debug!(barrio = label, "unknown barrio, encoding as -1");
        }
        encoded
    }

    /// First (only) output of the model for a single row.
    pub fn predict_row(&self, row: &FeatureRow) -> AppResult<f64> {
        if !matches_schema(self.model.feature_names()) {
            return Err(AppError::prediction(format!(
                "feature names mismatch: model expects [{}], row has [{}]",
                self.model.feature_names().join(", "),
                FEATURES.join(", ")
            )));
        }

        let outputs = self
            .model
            .predict_rows(&[row.to_vector().to_vec()])
            .map_err(|e| AppError::prediction(e.to_string()))?;
        let value = outputs
            .first()
            .copied()
            .ok_or_else(|| AppError::prediction("model returned no output"))?;

        if !value.is_finite() {
            return Err(AppError::prediction(format!(
                "model returned a non-finite value ({value})"
            )));
        }
        Ok(value)
    }

    pub fn predict(&self, values: &FormValues) -> AppResult<PricePrediction> {
        values.validate()?;

        let encoded = self.encode_barrio(&values.barrio);
        let row = assemble(values, Some(encoded))?;
        let price = self.predict_row(&row).map_err(|e| {
            warn!(error = %e, "prediction failed");
            e
        })?;
        let formatted = format_currency(price, &self.currency);

        info!(
            barrio = %values.barrio,
            barrio_encoded = row.barrio_encoded,
            price,
            "predicted nightly price"
        );

        Ok(PricePrediction {
            price,
            formatted,
            barrio: values.barrio.clone(),
            barrio_encoded: encoded.code(),
            barrio_known: encoded.is_known(),
            features: row,
            predicted_at: Utc::now(),
        })
    }
}
