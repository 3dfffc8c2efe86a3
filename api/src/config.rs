use std::path::PathBuf;

use clap::Parser;

/// Serve the nightly price prediction form.
#[derive(Parser, Debug, Clone)]
#[command(name = "listing-price-api", version)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, default_value = "0.0.0.0:3000", env = "LISTING_PRICE_BIND")]
    pub bind: String,

    /// LightGBM text model saved by the training job
    #[arg(
        long,
        default_value = "modelo_lightgbm_mejor.txt",
        env = "LISTING_PRICE_MODEL"
    )]
    pub model_path: PathBuf,

    /// Neighborhood encoder (JSON)
    #[arg(long, default_value = "encoder_barrio.json", env = "LISTING_PRICE_ENCODER")]
    pub encoder_path: PathBuf,

    /// Currency prefix shown next to predicted prices
    #[arg(long, default_value = "ARS", env = "LISTING_PRICE_CURRENCY")]
    pub currency: String,
}

impl Config {
    pub fn new(model_path: impl Into<PathBuf>, encoder_path: impl Into<PathBuf>) -> Self {
        Config {
            bind: "0.0.0.0:3000".to_string(),
            model_path: model_path.into(),
            encoder_path: encoder_path.into(),
            currency: "ARS".to_string(),
        }
    }
}
