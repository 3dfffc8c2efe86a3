use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{error, info, warn};

use crate::config::Config;
use crate::encoder::{CategoryEncoder, EncoderError};
use crate::error::{AppError, AppResult};
use crate::features::{matches_schema, FEATURES};
use crate::gbdt::{Booster, GbdtError};
use crate::predictor::Predictor;

/// Path-keyed store of loaded artifacts. The first load of a path reads the
/// file; later loads return the same `Arc`. Loads block, so async callers go
/// through `spawn_blocking`.
pub struct Cache<T> {
    inner: RwLock<HashMap<PathBuf, Arc<T>>>,
}

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Cache<T> {
    pub fn get(&self, path: &Path) -> Option<Arc<T>> {
        let cache = self.inner.read().unwrap_or_else(|e| e.into_inner());
        cache.get(path).cloned()
    }

    pub fn get_or_load<F, E>(&self, path: &Path, load: F) -> AppResult<Arc<T>>
    where
        F: FnOnce(&Path) -> Result<T, E>,
        E: Display,
    {
        if let Some(hit) = self.get(path) {
            return Ok(hit);
        }

        // hold the write lock across the load so a path is read at most once
        let mut cache = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.get(path) {
            return Ok(Arc::clone(hit));
        }
        let value = Arc::new(load(path).map_err(|e| AppError::artifact_load(path, e))?);
        cache.insert(path.to_path_buf(), Arc::clone(&value));
        Ok(value)
    }
}

#[derive(Default)]
pub struct ArtifactCache {
    models: Cache<Booster>,
    encoders: Cache<CategoryEncoder>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_model(&self, path: &Path) -> AppResult<Arc<Booster>> {
        self.models.get_or_load(path, |path| {
            let model = Booster::load(path)?;
            info!(
                path = %path.display(),
                trees = model.num_trees(),
                objective = model.objective(),
                "loaded model"
            );
            Ok::<_, GbdtError>(model)
        })
    }

    pub fn load_encoder(&self, path: &Path) -> AppResult<Arc<CategoryEncoder>> {
        self.encoders.get_or_load(path, |path| {
            let encoder = CategoryEncoder::load(path)?;
            info!(path = %path.display(), categories = encoder.len(), "loaded encoder");
            Ok::<_, EncoderError>(encoder)
        })
    }
}

/// Whether prediction is available for the lifetime of the process.
#[derive(Clone)]
pub enum ArtifactStatus {
    Ready(Arc<Predictor>),
    Unavailable { reason: String },
}

impl ArtifactStatus {
    /// Loads both artifacts off the async runtime. Failure is reported, not
    /// propagated: the server still starts and every prediction answers with
    /// the load error.
    pub async fn load(config: &Config, cache: Arc<ArtifactCache>) -> Self {
        let config = config.clone();
        let loaded = tokio::task::spawn_blocking(move || Self::try_load(&config, &cache))
            .await
            .unwrap_or_else(|e| Err(AppError::ArtifactsUnavailable(e.to_string())));

        match loaded {
            Ok(predictor) => ArtifactStatus::Ready(Arc::new(predictor)),
            Err(e) => {
                error!("{e}");
                ArtifactStatus::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn try_load(config: &Config, cache: &ArtifactCache) -> AppResult<Predictor> {
        let model = cache.load_model(&config.model_path)?;
        let encoder = cache.load_encoder(&config.encoder_path)?;

        if !matches_schema(model.feature_names()) {
            warn!(
                expected = ?FEATURES,
                actual = ?model.feature_names(),
                "model feature names differ from the form's feature row, predictions will fail"
            );
        }

        Ok(Predictor::new(model, encoder, &config.currency))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ArtifactStatus::Ready(_))
    }

    pub fn predictor(&self) -> AppResult<&Predictor> {
        match self {
            ArtifactStatus::Ready(predictor) => Ok(predictor.as_ref()),
            ArtifactStatus::Unavailable { reason } => {
                Err(AppError::ArtifactsUnavailable(reason.clone()))
            }
        }
    }

    pub fn load_error(&self) -> Option<&str> {
        match self {
            ArtifactStatus::Ready(_) => None,
            ArtifactStatus::Unavailable { reason } => Some(reason),
        }
    }
}
