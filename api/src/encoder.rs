use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Code fed to the model for a label the encoder has never seen.
pub const UNKNOWN_CODE: i64 = -1;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid encoder file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate class '{0}'")]
    DuplicateClass(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoded {
    Known(i64),
    Unknown,
}

impl Encoded {
    pub fn code(self) -> i64 {
        match self {
            Encoded::Known(code) => code,
            Encoded::Unknown => UNKNOWN_CODE,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Encoded::Known(_))
    }
}

// Either the fitted `classes_` list (code = position) or an explicit map.
#[derive(Deserialize)]
#[serde(untagged)]
enum EncoderFile {
    Classes(Vec<String>),
    Wrapped { classes: Vec<String> },
    Mapping(HashMap<String, i64>),
}

#[derive(Debug, Clone, Default)]
pub struct CategoryEncoder {
    codes: HashMap<String, i64>,
}

impl CategoryEncoder {
    pub fn from_classes<I, S>(classes: I) -> Result<Self, EncoderError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut codes = HashMap::new();
        for (position, label) in classes.into_iter().enumerate() {
            let label: String = label.into();
            if codes.insert(label.clone(), position as i64).is_some() {
                return Err(EncoderError::DuplicateClass(label));
            }
        }
        Ok(CategoryEncoder { codes })
    }

    pub fn from_mapping(codes: HashMap<String, i64>) -> Self {
        CategoryEncoder { codes }
    }

    pub fn from_json(text: &str) -> Result<Self, EncoderError> {
        let file: EncoderFile = serde_json::from_str(text)?;
        match file {
            EncoderFile::Classes(classes) | EncoderFile::Wrapped { classes } => {
                Self::from_classes(classes)
            }
            EncoderFile::Mapping(codes) => Ok(Self::from_mapping(codes)),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EncoderError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Labels are matched exactly, without trimming or case folding.
    pub fn encode(&self, label: &str) -> Encoded {
        match self.codes.get(label) {
            Some(&code) => Encoded::Known(code),
            None => Encoded::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
