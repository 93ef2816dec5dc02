//! Ошибки генерации и загрузки конфигурации

use thiserror::Error;

/// Итог неудачного запуска конвейера.
///
/// `InvalidParameters` и `ResourceExhausted` обнаруживаются до запуска первой стадии,
/// `GenerationFailure` прерывает весь запуск: частичный растр никогда не возвращается.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("generation failed in stage '{stage}': {reason}")]
    GenerationFailure { stage: &'static str, reason: String },

    #[error("generation cancelled")]
    Cancelled,

    #[error("resource limit exceeded: {0}")]
    ResourceExhausted(String),
}

impl GenerationError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameters(reason.into())
    }

    pub(crate) fn failure(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::GenerationFailure {
            stage,
            reason: reason.into(),
        }
    }
}

/// Ошибки чтения конфигурационного файла.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
