use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Notification error: {notifier}: {message}")]
    Notification { notifier: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn navigation(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AppError::Navigation {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn notification(notifier: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AppError::Notification {
            notifier: notifier.into(),
            message: message.to_string(),
        }
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
