use thiserror::Error;

pub const GENERIC_RETRY_MESSAGE: &str = "Hubo un error al procesar la solicitud. Por favor intenta de nuevo.";
pub const GENERIC_AUTH_MESSAGE: &str = "Email o contraseña incorrectos";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("STORE_UNAVAILABLE: {0}")]
    StoreUnavailable(String),
    #[error("MAIL_UNAVAILABLE: {0}")]
    MailUnavailable(String),
    #[error("AUTH_FAILED: {0}")]
    Auth(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    /// Message safe to show to whoever triggered the operation.
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::NotFound(message) => message.clone(),
            Self::Auth(_) => GENERIC_AUTH_MESSAGE.to_string(),
            Self::StoreUnavailable(_) | Self::MailUnavailable(_) | Self::Io(_) | Self::Internal(_) => {
                GENERIC_RETRY_MESSAGE.to_string()
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StoreUnavailable(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<keyring::Error> for AppError {
    fn from(value: keyring::Error) -> Self {
        Self::Auth(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
