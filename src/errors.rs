use crate::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid payload: {0}")]
    Protocol(String),
}
