use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("phone number '{phone}' already exists")]
    DuplicatePhone { phone: String },
    #[error("invalid category '{category}'. Choose from: {choices}")]
    InvalidCategory { category: String, choices: String },
    #[error("invalid sub_category '{sub_category}' for {category}. Choose from: {choices}")]
    InvalidSubCategory {
        category: String,
        sub_category: String,
        choices: String,
    },
    #[error("payment {amount} exceeds remaining balance of {remaining}")]
    OverPayment { amount: f64, remaining: f64 },
}
