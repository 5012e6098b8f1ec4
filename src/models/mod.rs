pub mod node;
pub mod user;

pub use node::{Node, NodeDocument, NodePatch};
pub use user::{User, UserDocument, UserPatch};

use chrono::{DateTime, Utc};
use mongodb::bson;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid decimal value: {0}")]
    InvalidDecimal(String),
}

pub(crate) fn to_utc(dt: bson::DateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
}

pub(crate) fn to_bson_datetime(dt: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(dt.timestamp_millis())
}

pub(crate) fn to_decimal128(value: rust_decimal::Decimal) -> Result<bson::Decimal128, DocumentError> {
    value
        .to_string()
        .parse::<bson::Decimal128>()
        .map_err(|e| DocumentError::InvalidDecimal(e.to_string()))
}
