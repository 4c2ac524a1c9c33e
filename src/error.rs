// 🚨 Filing Errors
// Everything that can invalidate a generation attempt.
//
// "No eligible payees" is NOT here: it is a normal outcome (process() -> None).
// Over-long text is NOT here either: text fields truncate.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilingError {
    /// A numeric value does not fit its slot, is negative, or a composed
    /// record broke its width invariant. Always an upstream defect.
    #[error("encoding error in {field}: {reason}")]
    Encoding { field: String, reason: String },

    /// A payee passed eligibility but lacks an attribute the record needs.
    #[error("missing required field {field} for {record} record")]
    MissingRequiredField { record: String, field: String },

    /// The request names a different company than the data it was built over.
    #[error("request is for company {requested} but data was loaded for company {loaded}")]
    CompanyMismatch { requested: i64, loaded: i64 },
}

impl FilingError {
    pub fn encoding(field: &str, reason: impl Into<String>) -> Self {
        FilingError::Encoding {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(record: &str, field: &str) -> Self {
        FilingError::MissingRequiredField {
            record: record.to_string(),
            field: field.to_string(),
        }
    }
}

pub type FilingResult<T> = Result<T, FilingError>;
