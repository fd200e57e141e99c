//! Mapping from domain errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::challenge::ChallengeError;
use crate::ledger::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Challenge(#[from] ChallengeError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Ledger(e) => ledger_status(e),
            ApiError::Challenge(e) => match e {
                ChallengeError::NotFound => StatusCode::NOT_FOUND,
                ChallengeError::Expired | ChallengeError::NotVerified => StatusCode::FORBIDDEN,
                ChallengeError::HandleMismatch { .. } | ChallengeError::Rejected(_) => {
                    StatusCode::FORBIDDEN
                }
                ChallengeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ChallengeError::CodeSpaceExhausted => StatusCode::SERVICE_UNAVAILABLE,
                ChallengeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ChallengeError::Ledger(e) => ledger_status(e),
            },
        }
    }
}

fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InvalidHandle(_)
        | LedgerError::InvalidAddress(_)
        | LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        LedgerError::NotActive { .. }
        | LedgerError::Expired(_)
        | LedgerError::AlreadyActive { .. }
        | LedgerError::InsufficientFunds { .. } => StatusCode::CONFLICT,
        LedgerError::Price(_) | LedgerError::Chain(_) => StatusCode::BAD_GATEWAY,
        LedgerError::Store(_) | LedgerError::Crypto(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Lamports;
    use crate::store::StoreError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(LedgerError::InvalidHandle("x y".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::InsufficientFunds {
                required: Lamports(2),
                available: Lamports(1)
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ChallengeError::NotVerified).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ChallengeError::Ledger(LedgerError::NotFound("user".into()))).status(),
            StatusCode::NOT_FOUND
        );
        let io = std::io::Error::other("disk");
        assert_eq!(
            ApiError::from(ChallengeError::Store(StoreError::Io(io))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
