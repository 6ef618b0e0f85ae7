//! Error types for the HTTP boundary
//!
//! Every failure leaves the service as a JSON body `{error, message}`. The
//! status code follows the engine's error category: rejected input is a 4xx,
//! contention and paused pools are 503, invariant faults are 500 with the
//! details kept in the log.

use engine_config::service::server::RETRY_AFTER_SECS;
use pool_engine::{EngineError, ErrorCategory};
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use types::{PrecisionError, ValidationError};
use warp::http::{header, HeaderValue, StatusCode};
use warp::reply::Response;
use warp::{Rejection, Reply};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid {field}: {source}")]
    Precision {
        field: &'static str,
        #[source]
        source: PrecisionError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unknown token '{0}'")]
    UnknownToken(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl warp::reject::Reject for ApiError {}

/// Wire shape of every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn precision(field: &'static str) -> impl FnOnce(PrecisionError) -> ApiError {
        move |source| ApiError::Precision { field, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(err) => engine_status(err),
            ApiError::UnknownToken(_) => StatusCode::NOT_FOUND,
            ApiError::Precision { .. } | ApiError::Validation(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Engine(err) => engine_code(err),
            ApiError::Precision { .. } => "invalid_amount",
            ApiError::Validation(_) => "invalid_identifier",
            ApiError::UnknownToken(_) => "unknown_token",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn to_response(&self) -> Response {
        let message = match self {
            ApiError::Engine(err) if err.is_fault() => {
                error!(error = %err, "invariant fault surfaced to caller");
                "internal invariant fault; the pool has been paused".to_string()
            }
            ApiError::Internal(detail) => {
                error!(%detail, "request failed");
                "internal server error".to_string()
            }
            other => {
                warn!(error = %other, "request rejected");
                other.to_string()
            }
        };

        let body = ErrorBody {
            error: self.code(),
            message,
        };
        let mut response =
            warp::reply::with_status(warp::reply::json(&body), self.status()).into_response();

        if matches!(self, ApiError::Engine(err) if err.is_retryable()) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err.category() {
        ErrorCategory::Contention => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::InvariantFault => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCategory::UserInput => match err {
            EngineError::PoolNotFound(_)
            | EngineError::FarmNotFound(_)
            | EngineError::UnknownToken { .. } => StatusCode::NOT_FOUND,
            EngineError::DuplicatePool { .. } | EngineError::DuplicateFarm { .. } => {
                StatusCode::CONFLICT
            }
            EngineError::PoolPaused(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        },
    }
}

fn engine_code(err: &EngineError) -> &'static str {
    match err {
        EngineError::SlippageExceeded { .. } => "slippage_exceeded",
        EngineError::InsufficientShares { .. } => "insufficient_shares",
        EngineError::DeadlineExpired { .. } => "deadline_expired",
        EngineError::DuplicatePool { .. } => "duplicate_pool",
        EngineError::InsufficientLiquidity { .. } => "insufficient_liquidity",
        EngineError::PoolNotFound(_) => "pool_not_found",
        EngineError::FarmNotFound(_) => "farm_not_found",
        EngineError::DuplicateFarm { .. } => "duplicate_farm",
        EngineError::InvalidAmount(_) => "invalid_amount",
        EngineError::InvalidPair(_) => "invalid_pair",
        EngineError::InvalidFee { .. } => "invalid_fee",
        EngineError::InvalidLockPeriod(_) => "invalid_lock_period",
        EngineError::InvalidUser => "invalid_user",
        EngineError::LockActive { .. } => "lock_active",
        EngineError::UnknownToken { .. } => "unknown_token",
        EngineError::Overflow(_) => "overflow",
        EngineError::PoolPaused(_) => "pool_paused",
        EngineError::Busy(_) => "busy",
        EngineError::InvariantViolated { .. }
        | EngineError::ReserveUnderflow { .. }
        | EngineError::DivisionByZero => "internal_fault",
    }
}

/// Turn any rejection into a JSON error response
pub async fn handle_rejection(err: Rejection) -> std::result::Result<Response, Infallible> {
    if let Some(api_error) = err.find::<ApiError>() {
        return Ok(api_error.to_response());
    }

    let (status, code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "no such route".to_string())
    } else if let Some(body_error) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "invalid_body", body_error.to_string())
    } else if let Some(query_error) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, "invalid_query", query_error.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "method not allowed".to_string(),
        )
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error".to_string(),
        )
    };

    let body = ErrorBody { error: code, message };
    Ok(warp::reply::with_status(warp::reply::json(&body), status).into_response())
}
