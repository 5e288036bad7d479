//! Domain error types and helpers for mapping errors to HTTP responses.
//!
//! The [`ServiceError`] type carries a numeric domain code and a message,
//! the exact shape the error envelope puts on the wire. The code lives in the
//! application's own taxonomy and is not restricted to HTTP status ranges;
//! the transport status is derived from it separately by
//! [`envelope::encode_error`](crate::web::envelope::encode_error).
//!
//! Use [`ResultExt`] to attach domain codes to `anyhow::Error` chains, or the
//! [`client_bail!`] and [`code_bail!`] macros for early returns.

use serde::Serialize;
use std::fmt::{Debug, Display, Formatter};
use warp::reject::Reject;

/// A structured domain error: numeric code plus human-readable message.
///
/// Both fields are serialized; together they form the error envelope body.
#[derive(Clone, Serialize, Debug)]
pub struct ServiceError {
    /// Domain/application error code. Unrestricted range.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl Reject for ServiceError {}

impl ServiceError {
    /// Creates a new domain error with the given code and message.
    pub fn new(code: i64, message: impl ToString) -> Self {
        ServiceError {
            code,
            message: message.to_string(),
        }
    }

    /// Extracts the structured error from an `anyhow` chain.
    ///
    /// Errors that never had a code attached become code 500 with the full
    /// context chain as message.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<ServiceError>() {
            Some(service_error) => service_error.clone(),
            None => ServiceError::new(500, format!("{:#}", err)),
        }
    }
}

/// Extension trait for attaching domain codes to error results.
pub trait ResultExt<T> {
    /// Wraps the error with a [`ServiceError`] carrying the given code.
    fn with_code(self, code: i64) -> Result<T, anyhow::Error>;

    /// Convenience method for `with_code(400)`.
    fn mark_client_error(self) -> Result<T, anyhow::Error>;
}

impl<T> ResultExt<T> for Result<T, anyhow::Error> {
    fn with_code(self, code: i64) -> Result<T, anyhow::Error> {
        match self {
            Ok(t) => Ok(t),
            Err(err) => {
                let message = format!("{:#}", err);
                Err(err.context(ServiceError { code, message }))
            }
        }
    }

    fn mark_client_error(self) -> Result<T, anyhow::Error> {
        self.with_code(400)
    }
}

/// Early return with a code-400 domain error.
#[macro_export]
macro_rules! client_bail {
    ($err:expr $(,)?) => {
        return $crate::web::error::ResultExt::mark_client_error(Err(::anyhow::anyhow!($err)))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return $crate::web::error::ResultExt::mark_client_error(Err(::anyhow::anyhow!($fmt, $($arg)*)))
    };
}

/// Early return with a custom domain error code.
#[macro_export]
macro_rules! code_bail {
    ($code:expr, $msg:literal $(,)?) => {
        return $crate::web::error::ResultExt::with_code(Err(::anyhow::anyhow!($msg)), $code)
    };
    ($code:expr, $fmt:literal, $($arg:tt)*) => {
        return $crate::web::error::ResultExt::with_code(Err(::anyhow::anyhow!($fmt, $($arg)*)), $code)
    };
}
