//! HTTP layer built on the Warp framework.
//!
//! Every response leaving this layer goes through the envelope translator in
//! [`envelope`], so clients always see the same `{code, message, data, ts}`
//! success shape and `{code, message}` error shape regardless of which codec
//! the request negotiated. Use [`warp::run_webserver`] to start a server with
//! graceful shutdown support.

use bytesize::MB;

pub mod codec;
pub mod envelope;
pub mod error;
pub mod info_service;
pub mod warp;

/// Default limit for request bodies (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: u64 = 10 * MB;
