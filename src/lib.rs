//! # Ponzu
//!
//! A lightweight microservice scaffold for containerized deployments.
//!
//! Ponzu wraps a Warp/hyper HTTP stack with two opinionated pieces:
//!
//! - a **response envelope translator** ([`web::envelope`]) that normalizes
//!   every success and error body into one canonical wire shape, and
//! - a **tiered log sink** ([`logging`]) that fans each record out to stdout
//!   plus severity-tiered, daily-rotating log files.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ponzu::logging::{self, LogConfig};
//! use ponzu::web::warp::run_webserver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     logging::setup_tracing(&LogConfig::from_env())?;
//!
//!     let routes = ponzu::web::info_service::get_info_route();
//!     run_webserver(routes).await
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_NAME` | Application identifier | `PONZU` |
//! | `APP_VERSION` | Version string | `DEVELOPMENT-SNAPSHOT-VERSION` |
//! | `CLUSTER_ID` | Cluster/service identifier | `local` |
//! | `TASK_ID` | Task/instance identifier | `local` |
//! | `BIND_ADDRESS` | HTTP server bind address | (required) |
//! | `LOG_LEVEL` | Minimum log severity | `info` |
//! | `LOG_FORMAT` | `console` or `json` record framing | `console` |
//! | `LOG_ENCODE_LEVEL` | Level encoding style (see [`logging`]) | `lowercase` |
//! | `LOG_DIRECTORY` | Directory for rotated log files | `logs` |
//! | `LOG_LINK_NAME` | Stable pointer to the current log file | `latest.log` |

use std::env;
use std::sync::LazyLock;

/// Tiered logging sink and tracing setup.
pub mod logging;

/// General-purpose utilities (graceful shutdown, request timing).
pub mod tools;

/// HTTP server, codecs, and the response envelope.
pub mod web;

/// Application name from `APP_NAME` environment variable.
///
/// Used in logging, tracing spans, and the info endpoint.
/// Defaults to `"PONZU"` if not set.
pub static APP_NAME: LazyLock<String> =
    LazyLock::new(|| env::var("APP_NAME").unwrap_or("PONZU".to_string()));

/// Application version from `APP_VERSION` environment variable.
///
/// Typically set during CI/CD builds. Defaults to
/// `"DEVELOPMENT-SNAPSHOT-VERSION"` for local development.
pub static APP_VERSION: LazyLock<String> =
    LazyLock::new(|| env::var("APP_VERSION").unwrap_or("DEVELOPMENT-SNAPSHOT-VERSION".to_string()));

/// Cluster identifier from `CLUSTER_ID` environment variable.
///
/// Identifies the deployment cluster or service group. Defaults to `"local"`.
pub static CLUSTER_ID: LazyLock<String> =
    LazyLock::new(|| env::var("CLUSTER_ID").unwrap_or("local".to_string()));

/// Task identifier from `TASK_ID` environment variable.
///
/// Identifies the specific task or container instance.
/// Useful for correlating logs across replicas. Defaults to `"local"`.
pub static TASK_ID: LazyLock<String> =
    LazyLock::new(|| env::var("TASK_ID").unwrap_or("local".to_string()));
