//! Common utilities used across the scaffold.

pub mod system;
pub mod watch;
