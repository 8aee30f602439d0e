//! Request-scoped domain values.

pub mod request;
pub mod state;
