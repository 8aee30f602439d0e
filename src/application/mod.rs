//! Server-side rendering pipeline: per-request data access, state seeding,
//! the render driver, response assembly and failure reporting.

pub mod data;
pub mod error;
pub mod failure;
pub mod render;
pub mod response;
pub mod ssr;
pub mod state;
