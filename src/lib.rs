pub mod application;
pub mod community;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
