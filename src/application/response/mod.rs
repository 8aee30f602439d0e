//! Streaming response assembly for settled renders.

mod assembler;
mod cache_control;
mod manifest;
mod shell;

pub use assembler::{AssembleError, ResponseAssembler};
pub use cache_control::{ANONYMOUS_CACHE_CONTROL, AUTHENTICATED_CACHE_CONTROL, CachePolicy};
pub use manifest::{AssetManifest, DEFAULT_PUBLIC_PATH, ManifestEntry};
pub use shell::{DocumentShell, FooterContext, ShellError, script_safe_json};

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
