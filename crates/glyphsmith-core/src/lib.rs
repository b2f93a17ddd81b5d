//! Glyphsmith Core - Foundational types for the glyphsmith asset pipeline
//!
//! This crate provides the types that the other glyphsmith crates depend on:
//! - `GlyphsmithError` / `GatewayError` and the `Result` alias
//! - `ContentHash` - SHA-256 based content digests
//! - `CancellationToken` - request-level cancellation

mod cancel;
mod error;
mod hash;

pub use cancel::CancellationToken;
pub use error::{GatewayError, GlyphsmithError, Result};
pub use hash::ContentHash;
