//! URL handling module
//!
//! This module provides request-key normalization for the response cache and
//! the URL validation rules applied to configured endpoints.

mod normalize;
mod validate;

// Re-export main functions
pub use normalize::cache_key;
pub use validate::{validate_host, validate_url, MAX_URL_LENGTH};
