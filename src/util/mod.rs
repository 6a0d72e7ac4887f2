//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: Security-focused validation of feed URLs before fetching
//! - **Text processing**: Cleanup of feed markup so it can be spoken
//!
//! # Examples
//!
//! ```
//! use feedvoice::util::{replace_line_breaks, validate_url};
//!
//! // Validate a feed URL
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//!
//! // Turn HTML line breaks into newlines
//! assert_eq!(replace_line_breaks("one<br/>two"), "one\ntwo");
//! ```

mod text;
mod url_validator;

pub use text::replace_line_breaks;
pub use url_validator::{validate_url, validate_url_with_policy, HostPolicy, UrlValidationError};
