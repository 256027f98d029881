//! Small helpers shared by the UI, the API client and persistence code.
//!
//! - **Text**: Unicode-aware width measurement and truncation for card
//!   layout, stripping of terminal control sequences from upstream text, and
//!   HTML-to-text for item descriptions
//! - **URL checks**: only public http(s) pages are handed to the browser
//! - **Files**: atomic write (temp file + rename) for snapshots and term lists

mod fs;
mod text;
mod url_validator;

pub use fs::atomic_write;
pub use text::{display_width, html_to_text, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_open_url, UrlValidationError};
