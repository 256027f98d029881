//! Local translation overlay for display strings.
//!
//! A term list (English source term → Chinese display term) is read once at
//! startup and applied to item names and category labels as items enter a
//! feed track. The list can be refreshed from the remote dictionary dataset
//! with `--update-terms`.

mod overlay;
mod terms;

pub use overlay::TranslationOverlay;
pub use terms::{parse_terms, read_term_file, read_term_lists, update_terms, TermEntry, TermsError};
