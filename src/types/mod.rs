// ABOUTME: Validated domain types shared across the crate.
// ABOUTME: Image references and their deduplication.

mod image_ref;

pub use image_ref::{ImageRef, ParseImageRefError};

use nonempty::NonEmpty;
use std::collections::HashSet;

/// Remove duplicate references, keeping the first occurrence of each.
///
/// Returns `None` when the input is empty.
pub fn dedup_references<I>(references: I) -> Option<NonEmpty<ImageRef>>
where
    I: IntoIterator<Item = ImageRef>,
{
    let mut seen = HashSet::new();
    let unique: Vec<ImageRef> = references
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect();
    NonEmpty::from_vec(unique)
}
