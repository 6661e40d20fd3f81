// ABOUTME: Reads image references from a plain-text list file.
// ABOUTME: One reference per line; blank lines and # comments are skipped.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ImageRef;

pub fn read_image_list(path: &Path) -> Result<Vec<ImageRef>> {
    let content = std::fs::read_to_string(path)?;
    parse_image_list(&content).map_err(|(line, source)| Error::ImageList {
        path: path.to_path_buf(),
        line,
        source,
    })
}

fn parse_image_list(
    content: &str,
) -> std::result::Result<Vec<ImageRef>, (usize, crate::types::ParseImageRefError)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(n, line)| ImageRef::parse(line).map_err(|e| (n, e)))
        .collect()
}
