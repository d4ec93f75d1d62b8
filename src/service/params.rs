//! Reload parameter files
//!
//! Norm file: a single non-negative integer.
//! Margins file: exactly four whitespace-separated integers, in the order
//! left right top bottom.
//!
//! A missing or malformed file yields `None`; the caller skips the reload
//! and whatever was applied before stays in effect.

use log::debug;
use std::path::Path;

use crate::drm::Margins;

/// Parse norm file content
pub fn parse_norm(content: &str) -> Option<i32> {
    let mut tokens = content.split_whitespace();
    let norm = tokens.next()?.parse::<i32>().ok()?;
    (norm >= 0).then_some(norm)
}

/// Parse margins file content; anything but four integers is rejected
pub fn parse_margins(content: &str) -> Option<Margins> {
    let values = content
        .split_whitespace()
        .map(|t| t.parse::<i32>().ok())
        .collect::<Option<Vec<_>>>()?;

    match values[..] {
        [left, right, top, bottom] => Some(Margins {
            left,
            right,
            top,
            bottom,
        }),
        _ => None,
    }
}

fn read(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            debug!("Cannot read {}: {}", path.display(), e);
            None
        }
    }
}

pub fn read_norm_file(path: &Path) -> Option<i32> {
    let norm = parse_norm(&read(path)?);
    if norm.is_none() {
        debug!("No usable norm in {}", path.display());
    }
    norm
}

pub fn read_margins_file(path: &Path) -> Option<Margins> {
    let margins = parse_margins(&read(path)?);
    if margins.is_none() {
        debug!("No usable margins in {}", path.display());
    }
    margins
}
