//! GitHub-compatible heading slugs.
//!
//! `slugify` lowercases, keeps letters, digits, spaces, hyphens and underscores, turns
//! whitespace runs into a hyphen and collapses/trims hyphens. [`SlugTable`] makes the
//! slugs of one document unique by appending `-1`, `-2`, ... on collisions.

use std::collections::HashMap;

pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() || ch == '-' {
            pending_hyphen = true;
        } else if ch.is_alphanumeric() || ch == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        }
    }

    slug
}

/// Running "slug → last suffix" table for one document.
#[derive(Debug, Default, Clone)]
pub struct SlugTable {
    seen: HashMap<String, i64>,
}

impl SlugTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slug of `text`, suffixed when the same slug was handed out before.
    pub fn unique(&mut self, text: &str) -> String {
        let slug = slugify(text);
        let counter = self.seen.entry(slug.clone()).or_insert(-1);
        *counter += 1;
        if *counter == 0 {
            slug
        } else {
            format!("{slug}-{counter}")
        }
    }
}
