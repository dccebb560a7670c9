// ABOUTME: Ordered de-duplicated string list for scopes, audiences and response types
// ABOUTME: Parses space-delimited form values and renders them back the same way
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of unique, non-empty strings
///
/// Insertion order is preserved so rendered scope strings are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Arguments(Vec<String>);

impl Arguments {
    /// Create an empty list
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a space-delimited form value such as `"openid offline"`
    #[must_use]
    pub fn from_space_delimited(value: &str) -> Self {
        value.split_whitespace().collect()
    }

    /// Append an item unless it is empty or already present
    pub fn append(&mut self, item: impl Into<String>) {
        let item = item.into();
        if !item.is_empty() && !self.has(&item) {
            self.0.push(item);
        }
    }

    /// True if `item` is present (case sensitive)
    #[must_use]
    pub fn has(&self, item: &str) -> bool {
        self.0.iter().any(|existing| existing == item)
    }

    /// True if any of `items` is present
    #[must_use]
    pub fn has_one_of<S: AsRef<str>>(&self, items: &[S]) -> bool {
        items.iter().any(|item| self.has(item.as_ref()))
    }

    /// True if the list holds exactly `item` and nothing else
    #[must_use]
    pub fn exact_one(&self, item: &str) -> bool {
        self.0.len() == 1 && self.0[0] == item
    }

    /// True if both lists hold the same items regardless of order
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && other.0.iter().all(|item| self.has(item))
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the list holds no item
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Render as a space-delimited string
    #[must_use]
    pub fn join(&self) -> String {
        self.0.join(" ")
    }
}

impl<S: Into<String>> FromIterator<S> for Arguments {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut arguments = Self::new();
        for item in iter {
            arguments.append(item);
        }
        arguments
    }
}

impl From<Vec<String>> for Arguments {
    fn from(items: Vec<String>) -> Self {
        items.into_iter().collect()
    }
}

impl From<Arguments> for Vec<String> {
    fn from(arguments: Arguments) -> Self {
        arguments.0
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}
