use std::str::FromStr;

use serde::Serialize;

use crate::error::SyncError;
use crate::model::{Category, Item, Status};

/// Filter criteria for listing items. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemFilter {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub status: Option<Status>,
}

impl ItemFilter {
    /// Parse raw filter strings as the UI holds them.
    ///
    /// Empty strings and `all` (any case) leave a field unconstrained.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidFilter`] when a category or status is neither
    /// `all` nor a known value. That is a caller bug, not a network failure,
    /// so it is never absorbed.
    pub fn parse(search: &str, category: &str, status: &str) -> Result<Self, SyncError> {
        let search = search.trim();
        Ok(Self {
            search: (!search.is_empty()).then(|| search.to_string()),
            category: parse_constraint("category", category)?,
            status: parse_constraint("status", status)?,
        })
    }

    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    /// Local evaluation, used for the fallback dataset and in-memory sources.
    ///
    /// Search is a case-insensitive substring match over title, description
    /// and location.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        if self.category.is_some_and(|category| item.category != category) {
            return false;
        }
        if self.status.is_some() && item.status != self.status {
            return false;
        }
        let Some(needle) = self.search.as_deref() else {
            return true;
        };
        let needle = needle.to_lowercase();
        [&item.title, &item.description, &item.location]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Query parameters for HTTP backends; unconstrained fields are omitted.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(category) = self.category {
            pairs.push(("category", category.as_str().to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        pairs
    }
}

fn parse_constraint<T: FromStr>(field: &'static str, raw: &str) -> Result<Option<T>, SyncError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    T::from_str(raw)
        .map(Some)
        .map_err(|_| SyncError::InvalidFilter {
            field,
            value: raw.to_string(),
        })
}
