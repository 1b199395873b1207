// Listing filters and pagination arithmetic
use serde::Deserialize;

use crate::blog::domain::CategoryId;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const SEARCH_CAP: u32 = 20;

/// Raw `GET /posts` query string. Numbers stay text so bad input falls back
/// to defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// Missing, unparseable or zero values fall back to 1 / 10.
    /// The limit has no upper bound.
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Self {
        fn positive(raw: Option<&str>) -> Option<u32> {
            raw.and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|n| *n > 0)
        }

        Self {
            number: positive(page).unwrap_or(DEFAULT_PAGE),
            limit: positive(limit).unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.limit)
    }

    /// `ceil(total / limit)`
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

/// Predicate over the post collection. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
}

impl PostFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            category_id: None,
            search: Some(term.into()),
        }
    }

    /// SQL `WHERE` fragment (without the keyword) plus its bound values.
    /// Columns are qualified with the `p` alias used by the post queries.
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(category_id) = &self.category_id {
            values.push(category_id.as_str().to_string());
            clauses.push(format!("p.category_id = ?{}", values.len()));
        }

        if let Some(term) = &self.search {
            values.push(term.clone());
            let n = values.len();
            clauses.push(format!(
                "(contains_ci(p.title, ?{n}) OR contains_ci(p.content, ?{n}) OR contains_ci(p.excerpt, ?{n}))"
            ));
        }

        if clauses.is_empty() {
            ("1 = 1".to_string(), values)
        } else {
            (clauses.join(" AND "), values)
        }
    }
}

/// Literal, Unicode case-insensitive substring test. Registered on every
/// pooled connection as the SQL function `contains_ci`.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
