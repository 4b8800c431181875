//! Listing parameters and pagination metadata.
//!
//! The lifecycle core does not build search or sort logic of its own; the
//! request layer hands a [`ListParams`] through and the repository applies it
//! as opaque predicates. Page size is clamped to the range 1..=100.

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

/// Deserializes an optional string into an optional i64.
///
/// Query strings send empty values as `""`, which should read as `None`.
fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Metadata about a paginated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Total number of items across all pages
    pub total: i64,
    /// Items per page (the limit that was applied)
    pub per_page: i64,
    /// Current page number, 1-indexed
    pub page: i64,
    /// Whether there are more items after this page
    pub has_more: bool,
}

impl PaginationMeta {
    pub fn new(total: i64, params: &ListParams) -> Self {
        Self {
            total,
            per_page: params.limit(),
            page: params.page(),
            has_more: params.offset() + params.limit() < total,
        }
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl StatusFilter {
    /// The status flag value this filter selects, if any.
    pub fn flag(self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Active => Some(true),
            Self::Inactive => Some(false),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Query parameters for resource listings.
///
/// # Example
///
/// ```ignore
/// // GET /api/courses?search=math&status=active&sort_by=title&per_page=20&page=3
/// let params = ListParams {
///     search: Some("math".into()),
///     status: StatusFilter::Active,
///     sort_by: Some("title".into()),
///     direction: SortDirection::Asc,
///     per_page: Some(20),
///     page: Some(3),
/// };
///
/// assert_eq!(params.limit(), 20);
/// assert_eq!(params.offset(), 40);
/// ```
#[derive(Debug, Clone, Default, Hash, Deserialize)]
pub struct ListParams {
    /// Free text matched against the resource's slug and field values
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: StatusFilter,
    /// Column or field name to sort by (default: `created_at`)
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub per_page: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub page: Option<i64>,
}

impl ListParams {
    /// Returns the effective page size, clamped to [1, 100].
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Returns the page number, clamped to a minimum of 1.
    #[must_use]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }

    /// Trimmed search text, `None` when blank.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Sort key, `created_at` unless the caller asked for something else.
    #[must_use]
    pub fn sort_key(&self) -> &str {
        self.sort_by
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("created_at")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_defaults() {
        let params = ListParams::default();
        assert_eq!(params.limit(), 10);
        assert_eq!(params.page(), 1);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.sort_key(), "created_at");
        assert_eq!(params.direction, SortDirection::Desc);
        assert_eq!(params.status.flag(), None);
    }

    #[test]
    fn test_list_params_limit_boundary_cases() {
        let test_cases = vec![
            (Some(1), 1),
            (Some(50), 50),
            (Some(100), 100),
            (Some(101), 100),
            (Some(0), 1),
            (Some(-1), 1),
            (None, 10),
        ];

        for (input, expected) in test_cases {
            let params = ListParams {
                per_page: input,
                ..Default::default()
            };
            assert_eq!(params.limit(), expected);
        }
    }

    #[test]
    fn test_list_params_offset_from_page() {
        let params = ListParams {
            per_page: Some(20),
            page: Some(3),
            ..Default::default()
        };
        assert_eq!(params.offset(), 40);

        let params = ListParams {
            page: Some(-4),
            ..Default::default()
        };
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_list_params_deserialize_query_strings() {
        let json = r#"{"search":"  fees ","status":"inactive","direction":"asc","per_page":"250","page":""}"#;
        let params: ListParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.search_term(), Some("fees"));
        assert_eq!(params.status, StatusFilter::Inactive);
        assert_eq!(params.direction, SortDirection::Asc);
        assert_eq!(params.limit(), 100);
        assert_eq!(params.page(), 1);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let params = ListParams {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(params.search_term(), None);
    }

    #[test]
    fn test_pagination_meta_has_more() {
        let params = ListParams {
            per_page: Some(10),
            page: Some(2),
            ..Default::default()
        };
        assert!(PaginationMeta::new(21, &params).has_more);
        assert!(!PaginationMeta::new(20, &params).has_more);
    }
}
