use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Resource, SortDirection};

/// Query string of a collection request. Absent parameters are omitted
/// entirely rather than sent empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub page: u32,
    pub size: u32,
    pub filter_field: Option<String>,
    pub filter_value: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortDirection>,
    pub name: Option<String>,
}

impl QueryDescriptor {
    /// Parameters in the order they are put on the wire.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("size", self.size.to_string())];
        if let (Some(field), Some(value)) = (&self.filter_field, &self.filter_value) {
            pairs.push(("filterField", field.clone()));
            pairs.push(("filterValue", value.clone()));
        }
        if let Some(sort_by) = &self.sort_by {
            pairs.push(("sort_by", sort_by.clone()));
            pairs.push((
                "sort_order",
                self.sort_order.unwrap_or_default().as_str().to_string(),
            ));
        }
        if let Some(name) = &self.name {
            pairs.push(("name", name.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
}

#[derive(Debug, Error)]
pub enum PageDecodeError {
    #[error("response has no items array")]
    MissingItems,
    #[error("malformed page: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, size: u32) -> Self {
        let pages = page_count(total, size);
        Self {
            items,
            total,
            page,
            size,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }

    /// Page count, falling back to `ceil(total / size)` when the backend
    /// omitted it. An empty collection has zero pages whatever the backend
    /// reports.
    pub fn page_count(&self) -> u32 {
        if self.total == 0 {
            0
        } else if self.pages > 0 {
            self.pages
        } else {
            page_count(self.total, self.size)
        }
    }

    pub fn exceeds_page_size(&self) -> bool {
        self.size > 0 && self.items.len() > self.size as usize
    }
}

impl<T: DeserializeOwned> PageResult<T> {
    /// Decodes a collection response body. A body without an `items` array is
    /// reported separately from one whose rows fail to decode.
    pub fn from_body(body: serde_json::Value) -> Result<Self, PageDecodeError> {
        let has_items = body
            .as_object()
            .and_then(|object| object.get("items"))
            .is_some_and(serde_json::Value::is_array);
        if !has_items {
            return Err(PageDecodeError::MissingItems);
        }
        Ok(serde_json::from_value(body)?)
    }
}

fn page_count(total: u64, size: u32) -> u32 {
    if size == 0 {
        return 0;
    }
    u32::try_from(total.div_ceil(u64::from(size))).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightRequest {
    pub name: String,
    pub entity_type: Resource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResponse {
    pub name: String,
    pub entity_type: Resource,
    pub insight: String,
    pub confidence_score: f64,
    pub generated_at: String,
    pub model_version: String,
}

impl InsightResponse {
    /// The backend emits either RFC 3339 or a naive UTC timestamp.
    pub fn generated_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.generated_at.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
