//! Client-held pagination, filter, sort and search state for one collection
//! view, and its projection onto the collection query string.

use std::fmt;

use shared::{domain::SortDirection, protocol::QueryDescriptor};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListStateError {
    #[error("page size {0} is not one of 15, 25, 50, 100")]
    PageSizeNotAllowed(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize(u32);

impl PageSize {
    pub const ALLOWED: [u32; 4] = [15, 25, 50, 100];

    pub fn new(size: u32) -> Result<Self, ListStateError> {
        if Self::ALLOWED.contains(&size) {
            Ok(Self(size))
        } else {
            Err(ListStateError::PageSizeNotAllowed(size))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(Self::ALLOWED[0])
    }
}

impl TryFrom<u32> for PageSize {
    type Error = ListStateError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Single-column filter and sort; every transition except [`ListState::set_page`]
/// returns to the first page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListState {
    page_index: u32,
    page_size: PageSize,
    filter: Option<Filter>,
    sort: Option<Sort>,
    search_term: Option<String>,
}

impl ListState {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search_term.as_deref()
    }

    pub fn set_page(&mut self, page_index: u32) {
        self.page_index = page_index;
    }

    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.page_size = page_size;
        self.page_index = 0;
    }

    /// An empty field or value removes the filter. The value is kept
    /// verbatim; only the field name is trimmed.
    pub fn set_filter(&mut self, field: &str, value: &str) {
        let field = field.trim();
        self.filter = if field.is_empty() || value.is_empty() {
            None
        } else {
            Some(Filter {
                field: field.to_string(),
                value: value.to_string(),
            })
        };
        self.page_index = 0;
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
        self.page_index = 0;
    }

    /// Re-selecting the active field flips its direction; any other field
    /// starts ascending. A blank field behaves like [`ListState::clear_sort`].
    pub fn set_sort(&mut self, field: &str) {
        let field = field.trim();
        self.sort = match self.sort.take() {
            _ if field.is_empty() => None,
            Some(current) if current.field == field => Some(Sort {
                direction: current.direction.toggled(),
                ..current
            }),
            _ => Some(Sort {
                field: field.to_string(),
                direction: SortDirection::Asc,
            }),
        };
        self.page_index = 0;
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.page_index = 0;
    }

    pub fn set_search_term(&mut self, term: &str) {
        let term = term.trim();
        self.search_term = (!term.is_empty()).then(|| term.to_string());
        self.page_index = 0;
    }

    pub fn query_descriptor(&self) -> QueryDescriptor {
        build_query_descriptor(self)
    }
}

pub fn build_query_descriptor(state: &ListState) -> QueryDescriptor {
    let filter = state
        .filter
        .as_ref()
        .filter(|filter| !filter.field.is_empty() && !filter.value.is_empty());
    let sort = state.sort.as_ref().filter(|sort| !sort.field.is_empty());
    let name = state
        .search_term
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty());

    QueryDescriptor {
        page: state.page_index.saturating_add(1),
        size: state.page_size.get(),
        filter_field: filter.map(|filter| filter.field.clone()),
        filter_value: filter.map(|filter| filter.value.clone()),
        sort_by: sort.map(|sort| sort.field.clone()),
        sort_order: sort.map(|sort| sort.direction),
        name: name.map(str::to_string),
    }
}

#[cfg(test)]
#[path = "tests/list_state_tests.rs"]
mod tests;
