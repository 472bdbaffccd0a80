use serde::Serialize;

/// Largest page number a client may request; keeps OFFSET bounded.
pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination and sorting request, as read from the query string.
#[derive(Debug, Clone)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A sort column that has passed the safelist check.
///
/// Fields are private: the only constructor is [`crate::filter::FilterOrder::parse`],
/// so any `SortOrder` reaching SQL generation has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub(super) column: String,
    pub(super) direction: SortDirection,
}

impl SortOrder {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }
}

/// Pagination metadata derived from the window count of a list query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

impl Metadata {
    /// All-zero when there are no records, so "empty" never reads as "page 1 of 1".
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records <= 0 || page_size <= 0 {
            return Metadata::default();
        }

        Metadata {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SqlParam {
    Text(String),
    TextArray(Vec<String>),
    Int(i64),
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}
