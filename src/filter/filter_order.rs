use super::error::FilterError;
use super::types::{SortDirection, SortOrder};

pub struct FilterOrder;

impl FilterOrder {
    /// Checks `sort` verbatim against `safelist` and splits off the `-` prefix.
    ///
    /// This is the only way to build a [`SortOrder`]; the column is later
    /// interpolated into ORDER BY, so nothing outside the safelist may pass.
    pub fn parse(sort: &str, safelist: &[&str]) -> Result<SortOrder, FilterError> {
        if !safelist.iter().any(|safe| *safe == sort) {
            return Err(FilterError::UnsafeSort(sort.to_string()));
        }

        let (column, direction) = match sort.strip_prefix('-') {
            Some(column) => (column, SortDirection::Desc),
            None => (sort, SortDirection::Asc),
        };

        if column.is_empty() {
            return Err(FilterError::UnsafeSort(sort.to_string()));
        }

        Ok(SortOrder {
            column: column.to_string(),
            direction,
        })
    }

    /// ORDER BY with `id ASC` as tie-break so equal sort keys page stably.
    pub fn generate(order: &SortOrder) -> String {
        format!(
            "ORDER BY \"{}\" {}, \"id\" ASC",
            order.column,
            order.direction.to_sql()
        )
    }
}
