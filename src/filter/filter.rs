use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::types::{Filters, SortOrder, MAX_PAGE, MAX_PAGE_SIZE};
use crate::validator::{permitted_value, Validator};

impl Filters {
    pub fn new(page: i64, page_size: i64, sort: impl Into<String>, sort_safelist: &'static [&'static str]) -> Self {
        Self {
            page,
            page_size,
            sort: sort.into(),
            sort_safelist,
        }
    }

    /// Records every pagination/sort problem; does not stop at the first.
    pub fn validate(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(self.page_size <= MAX_PAGE_SIZE, "page_size", "must be a maximum of 100");
        v.check(
            permitted_value(self.sort.as_str(), self.sort_safelist),
            "sort",
            "invalid sort value",
        );
    }

    /// Safelisted sort column and direction.
    pub fn sort_order(&self) -> Result<SortOrder, FilterError> {
        FilterOrder::parse(&self.sort, self.sort_safelist)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}
