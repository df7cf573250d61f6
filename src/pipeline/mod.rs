//! Log analytics pipeline.
//!
//! Normalizer -> Filter -> Sort -> Paginate for the table; the chart reducers
//! read the full normalized set. Every stage is a pure function.

mod charts;
mod filter;
mod page;
mod rows;
mod sort;

pub use charts::*;
pub use filter::*;
pub use page::*;
pub use rows::*;
pub use sort::*;

/// Everything the table needs to pick its current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub filter: FilterSpec,
    pub sort: SortSpec,
    pub page: PageSpec,
}

/// Filter, sort and slice `rows`. The page total counts filtered rows.
pub fn table_view(rows: &[Row], query: &TableQuery, ordering: SortOrdering) -> Page<Row> {
    let filtered = filter_rows(rows, &query.filter);
    let sorted = sort_rows(filtered, query.sort, ordering);
    let page = paginate(&sorted, query.page);

    Page {
        items: page.items.into_iter().cloned().collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        page_count: page.page_count,
    }
}
