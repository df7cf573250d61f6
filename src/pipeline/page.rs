//! In-memory pagination.

use serde::Serialize;

/// Requested page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page: usize,
    pub page_size: usize,
}

impl PageSpec {
    /// Page and size are raised to at least 1.
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }
}

/// One page of items plus what the pager needs to draw itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Size of the filtered set before slicing.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub page_count: usize,
}

/// Slice `[(page-1)*size, page*size)` out of `items`.
///
/// A page past the end is empty, not an error.
pub fn paginate<T: Clone>(items: &[T], spec: PageSpec) -> Page<T> {
    let spec = PageSpec::new(spec.page, spec.page_size);
    let start = (spec.page - 1).saturating_mul(spec.page_size);
    let end = start.saturating_add(spec.page_size).min(items.len());

    let slice = if start < items.len() {
        items[start..end].to_vec()
    } else {
        Vec::new()
    };

    Page {
        items: slice,
        total: items.len(),
        page: spec.page,
        per_page: spec.page_size,
        page_count: items.len().div_ceil(spec.page_size),
    }
}
