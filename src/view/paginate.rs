use serde::Serialize;

pub const INTERACTIONS_PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Cut page `page` (1-based) out of `items`. Out-of-range pages are empty.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);

    let start = page.saturating_sub(1).saturating_mul(page_size);
    let items = if page == 0 || start >= total_items {
        Vec::new()
    } else {
        items.into_iter().skip(start).take(page_size).collect()
    };

    Page {
        items,
        page,
        page_size,
        total_items,
        total_pages,
    }
}
