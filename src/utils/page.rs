use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Zero-based page/size query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(0).max(0)
    }

    pub fn size(&self) -> i64 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.page() * self.size()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub content: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> PageResponse<T> {
    pub fn of(content: Vec<T>, page: i64, size: i64, total_elements: i64) -> Self {
        let total_pages = if total_elements == 0 {
            0
        } else {
            (total_elements + size - 1) / size
        };
        Self {
            content,
            page,
            size,
            total_elements,
            total_pages,
            has_next: page + 1 < total_pages,
            has_previous: page > 0 && total_elements > 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResponse<U> {
        PageResponse {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let params = PageParams::default();
        assert_eq!(params.page(), 0);
        assert_eq!(params.size(), DEFAULT_PAGE_SIZE);
        assert_eq!(params.offset(), 0);

        let params = PageParams {
            page: Some(-3),
            size: Some(1000),
        };
        assert_eq!(params.page(), 0);
        assert_eq!(params.size(), MAX_PAGE_SIZE);

        let params = PageParams {
            page: Some(2),
            size: Some(25),
        };
        assert_eq!(params.offset(), 50);
    }

    #[test]
    fn page_metadata_math() {
        let page = PageResponse::of(vec![1, 2, 3], 0, 3, 7);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(!page.has_previous);

        let page = PageResponse::of(vec![7], 2, 3, 7);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn empty_result_has_no_pages() {
        let page: PageResponse<i32> = PageResponse::of(vec![], 0, 20, 0);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn map_preserves_metadata() {
        let page = PageResponse::of(vec![1, 2], 1, 2, 6).map(|n| n * 10);
        assert_eq!(page.content, vec![10, 20]);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 3);
    }
}
