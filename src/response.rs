//! Response envelope and pagination helpers
//!
//! List endpoints share the `{page, limit, total, pages}` pagination object;
//! mutating endpoints reply with `{success, message, data}`.

use serde::{Deserialize, Serialize};

/// Standard success envelope for mutating endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// Envelope with a message and no payload.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Pagination block returned on every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if total == 0 {
            0
        } else {
            ((total + limit as u64 - 1) / limit as u64) as u32
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// Common query parameters for paginated listings.
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    /// Clamp to sane bounds: page >= 1, 1 <= limit <= 100.
    pub fn resolve(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (page, limit)
    }

    pub fn offset(&self) -> i64 {
        let (page, limit) = self.resolve();
        ((page - 1) as i64) * (limit as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pagination_rounds_up() {
        let p = Pagination::new(1, 20, 41);
        assert_eq!(p.pages, 3);
    }

    #[test]
    fn test_pagination_empty() {
        let p = Pagination::new(1, 20, 0);
        assert_eq!(p.pages, 0);
    }

    #[test]
    fn test_page_params_clamped() {
        let params = PageParams {
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(params.resolve(), (1, 100));
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_page_params_offset() {
        let params = PageParams {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(params.offset(), 20);
    }
}
