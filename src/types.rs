/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Caller roles that the lifecycle understands.
/// Role rows in the database carry institutional names; both those and the
/// plain English names resolve here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Advisor,
    Admin,
}

impl Role {
    pub fn from_role_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "mahasiswa" | "student" => Some(Role::Student),
            "dosen wali" | "dosen_wali" | "advisor" | "lecturer" => Some(Role::Advisor),
            "admin" | "administrator" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Raw `page`/`limit` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Clamped page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl From<PageQuery> for PageRequest {
    fn from(q: PageQuery) -> Self {
        Self::new(q.page, q.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let total_pages = if total <= 0 { 0 } else { (total + request.limit - 1) / request.limit };
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
        }
    }
}

/// One page of results plus its pagination block
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_resolve_case_insensitively() {
        assert_eq!(Role::from_role_name("Mahasiswa"), Some(Role::Student));
        assert_eq!(Role::from_role_name("Dosen Wali"), Some(Role::Advisor));
        assert_eq!(Role::from_role_name("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_role_name("lecturer"), Some(Role::Advisor));
        assert_eq!(Role::from_role_name("guest"), None);
    }

    #[test]
    fn page_request_clamps() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(-4), Some(500)), PageRequest { page: 1, limit: 100 });
        assert_eq!(PageRequest::new(Some(3), Some(25)).offset(), 50);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination::new(PageRequest::new(Some(2), Some(10)), 25);
        assert_eq!(p.total_pages, 3);
        assert_eq!(Pagination::new(PageRequest::default(), 0).total_pages, 0);
        assert_eq!(Pagination::new(PageRequest::default(), 10).total_pages, 1);
    }
}
