//! Common types used across StoreChat

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Participant role, carried in token claims and stored with every
/// message and session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Admin,
    Staff,
}

impl Default for Role {
    fn default() -> Self {
        Self::Buyer
    }
}

impl Role {
    /// Staff and admin share the store-side permission set.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Staff)
    }

    pub fn is_buyer(&self) -> bool {
        matches!(self, Self::Buyer)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => write!(f, "buyer"),
            Self::Admin => write!(f, "admin"),
            Self::Staff => write!(f, "staff"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buyer" => Ok(Self::Buyer),
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Media attachment kind. The engine only records a reference to the
/// media store; it never touches file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

// =============================================================================
// API Response Types
// =============================================================================

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = (total + per_page - 1) / per_page;
        Self {
            data,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(!Role::Buyer.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(Role::Staff.is_staff());

        assert!(Role::Buyer.is_buyer());
        assert!(!Role::Admin.is_buyer());
    }

    #[test]
    fn test_role_display_and_parse() {
        assert_eq!(format!("{}", Role::Staff), "staff");
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Buyer).unwrap(), r#""buyer""#);
        let role: Role = serde_json::from_str(r#""staff""#).unwrap();
        assert_eq!(role, Role::Staff);
    }

    #[test]
    fn test_media_type_serde() {
        assert_eq!(
            serde_json::to_string(&MediaType::Image).unwrap(),
            r#""image""#
        );
        assert!(serde_json::from_str::<MediaType>(r#""audio""#).is_err());
    }

    #[test]
    fn test_paginated_response() {
        let data = vec![1, 2, 3, 4, 5];
        let response = PaginatedResponse::new(data, 100, 1, 10);

        assert_eq!(response.total, 100);
        assert_eq!(response.page, 1);
        assert_eq!(response.per_page, 10);
        assert_eq!(response.total_pages, 10);
    }

    #[test]
    fn test_paginated_response_partial_page() {
        let data = vec![1, 2, 3];
        let response = PaginatedResponse::new(data, 23, 3, 10);

        // 23 items / 10 per page = 3 pages (2 full + 1 partial)
        assert_eq!(response.total_pages, 3);
    }
}
