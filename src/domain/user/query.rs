//! Listing options for users

use serde::Serialize;

use super::entity::User;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;

/// Column a user listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Id,
    Username,
    Email,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Lenient parse; unknown names fall back to the creation timestamp
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "id" => Self::Id,
            "username" => Self::Username,
            "email" => Self::Email,
            "updated_at" | "updatedAt" => Self::UpdatedAt,
            _ => Self::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::Email => "email",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

/// Sort direction; anything other than ascending means descending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Normalized listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub order: SortOrder,
}

impl Default for UserListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            search: None,
            sort_by: SortField::default(),
            order: SortOrder::default(),
        }
    }
}

impl UserListQuery {
    /// Build from raw options, replacing missing or non-positive values
    pub fn from_options(
        page: Option<u32>,
        limit: Option<u32>,
        search: Option<String>,
        sort_by: Option<&str>,
        order: Option<&str>,
    ) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
            limit: limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT),
            search: search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            sort_by: sort_by.map(SortField::parse).unwrap_or_default(),
            order: order.map(SortOrder::parse).unwrap_or_default(),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Case-insensitive substring match on username or email
    pub fn matches(&self, user: &User) -> bool {
        match &self.search {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                user.username().to_lowercase().contains(&needle)
                    || user.email().to_lowercase().contains(&needle)
            }
        }
    }
}

/// One page of users plus the total number of matches
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}
