use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tabula_core::QueryParams;
use tokio::sync::OnceCell;

use crate::entity::EntityKind;
use crate::error::DataError;
use crate::schema::ColumnType;
use crate::validate::cast_value;

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_LIMIT: u64 = 200;

/// Query parameters the paginator owns; they are never used as filters.
pub const RESERVED_PARAMS: [&str; 2] = ["limit", "offset"];

/// Page size bounds for one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSettings {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_LIMIT,
        }
    }
}

impl PageSettings {
    /// Limit for a raw `limit` parameter: missing, invalid or non-positive
    /// values fall back to the default, and the result never exceeds the cap.
    pub fn limit(&self, requested: Option<&str>) -> u64 {
        let limit = requested
            .map(parse_int)
            .filter(|l| *l > 0)
            .map_or(self.default_limit, |l| l as u64);
        limit.clamp(1, self.max_limit.max(1))
    }

    pub fn offset(&self, requested: Option<&str>) -> u64 {
        requested.map(parse_int).map_or(0, |o| o.max(0) as u64)
    }
}

fn parse_int(raw: &str) -> i64 {
    cast_value(Value::String(raw.to_string()), ColumnType::Int)
        .as_i64()
        .unwrap_or(0)
}

pub fn current_page(offset: u64, limit: u64) -> u64 {
    if offset > 0 && limit > 0 {
        offset / limit
    } else {
        0
    }
}

pub fn total_pages(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        0
    } else {
        total.div_ceil(limit)
    }
}

/// Offset of the next page, absent once `offset + limit` reaches `total`.
pub fn next_offset(offset: u64, limit: u64, total: u64) -> Option<u64> {
    let next = offset.saturating_add(limit);
    (next < total).then_some(next)
}

/// Offset of the previous page, absent unless `offset - limit` is positive.
pub fn prev_offset(offset: u64, limit: u64) -> Option<u64> {
    offset.checked_sub(limit).filter(|prev| *prev > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Navigation summary of a list response. Absent links are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub next: String,
    pub prev: String,
    pub page: u64,
    pub pages: u64,
    pub total: u64,
}

/// Request-scoped pagination state for one entity kind.
///
/// The row total is fetched at most once per paginator.
pub struct Paginator {
    kind: Arc<EntityKind>,
    path: String,
    params: QueryParams,
    settings: PageSettings,
    total: OnceCell<u64>,
}

impl Paginator {
    pub fn new(kind: Arc<EntityKind>, path: impl Into<String>, params: QueryParams, settings: PageSettings) -> Self {
        Self {
            kind,
            path: path.into(),
            params,
            settings,
            total: OnceCell::new(),
        }
    }

    pub fn limit(&self) -> u64 {
        self.settings.limit(self.params.get("limit"))
    }

    pub fn offset(&self) -> u64 {
        self.settings.offset(self.params.get("offset"))
    }

    pub fn current_page(&self) -> u64 {
        current_page(self.offset(), self.limit())
    }

    /// Rows of the kind, counted once.
    pub async fn total(&self) -> Result<u64, DataError> {
        self.total
            .get_or_try_init(|| self.kind.count())
            .await
            .copied()
    }

    pub async fn total_pages(&self) -> Result<u64, DataError> {
        Ok(total_pages(self.total().await?, self.limit()))
    }

    pub async fn next(&self) -> Result<Option<u64>, DataError> {
        Ok(next_offset(self.offset(), self.limit(), self.total().await?))
    }

    pub fn prev(&self) -> Option<u64> {
        prev_offset(self.offset(), self.limit())
    }

    /// Link to the adjacent page, or an empty string at the boundary.
    ///
    /// The request path and every other query parameter are kept; only
    /// `limit` and `offset` are replaced.
    pub async fn link(&self, direction: Direction) -> Result<String, DataError> {
        let offset = match direction {
            Direction::Next => self.next().await?,
            Direction::Prev => self.prev(),
        };
        Ok(offset.map_or_else(String::new, |offset| self.link_to(offset)))
    }

    fn link_to(&self, offset: u64) -> String {
        let mut params = self.params.clone();
        params.set("limit", self.limit().to_string());
        params.set("offset", offset.to_string());
        format!("{}?{}", self.path, params.encode())
    }

    pub async fn links(&self) -> Result<PageLinks, DataError> {
        Ok(PageLinks {
            next: self.link(Direction::Next).await?,
            prev: self.link(Direction::Prev).await?,
            page: self.current_page(),
            pages: self.total_pages().await?,
            total: self.total().await?,
        })
    }
}
