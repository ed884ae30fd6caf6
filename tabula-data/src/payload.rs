use serde::Serialize;
use serde_json::Value;
use tabula_core::StatusCode;

use crate::page::PageLinks;

/// Response envelope handed to the HTTP layer.
///
/// List responses carry the paginator summary next to `data`:
/// `{ "statusCode": 200, "data": [...], "next": "...", "prev": "", "page": 0, "pages": 3, "total": 25 }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub status_code: u16,
    pub data: Value,
    #[serde(flatten)]
    pub links: Option<PageLinks>,
}

impl Payload {
    pub fn new(status: StatusCode, data: Value) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            links: None,
        }
    }

    pub fn ok(data: Value) -> Self {
        Self::new(StatusCode::OK, data)
    }

    pub fn created(data: Value) -> Self {
        Self::new(StatusCode::CREATED, data)
    }

    pub fn list(data: Value, links: PageLinks) -> Self {
        Self {
            links: Some(links),
            ..Self::ok(data)
        }
    }
}
