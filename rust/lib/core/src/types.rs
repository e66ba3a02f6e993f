use serde::{Deserialize, Serialize};

/// Seconds since the unix epoch, as supplied by the trusted clock.
pub type Timestamp = i64;

/// Parameters for list operations.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    /// Maximum number of results to return.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Offset for pagination.
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Result wrapper for list operations.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
    pub has_more: bool,
}

impl<T: Serialize> ListResult<T> {
    /// Slice an already-sorted collection according to `params`.
    pub fn paginate(all: Vec<T>, params: &ListParams) -> Self {
        let total = all.len();
        let offset = params.offset.min(total);
        let end = offset.saturating_add(params.limit).min(total);
        let items: Vec<T> = all.into_iter().skip(offset).take(end - offset).collect();
        Self {
            items,
            total,
            has_more: end < total,
        }
    }
}
