use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One bar of the registrations chart: bucket label and count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: u64,
}

/// Chart-ready weekly registration counts, oldest bucket first.
///
/// `note` is non-empty only when undated buyers were folded into the most
/// recent bucket.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklySeries {
    pub series: Vec<SeriesPoint>,
    pub note: String,
}

/// A named tally used for the catalog distributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SellerMetrics {
    pub total: usize,
    pub verified: usize,
}

/// Persisted admin session. `user` keeps whatever shape the backend returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<Value>,
}

/// Body of a successful `POST /users/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}
