use serde::Deserialize;

/// An error response from the REST API: `["error", 10020, "symbol: invalid"]`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse(pub String, pub i64, pub String);

impl ApiErrorResponse {
    pub fn code(&self) -> i64 {
        self.1
    }

    pub fn msg(&self) -> &str {
        &self.2
    }
}
