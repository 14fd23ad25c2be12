use std::collections::BTreeMap;

pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_PLATFORM_ID: &str = "x-federation-platform-id";
pub const HEADER_TIMESTAMP: &str = "x-federation-timestamp";
pub const HEADER_SIGNATURE: &str = "x-federation-signature";
pub const QUERY_API_KEY: &str = "api_key";

/// Transport-agnostic view of an inbound federation request.
///
/// Header names are stored lowercased so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: String,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Value of `Authorization: Bearer <token>`, scheme matched case-insensitively.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.header(HEADER_AUTHORIZATION)?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }
}
