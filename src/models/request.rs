//! Outbound request description and HTTP method selection.

use std::fmt;

/// Serialized URIs at or above this length are sent as POST.
pub const MAX_GET_URI_LEN: usize = 2000;

/// HTTP method chosen for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Parameters travel in the query string
    Get,
    /// Parameters travel in a urlencoded form body
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// Encode parameters as `key=value` pairs joined by `&`
pub fn encode_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Length of the unescaped `url?key=value&...` form.
///
/// Escaping is left out: reqwest's form encoding writes spaces as `+`, so
/// the unescaped length is what typical terms and ID lists cost.
pub fn serialized_len(url: &str, params: &[(String, String)]) -> usize {
    if params.is_empty() {
        return url.len();
    }
    let pairs: usize = params.iter().map(|(k, v)| k.len() + 1 + v.len()).sum();
    url.len() + 1 + pairs + (params.len() - 1)
}

/// Pick GET for short URIs and POST for long ones.
pub fn select_method(url: &str, params: &[(String, String)]) -> HttpMethod {
    if serialized_len(url, params) < MAX_GET_URI_LEN {
        HttpMethod::Get
    } else {
        HttpMethod::Post
    }
}

/// One request against an E-utilities endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    /// Endpoint URL without query string
    pub url: String,
    /// Query parameters in insertion order
    pub params: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter (builder style)
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_param(key, value);
        self
    }

    /// Insert or replace a parameter, keeping its original position
    pub fn set_param(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
    }

    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_string(&self) -> String {
        encode_params(&self.params)
    }

    /// Full `url?query` form with escaped parameters
    pub fn uri(&self) -> String {
        if self.params.is_empty() {
            self.url.clone()
        } else {
            format!("{}?{}", self.url, self.query_string())
        }
    }

    pub fn method(&self) -> HttpMethod {
        select_method(&self.url, &self.params)
    }
}
