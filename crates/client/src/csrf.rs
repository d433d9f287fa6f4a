//! CSRF token resolution.
//!
//! The token comes from the `csrftoken` cookie first, then from the hidden
//! `csrfmiddlewaretoken` form field rendered into the page. Missing both
//! yields an empty token; the server decides what that means.

use secmatrix_protocol::{CSRF_COOKIE, CSRF_FORM_FIELD};

/// Where a host can look up the token.
pub trait TokenSource {
    fn cookie(&self, name: &str) -> Option<String>;
    fn form_field(&self, name: &str) -> Option<String>;
}

/// Resolve the CSRF token: cookie, then hidden field, then empty.
pub fn resolve_csrf_token<T: TokenSource + ?Sized>(source: &T) -> String {
    source
        .cookie(CSRF_COOKIE)
        .filter(|v| !v.is_empty())
        .or_else(|| source.form_field(CSRF_FORM_FIELD).filter(|v| !v.is_empty()))
        .unwrap_or_default()
}

/// Parsed `Cookie` header (`a=1; b=2`), plus the hidden-field fallback.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    pairs: Vec<(String, String)>,
    hidden_token: Option<String>,
}

impl CookieJar {
    pub fn parse(header: &str) -> Self {
        let pairs = header
            .split(';')
            .filter_map(|part| {
                let (name, value) = part.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect();
        Self { pairs, hidden_token: None }
    }

    /// Token rendered in the page's hidden form field.
    pub fn with_hidden_token(mut self, token: Option<String>) -> Self {
        self.hidden_token = token.filter(|t| !t.is_empty());
        self
    }
}

impl TokenSource for CookieJar {
    fn cookie(&self, name: &str) -> Option<String> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn form_field(&self, name: &str) -> Option<String> {
        if name == CSRF_FORM_FIELD {
            self.hidden_token.clone()
        } else {
            None
        }
    }
}
