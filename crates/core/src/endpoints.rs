//! Server paths for one secure session.
//!
//! Secure routes live under `/secure/<access_code>/`. When the access code is
//! neither configured nor visible in the current location, the bare
//! `/secure/` prefix is used and the server resolves the session itself.

/// Path segments under `/secure/` that are routes, not access codes.
const RESERVED_SEGMENTS: &[&str] = &[
    "api",
    "matrix",
    "matrix-view",
    "logout",
    "logout-secure",
    "access",
];

/// Access code from a location such as `/secure/k3y/matrix-view/?x=1`.
pub fn access_code_from_path(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    segments.find(|s| *s == "secure")?;
    let code = segments.next()?;
    if RESERVED_SEGMENTS.contains(&code) {
        return None;
    }
    Some(code.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    prefix: String,
}

impl Endpoints {
    pub fn new(access_code: Option<&str>) -> Self {
        let prefix = match access_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => format!("/secure/{}", code.trim_matches('/')),
            None => "/secure".to_string(),
        };
        Self { prefix }
    }

    /// Configured code wins; otherwise derive it from the current location.
    pub fn resolve(configured: Option<&str>, current_path: &str) -> Self {
        match configured.filter(|c| !c.trim().is_empty()) {
            Some(code) => Self::new(Some(code)),
            None => Self::new(access_code_from_path(current_path).as_deref()),
        }
    }

    pub fn access_code(&self) -> Option<&str> {
        self.prefix.strip_prefix("/secure/")
    }

    pub fn save(&self) -> String {
        format!("{}/api/save-matrix/", self.prefix)
    }

    pub fn load_cells(&self) -> String {
        format!("{}/api/load-cells/", self.prefix)
    }

    pub fn undo(&self) -> String {
        format!("{}/matrix/undo/", self.prefix)
    }

    pub fn redo(&self) -> String {
        format!("{}/matrix/redo/", self.prefix)
    }

    pub fn logout(&self) -> String {
        format!("{}/logout-secure/", self.prefix)
    }

    pub fn logout_beacon(&self) -> String {
        format!("{}/api/logout-beacon/", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_from_location() {
        assert_eq!(access_code_from_path("/secure/k3y/matrix-view/").as_deref(), Some("k3y"));
        assert_eq!(access_code_from_path("/secure/k3y").as_deref(), Some("k3y"));
        assert_eq!(access_code_from_path("/app/secure/abc/?tab=1").as_deref(), Some("abc"));
        assert_eq!(access_code_from_path("/secure/matrix-view/"), None);
        assert_eq!(access_code_from_path("/secure/matrix/undo/"), None);
        assert_eq!(access_code_from_path("/secure/"), None);
        assert_eq!(access_code_from_path("/ledger/"), None);
    }

    #[test]
    fn paths_with_code() {
        let ep = Endpoints::new(Some("k3y"));
        assert_eq!(ep.access_code(), Some("k3y"));
        assert_eq!(ep.save(), "/secure/k3y/api/save-matrix/");
        assert_eq!(ep.undo(), "/secure/k3y/matrix/undo/");
        assert_eq!(ep.redo(), "/secure/k3y/matrix/redo/");
        assert_eq!(ep.load_cells(), "/secure/k3y/api/load-cells/");
        assert_eq!(ep.logout(), "/secure/k3y/logout-secure/");
        assert_eq!(ep.logout_beacon(), "/secure/k3y/api/logout-beacon/");
    }

    #[test]
    fn paths_without_code() {
        let ep = Endpoints::new(None);
        assert_eq!(ep.access_code(), None);
        assert_eq!(ep.save(), "/secure/api/save-matrix/");
        assert_eq!(ep.undo(), "/secure/matrix/undo/");
        assert_eq!(ep.redo(), "/secure/matrix/redo/");
        assert_eq!(Endpoints::new(Some("  ")), ep);
    }

    #[test]
    fn configured_code_wins_over_location() {
        let ep = Endpoints::resolve(Some("cfg"), "/secure/loc/matrix-view/");
        assert_eq!(ep.access_code(), Some("cfg"));

        let ep = Endpoints::resolve(None, "/secure/loc/matrix-view/");
        assert_eq!(ep.access_code(), Some("loc"));

        let ep = Endpoints::resolve(Some(""), "/secure/matrix-view/");
        assert_eq!(ep.access_code(), None);
    }
}
