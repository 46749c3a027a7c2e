#![forbid(unsafe_code)]

use serde::Serialize;

/// What a failed delete does beyond logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DeleteErrorPolicy {
    /// `tracing::error!` only; the panel shows nothing.
    #[default]
    LogOnly,
    /// Log and set the panel notice.
    Surface,
}

impl std::str::FromStr for DeleteErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" | "log-only" | "logonly" => Ok(DeleteErrorPolicy::LogOnly),
            "surface" => Ok(DeleteErrorPolicy::Surface),
            other => Err(format!("unknown delete error policy: {} (expect log|surface)", other)),
        }
    }
}

/// Whether a refetch that changes the desired replica count replaces unsaved input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ReseedPolicy {
    #[default]
    PreserveEdits,
    Clobber,
}

impl std::str::FromStr for ReseedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" | "preserve-edits" => Ok(ReseedPolicy::PreserveEdits),
            "clobber" => Ok(ReseedPolicy::Clobber),
            other => Err(format!("unknown reseed policy: {} (expect preserve|clobber)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewConfig {
    pub delete_errors: DeleteErrorPolicy,
    pub reseed: ReseedPolicy,
    /// Workload label whose value selects its pods.
    pub selector_label: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self { delete_errors: DeleteErrorPolicy::default(), reseed: ReseedPolicy::default(), selector_label: "app".to_string() }
    }
}

impl ViewConfig {
    /// Read `KDECK_DELETE_ERRORS`, `KDECK_RESEED` and `KDECK_SELECTOR_LABEL`.
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            delete_errors: get("KDECK_DELETE_ERRORS").and_then(|s| s.parse().ok()).unwrap_or(d.delete_errors),
            reseed: get("KDECK_RESEED").and_then(|s| s.parse().ok()).unwrap_or(d.reseed),
            selector_label: get("KDECK_SELECTOR_LABEL").filter(|s| !s.trim().is_empty()).unwrap_or(d.selector_label),
        }
    }

    pub fn with_delete_errors(mut self, p: DeleteErrorPolicy) -> Self { self.delete_errors = p; self }

    pub fn with_reseed(mut self, p: ReseedPolicy) -> Self { self.reseed = p; self }

    pub fn with_selector_label(mut self, key: impl Into<String>) -> Self { self.selector_label = key.into(); self }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_and_falls_back() {
        let env: HashMap<&str, &str> =
            [("KDECK_DELETE_ERRORS", "Surface"), ("KDECK_RESEED", "bogus"), ("KDECK_SELECTOR_LABEL", "")].into_iter().collect();
        let cfg = ViewConfig::from_lookup(|k| env.get(k).map(|s| s.to_string()));
        assert_eq!(cfg.delete_errors, DeleteErrorPolicy::Surface);
        assert_eq!(cfg.reseed, ReseedPolicy::PreserveEdits);
        assert_eq!(cfg.selector_label, "app");
    }

    #[test]
    fn policies_parse() {
        assert_eq!("log".parse::<DeleteErrorPolicy>(), Ok(DeleteErrorPolicy::LogOnly));
        assert_eq!("clobber".parse::<ReseedPolicy>(), Ok(ReseedPolicy::Clobber));
        assert!("loud".parse::<DeleteErrorPolicy>().is_err());
    }
}
