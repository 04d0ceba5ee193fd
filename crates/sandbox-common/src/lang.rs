//! Canonical execution language and its alias normalization rule.

use serde::{Deserialize, Serialize};

/// The closed set of languages the code executor understands.
///
/// `Shell` is the default when a request omits `language` entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Shell,
    Js,
    Ts,
    Py,
}

impl Lang {
    /// Normalize a caller-supplied language string per the alias table:
    /// `javascript -> js`, `typescript -> ts`, `python -> py`,
    /// `bash|sh -> shell`. Unknown values are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "shell" | "bash" | "sh" => Some(Lang::Shell),
            "js" | "javascript" => Some(Lang::Js),
            "ts" | "typescript" => Some(Lang::Ts),
            "py" | "python" => Some(Lang::Py),
            _ => None,
        }
    }

    /// Normalize an optional language string, defaulting to `Shell` when absent.
    pub fn parse_or_default(raw: Option<&str>) -> Option<Self> {
        match raw {
            None => Some(Lang::Shell),
            Some(s) => Self::parse(s),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::Shell => "shell",
            Lang::Js => "js",
            Lang::Ts => "ts",
            Lang::Py => "py",
        }
    }

    /// Whether this language is handled by the code executor as opposed to
    /// the raw process runner.
    pub fn is_code(&self) -> bool {
        !matches!(self, Lang::Shell)
    }

    pub fn source_extension(&self) -> &'static str {
        match self {
            Lang::Js => "js",
            Lang::Ts => "ts",
            Lang::Py => "py",
            Lang::Shell => "sh",
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize() {
        assert_eq!(Lang::parse("javascript"), Some(Lang::Js));
        assert_eq!(Lang::parse("TypeScript"), Some(Lang::Ts));
        assert_eq!(Lang::parse("python"), Some(Lang::Py));
        assert_eq!(Lang::parse("bash"), Some(Lang::Shell));
        assert_eq!(Lang::parse("sh"), Some(Lang::Shell));
        assert_eq!(Lang::parse("ruby"), None);
    }

    #[test]
    fn absent_defaults_to_shell() {
        assert_eq!(Lang::parse_or_default(None), Some(Lang::Shell));
    }

    #[test]
    fn is_code_excludes_shell() {
        assert!(!Lang::Shell.is_code());
        assert!(Lang::Js.is_code());
        assert!(Lang::Ts.is_code());
        assert!(Lang::Py.is_code());
    }
}
