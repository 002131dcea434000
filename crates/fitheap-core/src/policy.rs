//! Free-policy selection.

/// How the allocator treats null, foreign, and double frees.
///
/// Under either policy the arena, the chain, and the counters are left
/// untouched by an invalid free; the policies differ only in how the
/// caller hears about it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FreePolicy {
    /// Invalid frees are reported no-ops, in the spirit of the classical
    /// `free(NULL)` contract.
    #[default]
    Lenient,
    /// Invalid frees are hard errors.
    Strict,
}

impl FreePolicy {
    /// Parses a policy name, case-insensitive. Unknown names fall back to
    /// the lenient default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "strict" | "hard" | "error" => Self::Strict,
            _ => Self::Lenient,
        }
    }

    #[must_use]
    pub fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }

    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_names() {
        assert_eq!(FreePolicy::from_str_loose("strict"), FreePolicy::Strict);
        assert_eq!(FreePolicy::from_str_loose("STRICT"), FreePolicy::Strict);
        assert_eq!(FreePolicy::from_str_loose("hard"), FreePolicy::Strict);
        assert_eq!(FreePolicy::from_str_loose("error"), FreePolicy::Strict);
        assert_eq!(FreePolicy::from_str_loose("lenient"), FreePolicy::Lenient);
        assert_eq!(FreePolicy::from_str_loose("silent"), FreePolicy::Lenient);
        assert_eq!(FreePolicy::from_str_loose("unknown"), FreePolicy::Lenient);
        assert_eq!(FreePolicy::from_str_loose(""), FreePolicy::Lenient);
    }

    #[test]
    fn default_is_lenient() {
        assert_eq!(FreePolicy::default(), FreePolicy::Lenient);
        assert!(!FreePolicy::default().is_strict());
    }

    #[test]
    fn canonical_names_roundtrip() {
        for policy in [FreePolicy::Lenient, FreePolicy::Strict] {
            assert_eq!(FreePolicy::from_str_loose(policy.as_str()), policy);
        }
    }
}
