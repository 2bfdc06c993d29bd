//! Where catalogs live.
//!
//! Each survey family has one root: a directory, or the URL of a remote
//! search engine that answers with tab-tables. Roots come from environment
//! variables with compiled-in fallbacks.

use std::collections::HashMap;
use std::path::PathBuf;

/// A group of catalogs sharing one root and one storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurveyFamily {
    UsnoA1,
    UsnoA2,
    UsnoSa1,
    UsnoSa2,
    UsnoB1,
    Ucac2,
    Tycho2,
    Sao,
    Ppm,
    Iras,
    Bsc,
    /// Any ASCII or tab-table catalog named by file.
    Generic,
}

impl SurveyFamily {
    pub const ALL: [SurveyFamily; 12] = [
        SurveyFamily::UsnoA1,
        SurveyFamily::UsnoA2,
        SurveyFamily::UsnoSa1,
        SurveyFamily::UsnoSa2,
        SurveyFamily::UsnoB1,
        SurveyFamily::Ucac2,
        SurveyFamily::Tycho2,
        SurveyFamily::Sao,
        SurveyFamily::Ppm,
        SurveyFamily::Iras,
        SurveyFamily::Bsc,
        SurveyFamily::Generic,
    ];

    /// Environment variable naming this family's root.
    pub fn env_var(self) -> &'static str {
        match self {
            SurveyFamily::UsnoA1 => "UA1_PATH",
            SurveyFamily::UsnoA2 => "UA2_PATH",
            SurveyFamily::UsnoSa1 => "USA1_PATH",
            SurveyFamily::UsnoSa2 => "USA2_PATH",
            SurveyFamily::UsnoB1 => "UB1_PATH",
            SurveyFamily::Ucac2 => "UCAC2_PATH",
            SurveyFamily::Tycho2 => "TY2_PATH",
            SurveyFamily::Sao => "SAO_PATH",
            SurveyFamily::Ppm => "PPM_PATH",
            SurveyFamily::Iras => "IRAS_PATH",
            SurveyFamily::Bsc => "BSC_PATH",
            SurveyFamily::Generic => "WCS_CATDIR",
        }
    }

    /// Root used when the environment variable is unset.
    pub fn default_root(self) -> &'static str {
        match self {
            SurveyFamily::UsnoA1 => "/data/ua1",
            SurveyFamily::UsnoA2 => "/data/ua2",
            SurveyFamily::UsnoSa1 => "/data/usa1",
            SurveyFamily::UsnoSa2 => "/data/usa2",
            SurveyFamily::UsnoB1 => "/data/ub1",
            SurveyFamily::Ucac2 => "/data/ucac2",
            SurveyFamily::Tycho2 => "/data/tycho2",
            SurveyFamily::Sao
            | SurveyFamily::Ppm
            | SurveyFamily::Iras
            | SurveyFamily::Bsc
            | SurveyFamily::Generic => "/data/catalogs",
        }
    }

    /// Display name of the survey.
    pub fn label(self) -> &'static str {
        match self {
            SurveyFamily::UsnoA1 => "USNO-A1.0",
            SurveyFamily::UsnoA2 => "USNO-A2.0",
            SurveyFamily::UsnoSa1 => "USNO-SA1.0",
            SurveyFamily::UsnoSa2 => "USNO-SA2.0",
            SurveyFamily::UsnoB1 => "USNO-B1.0",
            SurveyFamily::Ucac2 => "UCAC2",
            SurveyFamily::Tycho2 => "Tycho-2",
            SurveyFamily::Sao => "SAO",
            SurveyFamily::Ppm => "PPM",
            SurveyFamily::Iras => "IRAS",
            SurveyFamily::Bsc => "BSC",
            SurveyFamily::Generic => "catalog",
        }
    }
}

/// A resolved catalog root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRoot {
    Local(PathBuf),
    /// Base URL of a search engine returning tab-tables.
    Remote(String),
}

impl CatalogRoot {
    pub fn parse(root: &str) -> CatalogRoot {
        let lower = root.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            CatalogRoot::Remote(root.to_string())
        } else {
            CatalogRoot::Local(PathBuf::from(root))
        }
    }
}

/// Root directory or URL per survey family.
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    roots: HashMap<SurveyFamily, String>,
}

impl CatalogConfig {
    /// Read every family's root from the process environment.
    pub fn from_env() -> CatalogConfig {
        CatalogConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read roots through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> CatalogConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let roots = SurveyFamily::ALL
            .iter()
            .filter_map(|&family| {
                lookup(family.env_var())
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .map(|v| (family, v))
            })
            .collect();
        CatalogConfig { roots }
    }

    /// Override one family's root.
    pub fn with_root(mut self, family: SurveyFamily, root: impl Into<String>) -> CatalogConfig {
        self.roots.insert(family, root.into());
        self
    }

    /// The configured root text, or the family default.
    pub fn root_str(&self, family: SurveyFamily) -> &str {
        self.roots
            .get(&family)
            .map(String::as_str)
            .unwrap_or_else(|| family.default_root())
    }

    pub fn root(&self, family: SurveyFamily) -> CatalogRoot {
        CatalogRoot::parse(self.root_str(family))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = CatalogConfig::from_lookup(|_| None);
        assert_eq!(cfg.root_str(SurveyFamily::UsnoB1), "/data/ub1");
        assert_eq!(
            cfg.root(SurveyFamily::Generic),
            CatalogRoot::Local(PathBuf::from("/data/catalogs"))
        );
    }

    #[test]
    fn lookup_overrides_default() {
        let cfg = CatalogConfig::from_lookup(|k| match k {
            "UCAC2_PATH" => Some("/mnt/ucac2".to_string()),
            "UA2_PATH" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.root_str(SurveyFamily::Ucac2), "/mnt/ucac2");
        assert_eq!(cfg.root_str(SurveyFamily::UsnoA2), "/data/ua2");
    }

    #[test]
    fn http_root_is_remote() {
        let cfg = CatalogConfig::default()
            .with_root(SurveyFamily::UsnoB1, "http://archive.example/cgi-bin/scat");
        assert!(matches!(cfg.root(SurveyFamily::UsnoB1), CatalogRoot::Remote(_)));
    }

    #[test]
    fn every_family_has_distinct_variable() {
        let mut names: Vec<_> = SurveyFamily::ALL.iter().map(|f| f.env_var()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SurveyFamily::ALL.len());
    }
}
