use serde::{Deserialize, Serialize};

/// A single course record parsed from one module detail page
///
/// The URL is the stable key. Once registered a module is never mutated and is
/// shared by every group that references it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub url: String,
    pub name: String,
    pub code: String,
    pub levels: Vec<String>,
    pub duration: String,
    pub nqf_level: u32,
    pub credits: u32,
    pub purpose: String,
    pub pre_requisite: String,
    pub co_requisite: String,
    pub recommendation: String,
}

impl Module {
    /// Builds a placeholder for a module whose page could not be used
    ///
    /// Only the URL and the display name from the referencing link are known;
    /// every other field keeps its default.
    pub fn stub(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns true if the module carries nothing beyond its URL and name
    pub fn is_stub(&self) -> bool {
        self.code.is_empty()
            && self.levels.is_empty()
            && self.duration.is_empty()
            && self.nqf_level == 0
            && self.credits == 0
            && self.purpose.is_empty()
    }

    /// Case-sensitive substring search over the descriptive fields
    pub fn matches(&self, query: &str) -> bool {
        [&self.name, &self.code, &self.duration, &self.purpose]
            .iter()
            .any(|field| field.contains(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_keeps_only_url_and_name() {
        let module = Module::stub("https://example.com/mod/ABC1501", "Intro to ABC");
        assert_eq!(module.url, "https://example.com/mod/ABC1501");
        assert_eq!(module.name, "Intro to ABC");
        assert_eq!(module.code, "");
        assert!(module.levels.is_empty());
        assert_eq!(module.nqf_level, 0);
        assert_eq!(module.credits, 0);
        assert!(module.is_stub());
    }

    #[test]
    fn test_parsed_module_is_not_stub() {
        let module = Module {
            code: "ABC1501".to_string(),
            credits: 12,
            ..Module::stub("https://example.com/mod/ABC1501", "Intro to ABC")
        };
        assert!(!module.is_stub());
    }

    #[test]
    fn test_matches() {
        let module = Module {
            code: "ABC1501".to_string(),
            purpose: "Students learn the alphabet".to_string(),
            ..Module::stub("https://example.com/mod/ABC1501", "Intro to ABC")
        };
        assert!(module.matches("ABC15"));
        assert!(module.matches("alphabet"));
        assert!(!module.matches("calculus"));
    }
}
