use crate::model::Module;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// A named bucket of modules under one level
#[derive(Debug, Clone, Serialize)]
pub struct ModuleGroup {
    /// Normalized heading text
    pub heading: String,

    /// Modules in page order
    pub modules: Vec<Arc<Module>>,
}

/// One block of module groups on a qualification page
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleLevel {
    pub module_groups: Vec<ModuleGroup>,
}

/// A degree or diploma program scraped from one detail page
///
/// The URL is the primary key; the human code is not unique across runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Qualification {
    pub url: String,
    pub name: String,
    pub stream: String,
    pub code: String,
    pub nqf_level: u32,
    pub total_credits: u32,
    pub saqa_id: String,
    pub aps_as: u32,
    pub purpose: String,
    pub rules: String,
    pub module_levels: Vec<ModuleLevel>,
}

impl Qualification {
    /// Iterates over every module reference in page order
    ///
    /// A module listed in several groups is yielded once per reference.
    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.module_levels
            .iter()
            .flat_map(|level| level.module_groups.iter())
            .flat_map(|group| group.modules.iter())
    }

    /// Total number of module references
    pub fn module_count(&self) -> usize {
        self.modules().count()
    }

    /// Total number of module groups across all levels
    pub fn group_count(&self) -> usize {
        self.module_levels
            .iter()
            .map(|level| level.module_groups.len())
            .sum()
    }

    /// Distinct modules referenced by this qualification, first reference wins
    pub fn unique_modules(&self) -> Vec<Arc<Module>> {
        let mut seen = HashSet::new();
        self.modules()
            .filter(|module| seen.insert(module.url.clone()))
            .cloned()
            .collect()
    }

    /// Builds the projection handed to the document store
    pub fn to_document(&self) -> QualificationDocument<'_> {
        QualificationDocument {
            qualification: self,
            module_count: self.module_count(),
            group_count: self.group_count(),
        }
    }
}

/// Persisted form of a qualification, carrying the derived counts
#[derive(Debug, Serialize)]
pub struct QualificationDocument<'a> {
    #[serde(flatten)]
    pub qualification: &'a Qualification,
    pub module_count: usize,
    pub group_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(code: &str) -> Arc<Module> {
        Arc::new(Module {
            code: code.to_string(),
            ..Module::stub(format!("https://example.com/mod/{}", code), code)
        })
    }

    fn sample() -> Qualification {
        let shared = module("SHR1501");
        Qualification {
            url: "https://example.com/q/98000".to_string(),
            name: "Bachelor of Testing".to_string(),
            code: "98000".to_string(),
            module_levels: vec![
                ModuleLevel {
                    module_groups: vec![
                        ModuleGroup {
                            heading: "Compulsory".to_string(),
                            modules: vec![module("ABC1501"), shared.clone()],
                        },
                        ModuleGroup {
                            heading: "Choose 1 from the following".to_string(),
                            modules: vec![module("DEF1502")],
                        },
                    ],
                },
                ModuleLevel {
                    module_groups: vec![ModuleGroup {
                        heading: "Compulsory".to_string(),
                        modules: vec![shared, module("GHI2601")],
                    }],
                },
            ],
            ..Qualification::default()
        }
    }

    #[test]
    fn test_counts() {
        let qualification = sample();
        assert_eq!(qualification.module_count(), 5);
        assert_eq!(qualification.group_count(), 3);
    }

    #[test]
    fn test_unique_modules() {
        let codes: Vec<_> = sample()
            .unique_modules()
            .iter()
            .map(|m| m.code.clone())
            .collect();
        assert_eq!(codes, vec!["ABC1501", "SHR1501", "DEF1502", "GHI2601"]);
    }

    #[test]
    fn test_document_projection_carries_counts() {
        let qualification = sample();
        let value = serde_json::to_value(qualification.to_document()).unwrap();
        assert_eq!(value["url"], "https://example.com/q/98000");
        assert_eq!(value["module_count"], 5);
        assert_eq!(value["group_count"], 3);
        assert_eq!(
            value["module_levels"][0]["module_groups"][1]["modules"][0]["code"],
            "DEF1502"
        );
    }
}
