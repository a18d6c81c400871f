use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Instrument {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StyleDefinition {
    pub description: String,
    pub instruments: Vec<Instrument>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StyleGroup {
    pub name: String,
    pub description: String,
    pub styles: BTreeMap<String, StyleDefinition>,
}

/// The style reference data: groups as authored, plus a flattened lookup by
/// style key. Style keys are unique across the whole catalog.
#[derive(Debug, Default, Clone)]
pub struct StyleCatalog {
    pub groups: Vec<StyleGroup>,
    lookup: BTreeMap<String, StyleDefinition>,
    loaded: bool,
}

impl StyleCatalog {
    /// Reads the catalog document. A missing or malformed file logs the
    /// error and yields an empty catalog; `loaded` is set either way so
    /// callers never wait on catalog availability.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let groups = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Vec<StyleGroup>>(&content) {
                Ok(groups) => groups,
                Err(e) => {
                    log::error!("Failed to parse style catalog {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(e) => {
                log::error!("Failed to read style catalog {}: {}", path.display(), e);
                Vec::new()
            }
        };
        Self::from_groups(groups)
    }

    pub fn from_groups(groups: Vec<StyleGroup>) -> Self {
        let mut lookup = BTreeMap::new();
        for group in &groups {
            for (key, definition) in &group.styles {
                lookup.insert(key.clone(), definition.clone());
            }
        }
        Self {
            groups,
            lookup,
            loaded: true,
        }
    }

    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StyleDefinition> {
        self.lookup.get(key)
    }

    /// All style keys, grouped order flattened.
    pub fn style_keys(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|group| group.styles.keys().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> StyleCatalog {
        let json = r#"[
            {
                "name": "Classic",
                "description": "Timeless forms",
                "styles": {
                    "Jazz": {
                        "description": "Smooth",
                        "instruments": [
                            { "name": "Piano", "description": "Keys", "default": true },
                            { "name": "Double Bass", "description": "Walking lines" }
                        ]
                    }
                }
            },
            {
                "name": "Modern",
                "description": "Electronic textures",
                "styles": {
                    "Synthwave": {
                        "description": "Retro-futuristic",
                        "instruments": [
                            { "name": "Analog Synth", "description": "Saw leads", "default": true }
                        ]
                    }
                }
            }
        ]"#;
        let groups: Vec<StyleGroup> = serde_json::from_str(json).unwrap();
        StyleCatalog::from_groups(groups)
    }

    #[test]
    fn flattens_groups_into_lookup() {
        let catalog = sample_catalog();
        assert!(catalog.loaded());
        assert_eq!(catalog.get("Jazz").unwrap().description, "Smooth");
        assert_eq!(catalog.get("Synthwave").unwrap().instruments.len(), 1);
        assert!(catalog.get("Polka").is_none());
        assert_eq!(catalog.style_keys(), vec!["Jazz", "Synthwave"]);
    }

    #[test]
    fn missing_file_yields_empty_loaded_catalog() {
        let catalog = StyleCatalog::load("/definitely/not/here/styles.json");
        assert!(catalog.loaded());
        assert!(catalog.is_empty());
    }

    #[test]
    fn default_flag_is_optional() {
        let catalog = sample_catalog();
        let jazz = catalog.get("Jazz").unwrap();
        assert!(jazz.instruments[0].default);
        assert!(!jazz.instruments[1].default);
    }
}
