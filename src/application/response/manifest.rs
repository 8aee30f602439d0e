//! Lazy-module to script-file mapping produced by the client bundler.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

pub const SOURCE_MAP_SUFFIX: &str = ".map";
pub const DEFAULT_PUBLIC_PATH: &str = "/static/";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub file: String,
    #[serde(default)]
    pub public_path: Option<String>,
}

/// Parsed manifest: `{"ModuleName": [{"file": "a.js", "publicPath": "/static/a.js"}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    modules: BTreeMap<String, Vec<ManifestEntry>>,
    public_path: String,
}

impl AssetManifest {
    pub fn new(public_path: impl Into<String>) -> Self {
        Self {
            modules: BTreeMap::new(),
            public_path: public_path.into(),
        }
    }

    pub fn from_json(raw: &str, public_path: impl Into<String>) -> Result<Self, serde_json::Error> {
        let modules = serde_json::from_str(raw)?;
        Ok(Self {
            modules,
            public_path: public_path.into(),
        })
    }

    pub fn insert(&mut self, module: impl Into<String>, entries: Vec<ManifestEntry>) {
        self.modules.insert(module.into(), entries);
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Script paths for the touched modules. Each distinct path appears once,
    /// in first-seen order, with source-map suffixes removed before comparing.
    /// Modules the manifest does not know are skipped.
    pub fn scripts_for<S: AsRef<str>>(&self, modules: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut scripts = Vec::new();
        for module in modules {
            let Some(entries) = self.modules.get(module.as_ref()) else {
                continue;
            };
            for entry in entries {
                let path = strip_source_map(&self.script_path(entry)).to_string();
                if seen.insert(path.clone()) {
                    scripts.push(path);
                }
            }
        }
        scripts
    }

    fn script_path(&self, entry: &ManifestEntry) -> String {
        if let Some(public_path) = &entry.public_path {
            return public_path.clone();
        }
        let prefix = self.public_path.trim_end_matches('/');
        let file = entry.file.trim_start_matches('/');
        format!("{prefix}/{file}")
    }
}

fn strip_source_map(path: &str) -> &str {
    path.strip_suffix(SOURCE_MAP_SUFFIX).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(public_path: &str) -> ManifestEntry {
        ManifestEntry {
            file: public_path.trim_start_matches('/').to_string(),
            public_path: Some(public_path.to_string()),
        }
    }

    #[test]
    fn repeated_modules_yield_each_path_once_in_first_seen_order() {
        let mut manifest = AssetManifest::new(DEFAULT_PUBLIC_PATH);
        manifest.insert("A", vec![entry("/A.js")]);
        manifest.insert("B", vec![entry("/B.js")]);
        manifest.insert("C", vec![entry("/C.js")]);

        let scripts = manifest.scripts_for(&["A", "B", "A", "C", "B"]);

        assert_eq!(scripts, vec!["/A.js", "/B.js", "/C.js"]);
    }

    #[test]
    fn source_maps_collapse_onto_their_scripts() {
        let mut manifest = AssetManifest::new(DEFAULT_PUBLIC_PATH);
        manifest.insert("A", vec![entry("/A.js"), entry("/A.js.map")]);
        manifest.insert("B", vec![entry("/B.js.map")]);

        assert_eq!(manifest.scripts_for(&["A", "B"]), vec!["/A.js", "/B.js"]);
    }

    #[test]
    fn files_without_public_path_use_the_prefix() {
        let raw = r#"{"Thread": [
            {"file": "thread.1a2b.js"},
            {"file": "vendor.js", "publicPath": "https://cdn.example/vendor.js"}
        ]}"#;
        let manifest = AssetManifest::from_json(raw, "/static/").expect("valid manifest");

        assert_eq!(
            manifest.scripts_for(&["Thread"]),
            vec!["/static/thread.1a2b.js", "https://cdn.example/vendor.js"]
        );
    }

    #[test]
    fn unknown_modules_are_skipped() {
        let manifest = AssetManifest::new(DEFAULT_PUBLIC_PATH);
        assert!(manifest.scripts_for(&["Missing"]).is_empty());
    }

    #[test]
    fn malformed_manifest_is_rejected() {
        assert!(AssetManifest::from_json("[1,2]", "/").is_err());
    }
}
