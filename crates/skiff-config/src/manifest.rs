use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Cookie lifetime used when storage falls back to cookies.
pub const DEFAULT_COOKIE_EXPIRY_DAYS: u32 = 30;

/// Module keys registered when no manifest lists any.
pub const DEMO_MODULES: [&str; 4] = [
    "modules/modone",
    "modules/modtwo",
    "modules/modthree",
    "modules/status",
];

/// Application manifest loaded from `skiff.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppManifest {
    /// Registration keys, in registration order. The module id is the last
    /// `/` segment of each key.
    pub modules: Vec<String>,
    #[serde(default)]
    pub templates: TemplateSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    /// Fragment routed at startup, e.g. `#!/modone`.
    #[serde(default)]
    pub initial_fragment: Option<String>,
}

/// Where module templates are fetched from: `<dir>/<module id><suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSettings {
    #[serde(default = "default_template_dir")]
    pub dir: String,
    #[serde(default)]
    pub suffix: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            dir: default_template_dir(),
            suffix: String::new(),
        }
    }
}

/// Key/value store backing. Without a `path` the store uses cookies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSettings {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_cookie_expiry_days")]
    pub cookie_expiry_days: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: None,
            cookie_expiry_days: DEFAULT_COOKIE_EXPIRY_DAYS,
        }
    }
}

fn default_template_dir() -> String {
    "templates".into()
}

fn default_cookie_expiry_days() -> u32 {
    DEFAULT_COOKIE_EXPIRY_DAYS
}

impl Default for AppManifest {
    fn default() -> Self {
        Self {
            modules: DEMO_MODULES.iter().map(|k| k.to_string()).collect(),
            templates: TemplateSettings::default(),
            storage: StorageSettings::default(),
            initial_fragment: None,
        }
    }
}

impl AppManifest {
    /// Parse and validate manifest TOML.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(input).context("failed to parse skiff manifest TOML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and validate a manifest from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read skiff manifest at {}", path.display()))?;

        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid skiff manifest at {}", path.display()))
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate required fields and semantic constraints.
    pub fn validate(&self) -> Result<()> {
        validate_module_keys(&self.modules)?;

        if self.templates.dir.trim().is_empty() {
            bail!("templates.dir must not be empty");
        }
        if self.templates.suffix.trim() != self.templates.suffix {
            bail!("templates.suffix {:?} has leading/trailing whitespace", self.templates.suffix);
        }
        if self.storage.cookie_expiry_days == 0 {
            bail!("storage.cookie_expiry_days must be positive");
        }
        if let Some(path) = &self.storage.path {
            if path.as_os_str().is_empty() {
                bail!("storage.path must not be empty");
            }
        }

        Ok(())
    }

    /// The fragment to route at startup; empty when unset.
    pub fn start_fragment(&self) -> &str {
        self.initial_fragment.as_deref().unwrap_or("")
    }
}

fn validate_module_keys(keys: &[String]) -> Result<()> {
    if keys.is_empty() {
        bail!("modules must list at least one module");
    }

    let mut seen = BTreeSet::new();
    for key in keys {
        if key.trim().is_empty() {
            bail!("modules entries must not be empty");
        }
        if key.trim() != key {
            bail!("modules entry {:?} has leading/trailing whitespace", key);
        }
        if key.ends_with('/') {
            bail!("modules entry {:?} has no module id", key);
        }
        if !seen.insert(key.as_str()) {
            bail!("modules contains duplicate entry {:?}", key);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_MANIFEST: &str = r##"
modules = ["modules/modone", "modules/modtwo"]
initial_fragment = "#!/modone"

[templates]
dir = "demo/templates"
suffix = ".tpl"

[storage]
path = "skiff-store.json"
cookie_expiry_days = 7
"##;

    #[test]
    fn parses_valid_manifest() {
        let manifest = AppManifest::from_toml_str(VALID_MANIFEST).unwrap();
        assert_eq!(manifest.modules, vec!["modules/modone", "modules/modtwo"]);
        assert_eq!(manifest.start_fragment(), "#!/modone");
        assert_eq!(manifest.templates.suffix, ".tpl");
        assert_eq!(manifest.storage.path, Some(PathBuf::from("skiff-store.json")));
        assert_eq!(manifest.storage.cookie_expiry_days, 7);
    }

    #[test]
    fn optional_sections_take_defaults() {
        let manifest = AppManifest::from_toml_str(r#"modules = ["a"]"#).unwrap();
        assert_eq!(manifest.templates, TemplateSettings::default());
        assert_eq!(manifest.storage.cookie_expiry_days, DEFAULT_COOKIE_EXPIRY_DAYS);
        assert_eq!(manifest.start_fragment(), "");
    }

    #[test]
    fn default_lists_demo_modules() {
        let manifest = AppManifest::default();
        assert_eq!(manifest.modules.len(), DEMO_MODULES.len());
        manifest.validate().unwrap();
    }

    #[test]
    fn unknown_field_is_rejected() {
        let raw = format!("{VALID_MANIFEST}\nextra = 1\n");
        let err = AppManifest::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("failed to parse skiff manifest TOML"));
    }

    #[test]
    fn duplicate_module_keys_are_rejected() {
        let raw = VALID_MANIFEST.replace("\"modules/modtwo\"", "\"modules/modone\"");
        let err = AppManifest::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("modules contains duplicate entry"));
    }

    #[test]
    fn padded_module_key_is_rejected() {
        let raw = VALID_MANIFEST.replace("\"modules/modtwo\"", "\" modules/modtwo\"");
        let err = AppManifest::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("leading/trailing whitespace"));
    }

    #[test]
    fn empty_module_list_is_rejected() {
        let err = AppManifest::from_toml_str("modules = []").unwrap_err().to_string();
        assert!(err.contains("at least one module"));
    }

    #[test]
    fn zero_cookie_expiry_is_rejected() {
        let raw = VALID_MANIFEST.replace("cookie_expiry_days = 7", "cookie_expiry_days = 0");
        let err = AppManifest::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("cookie_expiry_days must be positive"));
    }

    #[test]
    fn empty_template_dir_is_rejected() {
        let raw = VALID_MANIFEST.replace("dir = \"demo/templates\"", "dir = \"  \"");
        let err = AppManifest::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("templates.dir must not be empty"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("skiff-config-test-missing.toml");
        let _ = fs::remove_file(&path);
        let manifest = AppManifest::load_or_default(&path).unwrap();
        assert_eq!(manifest, AppManifest::default());
    }

    #[test]
    fn from_path_reports_location() {
        let path = std::env::temp_dir().join("skiff-config-test-invalid.toml");
        fs::write(&path, "modules = [").unwrap();
        let err = format!("{:#}", AppManifest::from_path(&path).unwrap_err());
        assert!(err.contains("invalid skiff manifest at"));
        let _ = fs::remove_file(&path);
    }
}
