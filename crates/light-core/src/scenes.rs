//! Scene catalog loaded from the vendor's per-model JSON
//!
//! The vendor app ships a JSON catalog per model: categories of
//! scenes, each scene a list of effects with a 2-byte scene code and
//! a base64 bulk parameter blob that must be uploaded before the code
//! is written. A handful of scene codes predate the catalogs and are
//! built into the firmware with no parameter blob.

use std::collections::HashMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tokio::fs;

use crate::error::LightError;

/// Scene codes built into the firmware, usable without a catalog
pub const BUILTIN_SCENES: &[(&str, u16)] = &[
    ("sunrise", 0),
    ("sunset", 1),
    ("movie", 4),
    ("dating", 5),
    ("romantic", 7),
    ("illumination", 0x3f),
    ("cheerful", 0x40),
];

/// Firmware version constraints on an effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRule {
    pub hardware: String,
    pub software: String,
    pub wifi_software: String,
}

/// A special-effect variant within an effect
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialEffect {
    pub code: u16,
    pub param: Vec<u8>,
    pub speed: Vec<serde_json::Value>,
}

/// One concrete effect of a scene
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    /// Scene code written to the mode register, little-endian.
    pub code: u16,
    /// Bulk parameter blob uploaded ahead of the mode write.
    pub param: Vec<u8>,
    pub diy_code: u32,
    pub diy_param: Vec<u8>,
    pub rules: Vec<VersionRule>,
    pub special: Vec<SpecialEffect>,
}

/// A named scene with one or more effects
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub title: String,
    pub category: String,
    pub hint: String,
    pub effects: Vec<Effect>,
}

#[derive(Deserialize)]
struct RawScene {
    #[serde(default)]
    hint: String,
    #[serde(default)]
    effects: Vec<RawEffect>,
}

#[derive(Deserialize)]
struct RawEffect {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    param: String,
    #[serde(default, rename = "diyCode")]
    diy_code: u32,
    #[serde(default, rename = "diyParam")]
    diy_param: String,
    #[serde(default)]
    rules: Vec<RawRule>,
    #[serde(default)]
    special: Vec<RawSpecial>,
}

#[derive(Deserialize)]
struct RawRule {
    #[serde(default, rename = "hardVersion")]
    hard_version: String,
    #[serde(default, rename = "softVersion")]
    soft_version: String,
    #[serde(default, rename = "wifiSoftVersion")]
    wifi_soft_version: String,
}

#[derive(Deserialize)]
struct RawSpecial {
    code: u16,
    #[serde(default)]
    param: String,
    #[serde(default)]
    speed: Vec<serde_json::Value>,
}

/// Scene lookup by name, `category-scene` path, or scene code
#[derive(Debug, Default)]
pub struct SceneCatalog {
    entries: Vec<Scene>,
    by_name: HashMap<String, usize>,
    by_path: HashMap<String, HashMap<String, usize>>,
    by_code: HashMap<u16, usize>,
}

/// Titles are matched loosely: case and punctuation do not count
fn normalize(title: &str) -> String {
    title
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn decode_param(param: &str) -> Result<Vec<u8>, LightError> {
    BASE64
        .decode(param)
        .map_err(|e| LightError::InvalidCatalog(format!("bad base64 parameter: {e}")))
}

impl SceneCatalog {
    /// Load a catalog file, falling back to an empty catalog when the
    /// file is missing or malformed. Built-in scenes keep working
    /// either way.
    pub async fn load(path: &Path) -> Self {
        match fs::read_to_string(path).await {
            Ok(contents) => match Self::parse(&contents) {
                Ok(catalog) => {
                    tracing::info!("Loaded {} scenes from {:?}", catalog.len(), path);
                    catalog
                }
                Err(e) => {
                    tracing::warn!("Invalid scene catalog {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No scene catalog at {:?}", path);
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read scene catalog {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Parse the catalog JSON: a map of category titles to maps of
    /// scene titles
    pub fn parse(text: &str) -> Result<Self, LightError> {
        let raw: HashMap<String, HashMap<String, RawScene>> =
            serde_json::from_str(text).map_err(|e| LightError::InvalidCatalog(e.to_string()))?;

        let mut catalog = Self::default();
        for (category_title, scenes) in raw {
            let mut category_scenes = HashMap::new();

            for (scene_title, scene) in scenes {
                let mut effects = Vec::with_capacity(scene.effects.len());
                for effect in scene.effects {
                    effects.push(Effect {
                        code: effect.code,
                        param: decode_param(&effect.param)?,
                        diy_code: effect.diy_code,
                        diy_param: decode_param(&effect.diy_param)?,
                        rules: effect
                            .rules
                            .into_iter()
                            .map(|rule| VersionRule {
                                hardware: rule.hard_version,
                                software: rule.soft_version,
                                wifi_software: rule.wifi_soft_version,
                            })
                            .collect(),
                        special: effect
                            .special
                            .into_iter()
                            .map(|special| {
                                Ok(SpecialEffect {
                                    code: special.code,
                                    param: decode_param(&special.param)?,
                                    speed: special.speed,
                                })
                            })
                            .collect::<Result<_, LightError>>()?,
                    });
                }

                let index = catalog.entries.len();
                let name = normalize(&scene_title);
                // Code zero is the buffer-backed placeholder, not an
                // identity.
                for effect in &effects {
                    if effect.code != 0 {
                        catalog.by_code.entry(effect.code).or_insert(index);
                    }
                }
                catalog.by_name.insert(name.clone(), index);
                category_scenes.insert(name, index);

                catalog.entries.push(Scene {
                    title: scene_title,
                    category: category_title.clone(),
                    hint: scene.hint,
                    effects,
                });
            }

            catalog
                .by_path
                .insert(normalize(&category_title), category_scenes);
        }
        Ok(catalog)
    }

    /// Look up a scene by name or by `category-scene` path
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Scene> {
        let index = match name.split_once('-') {
            Some((category, scene)) => self
                .by_path
                .get(&normalize(category))?
                .get(&normalize(scene)),
            None => self.by_name.get(&normalize(name)),
        }?;
        self.entries.get(*index)
    }

    /// Look up a scene by its nonzero scene code
    #[must_use]
    pub fn by_code(&self, code: u16) -> Option<&Scene> {
        self.entries.get(*self.by_code.get(&code)?)
    }

    /// Human name for a scene code, from the catalog or the built-in
    /// table
    #[must_use]
    pub fn scene_name(&self, code: u16) -> Option<String> {
        if let Some(scene) = self.by_code(code) {
            return Some(scene.title.clone());
        }
        BUILTIN_SCENES
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(name, _)| (*name).to_string())
    }

    /// Scene code for a built-in scene name
    #[must_use]
    pub fn builtin_code(name: &str) -> Option<u16> {
        let name = normalize(name);
        BUILTIN_SCENES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, code)| *code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "Nature": {
            "Sunrise Glow": {
                "hint": "Warm fade-in",
                "effects": [{"code": 927, "param": "AAEC"}]
            },
            "Aurora": {
                "effects": [
                    {"code": 931, "param": "", "rules": [{"hardVersion": "1.00.01"}]},
                    {"code": 932, "param": "AAEC"}
                ]
            }
        },
        "Holiday": {
            "Aurora": {
                "effects": [{"code": 0, "param": ""}]
            }
        }
    }"#;

    #[test]
    fn test_parse_and_lookup() {
        let catalog = SceneCatalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.len(), 3);

        let scene = catalog.get("sunriseglow").unwrap();
        assert_eq!(scene.title, "Sunrise Glow");
        assert_eq!(scene.category, "Nature");
        assert_eq!(scene.hint, "Warm fade-in");
        assert_eq!(scene.effects[0].code, 927);
        assert_eq!(scene.effects[0].param, vec![0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_lookup_is_punctuation_blind() {
        let catalog = SceneCatalog::parse(CATALOG).unwrap();
        assert!(catalog.get("Sunrise Glow!").is_some());
        assert!(catalog.get("SUNRISE_GLOW").is_some());
        assert!(catalog.get("dusk").is_none());
    }

    #[test]
    fn test_category_path_disambiguates() {
        let catalog = SceneCatalog::parse(CATALOG).unwrap();
        let nature = catalog.get("nature-aurora").unwrap();
        assert_eq!(nature.category, "Nature");
        let holiday = catalog.get("holiday-aurora").unwrap();
        assert_eq!(holiday.category, "Holiday");
        assert!(catalog.get("nowhere-aurora").is_none());
    }

    #[test]
    fn test_by_code_skips_zero() {
        let catalog = SceneCatalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.by_code(927).unwrap().title, "Sunrise Glow");
        assert_eq!(catalog.by_code(932).unwrap().title, "Aurora");
        assert!(catalog.by_code(0).is_none());
    }

    #[test]
    fn test_scene_name_falls_back_to_builtins() {
        let catalog = SceneCatalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.scene_name(927).as_deref(), Some("Sunrise Glow"));
        assert_eq!(catalog.scene_name(0x3f).as_deref(), Some("illumination"));
        assert_eq!(catalog.scene_name(0x999), None);
    }

    #[test]
    fn test_builtin_codes() {
        assert_eq!(SceneCatalog::builtin_code("Sunset"), Some(1));
        assert_eq!(SceneCatalog::builtin_code("cheerful"), Some(0x40));
        assert_eq!(SceneCatalog::builtin_code("disco"), None);
    }

    #[test]
    fn test_version_rules_carried() {
        let catalog = SceneCatalog::parse(CATALOG).unwrap();
        let scene = catalog.get("nature-aurora").unwrap();
        assert_eq!(scene.effects[0].rules[0].hardware, "1.00.01");
        assert!(scene.effects[0].rules[0].software.is_empty());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(matches!(
            SceneCatalog::parse("not json"),
            Err(LightError::InvalidCatalog(_))
        ));
        assert!(matches!(
            SceneCatalog::parse(r#"{"A": {"B": {"effects": [{"param": "!!"}]}}}"#),
            Err(LightError::InvalidCatalog(_))
        ));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let catalog = SceneCatalog::load(Path::new("/nonexistent/scenes.json")).await;
        assert!(catalog.is_empty());
    }
}
