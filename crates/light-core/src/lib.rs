//! High-level control of Govee BLE LED lights
//!
//! Builds a semantic light interface on top of `govee-protocol`:
//! state caching, segment colors, color temperature, and scene
//! activation driven by the vendor's per-model scene catalogs.

pub mod error;
pub mod light;
pub mod scenes;

pub use error::LightError;
pub use light::{kelvin_to_rgb, LightController, LightMode, HEARTBEAT_PERIOD};
pub use scenes::{Effect, Scene, SceneCatalog, SpecialEffect, VersionRule};
