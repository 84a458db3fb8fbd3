//! # Flow Extension Configuration
//!
//! Layered settings for the flow extension store: record geometry, buffer
//! size classes, the side-slot prerequisite and log verbosity.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `config/flowext.yaml`
//! 3. `config/<FLOWEXT_ENV>.yaml`
//! 4. `FLOWEXT_*` environment variables, `__` separating nested keys
//!    (e.g. `FLOWEXT_LAYOUT__PAYLOAD_SIZE=256`)

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use flowext_conntrack::ExtKind;
use flowext_core::alloc::SizeClassAllocator;
use flowext_core::{ExtensionStore, Layout};

mod error;
mod layout;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use layout::{AllocatorConfig, LayoutConfig};
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/flowext.yaml";
const ENV_PREFIX: &str = "FLOWEXT_";

/// Store-level options.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct StoreConfig {
    /// Side slot that must exist before the record is attached. `None`
    /// disables the prerequisite.
    #[serde(default = "default_prerequisite")]
    #[validate(custom(function = validation::validate_ext_kind))]
    pub prerequisite: Option<String>,
}

fn default_prerequisite() -> Option<String> {
    Some(ExtKind::Nat.name().to_string())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prerequisite: default_prerequisite(),
        }
    }
}

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct FlowExtConfig {
    #[serde(default)]
    #[validate(nested)]
    pub layout: LayoutConfig,

    #[serde(default)]
    #[validate(nested)]
    pub allocator: AllocatorConfig,

    #[serde(default)]
    #[validate(nested)]
    pub store: StoreConfig,

    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl FlowExtConfig {
    /// Load configuration from the default files and the environment.
    ///
    /// Missing files are skipped; the environment always applies.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(FlowExtConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        } else {
            tracing::debug!(path = BASE_FILE, "config file not found, using defaults");
        }

        let env = std::env::var("FLOWEXT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(&env_file));
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file, then apply the environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment =
            Figment::from(Serialized::defaults(FlowExtConfig::default())).merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        tracing::info!(
            scale_factor = config.layout.scale_factor,
            payload_size = config.layout.payload_size,
            prerequisite = ?config.store.prerequisite,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn layout(&self) -> Result<Layout, ConfigError> {
        self.layout.to_layout()
    }

    pub fn allocator(&self) -> SizeClassAllocator {
        self.allocator.to_allocator()
    }

    pub fn prerequisite(&self) -> Result<Option<ExtKind>, ConfigError> {
        self.store
            .prerequisite
            .as_deref()
            .map(str::parse::<ExtKind>)
            .transpose()
            .map_err(ConfigError::from)
    }

    /// Build an extension store from these settings.
    pub fn build_store(&self) -> Result<ExtensionStore, ConfigError> {
        let mut store = ExtensionStore::new(self.layout()?).with_allocator(self.allocator());
        if let Some(kind) = self.prerequisite()? {
            store = store.with_prerequisite(kind.slot());
        }
        Ok(store)
    }
}
