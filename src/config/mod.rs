use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use crate::schema::TypeRegistry;
use crate::store::EntityStore;

/// Complete daemon configuration.
///
/// Every declared section seeds a config entity in the store before the
/// management endpoints accept requests, so a fresh daemon is introspectable
/// from the first request on.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CourierConfig {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub management: ManagementConfig,
    #[serde(default, rename = "listener")]
    pub listeners: Vec<ListenerConfig>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default, rename = "extension")]
    pub extensions: Vec<ExtensionConfig>,
}

/// Router identity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_router_name")]
    pub name: String,
    #[serde(default = "default_router_mode")]
    pub mode: String,
}

fn default_router_name() -> String {
    "router/courier".to_string()
}

fn default_router_mode() -> String {
    "standalone".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: default_router_name(),
            mode: default_router_mode(),
        }
    }
}

/// Management endpoint bind configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ManagementConfig {
    #[serde(default = "default_management_listen")]
    pub listen: String,
}

fn default_management_listen() -> String {
    "127.0.0.1:5672".to_string()
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            listen: default_management_listen(),
        }
    }
}

/// One message listener declaration
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// Entity name; defaults to "listener/<host>:<port>"
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_listener_host")]
    pub host: String,
    pub port: u16,
}

fn default_listener_host() -> String {
    "0.0.0.0".to_string()
}

impl ListenerConfig {
    fn entity_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("listener/{}:{}", self.host, self.port))
    }
}

/// Logging configuration, exposed as a "log" entity
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_module")]
    pub module: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_module() -> String {
    "DEFAULT".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            module: default_log_module(),
            level: default_log_level(),
        }
    }
}

/// An extension entity type, registered exactly like the built-ins
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionConfig {
    pub name: String,
    #[serde(default = "default_extension_config")]
    pub config: bool,
}

fn default_extension_config() -> bool {
    true
}

impl CourierConfig {
    /// Parse a TOML configuration string
    pub fn from_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse configuration")
    }

    /// Load configuration from a file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::from_str(&raw)
    }

    /// Register declared extension types alongside the built-ins
    pub fn build_registry(&self) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::builtin();
        for extension in &self.extensions {
            registry
                .register(&extension.name, extension.config)
                .map_err(|e| anyhow::anyhow!("{:?}", e))
                .with_context(|| format!("Failed to register extension type '{}'", extension.name))?;
        }
        Ok(registry)
    }

    /// Seed the store with the configured entities: router, container, log,
    /// and one entity per listener.
    pub fn seed(&self, registry: &TypeRegistry, store: &Arc<EntityStore>) -> Result<()> {
        let mut seeds: Vec<(&str, Value)> = vec![
            (
                "router",
                json!({"name": self.router.name, "mode": self.router.mode}),
            ),
            (
                "container",
                json!({"name": format!("container/{}", self.router.name)}),
            ),
            (
                "log",
                json!({
                    "name": format!("log/{}", self.log.module),
                    "module": self.log.module,
                    "level": self.log.level
                }),
            ),
        ];
        for listener in &self.listeners {
            seeds.push((
                "listener",
                json!({
                    "name": listener.entity_name(),
                    "host": listener.host,
                    "port": listener.port
                }),
            ));
        }

        for (type_name, attributes) in seeds {
            let entity_type = registry
                .resolve(type_name)
                .map_err(|e| anyhow::anyhow!("{:?}", e))?;
            let attributes = match attributes {
                Value::Object(map) => map,
                _ => unreachable!(),
            };
            store
                .create(entity_type, attributes)
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Failed to seed '{}' entity", type_name))?;
        }
        Ok(())
    }
}
