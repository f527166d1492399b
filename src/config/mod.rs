// Configuration module - declarative input document for the conductor
//
// The conductor is driven by a single YAML document: global HAProxy
// directives (copied verbatim into the generated config's `global` and
// `defaults` sections) plus a map of services, each naming a scheduler app,
// a target HAProxy backend, and an elasticity policy.

pub mod elasticity;
pub mod service;

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::haproxy::ConfigModel;
use service::{ServiceConfigYaml, ServiceMap};

/// Raw YAML document shape, deserialized directly by serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigYaml {
    #[serde(default)]
    haproxy: IndexMap<String, Vec<String>>,
    #[serde(default)]
    services: IndexMap<String, ServiceConfigYaml>,
}

/// Validated configuration, loaded once at startup and immutable for the
/// lifetime of the process — the conductor re-converges from discovery and
/// HAProxy stats on every tick rather than reloading this document.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directives copied into the generated config's global sections,
    /// keyed by section name (`global`, `defaults`), values in file order.
    pub haproxy: IndexMap<String, Vec<String>>,
    pub services: ServiceMap,
}

impl Config {
    /// Load and validate the document at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents, path)
    }

    /// Build the initial in-memory HAProxy config model for this
    /// configuration: one listen block per service (or, for `hold_conns`
    /// services, the `<name>_proxy`/`<name>` split with a static server
    /// linking the two), seeded with the document's global directives.
    pub fn build_model(&self, socket_dir: &Path) -> ConfigModel {
        let mut model = ConfigModel::new(socket_dir);
        for (section, directives) in &self.haproxy {
            model.extend_section(section, directives);
        }

        for service in self.services.values() {
            let properties = &service.haproxy.listen;
            let port = service.haproxy.port;

            if service.elasticity.as_ref().and_then(|e| e.hold_conns).is_some() {
                let proxy_name = service.proxy_name();
                model.add_listen_block(&proxy_name, properties, port);
                model.add_listen_block(&service.name, properties, port + 1);
                model.add_server(
                    &proxy_name,
                    "static",
                    &format!("127.0.0.1:{}", port + 1),
                    &[],
                );
            } else {
                model.add_listen_block(&service.name, properties, port);
            }
        }

        model
    }

    /// Parse and validate a document already read into memory. `path` is
    /// carried only for error messages.
    pub fn from_yaml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: ConfigYaml = serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        raw.validate()
    }
}

impl ConfigYaml {
    fn validate(self) -> Result<Config, ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::Invalid {
                service: "<document>".to_string(),
                reason: "at least one service must be configured".to_string(),
            });
        }

        let mut services = ServiceMap::new();
        for (name, raw) in self.services {
            let resolved = raw.resolve(&name).map_err(|reason| ConfigError::Invalid {
                service: name.clone(),
                reason,
            })?;
            services.insert(name, resolved);
        }

        Ok(Config {
            haproxy: self.haproxy,
            services,
        })
    }
}
