//! Per-service configuration: scheduler linkage, HAProxy placement, and
//! elasticity policy.

use serde::{Deserialize, Serialize};

use super::elasticity::{ElasticityConfig, ElasticityConfigYaml};

/// Raw YAML shape for a `services.<name>.scheduler` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfigYaml {
    /// Scheduler app name, e.g. `myapp.prod`.
    pub appname: String,
    /// Run manifest passed to `treadmill run --manifest`.
    pub manifest: String,
    /// Scheduler endpoint name to discover within the app, e.g. `http`.
    pub endpoint: String,
}

/// Raw YAML shape for a `services.<name>.haproxy` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HaproxyServiceConfigYaml {
    /// Directives appended to the listen block, in declaration order.
    #[serde(default)]
    pub listen: Vec<String>,
    /// Port the listen block binds.
    pub port: u16,
    /// Directives appended to every server line for this service.
    #[serde(default)]
    pub server: Vec<String>,
}

/// Raw YAML shape for a `services.<name>` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfigYaml {
    pub scheduler: SchedulerConfigYaml,
    pub haproxy: HaproxyServiceConfigYaml,
    #[serde(default)]
    pub elasticity: Option<ElasticityConfigYaml>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub appname: String,
    pub manifest: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct HaproxyServiceConfig {
    pub listen: Vec<String>,
    pub port: u16,
    pub server: Vec<String>,
}

/// Validated service configuration. `name` doubles as the listen
/// block/backend name in the generated HAProxy config.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub scheduler: SchedulerConfig,
    pub haproxy: HaproxyServiceConfig,
    pub elasticity: Option<ElasticityConfig>,
}

impl ServiceConfigYaml {
    pub fn resolve(&self, name: &str) -> Result<ServiceConfig, String> {
        if self.scheduler.appname.is_empty() {
            return Err(format!("service '{name}': scheduler.appname must not be empty"));
        }
        if self.haproxy.port == 0 {
            return Err(format!("service '{name}': haproxy.port must be nonzero"));
        }

        let elasticity = self.elasticity.as_ref().map(|e| e.resolve(name)).transpose()?;

        Ok(ServiceConfig {
            name: name.to_string(),
            scheduler: SchedulerConfig {
                appname: self.scheduler.appname.clone(),
                manifest: self.scheduler.manifest.clone(),
                endpoint: self.scheduler.endpoint.clone(),
            },
            haproxy: HaproxyServiceConfig {
                listen: self.haproxy.listen.clone(),
                port: self.haproxy.port,
                server: self.haproxy.server.clone(),
            },
            elasticity,
        })
    }
}

impl ServiceConfig {
    /// The hold-conns public-facing listen block name (`<name>_proxy`).
    pub fn proxy_name(&self) -> String {
        format!("{}_proxy", self.name)
    }
}

pub type ServiceMap = indexmap::IndexMap<String, ServiceConfig>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::elasticity::DemandMetric;

    fn sample_yaml() -> ServiceConfigYaml {
        serde_yaml::from_str(
            r#"
scheduler:
  appname: myapp.prod
  manifest: myapp.yml
  endpoint: http
haproxy:
  listen:
    - "balance roundrobin"
  port: 8080
  server:
    - "check"
elasticity:
  min_servers: 1
  max_servers: 4
  method: conn_rate
  steps: [100, 300]
"#,
        )
        .unwrap()
    }

    #[test]
    fn resolves_full_service() {
        let resolved = sample_yaml().resolve("myapp").unwrap();
        assert_eq!(resolved.scheduler.appname, "myapp.prod");
        assert_eq!(resolved.haproxy.port, 8080);
        assert_eq!(resolved.haproxy.listen, vec!["balance roundrobin".to_string()]);
        assert_eq!(
            resolved.elasticity.as_ref().unwrap().metric,
            DemandMetric::ConnRate
        );
    }

    #[test]
    fn elasticity_is_optional() {
        let mut yaml = sample_yaml();
        yaml.elasticity = None;
        let resolved = yaml.resolve("myapp").unwrap();
        assert!(resolved.elasticity.is_none());
    }

    #[test]
    fn rejects_empty_appname() {
        let mut yaml = sample_yaml();
        yaml.scheduler.appname = String::new();
        assert!(yaml.resolve("myapp").is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let mut yaml = sample_yaml();
        yaml.haproxy.port = 0;
        assert!(yaml.resolve("myapp").is_err());
    }

    #[test]
    fn proxy_name_suffixes_underscore_proxy() {
        let yaml = sample_yaml().resolve("myapp").unwrap();
        assert_eq!(yaml.proxy_name(), "myapp_proxy");
    }
}
