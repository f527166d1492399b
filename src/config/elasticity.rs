//! Elasticity configuration types.
//!
//! An `elasticity` block names which HAProxy stat drives scaling decisions
//! (`metric`) and which policy turns that stat into a replica count
//! (`policy`). The two are independent: any metric can be paired with any
//! policy, matching the source system's "method → rate/qtime/rtime" measurement
//! selection crossed with its separate steps/breakpoint/scale policy
//! selection.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MIN_SERVERS;

fn default_min_servers() -> u32 {
    DEFAULT_MIN_SERVERS
}

/// Which HAProxy backend stat is sampled each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandMetric {
    /// `rate` — connection rate per second.
    ConnRate,
    /// `qtime` — average time spent in queue, in milliseconds.
    Queue,
    /// `rtime` — average server response time, in milliseconds.
    Response,
}

impl DemandMetric {
    /// The HAProxy stats-socket column name for this metric.
    pub fn stat_column(&self) -> &'static str {
        match self {
            DemandMetric::ConnRate => "rate",
            DemandMetric::Queue => "qtime",
            DemandMetric::Response => "rtime",
        }
    }
}

/// Turns a demand measurement into a desired replica delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalingPolicy {
    /// Ordered ascending thresholds; `target = min_servers + count(m > step)`.
    Steps(Vec<f64>),
    /// Single threshold with independent up/down steps.
    Breakpoint(f64),
    /// `target = floor(m / divisor) + min_servers`.
    Scale(f64),
}

/// Raw YAML shape for an elasticity block: exactly one of `steps`,
/// `breakpoint`, or `scale` must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElasticityConfigYaml {
    #[serde(default = "default_min_servers")]
    pub min_servers: u32,
    #[serde(default)]
    pub max_servers: Option<u32>,
    pub method: DemandMetric,
    #[serde(default)]
    pub steps: Option<Vec<f64>>,
    #[serde(default)]
    pub breakpoint: Option<f64>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub hold_conns: Option<HoldConnsYaml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoldConnsYaml {
    pub cooldown: u64,
}

/// Validated, immutable elasticity configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticityConfig {
    pub min_servers: u32,
    pub max_servers: Option<u32>,
    pub metric: DemandMetric,
    pub policy: ScalingPolicy,
    pub hold_conns: Option<HoldConns>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldConns {
    pub cooldown_secs: u64,
}

impl ElasticityConfigYaml {
    /// Resolve the raw YAML shape into a validated `ElasticityConfig`.
    ///
    /// `service` is the owning service's name, used only for error messages.
    /// When `hold_conns` is present, `min_servers` is forced to 0 regardless
    /// of what was configured: hold_conns requires a zero static floor since
    /// the floor is driven by connection activity instead.
    pub fn resolve(&self, service: &str) -> Result<ElasticityConfig, String> {
        let present = [
            self.steps.is_some(),
            self.breakpoint.is_some(),
            self.scale.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count();

        if present != 1 {
            return Err(format!(
                "service '{service}': exactly one of steps, breakpoint, or scale must be set, found {present}"
            ));
        }

        if let (Some(max), true) = (self.max_servers, self.min_servers > self.max_servers.unwrap_or(u32::MAX)) {
            return Err(format!(
                "service '{service}': min_servers ({}) exceeds max_servers ({})",
                self.min_servers, max
            ));
        }

        let policy = if let Some(steps) = &self.steps {
            if steps.windows(2).any(|w| w[0] > w[1]) {
                return Err(format!("service '{service}': steps must be sorted ascending"));
            }
            ScalingPolicy::Steps(steps.clone())
        } else if let Some(b) = self.breakpoint {
            ScalingPolicy::Breakpoint(b)
        } else {
            ScalingPolicy::Scale(self.scale.unwrap())
        };

        let min_servers = if self.hold_conns.is_some() { 0 } else { self.min_servers };

        Ok(ElasticityConfig {
            min_servers,
            max_servers: self.max_servers,
            metric: self.method,
            policy,
            hold_conns: self.hold_conns.as_ref().map(|h| HoldConns { cooldown_secs: h.cooldown }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_yaml() -> ElasticityConfigYaml {
        ElasticityConfigYaml {
            min_servers: 1,
            max_servers: Some(5),
            method: DemandMetric::ConnRate,
            steps: Some(vec![100.0, 300.0]),
            breakpoint: None,
            scale: None,
            hold_conns: None,
        }
    }

    #[test]
    fn resolves_steps_policy() {
        let resolved = base_yaml().resolve("svc").unwrap();
        assert_eq!(resolved.policy, ScalingPolicy::Steps(vec![100.0, 300.0]));
        assert_eq!(resolved.min_servers, 1);
        assert_eq!(resolved.max_servers, Some(5));
    }

    #[test]
    fn rejects_multiple_policies() {
        let mut yaml = base_yaml();
        yaml.breakpoint = Some(10.0);
        assert!(yaml.resolve("svc").is_err());
    }

    #[test]
    fn rejects_no_policy() {
        let mut yaml = base_yaml();
        yaml.steps = None;
        assert!(yaml.resolve("svc").is_err());
    }

    #[test]
    fn rejects_unsorted_steps() {
        let mut yaml = base_yaml();
        yaml.steps = Some(vec![300.0, 100.0]);
        assert!(yaml.resolve("svc").is_err());
    }

    #[test]
    fn rejects_min_exceeding_max() {
        let mut yaml = base_yaml();
        yaml.min_servers = 10;
        yaml.max_servers = Some(5);
        assert!(yaml.resolve("svc").is_err());
    }

    #[test]
    fn hold_conns_forces_zero_min_servers() {
        let mut yaml = base_yaml();
        yaml.hold_conns = Some(HoldConnsYaml { cooldown: 60 });
        let resolved = yaml.resolve("svc").unwrap();
        assert_eq!(resolved.min_servers, 0);
        assert_eq!(resolved.hold_conns.unwrap().cooldown_secs, 60);
    }

    #[test]
    fn default_min_servers_is_zero() {
        let yaml = r#"
method: queue
breakpoint: 10
"#;
        let parsed: ElasticityConfigYaml = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.min_servers, 0);
        assert!(parsed.max_servers.is_none());
    }

    #[test]
    fn stat_column_mapping() {
        assert_eq!(DemandMetric::ConnRate.stat_column(), "rate");
        assert_eq!(DemandMetric::Queue.stat_column(), "qtime");
        assert_eq!(DemandMetric::Response.stat_column(), "rtime");
    }
}
