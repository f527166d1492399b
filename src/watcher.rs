//! Membership reconciler: keeps a service's servers in the config model in
//! sync with what the scheduler reports as actually running.

use crate::config::service::ServiceConfig;
use crate::haproxy::ConfigModel;
use crate::scheduler::SchedulerClient;

pub struct Watcher {
    service: ServiceConfig,
}

impl Watcher {
    pub fn new(service: ServiceConfig) -> Self {
        Watcher { service }
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    /// Reconcile discovered instances against the config model. Returns
    /// whether the model changed (the conductor uses this to decide whether
    /// a reload is needed this tick). Never writes the file or reloads
    /// itself — that's the conductor's job, so several services' changes
    /// can batch into a single reload.
    pub fn tick(&mut self, scheduler: &SchedulerClient, model: &mut ConfigModel) -> bool {
        let discovered = scheduler.discover(&self.service.scheduler.appname);
        let endpoint = &self.service.scheduler.endpoint;

        let mut live: Vec<(String, String)> = Vec::new();
        for (instance, endpoints) in &discovered {
            if let Some(address) = endpoints.get(endpoint) {
                live.push((instance.clone(), address.clone()));
            }
        }

        let mut dirty = false;

        for (instance, address) in &live {
            if !model.server_exists(&self.service.name, instance) {
                model.add_server(&self.service.name, instance, address, &self.service.haproxy.server);
                dirty = true;
            }
        }

        let live_instances: std::collections::HashSet<&str> =
            live.iter().map(|(instance, _)| instance.as_str()).collect();
        let stale: Vec<String> = model
            .get_servers(&self.service.name)
            .keys()
            .filter(|instance| !live_instances.contains(instance.as_str()))
            .cloned()
            .collect();

        for instance in stale {
            model.delete_server(&self.service.name, &instance);
            dirty = true;
        }

        dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::service::{HaproxyServiceConfig, SchedulerConfig};
    use std::path::Path;

    fn sample_service() -> ServiceConfig {
        ServiceConfig {
            name: "svc".to_string(),
            scheduler: SchedulerConfig {
                appname: "myapp.prod".to_string(),
                manifest: "myapp.yml".to_string(),
                endpoint: "http".to_string(),
            },
            haproxy: HaproxyServiceConfig {
                listen: vec![],
                port: 8080,
                server: vec!["check".to_string()],
            },
            elasticity: None,
        }
    }

    #[test]
    fn first_tick_with_no_discovery_is_not_dirty() {
        let mut model = ConfigModel::new(Path::new("/run/haproxy"));
        model.add_listen_block("svc", &[], 8080);
        let mut watcher = Watcher::new(sample_service());
        let scheduler = SchedulerClient::new();
        // treadmill binary won't exist in the test sandbox; discover()
        // degrades to an empty map, matching production "nothing found yet".
        let dirty = watcher.tick(&scheduler, &mut model);
        assert!(!dirty);
        assert!(model.get_servers("svc").is_empty());
    }
}
