//! In-memory HAProxy configuration: the conductor's only persisted state.
//! Generation is one-way — this system never parses an existing
//! `haproxy.conf` back into a `ConfigModel`.

use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::WriteError;

#[derive(Debug, Clone)]
pub struct ServerEntry {
    pub instance_id: String,
    pub address: String,
    /// Space-joined extra directives, e.g. `"check weight 10"`.
    pub properties: String,
}

#[derive(Debug, Clone)]
pub struct ListenBlock {
    pub directives: Vec<String>,
    pub servers: IndexMap<String, ServerEntry>,
}

/// Ordered HAProxy configuration. Section order (`global`, `defaults`) is
/// significant and preserved; listen block and server order within a block
/// is not.
#[derive(Debug, Clone)]
pub struct ConfigModel {
    sections: IndexMap<String, Vec<String>>,
    listen_blocks: IndexMap<String, ListenBlock>,
}

impl ConfigModel {
    /// Seed `global` with the admin socket stanza every generated config
    /// needs, per the source system's `haproxy_config.py`.
    pub fn new(socket_dir: &Path) -> Self {
        let mut sections = IndexMap::new();
        sections.insert(
            "global".to_string(),
            vec![
                format!(
                    "stats socket {}/admin.sock mode 600 level admin",
                    socket_dir.display()
                ),
                "stats timeout 2m".to_string(),
            ],
        );
        ConfigModel {
            sections,
            listen_blocks: IndexMap::new(),
        }
    }

    /// Append directives to a top-level section (`global`, `defaults`),
    /// creating it if absent.
    pub fn extend_section(&mut self, name: &str, directives: &[String]) {
        self.sections
            .entry(name.to_string())
            .or_default()
            .extend(directives.iter().cloned());
    }

    /// Add a listen block bound at `port`. `properties` is cloned into the
    /// block's own directive list so two blocks never alias the same `Vec`
    /// (the source system's server-property aliasing bug).
    pub fn add_listen_block(&mut self, name: &str, properties: &[String], port: u16) {
        let mut directives: Vec<String> = properties.to_vec();
        directives.push(format!("bind *:{port}"));
        self.listen_blocks.insert(
            name.to_string(),
            ListenBlock {
                directives,
                servers: IndexMap::new(),
            },
        );
    }

    pub fn add_server(&mut self, service: &str, instance: &str, address: &str, properties: &[String]) {
        if let Some(block) = self.listen_blocks.get_mut(service) {
            block.servers.insert(
                instance.to_string(),
                ServerEntry {
                    instance_id: instance.to_string(),
                    address: address.to_string(),
                    properties: properties.join(" "),
                },
            );
        }
    }

    pub fn delete_server(&mut self, service: &str, instance: &str) {
        if let Some(block) = self.listen_blocks.get_mut(service) {
            block.servers.shift_remove(instance);
        }
    }

    pub fn server_exists(&self, service: &str, instance: &str) -> bool {
        self.listen_blocks
            .get(service)
            .map(|block| block.servers.contains_key(instance))
            .unwrap_or(false)
    }

    /// Snapshot copy of a service's current servers.
    pub fn get_servers(&self, service: &str) -> IndexMap<String, ServerEntry> {
        self.listen_blocks
            .get(service)
            .map(|block| block.servers.clone())
            .unwrap_or_default()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (name, directives) in &self.sections {
            out.push_str(name);
            out.push('\n');
            for d in directives {
                out.push('\t');
                out.push_str(d);
                out.push('\n');
            }
        }
        for (name, block) in &self.listen_blocks {
            out.push_str("listen ");
            out.push_str(name);
            out.push('\n');
            for d in &block.directives {
                out.push('\t');
                out.push_str(d);
                out.push('\n');
            }
            for server in block.servers.values() {
                out.push_str(&format!(
                    "\tserver {} {} {}\n",
                    server.instance_id, server.address, server.properties
                ));
            }
        }
        out
    }

    /// Serialize and atomically replace the file at `path`: write to a
    /// sibling temp file, `fsync`, then `rename` over the target so a reader
    /// (HAProxy's `-f` load, or a concurrent inspection) never observes a
    /// partially written config.
    pub fn write(&self, path: &Path) -> Result<(), WriteError> {
        let contents = self.render();
        let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));

        let mut file = std::fs::File::create(&tmp_path).map_err(|source| WriteError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        file.write_all(contents.as_bytes()).map_err(|source| WriteError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        file.sync_all().map_err(|source| WriteError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}
