//! Client for HAProxy's UNIX admin/stats socket.
//!
//! Each call opens a fresh connection — this is how HAProxy's line-oriented
//! stats socket protocol is meant to be driven, and avoids holding a
//! connection across a reload (the reload replaces the process listening on
//! the socket).

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AdminError;

/// Health/state of a single server row in `show stat` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    pub name: String,
    pub status: String,
}

impl ServerStatus {
    /// HAProxy considers a server down only when its status is literally
    /// `DOWN`; `MAINT`, `NOLB`, and the various `UP (...)` flavors all count
    /// as healthy for scheduling purposes.
    pub fn is_healthy(&self) -> bool {
        self.status != "DOWN"
    }
}

pub struct AdminClient {
    socket_path: PathBuf,
}

const PXNAME_COL: usize = 0;
const SVNAME_COL: usize = 1;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

impl AdminClient {
    pub fn new(socket_dir: &Path) -> Self {
        AdminClient {
            socket_path: socket_dir.join("admin.sock"),
        }
    }

    fn connect(&self) -> Result<UnixStream, AdminError> {
        let stream = UnixStream::connect(&self.socket_path).map_err(|source| AdminError::Connect {
            path: self.socket_path.clone(),
            source,
        })?;
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|source| AdminError::Read { source })?;
        Ok(stream)
    }

    fn command(&self, command: &str) -> Result<String, AdminError> {
        let mut stream = self.connect()?;
        stream
            .write_all(format!("{command}\n").as_bytes())
            .map_err(|source| AdminError::Read { source })?;

        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .map_err(|source| AdminError::Read { source })?;
        Ok(response)
    }

    fn show_stat(&self, backend: &str) -> Result<Vec<Vec<String>>, AdminError> {
        let raw = self.command("show stat")?;
        let mut lines = raw.lines();
        let header = lines
            .next()
            .ok_or_else(|| AdminError::Malformed("empty show stat response".to_string()))?;
        let header: Vec<&str> = header.trim_start_matches('#').trim().split(',').collect();

        let rows: Vec<Vec<String>> = lines
            .filter(|l| !l.is_empty())
            .map(|l| l.split(',').map(str::to_string).collect::<Vec<_>>())
            .filter(|row| row.get(PXNAME_COL).map(|s| s.as_str()) == Some(backend))
            .collect();

        if rows.is_empty() {
            return Err(AdminError::UnknownBackend(backend.to_string()));
        }

        let mut out = Vec::with_capacity(rows.len() + 1);
        out.push(header.iter().map(|s| s.to_string()).collect());
        out.extend(rows);
        Ok(out)
    }

    /// Read a numeric column (`rate`, `qtime`, `rtime`, `scur`, ...) from the
    /// backend's own `BACKEND` row.
    pub fn metric(&self, backend: &str, column: &str) -> Result<f64, AdminError> {
        let rows = self.show_stat(backend)?;
        let header = &rows[0];
        let col_idx = header
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| AdminError::UnknownMetric {
                backend: backend.to_string(),
                column: column.to_string(),
            })?;

        let backend_row = rows[1..]
            .iter()
            .find(|row| row.get(SVNAME_COL).map(|s| s.as_str()) == Some("BACKEND"))
            .ok_or_else(|| AdminError::UnknownBackend(backend.to_string()))?;

        let raw = backend_row
            .get(col_idx)
            .map(|s| s.as_str())
            .unwrap_or("");
        if raw.is_empty() {
            return Ok(0.0);
        }
        raw.parse().map_err(|_| AdminError::Malformed(format!("column '{column}' not numeric: '{raw}'")))
    }

    /// Per-server status rows for `backend`, excluding the synthetic
    /// `BACKEND`/`FRONTEND` summary rows.
    pub fn servers(&self, backend: &str) -> Result<Vec<ServerStatus>, AdminError> {
        let rows = self.show_stat(backend)?;
        let header = &rows[0];
        let status_idx = header
            .iter()
            .position(|c| c == "status")
            .ok_or_else(|| AdminError::UnknownMetric {
                backend: backend.to_string(),
                column: "status".to_string(),
            })?;

        Ok(rows[1..]
            .iter()
            .filter(|row| {
                !matches!(
                    row.get(SVNAME_COL).map(|s| s.as_str()),
                    Some("BACKEND") | Some("FRONTEND")
                )
            })
            .map(|row| ServerStatus {
                name: row.get(SVNAME_COL).cloned().unwrap_or_default(),
                status: row.get(status_idx).cloned().unwrap_or_default(),
            })
            .collect())
    }

    pub fn setmaxconn(&self, frontend: &str, n: u32) -> Result<(), AdminError> {
        let response = self.command(&format!("set maxconn frontend {frontend} {n}"))?;
        // HAProxy answers unknown commands/frontends with text starting
        // "Can't find..."; anything else is success (often an empty reply).
        if response.starts_with("Can't find") {
            return Err(AdminError::UnknownBackend(frontend.to_string()));
        }
        Ok(())
    }
}
