// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Conductor tick loop
// =============================================================================

/// Fixed tick period for the conductor loop, in seconds.
pub const LOOP_TIME_SECS: u64 = 7;

// =============================================================================
// Elasticity runtime
// =============================================================================

/// Sliding window capacity for demand-metric and connection history.
pub const HISTORY_CAPACITY: usize = 10;

/// Default `min_servers` floor when a service omits it.
pub const DEFAULT_MIN_SERVERS: u32 = 0;

/// `maxconn` applied to a hold-conns frontend once a worker is healthy.
pub const HOLD_CONNS_ADMIT_MAXCONN: u32 = 2000;

/// `maxconn` applied to a hold-conns frontend with no healthy workers.
pub const HOLD_CONNS_HOLD_MAXCONN: u32 = 0;

// =============================================================================
// HAProxy process & admin socket
// =============================================================================

/// Default directory holding the HAProxy admin socket.
pub const DEFAULT_SOCKET_DIR: &str = "/run/haproxy/";

/// Default path to the declarative input document.
pub const DEFAULT_CONFIG_FILE: &str = "config/treadmill-haproxy.yaml";

/// Default path for the generated HAProxy configuration file.
pub const DEFAULT_HAPROXY_CONFIG_FILE: &str = "config/haproxy.conf";

/// Well-known pidfile path written by `haproxy -p`, fixed independent of
/// `--socket` (the socket directory only holds the admin socket).
pub const DEFAULT_PIDFILE: &str = "/run/haproxy/haproxy.pid";

/// Admin socket file name under the socket directory.
pub const ADMIN_SOCKET_NAME: &str = "admin.sock";

/// Path to the `haproxy` binary.
pub const HAPROXY_BIN: &str = "/usr/sbin/haproxy";

/// Path to the `treadmill` scheduler CLI.
pub const TREADMILL_BIN: &str = "treadmill";
