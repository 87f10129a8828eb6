//! Central configuration constants for runtime limits and defaults.

/// Default listen address for the HTTP server.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default upper bound for a single command handler invocation, in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Longest a command handler may be allowed to run, in seconds.
pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 600;

/// How long a stored validation failure stays readable, in seconds. 10 minutes.
pub const DEFAULT_VALIDATION_TTL_SECS: u64 = 10 * 60;

/// Interval between SSE keep-alive comments, in seconds.
pub const SSE_KEEP_ALIVE_SECS: u64 = 15;

/// How long shutdown waits for open requests before dropping them, in seconds.
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

/// Connection ids are client-generated; anything longer is rejected.
pub const MAX_CONNECTION_ID_LEN: usize = 64;

/// Actor ids come from the session layer and are bounded the same way.
pub const MAX_ACTOR_ID_LEN: usize = 128;

/// Header carrying the actor id resolved by the upstream session layer.
pub const ACTOR_HEADER: &str = "x-hearth-actor";

/// Header carrying the client-generated connection id.
pub const CONNECTION_HEADER: &str = "x-hearth-connection";

/// Query parameter fallback for the connection id (EventSource cannot set headers).
pub const CONNECTION_QUERY_PARAM: &str = "connection";

/// Clamp a command timeout into the allowed range. `0` means "no timeout".
pub fn clamp_command_timeout_secs(v: u64) -> u64 {
    v.min(MAX_COMMAND_TIMEOUT_SECS)
}
