use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    // process-local map, lost on restart
    Memory,
    // hosted database over its REST interface
    Rest,
}

/// What a check answers when the record store cannot be reached.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    /// Surface the failure; callers must not proceed.
    #[default]
    Closed,
    /// Let the attempt through and log the failure.
    Open,
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "auth-throttle")]
#[command(about = "Fixed-window rate limiter for sign-in, sign-up and password reset")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "AUTH_THROTTLE_PORT", default_value_t = 8080)]
    pub port: u16,

    // Where records live
    #[arg(long, env = "AUTH_THROTTLE_STORE", value_enum, default_value_t = StoreBackend::Memory)]
    pub store: StoreBackend,

    // Base URL of the hosted database, e.g. https://xyz.example.co
    #[arg(long, env = "AUTH_THROTTLE_STORE_URL", required_if_eq("store", "rest"))]
    pub store_url: Option<String>,

    // Service key sent as apikey + bearer token
    #[arg(long, env = "AUTH_THROTTLE_STORE_KEY", hide_env_values = true, default_value = "")]
    pub store_key: String,

    // Table holding rate limit rows
    #[arg(long, env = "AUTH_THROTTLE_STORE_TABLE", default_value = "rate_limits")]
    pub store_table: String,

    // Per-call timeout against the store, in milliseconds
    #[arg(long, env = "AUTH_THROTTLE_STORE_TIMEOUT_MS", default_value_t = 5000)]
    pub store_timeout_ms: u64,

    #[arg(long, env = "AUTH_THROTTLE_FAIL_MODE", value_enum, default_value_t = FailMode::Closed)]
    pub fail_mode: FailMode,

    // How often a check re-reads after losing a concurrent update
    #[arg(long, env = "AUTH_THROTTLE_MAX_CONFLICTS", default_value_t = 8)]
    pub max_conflicts: u32,

    // Stale record sweep interval in seconds, 0 disables
    #[arg(long, env = "AUTH_THROTTLE_PRUNE_INTERVAL_SECS", default_value_t = 3600)]
    pub prune_interval_secs: u64,

    // Minimum age in seconds before an idle record is swept
    #[arg(long, env = "AUTH_THROTTLE_RETENTION_SECS", default_value_t = 86400)]
    pub retention_secs: u64,

    // tracing filter used when RUST_LOG is unset
    #[arg(long, env = "AUTH_THROTTLE_LOG", default_value = "auth_throttle=info,tower_http=info")]
    pub log: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["auth-throttle"]).unwrap();
        assert_eq!(args.port, 8080);
        assert_eq!(args.store, StoreBackend::Memory);
        assert_eq!(args.fail_mode, FailMode::Closed);
        assert_eq!(args.store_table, "rate_limits");
        assert_eq!(args.max_conflicts, 8);
    }

    #[test]
    fn rest_store_needs_url() {
        assert!(Args::try_parse_from(["auth-throttle", "--store", "rest"]).is_err());

        let args = Args::try_parse_from([
            "auth-throttle",
            "--store",
            "rest",
            "--store-url",
            "https://db.example.com",
            "--fail-mode",
            "open",
        ])
        .unwrap();
        assert_eq!(args.store, StoreBackend::Rest);
        assert_eq!(args.store_url.as_deref(), Some("https://db.example.com"));
        assert_eq!(args.fail_mode, FailMode::Open);
    }
}
