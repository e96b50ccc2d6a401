/// Watcher configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// WebSocket base URL of the backend (default: `ws://127.0.0.1:3000`).
    pub ws_url: String,
    /// Display tick interval in milliseconds (default: `16`).
    pub tick_interval_ms: u64,
}

impl WatchConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var         | Default              |
    /// |-----------------|----------------------|
    /// | `PULSE_WS_URL`  | `ws://127.0.0.1:3000`|
    /// | `PULSE_TICK_MS` | `16`                 |
    pub fn from_env() -> Self {
        let ws_url =
            std::env::var("PULSE_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:3000".into());

        let tick_interval_ms: u64 = std::env::var("PULSE_TICK_MS")
            .unwrap_or_else(|_| "16".into())
            .parse()
            .expect("PULSE_TICK_MS must be a valid u64");

        Self {
            ws_url,
            tick_interval_ms,
        }
    }
}
