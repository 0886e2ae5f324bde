use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub gateway_base_url: String,
    pub gateway_secret_key: String,
    /// Platform commission rate applied when a seller has no override, in [0, 1)
    pub platform_fee_rate: f64,
    /// Days a succeeded transaction stays pending before settlement
    pub maturity_window_days: i64,
    /// Hours of gateway history audited by each reconciliation pass
    pub reconcile_lookback_hours: i64,
    /// UTC hour at which the daily settlement sweep fires (0-23)
    pub settlement_hour_utc: u32,
    /// UTC hour at which the daily reconciliation pass fires (0-23)
    pub reconcile_hour_utc: u32,
    pub gateway_timeout_secs: u64,
    pub gateway_page_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/marketplace".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            gateway_base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.gateway.example.com/v1".to_string()),
            gateway_secret_key: std::env::var("GATEWAY_SECRET_KEY").unwrap_or_default(),
            platform_fee_rate: parse_env("PLATFORM_FEE_RATE", 0.10)?,
            maturity_window_days: parse_env("MATURITY_WINDOW_DAYS", 7)?,
            reconcile_lookback_hours: parse_env("RECONCILE_LOOKBACK_HOURS", 48)?,
            settlement_hour_utc: parse_env("SETTLEMENT_HOUR_UTC", 2)?,
            reconcile_hour_utc: parse_env("RECONCILE_HOUR_UTC", 3)?,
            gateway_timeout_secs: parse_env("GATEWAY_TIMEOUT_SECS", 30)?,
            gateway_page_limit: parse_env("GATEWAY_PAGE_LIMIT", 100)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, config::ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("invalid value for {}: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
