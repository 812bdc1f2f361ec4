use std::net::IpAddr;

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    /// Origin used to build check-in deep links.
    pub base_url: String,
    pub max_body_size: usize,
    pub trusted_proxies: Vec<IpNet>,
    /// Public link check-ins allowed per client per event per minute.
    pub checkin_rate_limit: u32,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("CONGREGATE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid CONGREGATE_HOST: {e}"))?;

        let port: u16 = env_or("CONGREGATE_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid CONGREGATE_PORT: {e}"))?;

        let base_url = env_or("CONGREGATE_BASE_URL", &format!("http://{host}:{port}"));

        let max_body_size: usize = env_or("CONGREGATE_MAX_BODY_SIZE", "65536")
            .parse()
            .map_err(|e| format!("Invalid CONGREGATE_MAX_BODY_SIZE: {e}"))?;

        let trusted_proxies = parse_proxies(&env_or("CONGREGATE_TRUSTED_PROXIES", ""))?;

        let checkin_rate_limit: u32 = env_or("CONGREGATE_CHECKIN_RATE_LIMIT", "30")
            .parse()
            .map_err(|e| format!("Invalid CONGREGATE_CHECKIN_RATE_LIMIT: {e}"))?;

        let log_level = env_or("CONGREGATE_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            base_url,
            max_body_size,
            trusted_proxies,
            checkin_rate_limit,
            log_level,
        })
    }
}

fn parse_proxies(raw: &str) -> Result<Vec<IpNet>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|e| format!("Invalid CONGREGATE_TRUSTED_PROXIES entry '{s}': {e}"))
        })
        .collect()
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
