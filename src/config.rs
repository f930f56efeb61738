use anyhow::{Context, Result, anyhow};
use std::{
    env,
    net::SocketAddr,
};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub routes: Vec<RouteEntry>,
    pub upstream_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["*".to_string()],
            allowed_headers: vec!["*".to_string()],
            allow_credentials: false,
            max_age_secs: 1800,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub protected_pattern: String,
    pub inner_pattern: String,
    pub token_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            protected_pattern: "/api/**/auth/**".to_string(),
            inner_pattern: "/**/inner/**".to_string(),
            token_header: "token".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub pattern: String,
    pub upstream: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .context("invalid BIND_ADDR")?;

        let cors_defaults = CorsConfig::default();
        let cors = CorsConfig {
            allowed_origins: parse_csv("CORS_ALLOWED_ORIGINS", "*"),
            allowed_methods: parse_csv("CORS_ALLOWED_METHODS", "*")
                .into_iter()
                .map(|m| m.to_ascii_uppercase())
                .collect(),
            allowed_headers: parse_csv("CORS_ALLOWED_HEADERS", "*"),
            allow_credentials: parse_env("CORS_ALLOW_CREDENTIALS", false),
            max_age_secs: parse_env("CORS_MAX_AGE_SECS", cors_defaults.max_age_secs),
        };

        let auth_defaults = AuthConfig::default();
        let auth = AuthConfig {
            protected_pattern: env::var("AUTH_PROTECTED_PATTERN")
                .unwrap_or(auth_defaults.protected_pattern),
            inner_pattern: env::var("AUTH_INNER_PATTERN").unwrap_or(auth_defaults.inner_pattern),
            token_header: env::var("AUTH_TOKEN_HEADER")
                .unwrap_or(auth_defaults.token_header)
                .to_ascii_lowercase(),
        };

        let routes = parse_routes(
            &env::var("ROUTES").unwrap_or_else(|_| "/api/**=http://127.0.0.1:9001".into()),
        )?;

        let upstream_timeout_ms = parse_env("UPSTREAM_TIMEOUT_MS", 30_000u64);

        Ok(Self {
            bind_addr,
            cors,
            auth,
            routes,
            upstream_timeout_ms,
        })
    }
}

fn parse_routes(raw: &str) -> Result<Vec<RouteEntry>> {
    let mut out = Vec::new();
    for chunk in raw.split(',').filter(|c| !c.trim().is_empty()) {
        let mut parts = chunk.splitn(2, '=');
        let pattern = parts
            .next()
            .map(str::trim)
            .filter(|s| s.starts_with('/'))
            .ok_or_else(|| anyhow!("invalid route entry: {chunk}"))?
            .to_string();

        let upstream = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("route has no upstream: {chunk}"))?
            .to_string();

        out.push(RouteEntry { pattern, upstream });
    }

    if out.is_empty() {
        return Err(anyhow!("no routes configured"));
    }
    Ok(out)
}

fn parse_csv(key: &str, default: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}
