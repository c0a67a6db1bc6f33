// Gateway configuration
// Decision: Raw values are kept as read; typed accessors apply defaults
// Decision: Lookup is injectable so tests never touch the process environment

/// Default HTTP listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8088";

/// Default base URL of the Temporal HTTP API
pub const DEFAULT_TEMPORAL_HTTP_ADDRESS: &str = "http://localhost:7243";

/// Default page size for namespace listing
pub const DEFAULT_NAMESPACE_PAGE_SIZE: u32 = 50;

/// Default identity reported on write operations
pub const DEFAULT_IDENTITY: &str = "sightline-gateway";

/// Configuration for the gateway process
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// HTTP listen address
    pub bind_addr: Option<String>,
    /// Temporal HTTP API base URL
    pub temporal_http_address: Option<String>,
    /// Anything but "false" permits terminate and signal
    pub permit_write_api: Option<String>,
    /// Reported by /api/me
    pub auth_enabled: Option<String>,
    pub namespace_page_size: Option<String>,
    pub identity: Option<String>,
    /// Comma-separated origin list
    pub cors_allowed_origins: Option<String>,
}

impl GatewayConfig {
    /// Create configuration from environment variables, after loading `.env`
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Failed to load .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            bind_addr: lookup("SIGHTLINE_BIND_ADDR"),
            temporal_http_address: lookup("TEMPORAL_HTTP_ADDRESS"),
            permit_write_api: lookup("TEMPORAL_PERMIT_WRITE_API"),
            auth_enabled: lookup("TEMPORAL_AUTH_ENABLED"),
            namespace_page_size: lookup("SIGHTLINE_NAMESPACE_PAGE_SIZE"),
            identity: lookup("SIGHTLINE_IDENTITY"),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS"),
        }
    }

    pub fn bind_addr(&self) -> String {
        non_empty(&self.bind_addr).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
    }

    pub fn temporal_http_address(&self) -> String {
        non_empty(&self.temporal_http_address)
            .unwrap_or_else(|| DEFAULT_TEMPORAL_HTTP_ADDRESS.to_string())
    }

    /// Write operations are permitted unless explicitly set to "false"
    pub fn permit_write_api(&self) -> bool {
        !self
            .permit_write_api
            .as_deref()
            .map(|v| v.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(false)
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth_enabled
            .as_deref()
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }

    /// Invalid or zero values fall back to the default
    pub fn namespace_page_size(&self) -> u32 {
        self.namespace_page_size
            .as_deref()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_NAMESPACE_PAGE_SIZE)
    }

    pub fn identity(&self) -> String {
        non_empty(&self.identity).unwrap_or_else(|| DEFAULT_IDENTITY.to_string())
    }

    /// Configured CORS origins; empty means same-origin only
    pub fn cors_allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
