//! Server Configuration

/// Environment-driven server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Hosted database / identity project base URL
    pub supabase_url: String,

    /// Service-role key for row-store access
    pub supabase_service_key: String,

    /// Anon key, used when resolving end-user tokens
    pub supabase_anon_key: String,

    /// Payment processor secret key (payments disabled when unset)
    pub stripe_secret_key: Option<String>,

    /// Webhook signing secret (payments disabled when unset)
    pub stripe_webhook_secret: Option<String>,

    /// Frontend base URL for redirects and CORS
    pub frontend_url: String,
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let supabase_url = require("SUPABASE_URL")?;
        let supabase_service_key = require("SUPABASE_SERVICE_ROLE_KEY")?;
        let supabase_anon_key = require("SUPABASE_ANON_KEY")?;

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into()),
            supabase_url,
            supabase_service_key,
            supabase_anon_key,
            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").ok(),
            stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
        })
    }
}

fn require(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} must be set"))
}
