use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Comma-separated list of domains whose users sign in without a
    /// whitelist entry. Whitelisting an address under one of these is
    /// redundant and rejected.
    pub auto_approved_domains: String,
}

impl AuthSettings {
    pub fn auto_approved_domains(&self) -> Vec<String> {
        self.auto_approved_domains
            .split(',')
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "postgres://localhost/gatehouse")?
            .set_default("database.max_connections", 10)?
            .set_default("redis.url", "redis://localhost:6379")?
            .set_default("auth.auto_approved_domains", "")?
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_approved_domains_parsing() {
        let auth = AuthSettings {
            auto_approved_domains: "Corp.Example.com, partner.io,".to_string(),
        };
        assert_eq!(
            auth.auto_approved_domains(),
            vec!["corp.example.com".to_string(), "partner.io".to_string()]
        );
    }

    #[test]
    fn test_auto_approved_domains_empty() {
        let auth = AuthSettings {
            auto_approved_domains: String::new(),
        };
        assert!(auth.auto_approved_domains().is_empty());
    }
}
