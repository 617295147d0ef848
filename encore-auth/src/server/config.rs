use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfiguration {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// How long an authorization link stays valid.
    #[serde(default = "default_state_ttl")]
    pub state_ttl_seconds: u64,
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            state_ttl_seconds: default_state_ttl(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OAuthConfiguration {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,

    /// Where the browser lands after a successful callback.
    #[serde(default = "default_success_redirect")]
    pub success_redirect: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_state_ttl() -> u64 {
    600
}

fn default_success_redirect() -> String {
    "https://t.me/".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl ServerConfiguration {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl OAuthConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.is_empty() {
            return Err("oauth.client_id is required".to_string());
        }
        if self.client_secret.is_empty() {
            return Err("oauth.client_secret is required".to_string());
        }
        if !self.redirect_uri.starts_with("http") {
            return Err("oauth.redirect_uri must be a valid HTTP(S) URL".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> OAuthConfiguration {
        OAuthConfiguration {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://bot.example.com/callback".to_string(),
            success_redirect: default_success_redirect(),
            timeout_seconds: default_timeout(),
        }
    }

    #[test]
    fn complete_oauth_configuration_is_valid() {
        assert!(oauth().validate().is_ok());
    }

    #[test]
    fn missing_secret_is_rejected() {
        let config = OAuthConfiguration {
            client_secret: String::new(),
            ..oauth()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn redirect_must_be_http() {
        let config = OAuthConfiguration {
            redirect_uri: "localhost/callback".to_string(),
            ..oauth()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn server_defaults() {
        let config: ServerConfiguration = serde_json::from_str("{}").unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.state_ttl_seconds, 600);
    }
}
