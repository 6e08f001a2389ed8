use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use genui::{
    agent::{CHAT_MAX_STEPS, DCM_MAX_STEPS},
    providers::configs::{OpenAiProviderConfig, ProviderConfig},
};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Shared password for the web client; no password means open access.
#[derive(Debug, Default, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowSettings {
    pub max_steps: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    pub chat: WorkflowSettings,
    pub dcm: WorkflowSettings,
    pub provider: ProviderSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("server.cors_origin", default_cors_origin())?
            .set_default("chat.max_steps", CHAT_MAX_STEPS as u64)?
            .set_default("dcm.max_steps", DCM_MAX_STEPS as u64)?
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            .add_source(
                Environment::with_prefix("GENUI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // serde reports "missing field `api_key`"; config reports NotFound(path)
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("GENUI_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("GENUI_PROVIDER__TYPE", "openai");
        env::set_var("GENUI_PROVIDER__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.server.cors_origin, "*");
        assert_eq!(settings.auth.password, None);
        assert_eq!(settings.chat.max_steps, 5);
        assert_eq!(settings.dcm.max_steps, 10);

        let ProviderSettings::OpenAi {
            host,
            api_key,
            model,
            temperature,
            max_tokens,
        } = settings.provider;
        assert_eq!(host, "https://api.openai.com");
        assert_eq!(api_key, "test-key");
        assert_eq!(model, "gpt-4o");
        assert_eq!(temperature, None);
        assert_eq!(max_tokens, None);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("GENUI_SERVER__PORT", "8080");
        env::set_var("GENUI_SERVER__CORS_ORIGIN", "http://localhost:5173");
        env::set_var("GENUI_AUTH__PASSWORD", "hunter2");
        env::set_var("GENUI_DCM__MAX_STEPS", "4");
        env::set_var("GENUI_PROVIDER__TYPE", "openai");
        env::set_var("GENUI_PROVIDER__API_KEY", "test-key");
        env::set_var("GENUI_PROVIDER__HOST", "https://custom.openai.com");
        env::set_var("GENUI_PROVIDER__MODEL", "gpt-4o-mini");
        env::set_var("GENUI_PROVIDER__MAX_TOKENS", "2000");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.cors_origin, "http://localhost:5173");
        assert_eq!(settings.auth.password.as_deref(), Some("hunter2"));
        assert_eq!(settings.dcm.max_steps, 4);
        assert_eq!(settings.chat.max_steps, 5);

        let ProviderConfig::OpenAi(config) = settings.provider.into_config();
        assert_eq!(config.host, "https://custom.openai.com");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, Some(2000));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key_names_variable() {
        clean_env();
        env::set_var("GENUI_PROVIDER__TYPE", "openai");

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "GENUI_PROVIDER__API_KEY")
            }
            other => panic!("expected a missing variable, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
            ..Default::default()
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");

        let bad = ServerSettings {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(bad.socket_addr().is_err());
    }
}
