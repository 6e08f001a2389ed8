use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a settings field.
///
/// Deserialization reports missing fields without their section. Only the provider
/// section has required fields, so bare names are placed under it.
pub fn to_env_var(field_path: &str) -> String {
    let normalized_path = match field_path {
        "type" | "provider" => "provider.type".to_string(),
        path if path.contains('.') => path.to_string(),
        path => format!("provider.{}", path),
    };
    format!("GENUI_{}", normalized_path.replace('.', "__").to_uppercase())
}
