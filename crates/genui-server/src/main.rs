mod configuration;
mod error;
mod routes;
mod state;

use anyhow::Context;
use genui::providers::{base::Provider, factory};
use http::HeaderValue;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        let value: HeaderValue = origin
            .parse()
            .with_context(|| format!("Invalid CORS origin: {}", origin))?;
        AllowOrigin::exact(value)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file is optional
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = configuration::Settings::new()?;
    let provider: Arc<dyn Provider + Send + Sync> =
        factory::get_provider(settings.provider.into_config())?.into();

    let state = state::AppState::new(
        provider,
        settings.chat.max_steps,
        settings.dcm.max_steps,
        settings.auth.password,
    )?;

    let app = routes::configure(state).layer(cors_layer(&settings.server.cors_origin)?);

    let addr = settings.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_origin_parsing() {
        assert!(cors_layer("*").is_ok());
        assert!(cors_layer("http://localhost:5173").is_ok());
        assert!(cors_layer("bad\norigin").is_err());
    }
}
