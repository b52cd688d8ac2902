use mock_server::MockConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let clock_skew_secs = match std::env::var("CLOCK_SKEW_SECS") {
        Ok(raw) => raw.parse::<i64>()?,
        Err(_) => 0,
    };
    let config = MockConfig {
        clock_skew_secs,
        ..MockConfig::default()
    };

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, clock_skew_secs, "listening");
    mock_server::run(listener, config).await?;
    Ok(())
}
