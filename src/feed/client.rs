use crate::error::AppError;
use crate::feed::types::{FeedConfig, Instrument};
use reqwest::Client;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

pub type FeedWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub fn pairs_endpoint(config: &FeedConfig) -> String {
    format!("{}/api/forex/pairs", config.base_url)
}

pub fn ws_endpoint(config: &FeedConfig) -> String {
    let endpoint = if let Some(rest) = config.base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = config.base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        config.base_url.clone()
    };
    format!("{endpoint}/ws")
}

pub async fn connect_feed_stream(config: &FeedConfig) -> Result<FeedWsStream, AppError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(16 << 20),
        max_frame_size: Some(4 << 20),
        ..Default::default()
    };

    let request = ws_endpoint(config);
    let (stream, _) = connect_async_with_config(request, Some(ws_config), true).await?;
    Ok(stream)
}

#[derive(Debug, Deserialize)]
struct InstrumentListWire {
    success: bool,
    data: Vec<Instrument>,
}

/// One-shot fetch of the tradable instrument list used to populate the pair
/// selector.
pub async fn fetch_instruments(
    client: &Client,
    config: &FeedConfig,
) -> Result<Vec<Instrument>, AppError> {
    let endpoint = pairs_endpoint(config);
    let response = client.get(endpoint).send().await?.error_for_status()?;
    let payload = response.json::<InstrumentListWire>().await?;

    if !payload.success {
        return Err(AppError::MalformedMessage(
            "instrument list response flagged unsuccessful".to_string(),
        ));
    }
    Ok(payload.data)
}
