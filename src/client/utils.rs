use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::client::config::Config;
use crate::client::consts::{AUTHORIZATION_HEADER, OPENAI_BETA_HEADER, OPENAI_BETA_REALTIME};

pub fn build_request(config: &Config) -> anyhow::Result<Request> {
    let mut request = config.url().into_client_request()?;
    request.headers_mut().insert(
        AUTHORIZATION_HEADER,
        format!("Bearer {}", config.api_key().expose_secret()).parse()?,
    );
    request
        .headers_mut()
        .insert(OPENAI_BETA_HEADER, OPENAI_BETA_REALTIME.parse()?);
    Ok(request)
}
