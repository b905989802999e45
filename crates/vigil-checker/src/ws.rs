//! WebSocket probe execution.
//!
//! Dials the endpoint with a fixed handshake timeout, reads exactly
//! one message under a read deadline, and closes. The URL scheme is
//! rewritten (http to ws, https to wss) in this path only.

use crate::context::RunContext;
use crate::http::{LATENCY_METRIC, MAX_CONTENT_LENGTH};
use crate::request::HttpRequest;
use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue, HOST};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tracing::debug;
use url::Url;
use vigil_core::{CheckError, HttpResult, Metric, Response};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Headers the handshake owns; spec-supplied copies are dropped.
const RESERVED_HEADERS: [&str; 5] = [
    "host",
    "connection",
    "upgrade",
    "sec-websocket-key",
    "sec-websocket-version",
];

pub(crate) async fn execute(
    ctx: &RunContext,
    request: &HttpRequest,
    read_timeout: Duration,
) -> Response {
    match run(ctx, request, read_timeout).await {
        Ok(result) => Response::ok(result),
        Err(error) => {
            debug!(url = %request.url, error = %error, "websocket probe failed");
            Response::from_error(error)
        }
    }
}

async fn run(
    ctx: &RunContext,
    request: &HttpRequest,
    read_timeout: Duration,
) -> Result<HttpResult, CheckError> {
    let started = Instant::now();
    let mut url = Url::parse(&request.url)
        .map_err(|e| CheckError::InvalidTarget(format!("{}: {e}", request.url)))?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    }
    .to_string();
    if url.set_scheme(&scheme).is_err() {
        return Err(CheckError::InvalidTarget(format!(
            "cannot probe scheme {} over websocket",
            url.scheme()
        )));
    }

    let mut client_request = url
        .as_str()
        .into_client_request()
        .map_err(|e| CheckError::InvalidTarget(e.to_string()))?;
    for header in &request.headers {
        if RESERVED_HEADERS.iter().any(|r| header.is(r)) {
            continue;
        }
        if let Ok(name) = HeaderName::from_bytes(header.name.as_bytes()) {
            for value in &header.values {
                if let Ok(value) = HeaderValue::from_str(value) {
                    client_request.headers_mut().append(name.clone(), value);
                }
            }
        }
    }
    if let Some(vhost) = request.virtual_host() {
        if let Ok(value) = HeaderValue::from_str(vhost) {
            client_request.headers_mut().insert(HOST, value);
        }
    }

    let connector = if request.insecure_skip_verify {
        Some(Connector::Rustls(Arc::new(skip_verify_config())))
    } else {
        None
    };

    let connect = connect_async_tls_with_config(client_request, None, false, connector);
    let handshake = tokio::select! {
        handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect) => handshake
            .map_err(|_| CheckError::Timeout("websocket handshake".to_owned()))?,
        _ = ctx.done() => return Err(ctx.cause()),
    };
    let (mut stream, upgrade) = handshake.map_err(classify)?;

    let code = upgrade.status().as_u16();
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in upgrade.headers() {
        headers
            .entry(name.as_str().to_owned())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let message = tokio::select! {
        message = stream.next() => message,
        _ = tokio::time::sleep(read_timeout) => {
            return Err(CheckError::Timeout("websocket read".to_owned()));
        }
        _ = ctx.done() => return Err(ctx.cause()),
    };
    let mut body = match message {
        Some(Ok(message)) => message
            .into_text()
            .map_err(|e| CheckError::Protocol(e.to_string()))?,
        Some(Err(err)) => return Err(classify(err)),
        None => {
            return Err(CheckError::Protocol(
                "connection closed before a message arrived".to_owned(),
            ))
        }
    };
    let _ = stream.close(None).await;

    if body.len() > MAX_CONTENT_LENGTH {
        let mut cut = MAX_CONTENT_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    Ok(HttpResult {
        code,
        body,
        headers,
        metrics: vec![Metric::new(LATENCY_METRIC, latency_ms)],
    })
}

fn skip_verify_config() -> rustls::ClientConfig {
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerification))
        .with_no_client_auth()
}

/// Accepts any server certificate. Only installed when the spec sets
/// `insecure_skip_verify`.
#[derive(Debug)]
struct NoVerification;

impl rustls::client::danger::ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

fn classify(err: WsError) -> CheckError {
    match err {
        WsError::Http(response) => CheckError::Protocol(format!(
            "unexpected handshake status {}",
            response.status()
        )),
        WsError::Io(err) => CheckError::Network(err.to_string()),
        WsError::Tls(err) => CheckError::Network(err.to_string()),
        other => CheckError::Protocol(other.to_string()),
    }
}
