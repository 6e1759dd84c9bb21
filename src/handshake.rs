use crate::config::WebSocketConfig;
use crate::connection::WSConnection;
use crate::error::Error;
use crate::request::{
    build_client_request, parse_ws_url, HttpRequest, HttpResponse, MAX_HANDSHAKE_SIZE,
};
use crate::write::Role;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use bytes::{Buf, BytesMut};
use log::debug;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const SERVER_HEADER: &str = concat!("frame-flow/", env!("CARGO_PKG_VERSION"));

// The fixed GUID every Sec-WebSocket-Accept value is derived with
const ACCEPT_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Derives the accept value for a client nonce. Sending it back proves the
/// peer actually spoke the websocket handshake rather than echoing headers:
/// SHA-1 over the nonce concatenated with the fixed GUID, then base64.
pub(crate) fn derive_accept_key(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(ACCEPT_GUID);
    BASE64_STANDARD.encode(sha1.finalize())
}

// A client nonce is 16 random bytes in base64
fn generate_nonce() -> String {
    BASE64_STANDARD.encode(rand::random::<[u8; 16]>())
}

/// Extra headers a decorator may add to an outgoing handshake message.
/// The mandatory upgrade headers are emitted by the library and cannot be
/// removed here.
pub type ExtraHeaders = Vec<(String, String)>;

// ---------------------------------------------------------------------------
// server side

/// Performs the server half of the opening handshake on a fresh transport
/// and returns the open connection.
pub async fn accept_async<S>(stream: S) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    accept_async_with_config(stream, None).await
}

pub async fn accept_async_with_config<S>(
    stream: S,
    config: Option<WebSocketConfig>,
) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    accept_impl(stream, &[], config, None).await
}

/// Like [`accept_async_with_config`], for a transport some bytes were
/// already read from, e.g. by a connection sniffer. `pre_read` is replayed
/// in front of whatever the transport yields next.
pub async fn accept_with_buffered<S>(
    stream: S,
    pre_read: &[u8],
    config: Option<WebSocketConfig>,
) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    accept_impl(stream, pre_read, config, None).await
}

/// Accepts with a decorator that may append headers to the 101 response.
pub async fn accept_async_with_decorator<S>(
    stream: S,
    config: Option<WebSocketConfig>,
    mut decorator: impl FnMut(&mut ExtraHeaders) + Send,
) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    accept_impl(stream, &[], config, Some(&mut decorator)).await
}

/// Completes the handshake for a request the caller already parsed with its
/// own HTTP machinery. No request bytes are read from the transport; frame
/// data may follow immediately.
pub async fn accept_with_request<S>(
    mut stream: S,
    request: &HttpRequest,
    config: Option<WebSocketConfig>,
) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = config.unwrap_or_default();
    respond_to_request(&mut stream, request, &config, None).await?;
    Ok(WSConnection::after_handshake(
        stream,
        Role::Server,
        BytesMut::new(),
        config,
    ))
}

async fn accept_impl<S>(
    mut stream: S,
    pre_read: &[u8],
    config: Option<WebSocketConfig>,
    decorator: Option<&mut (dyn FnMut(&mut ExtraHeaders) + Send)>,
) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = config.unwrap_or_default();
    let (request, leftover) =
        read_http_message(&mut stream, pre_read, HttpRequest::parse).await?;
    respond_to_request(&mut stream, &request, &config, decorator).await?;
    Ok(WSConnection::after_handshake(
        stream,
        Role::Server,
        leftover,
        config,
    ))
}

/// Validates the upgrade request and writes the response: a 101 on success,
/// a 4xx (or 426 on a version mismatch) otherwise. Refusals tear the
/// transport down unless the stream is configured to honor keep-alive and
/// the request asked for it.
async fn respond_to_request<S>(
    stream: &mut S,
    request: &HttpRequest,
    config: &WebSocketConfig,
    decorator: Option<&mut (dyn FnMut(&mut ExtraHeaders) + Send)>,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let accept_value = match validate_upgrade_request(request) {
        Ok(key) => derive_accept_key(key),
        Err(err) => {
            let keep_alive = config.keep_alive && request.wants_keep_alive();
            let response = build_reject_response(&err, keep_alive);
            stream.write_all(response.as_bytes()).await?;
            if !keep_alive {
                let _ = stream.shutdown().await;
            }
            return Err(err);
        }
    };

    let mut extras = ExtraHeaders::new();
    if let Some(decorator) = decorator {
        decorator(&mut extras);
    }

    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\nServer: {}\r\n",
        accept_value, SERVER_HEADER,
    );
    for (name, value) in &extras {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");

    stream.write_all(response.as_bytes()).await?;
    debug!("accepted websocket upgrade for {}", request.uri);
    Ok(())
}

/// The validation ladder for an upgrade request. Returns the client's
/// Sec-WebSocket-Key on success.
fn validate_upgrade_request(request: &HttpRequest) -> Result<&str, Error> {
    if request.version < 1 {
        return Err(Error::WrongHttpVersion);
    }
    if request.method != "GET" {
        return Err(Error::WrongHttpMethod);
    }
    if !request.has_header_token("upgrade", "websocket")
        || !request.has_header_token("connection", "upgrade")
    {
        return Err(Error::ExpectedUpgradeRequest);
    }
    if request.header("host").is_none() {
        return Err(Error::NoHostHeaderPresent);
    }
    let key = request.header("sec-websocket-key").ok_or(Error::NoSecWebsocketKey)?;
    match request.header("sec-websocket-version") {
        None => Err(Error::NoSecWebsocketVersion),
        Some(version) if version.trim() != "13" => {
            Err(Error::UnsupportedWebsocketVersion(version.to_string()))
        }
        Some(_) => Ok(key),
    }
}

fn build_reject_response(err: &Error, keep_alive: bool) -> String {
    let (status, body, version_header) = match err {
        Error::WrongHttpVersion => ("400 Bad Request", "HTTP version 1.1 required", false),
        Error::WrongHttpMethod => ("400 Bad Request", "Wrong method", false),
        Error::ExpectedUpgradeRequest => ("400 Bad Request", "Expected Upgrade request", false),
        Error::NoHostHeaderPresent => ("400 Bad Request", "Missing Host", false),
        Error::NoSecWebsocketKey => ("400 Bad Request", "Missing Sec-WebSocket-Key", false),
        Error::NoSecWebsocketVersion => {
            ("400 Bad Request", "Missing Sec-WebSocket-Version", false)
        }
        Error::UnsupportedWebsocketVersion(_) => {
            ("426 Upgrade Required", "Unsupported websocket version", true)
        }
        // request-level rejections are the only errors that reach here
        _ => ("400 Bad Request", "Bad request", false),
    };

    let mut response = format!(
        "HTTP/1.1 {}\r\nServer: {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n",
        status,
        SERVER_HEADER,
        body.len(),
    );
    if version_header {
        response.push_str("Sec-WebSocket-Version: 13\r\n");
    }
    if !keep_alive {
        response.push_str("Connection: close\r\n");
    }
    response.push_str("\r\n");
    response.push_str(body);
    response
}

// ---------------------------------------------------------------------------
// client side

/// Performs the client half of the opening handshake over a transport the
/// caller already connected. `host` goes into the Host header, `resource`
/// is the request target.
pub async fn client_handshake<S>(
    stream: S,
    host: &str,
    resource: &str,
) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    client_handshake_impl(stream, host, resource, None, None).await
}

pub async fn client_handshake_with_config<S>(
    stream: S,
    host: &str,
    resource: &str,
    config: Option<WebSocketConfig>,
) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    client_handshake_impl(stream, host, resource, config, None).await
}

/// Client handshake with a decorator that may append request headers, e.g.
/// `Sec-WebSocket-Protocol` or authorization.
pub async fn client_handshake_with_decorator<S>(
    stream: S,
    host: &str,
    resource: &str,
    config: Option<WebSocketConfig>,
    mut decorator: impl FnMut(&mut ExtraHeaders) + Send,
) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    client_handshake_impl(stream, host, resource, config, Some(&mut decorator)).await
}

/// Connects a TCP socket to a `ws://` URL and performs the handshake.
pub async fn connect_async(url: &str) -> Result<WSConnection<TcpStream>, Error> {
    connect_async_with_config(url, None).await
}

pub async fn connect_async_with_config(
    url: &str,
    config: Option<WebSocketConfig>,
) -> Result<WSConnection<TcpStream>, Error> {
    let (host_field, host_with_port, resource) = parse_ws_url(url)?;
    let stream = TcpStream::connect(host_with_port).await?;
    client_handshake_impl(stream, &host_field, &resource, config, None).await
}

async fn client_handshake_impl<S>(
    mut stream: S,
    host: &str,
    resource: &str,
    config: Option<WebSocketConfig>,
    decorator: Option<&mut (dyn FnMut(&mut ExtraHeaders) + Send)>,
) -> Result<WSConnection<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = config.unwrap_or_default();
    let key = generate_nonce();

    let mut extras = ExtraHeaders::new();
    if let Some(decorator) = decorator {
        decorator(&mut extras);
    }

    let request = build_client_request(host, resource, &key, &extras);
    stream.write_all(request.as_bytes()).await?;

    let (response, leftover) =
        read_http_message(&mut stream, &[], HttpResponse::parse).await?;

    if let Err(err) = validate_upgrade_response(&response, &key) {
        // the peer answered but refused or botched the upgrade, so this
        // transport is done
        let _ = stream.shutdown().await;
        return Err(err);
    }

    debug!("client handshake with {} completed", host);
    Ok(WSConnection::after_handshake(
        stream,
        Role::Client,
        leftover,
        config,
    ))
}

fn validate_upgrade_response(response: &HttpResponse, key: &str) -> Result<(), Error> {
    if response.version < 1 {
        return Err(Error::ResponseFailed("HTTP version 1.1 required"));
    }
    if response.code != 101 {
        // a well-formed refusal is a legitimate answer, not a broken one
        return Err(Error::HandshakeFailed(response.code));
    }
    if !response.has_header_token("upgrade", "websocket") {
        return Err(Error::ResponseFailed("missing Upgrade: websocket"));
    }
    let accept = response
        .header("sec-websocket-accept")
        .ok_or(Error::ResponseFailed("missing Sec-WebSocket-Accept"))?;
    if accept != derive_accept_key(key) {
        return Err(Error::ResponseFailed("Sec-WebSocket-Accept mismatch"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------

/// Reads from the transport until `parse` yields a complete HTTP message,
/// returning it together with any bytes that arrived past its end.
async fn read_http_message<S, T>(
    stream: &mut S,
    pre_read: &[u8],
    parse: impl Fn(&[u8]) -> Result<Option<(T, usize)>, Error>,
) -> Result<(T, BytesMut), Error>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(1024);
    buf.extend_from_slice(pre_read);

    loop {
        if !buf.is_empty() {
            if let Some((message, consumed)) = parse(&buf)? {
                buf.advance(consumed);
                return Ok((message, buf));
            }
        }

        // cap the header size so a peer can't feed us headers forever
        if buf.len() > MAX_HANDSHAKE_SIZE {
            return Err(Error::IncompleteHTTPRequest);
        }

        let mut tmp = [0u8; 1024];
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            return Err(Error::IncompleteHTTPRequest);
        }
        buf.extend_from_slice(&tmp[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_key_rfc_vector() {
        // Sample nonce straight from RFC 6455 section 1.3
        assert_eq!(
            derive_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_nonce_is_16_random_bytes() {
        let nonce = generate_nonce();
        let decoded = BASE64_STANDARD.decode(nonce).unwrap();
        assert_eq!(decoded.len(), 16);
    }

    fn sample_request() -> HttpRequest {
        let raw = b"GET /chat HTTP/1.1\r\nHost: server.example.com\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n";
        HttpRequest::parse(raw).unwrap().unwrap().0
    }

    #[test]
    fn test_validate_upgrade_request_ok() {
        let request = sample_request();
        let key = validate_upgrade_request(&request).unwrap();
        assert_eq!(key, "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn test_validate_upgrade_request_ladder() {
        let mut request = sample_request();
        request.method = "POST".into();
        assert!(matches!(
            validate_upgrade_request(&request),
            Err(Error::WrongHttpMethod)
        ));

        let mut request = sample_request();
        request.version = 0;
        assert!(matches!(
            validate_upgrade_request(&request),
            Err(Error::WrongHttpVersion)
        ));

        let mut request = sample_request();
        request.headers.remove("connection");
        assert!(matches!(
            validate_upgrade_request(&request),
            Err(Error::ExpectedUpgradeRequest)
        ));

        let mut request = sample_request();
        request.headers.remove("host");
        assert!(matches!(
            validate_upgrade_request(&request),
            Err(Error::NoHostHeaderPresent)
        ));

        let mut request = sample_request();
        request.headers.remove("sec-websocket-key");
        assert!(matches!(
            validate_upgrade_request(&request),
            Err(Error::NoSecWebsocketKey)
        ));

        let mut request = sample_request();
        request
            .headers
            .insert("sec-websocket-version".into(), "8".into());
        assert!(matches!(
            validate_upgrade_request(&request),
            Err(Error::UnsupportedWebsocketVersion(_))
        ));
    }

    #[test]
    fn test_reject_response_version_mismatch() {
        let response =
            build_reject_response(&Error::UnsupportedWebsocketVersion("8".into()), false);
        assert!(response.starts_with("HTTP/1.1 426 Upgrade Required\r\n"));
        assert!(response.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(response.contains("Connection: close\r\n"));
    }

    #[test]
    fn test_reject_response_keep_alive() {
        let response = build_reject_response(&Error::NoSecWebsocketKey, true);
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(!response.contains("Connection: close"));
        assert!(response.ends_with("Missing Sec-WebSocket-Key"));
    }

    #[test]
    fn test_validate_upgrade_response() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let raw = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n";
        let (response, _) = HttpResponse::parse(raw).unwrap().unwrap();
        assert!(validate_upgrade_response(&response, key).is_ok());

        // refusal with a parseable status is HandshakeFailed, not a parse error
        let raw = b"HTTP/1.1 403 Forbidden\r\n\r\n";
        let (response, _) = HttpResponse::parse(raw).unwrap().unwrap();
        assert!(matches!(
            validate_upgrade_response(&response, key),
            Err(Error::HandshakeFailed(403))
        ));

        // tampered accept value
        let raw = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nSec-WebSocket-Accept: bogus\r\n\r\n";
        let (response, _) = HttpResponse::parse(raw).unwrap().unwrap();
        assert!(matches!(
            validate_upgrade_response(&response, key),
            Err(Error::ResponseFailed(_))
        ));
    }
}
