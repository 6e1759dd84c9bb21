use crate::error::Error;
use std::collections::HashMap;
use url::Url;

// Upgrade requests and responses are tiny; anything past this cap is either
// a confused client or someone probing the parser
pub(crate) const MAX_HANDSHAKE_SIZE: usize = 16 * 1024;

const MAX_HEADERS: usize = 64;

/// A parsed HTTP/1.1 upgrade request, the only HTTP the server side speaks.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    /// Minor version digit: 1 for HTTP/1.1, 0 for HTTP/1.0
    pub version: u8,
    /// Header names are lowercased on parse
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    /// Tries to parse a request from the front of `buf`. Returns `None`
    /// while the headers are still incomplete, otherwise the request plus
    /// the number of bytes it consumed; anything after that belongs to the
    /// framing layer.
    pub fn parse(buf: &[u8]) -> Result<Option<(HttpRequest, usize)>, Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        match req.parse(buf)? {
            httparse::Status::Partial => Ok(None),
            httparse::Status::Complete(consumed) => {
                let mut map = HashMap::new();
                for header in req.headers.iter() {
                    map.insert(
                        header.name.to_lowercase(),
                        String::from_utf8_lossy(header.value).trim().to_string(),
                    );
                }
                Ok(Some((
                    HttpRequest {
                        method: req.method.unwrap_or_default().to_string(),
                        uri: req.path.unwrap_or("/").to_string(),
                        version: req.version.unwrap_or(0),
                        headers: map,
                    },
                    consumed,
                )))
            }
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|v| v.as_str())
    }

    /// Checks whether a header holds `token` in its comma-separated list,
    /// case-insensitively. `Connection: keep-alive, Upgrade` counts as
    /// carrying the `Upgrade` token.
    pub fn has_header_token(&self, name: &str, token: &str) -> bool {
        self.header(name)
            .map(|value| {
                value
                    .split(',')
                    .any(|part| part.trim().eq_ignore_ascii_case(token))
            })
            .unwrap_or(false)
    }

    /// HTTP/1.1 keeps the connection alive unless the request says close
    pub fn wants_keep_alive(&self) -> bool {
        if self.has_header_token("connection", "close") {
            return false;
        }
        self.version >= 1 || self.has_header_token("connection", "keep-alive")
    }
}

/// A parsed HTTP response, used by the client side to judge the upgrade.
#[derive(Debug)]
pub struct HttpResponse {
    pub code: u16,
    pub version: u8,
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn parse(buf: &[u8]) -> Result<Option<(HttpResponse, usize)>, Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut resp = httparse::Response::new(&mut headers);

        match resp.parse(buf)? {
            httparse::Status::Partial => Ok(None),
            httparse::Status::Complete(consumed) => {
                let mut map = HashMap::new();
                for header in resp.headers.iter() {
                    map.insert(
                        header.name.to_lowercase(),
                        String::from_utf8_lossy(header.value).trim().to_string(),
                    );
                }
                Ok(Some((
                    HttpResponse {
                        code: resp.code.unwrap_or(0),
                        version: resp.version.unwrap_or(0),
                        headers: map,
                    },
                    consumed,
                )))
            }
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|v| v.as_str())
    }

    pub fn has_header_token(&self, name: &str, token: &str) -> bool {
        self.header(name)
            .map(|value| {
                value
                    .split(',')
                    .any(|part| part.trim().eq_ignore_ascii_case(token))
            })
            .unwrap_or(false)
    }
}

/// Serializes the client upgrade request. The mandatory headers are always
/// emitted; `extra_headers` carries whatever the user's decorator added.
pub fn build_client_request(
    host: &str,
    resource: &str,
    key: &str,
    extra_headers: &[(String, String)],
) -> String {
    let mut request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n",
        resource, host, key,
    );
    for (name, value) in extra_headers {
        request.push_str(&format!("{}: {}\r\n", name, value));
    }
    request.push_str("\r\n");
    request
}

// Function used for client connections, reducing a ws URL to the pieces the
// handshake cares about: the Host header value, the host:port pair for
// establishing the TCP socket, and the request target including any query
pub fn parse_ws_url(ws_url: &str) -> Result<(String, String, String), Error> {
    let parsed_url = Url::parse(ws_url)?;

    // TLS lives outside this crate, so only plain ws is accepted here
    if parsed_url.scheme() != "ws" {
        return Err(Error::InvalidSchemeURL);
    }

    let host = parsed_url.host_str().ok_or(Error::URLNoHost)?;
    let port = parsed_url.port().unwrap_or(80);

    // The Host header drops the port when the URL did, the dial string
    // always needs it
    let request_host_field = match parsed_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => String::from(host),
    };
    let host_with_port = format!("{}:{}", host, port);

    let resource = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => parsed_url.path().to_string(),
    };

    Ok((request_host_field, host_with_port, resource))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ws_url_valid() {
        let (host_field, host_with_port, resource) =
            parse_ws_url("ws://localhost:8080/chat?room=1").unwrap();
        assert_eq!(host_field, "localhost:8080");
        assert_eq!(host_with_port, "localhost:8080");
        assert_eq!(resource, "/chat?room=1");
    }

    #[test]
    fn test_parse_ws_url_default_port() {
        let (host_field, host_with_port, resource) = parse_ws_url("ws://example.com").unwrap();
        assert_eq!(host_field, "example.com");
        assert_eq!(host_with_port, "example.com:80");
        assert_eq!(resource, "/");
    }

    #[test]
    fn test_parse_ws_url_rejects_other_schemes() {
        assert!(parse_ws_url("wss://localhost:8080").is_err());
        assert!(parse_ws_url("ftp://localhost:8080").is_err());
    }

    #[test]
    fn test_build_client_request_mandatory_headers() {
        let request =
            build_client_request("localhost:8080", "/", "dGhlIHNhbXBsZSBub25jZQ==", &[]);
        assert!(request.starts_with("GET / HTTP/1.1\r\n"));
        assert!(request.contains("Host: localhost:8080\r\n"));
        assert!(request.contains("Upgrade: websocket\r\n"));
        assert!(request.contains("Connection: Upgrade\r\n"));
        assert!(request.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_parse_request_and_tokens() {
        let raw = b"GET /chat HTTP/1.1\r\nHost: h\r\nConnection: keep-alive, Upgrade\r\nUpgrade: WebSocket\r\n\r\nleftover";
        let (request, consumed) = HttpRequest::parse(raw).unwrap().unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.uri, "/chat");
        assert_eq!(request.version, 1);
        assert!(request.has_header_token("connection", "upgrade"));
        assert!(request.has_header_token("upgrade", "websocket"));
        assert_eq!(&raw[consumed..], b"leftover");
    }

    #[test]
    fn test_parse_request_partial() {
        assert!(HttpRequest::parse(b"GET / HTTP/1.1\r\nHost:")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_keep_alive_defaults() {
        let (req, _) = HttpRequest::parse(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n")
            .unwrap()
            .unwrap();
        assert!(req.wants_keep_alive());

        let (req, _) =
            HttpRequest::parse(b"GET / HTTP/1.1\r\nHost: h\r\nConnection: close\r\n\r\n")
                .unwrap()
                .unwrap();
        assert!(!req.wants_keep_alive());
    }
}
