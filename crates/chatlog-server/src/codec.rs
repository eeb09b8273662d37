//! Request parsing and response encoding
//!
//! Only as much HTTP as the browser UI needs: the first line yields method
//! and path, headers are skipped, and whatever follows the blank line is the
//! body. Responses always close the connection.

use std::fmt;

/// Body sent for unknown paths
pub const NOT_FOUND_BODY: &str =
    "<html><body><h1>404 Not Found</h1><p>The requested path was not found.</p></body></html>";

/// Content type for HTML documents
pub const TEXT_HTML: &str = "text/html";

/// Content type for API responses
pub const APPLICATION_JSON: &str = "application/json";

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method, not used for dispatch
    pub method: String,
    /// Path with any query string removed
    pub path: String,
    /// Everything after the header block
    pub body: String,
}

/// Parse the bytes read from a connection
///
/// Returns `None` for an empty read. A malformed first line yields empty
/// method and path, which no route matches. Invalid UTF-8 is replaced.
pub fn parse_request(raw: &[u8]) -> Option<Request> {
    if raw.is_empty() {
        return None;
    }

    let text = String::from_utf8_lossy(raw);
    let mut lines = text.split_inclusive('\n');

    let first = lines.next().unwrap_or_default();
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default();
    let path = match target.split_once('?') {
        Some((path, _query)) => path,
        None => target,
    }
    .to_string();

    let mut consumed = first.len();
    for line in lines.by_ref() {
        consumed += line.len();
        if line.trim_end_matches(['\r', '\n']).is_empty() {
            break;
        }
    }

    let body = text.get(consumed..).unwrap_or_default().to_string();

    Some(Request { method, path, body })
}

/// Response status codes the server emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NotFound => 404,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "Not Found",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// A complete response, encoded with [`Response::to_bytes`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    pub fn ok(content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            content_type,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            content_type: TEXT_HTML,
            body: NOT_FOUND_BODY.to_string(),
        }
    }

    /// Status line, headers, blank line, then body
    ///
    /// `Content-Length` counts bytes, not characters.
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.content_type,
            self.body.len()
        );

        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_with_body() {
        let raw = b"POST /api/send HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\r\n{\"username\":\"alice\",\"message\":\"hi\"}";
        let request = parse_request(raw).unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/send");
        assert_eq!(request.body, "{\"username\":\"alice\",\"message\":\"hi\"}");
    }

    #[test]
    fn test_parse_strips_query() {
        let request = parse_request(b"GET /api/messages?t=123 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.path, "/api/messages");
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_parse_bare_newlines_and_no_blank_line() {
        let request = parse_request(b"GET / HTTP/1.0\nHost: x\n").unwrap();
        assert_eq!(request.path, "/");
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_parse_malformed_first_line() {
        assert!(parse_request(b"").is_none());

        let request = parse_request(b"\r\n\r\n").unwrap();
        assert!(request.method.is_empty());
        assert!(request.path.is_empty());
    }

    #[test]
    fn test_body_keeps_inner_newlines() {
        let request = parse_request(b"POST /x HTTP/1.1\r\n\r\nline1\nline2").unwrap();
        assert_eq!(request.body, "line1\nline2");
    }

    #[test]
    fn test_response_encoding() {
        let bytes = Response::ok(APPLICATION_JSON, "{\"a\":\"é\"}").to_bytes();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("Content-Length: 10\r\n"));
        assert!(text.contains("Connection: close\r\n\r\n"));
        assert!(text.ends_with("{\"a\":\"é\"}"));
    }

    #[test]
    fn test_not_found_response() {
        let text = String::from_utf8(Response::not_found().to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Type: text/html\r\n"));
        assert!(text.ends_with(NOT_FOUND_BODY));
    }
}
