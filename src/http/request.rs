//! # Parsing de Requests HTTP/1.0
//! src/http/request.rs
//!
//! ```text
//! POST /submit?name=pi HTTP/1.0\r\n
//! Content-Type: application/x-www-form-urlencoded\r\n
//! Content-Length: 24\r\n
//! \r\n
//! py=%2Fjobs%2Fpi.py&num-executors=2
//! ```
//!
//! Los parámetros de formulario pueden venir en la query string o en el body
//! urlencoded; `param()` busca primero en el body.

use std::collections::HashMap;
use thiserror::Error;

/// Separador entre headers y body
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
}

impl Method {
    fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
        }
    }
}

/// Request HTTP/1.0 parseado
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query_params: HashMap<String, String>,

    /// Nombres de header en minúsculas
    headers: HashMap<String, String>,

    /// Parámetros del body `application/x-www-form-urlencoded`
    form_params: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty request")]
    EmptyRequest,

    #[error("Incomplete HTTP request")]
    IncompleteRequest,

    #[error("Invalid request line format")]
    InvalidRequestLine,

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("Body shorter than Content-Length ({received} of {expected} bytes)")]
    TruncatedBody { expected: usize, received: usize },

    #[error("Request exceeds {0} bytes")]
    TooLarge(usize),
}

impl Request {
    /// Parsea un request completo (headers y body)
    ///
    /// ```
    /// use job_dispatch::http::Request;
    ///
    /// let raw = b"GET /job/abc?verbose=1 HTTP/1.0\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.path(), "/job/abc");
    /// assert_eq!(request.param("verbose"), Some("1"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::EmptyRequest);
        }

        let (head, body) = match find_header_end(buffer) {
            Some(end) => (&buffer[..end], &buffer[end + HEADER_TERMINATOR.len()..]),
            None => (buffer, &[][..]),
        };

        let head = std::str::from_utf8(head).map_err(|_| ParseError::InvalidRequestLine)?;
        let mut lines = head.split("\r\n");

        let request_line = lines.next().ok_or(ParseError::IncompleteRequest)?;
        let (method, path, query_params) = Self::parse_request_line(request_line)?;
        let headers = Self::parse_headers(lines)?;

        let body = match headers.get("content-length") {
            None => body,
            Some(value) => {
                let len = value
                    .parse::<usize>()
                    .map_err(|_| ParseError::InvalidContentLength(value.clone()))?;
                if len > body.len() {
                    return Err(ParseError::TruncatedBody {
                        expected: len,
                        received: body.len(),
                    });
                }
                &body[..len]
            }
        };

        let form_params = if method == Method::POST && is_form(&headers) {
            std::str::from_utf8(body)
                .map(parse_urlencoded)
                .unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Request {
            method,
            path,
            query_params,
            headers,
            form_params,
        })
    }

    /// `METHOD /path?query HTTP/1.x`
    fn parse_request_line(
        line: &str,
    ) -> Result<(Method, String, HashMap<String, String>), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::parse(parts[0])?;

        let version = parts[2];
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version.to_string()));
        }

        let (path, query_params) = match parts[1].split_once('?') {
            Some((path, query)) => (percent_decode(path), parse_urlencoded(query)),
            None => (percent_decode(parts[1]), HashMap::new()),
        };

        Ok((method, path, query_params))
    }

    fn parse_headers<'a>(
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, ParseError> {
        let mut headers = HashMap::new();

        for line in lines {
            if line.trim().is_empty() {
                break;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(headers)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parámetro de formulario: primero el body, después la query string
    pub fn param(&self, name: &str) -> Option<&str> {
        self.form_params
            .get(name)
            .or_else(|| self.query_params.get(name))
            .map(|s| s.as_str())
    }

    /// Búsqueda de header sin distinguir mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }
}

fn is_form(headers: &HashMap<String, String>) -> bool {
    match headers.get("content-type") {
        Some(ct) => ct.starts_with("application/x-www-form-urlencoded"),
        // Sin Content-Type se asume formulario (curl -d)
        None => true,
    }
}

/// Posición de `\r\n\r\n` en el buffer, si ya llegó
pub fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

/// Valor de `Content-Length` en un bloque de headers crudo (0 si falta)
pub fn content_length(head: &[u8]) -> Result<usize, ParseError> {
    let value = String::from_utf8_lossy(head)
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().to_string());

    match value {
        None => Ok(0),
        Some(value) => value
            .parse()
            .map_err(|_| ParseError::InvalidContentLength(value)),
    }
}

/// `a=1&b=hello+world&flag` → {"a": "1", "b": "hello world", "flag": ""}
fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (percent_decode(key), percent_decode(value)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Decodifica `%XX` y `+`. Las secuencias inválidas se dejan tal cual.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        decoded.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        decoded.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let request = Request::parse(b"GET /jobs HTTP/1.0\r\n\r\n").unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.path(), "/jobs");
        assert_eq!(request.param("name"), None);
    }

    #[test]
    fn test_parse_query_params() {
        let raw = b"GET /submit?name=pi%20computer&executor-cores=2 HTTP/1.0\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.path(), "/submit");
        assert_eq!(request.param("name"), Some("pi computer"));
        assert_eq!(request.param("executor-cores"), Some("2"));
    }

    #[test]
    fn test_parse_form_body() {
        let body = "py=%2Ftmp%2Fpi.py&name=pi+computer";
        let raw = format!(
            "POST /submit HTTP/1.0\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let request = Request::parse(raw.as_bytes()).unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.param("py"), Some("/tmp/pi.py"));
        assert_eq!(request.param("name"), Some("pi computer"));
    }

    #[test]
    fn test_body_param_wins_over_query() {
        let raw = b"POST /submit?name=query HTTP/1.0\r\nContent-Length: 9\r\n\r\nname=body";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.param("name"), Some("body"));
    }

    #[test]
    fn test_json_body_not_parsed_as_form() {
        let raw = b"POST /submit HTTP/1.0\r\nContent-Type: application/json\r\nContent-Length: 10\r\n\r\n{\"py\":\"x\"}";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.param("py"), None);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let raw = b"GET / HTTP/1.0\r\nHost: localhost:8998\r\nX-Request-Id: abc\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.header("host"), Some("localhost:8998"));
        assert_eq!(request.header("x-request-id"), Some("abc"));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%2Fb%3Dc"), "a/b=c");
        assert_eq!(percent_decode("hello+world"), "hello world");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("caf%C3%A9"), "café");
    }

    #[test]
    fn test_content_length_helper() {
        assert_eq!(content_length(b"POST / HTTP/1.0\r\ncontent-length: 42"), Ok(42));
        assert_eq!(content_length(b"GET / HTTP/1.0\r\nHost: x"), Ok(0));
        assert!(matches!(
            content_length(b"POST / HTTP/1.0\r\nContent-Length: 99999999999999999999999"),
            Err(ParseError::InvalidContentLength(_))
        ));
        assert_eq!(find_header_end(b"GET / HTTP/1.0\r\n\r\nbody"), Some(14));
        assert_eq!(find_header_end(b"GET / HTTP/1.0\r\n"), None);
    }

    #[test]
    fn test_unsupported_method() {
        let result = Request::parse(b"DELETE /job/1 HTTP/1.0\r\n\r\n");
        assert!(matches!(result, Err(ParseError::UnsupportedMethod(_))));
    }

    #[test]
    fn test_invalid_version() {
        let result = Request::parse(b"GET / HTTP/2.0\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHttpVersion(_))));
    }

    #[test]
    fn test_empty_request() {
        assert!(matches!(Request::parse(b""), Err(ParseError::EmptyRequest)));
    }

    #[test]
    fn test_invalid_request_line() {
        let result = Request::parse(b"GET\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidRequestLine)));
    }

    #[test]
    fn test_invalid_header() {
        let result = Request::parse(b"GET / HTTP/1.0\r\nnot a header\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }

    #[test]
    fn test_body_shorter_than_content_length_rejected() {
        let raw = b"POST /submit HTTP/1.0\r\nContent-Length: 20\r\n\r\npy=/tmp/p";
        let result = Request::parse(raw);

        assert_eq!(
            result.unwrap_err(),
            ParseError::TruncatedBody {
                expected: 20,
                received: 9
            }
        );
    }

    #[test]
    fn test_extra_bytes_after_body_ignored() {
        let raw = b"POST /submit HTTP/1.0\r\nContent-Length: 7\r\n\r\nname=pinoise";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.param("name"), Some("pi"));
    }

    #[test]
    fn test_invalid_content_length() {
        let result = Request::parse(b"POST /submit HTTP/1.0\r\nContent-Length: lots\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidContentLength(_))));
    }
}
