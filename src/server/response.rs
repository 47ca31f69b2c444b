use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue, SET_COOKIE};
use hyper::{Response, StatusCode};
use tracing::warn;

pub type ResponseBody = Full<Bytes>;

/// Response fields accumulated while the connectors run.
///
/// Connectors add identity headers, cookies and a status as they go; whether
/// they finish the response themselves or hand the request to the downstream
/// handler, the accumulated fields end up on the wire either way.
#[derive(Debug, Default)]
pub struct PendingResponse {
    status: Option<StatusCode>,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl PendingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn add_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => self.headers.push((name, value)),
            Err(e) => warn!("dropping header {name}: {e}"),
        }
    }

    pub fn add_cookie(&mut self, name: &str, value: &str) {
        self.add_header(SET_COOKIE, &format!("{name}={value}; Path=/"));
    }

    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(header, _)| header == name)
            .map(|(_, value)| value)
    }

    /// Build the final response from the accumulated fields. A missing status
    /// is a connector bug; it degrades to 400 rather than fabricating a
    /// success.
    pub fn into_response(self) -> Response<ResponseBody> {
        let status = self.status.unwrap_or(StatusCode::BAD_REQUEST);

        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        for (name, value) in self.headers {
            response.headers_mut().append(name, value);
        }
        response
    }

    /// Attach the accumulated headers to a handler-built response.
    pub fn merge_into(self, response: &mut Response<ResponseBody>) {
        for (name, value) in self.headers {
            response.headers_mut().append(name, value);
        }
    }
}
