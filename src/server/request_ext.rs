use hyper::header::{AsHeaderName, AUTHORIZATION, COOKIE};
use hyper::http::request::Parts;

static XHR_HEADER: &str = "X-Requested-With";
static WEBSOCKET_VERSION_HEADER: &str = "Sec-WebSocket-Version";

pub trait HeaderExt {
    fn get_header<K: AsHeaderName>(&self, header: K) -> Option<String>;
    fn cookie(&self, name: &str) -> Option<String>;
    fn authorization(&self) -> Option<String>;
    fn is_xhr(&self) -> bool;
    fn is_websocket_upgrade(&self) -> bool;
    fn decoded_path(&self) -> String;
}

impl HeaderExt for Parts {
    fn get_header<K>(&self, header: K) -> Option<String>
    where
        K: AsHeaderName,
    {
        self.headers
            .get(header)
            .and_then(|header| header.to_str().ok())
            .map(ToString::to_string)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        for header in self.headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };

            for pair in header.split(';') {
                let Some((key, value)) = pair.split_once('=') else {
                    continue;
                };
                if key.trim() == name {
                    return Some(value.trim().to_string());
                }
            }
        }

        None
    }

    fn authorization(&self) -> Option<String> {
        self.get_header(AUTHORIZATION).filter(|v| !v.is_empty())
    }

    fn is_xhr(&self) -> bool {
        self.get_header(XHR_HEADER)
            .is_some_and(|value| value.contains("XMLHttpRequest"))
    }

    fn is_websocket_upgrade(&self) -> bool {
        self.get_header(WEBSOCKET_VERSION_HEADER)
            .is_some_and(|value| !value.is_empty())
    }

    fn decoded_path(&self) -> String {
        let path = self.uri.path();
        match urlencoding::decode(path) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => path.to_string(),
        }
    }
}
