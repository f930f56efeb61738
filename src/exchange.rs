use axum::body::Body;
use http::{HeaderMap, Method, Uri};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::Mutex,
    time::Instant,
};

pub struct Exchange {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    // Wrapped in a Mutex so Exchange is Sync: `Body` is Send but not Sync,
    // and the pipeline holds `&Exchange` across awaits in a Send future.
    body: Mutex<Option<Body>>,
    pub client_ip: Option<IpAddr>,
    pub started_at: Instant,
    pub matched_route: Option<String>,
    pub chosen_upstream: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl Exchange {
    pub fn new(
        request_id: String,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Body,
        client_ip: Option<IpAddr>,
    ) -> Self {
        Self {
            request_id,
            method,
            uri,
            headers,
            body: Mutex::new(Some(body)),
            client_ip,
            started_at: Instant::now(),
            matched_route: None,
            chosen_upstream: None,
            attributes: HashMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    // The body is a one-shot stream; only the forwarder consumes it.
    pub fn take_body(&mut self) -> Body {
        self.body
            .get_mut()
            .unwrap()
            .take()
            .unwrap_or_else(Body::empty)
    }
}
