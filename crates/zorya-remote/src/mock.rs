//! In-process HTTP collaborator for tests.

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tiny_http::{Response, Server, StatusCode};

#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Answers every request with the handler's `(status, body)` and records it.
pub struct MockService {
    pub url: String,
    requests: Arc<Mutex<Vec<Captured>>>,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl MockService {
    pub fn start(handler: impl Fn(&Captured) -> (u16, Vec<u8>) + Send + 'static) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let srv = Arc::clone(&server);
        let reqs = Arc::clone(&requests);
        let handle = std::thread::spawn(move || {
            for mut req in srv.incoming_requests() {
                let mut body = String::new();
                let _ = req.as_reader().read_to_string(&mut body);
                let captured = Captured {
                    method: req.method().to_string(),
                    path: req.url().to_owned(),
                    headers: req
                        .headers()
                        .iter()
                        .map(|h| {
                            (
                                h.field.to_string().to_ascii_lowercase(),
                                h.value.to_string(),
                            )
                        })
                        .collect(),
                    body,
                };
                let (code, payload) = handler(&captured);
                reqs.lock().unwrap().push(captured);
                let _ = req.respond(Response::from_data(payload).with_status_code(StatusCode(code)));
            }
        });

        Self {
            url: format!("http://127.0.0.1:{port}"),
            requests,
            server,
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
