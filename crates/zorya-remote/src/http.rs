//! Shared ureq plumbing.
//!
//! Agents are built with `http_status_as_error(false)` so non-2xx responses
//! arrive as responses and their bodies can be quoted in errors.

use crate::RemoteError;
use std::io::Read;
use std::time::Duration;
use ureq::http::Response;
use ureq::Body;

/// Longest error body quoted back to the caller.
const ERROR_BODY_LIMIT: u64 = 4096;

pub fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

/// Map a response to `Ok` for 2xx and to the matching [`RemoteError`] otherwise.
///
/// The reason in [`RemoteError::Status`] is the canonical phrase for the
/// status code followed by the response body (first 4 KiB). The reason
/// phrase sent on the status line is not used, so a service must put its
/// explanation in the body for it to reach the error.
pub(crate) fn check_status(
    resp: Response<Body>,
    method: &str,
    url: &str,
) -> Result<Response<Body>, RemoteError> {
    let status = resp.status();
    let code = status.as_u16();
    if status.is_success() {
        return Ok(resp);
    }
    match code {
        404 => Err(RemoteError::NotFound(url.to_owned())),
        401 | 403 => Err(RemoteError::Unauthorized(format!(
            "HTTP {code} for {method} {url}"
        ))),
        _ => {
            let mut reason = status.canonical_reason().unwrap_or("").to_owned();
            let mut body = String::new();
            let _ = resp
                .into_body()
                .into_reader()
                .take(ERROR_BODY_LIMIT)
                .read_to_string(&mut body);
            let body = body.trim();
            if !body.is_empty() {
                if !reason.is_empty() {
                    reason.push_str(": ");
                }
                reason.push_str(body);
            }
            Err(RemoteError::Status {
                code,
                reason,
                url: url.to_owned(),
            })
        }
    }
}

pub(crate) fn read_body(resp: Response<Body>) -> Result<Vec<u8>, RemoteError> {
    let mut body = Vec::new();
    resp.into_body()
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| RemoteError::Http(e.to_string()))?;
    Ok(body)
}

pub(crate) fn transport(e: ureq::Error) -> RemoteError {
    RemoteError::Http(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockService;

    #[test]
    fn non_success_body_is_quoted() {
        let server = MockService::start(|_| (400, b"foobar".to_vec()));
        let agent = build_agent(Duration::from_secs(5));
        let resp = agent.get(&server.url).call().unwrap();
        let err = check_status(resp, "GET", &server.url).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("400"), "{msg}");
        assert!(msg.contains("Bad Request"), "{msg}");
        assert!(msg.contains("foobar"), "{msg}");
    }

    #[test]
    fn empty_error_body_leaves_canonical_reason() {
        let server = MockService::start(|_| (503, Vec::new()));
        let agent = build_agent(Duration::from_secs(5));
        let resp = agent.get(&server.url).call().unwrap();
        let Err(RemoteError::Status { code, reason, .. }) = check_status(resp, "GET", &server.url)
        else {
            panic!("expected a status error");
        };
        assert_eq!(code, 503);
        assert_eq!(reason, "Service Unavailable");
    }

    #[test]
    fn status_classes_map_to_variants() {
        let server = MockService::start(|req| match req.path.as_str() {
            "/missing" => (404, Vec::new()),
            "/secret" => (403, Vec::new()),
            _ => (200, b"ok".to_vec()),
        });
        let agent = build_agent(Duration::from_secs(5));

        let url = format!("{}/missing", server.url);
        let resp = agent.get(&url).call().unwrap();
        assert!(matches!(
            check_status(resp, "GET", &url),
            Err(RemoteError::NotFound(_))
        ));

        let url = format!("{}/secret", server.url);
        let resp = agent.get(&url).call().unwrap();
        assert!(matches!(
            check_status(resp, "GET", &url),
            Err(RemoteError::Unauthorized(_))
        ));

        let url = format!("{}/fine", server.url);
        let resp = check_status(agent.get(&url).call().unwrap(), "GET", &url).unwrap();
        assert_eq!(read_body(resp).unwrap(), b"ok");
    }

    #[test]
    fn connection_refused_is_transport_error() {
        let agent = build_agent(Duration::from_secs(2));
        let err = agent.get("http://127.0.0.1:1/").call().map_err(transport);
        assert!(matches!(err, Err(RemoteError::Http(_))));
    }
}
