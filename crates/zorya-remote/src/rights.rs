use crate::http::{check_status, read_body, transport};
use crate::{RemoteError, ServiceConfig};
use serde::Serialize;
use tracing::debug;
use zorya_schema::DateRange;

#[derive(Debug, Serialize)]
struct RightsRequest<'a> {
    identifiers: &'a [String],
    start_date: Option<String>,
    end_date: String,
}

/// Client for the external rights-determination service.
pub struct RightsClient {
    config: ServiceConfig,
    agent: ureq::Agent,
}

impl RightsClient {
    pub fn new(config: ServiceConfig, agent: ureq::Agent) -> Self {
        Self { config, agent }
    }

    /// POST the identifiers and date bounds; returns the response body verbatim.
    pub fn assign(
        &self,
        identifiers: &[String],
        range: &DateRange,
    ) -> Result<serde_json::Value, RemoteError> {
        let body = serde_json::to_vec(&RightsRequest {
            identifiers,
            start_date: range.start.map(|d| d.format("%Y-%m-%d").to_string()),
            end_date: range.end.format("%Y-%m-%d").to_string(),
        })
        .map_err(|e| RemoteError::Serialization(e.to_string()))?;

        let url = &self.config.url;
        debug!("POST {url} ({} rights ids)", identifiers.len());
        let mut req = self
            .agent
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.config.api_key {
            req = req.header("apikey", key);
        }
        let resp = check_status(req.send(&body[..]).map_err(transport)?, "POST", url)?;
        let data = read_body(resp)?;
        serde_json::from_slice(&data)
            .map_err(|e| RemoteError::Serialization(format!("rights response from {url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_agent;
    use crate::mock::MockService;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(1990, 1, 1),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
        )
        .unwrap()
    }

    fn client(server: &MockService, key: Option<&str>) -> RightsClient {
        let mut config = ServiceConfig::new(&format!("{}/rights/", server.url));
        if let Some(k) = key {
            config = config.with_api_key(k);
        }
        RightsClient::new(config, build_agent(Duration::from_secs(5)))
    }

    #[test]
    fn assign_posts_identifiers_and_dates() {
        let server = MockService::start(|_| {
            (200, br#"[{"rights_basis": "Copyright", "note": "ok"}]"#.to_vec())
        });
        let payload = client(&server, Some("k-123"))
            .assign(&["r1".to_owned(), "r2".to_owned()], &range())
            .unwrap();
        assert_eq!(payload[0]["rights_basis"], "Copyright");

        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "POST");
        assert_eq!(reqs[0].path, "/rights/");
        assert_eq!(reqs[0].headers.get("apikey"), Some(&"k-123".to_owned()));
        let sent: serde_json::Value = serde_json::from_str(&reqs[0].body).unwrap();
        assert_eq!(
            sent,
            serde_json::json!({
                "identifiers": ["r1", "r2"],
                "start_date": "1990-01-01",
                "end_date": "2020-12-31",
            })
        );
    }

    #[test]
    fn open_start_date_is_sent_as_null() {
        let server = MockService::start(|_| (200, b"{}".to_vec()));
        let open = DateRange::new(None, NaiveDate::from_ymd_opt(2001, 2, 3).unwrap()).unwrap();
        client(&server, None).assign(&["r".to_owned()], &open).unwrap();

        let req = &server.requests()[0];
        assert!(!req.headers.contains_key("apikey"));
        let sent: serde_json::Value = serde_json::from_str(&req.body).unwrap();
        assert!(sent["start_date"].is_null());
        assert_eq!(sent["end_date"], "2001-02-03");
    }

    #[test]
    fn bad_request_reason_reaches_the_error() {
        let server = MockService::start(|_| (400, b"foobar".to_vec()));
        let err = client(&server, None)
            .assign(&["r1".to_owned()], &range())
            .unwrap_err();
        assert!(matches!(err, RemoteError::Status { code: 400, .. }));
        assert!(err.to_string().contains("foobar"), "{err}");
    }

    #[test]
    fn non_json_success_body_is_an_error() {
        let server = MockService::start(|_| (200, b"<html>".to_vec()));
        let err = client(&server, None)
            .assign(&["r1".to_owned()], &range())
            .unwrap_err();
        assert!(matches!(err, RemoteError::Serialization(_)));
    }
}
