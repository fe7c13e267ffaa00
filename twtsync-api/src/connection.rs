//! [`ApiConnection`]: blocking `ureq` client for the ticketing API.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use log::debug;

use twtsync_core::error::ApiError;
use twtsync_core::ports::TicketingApi;
use twtsync_core::settings::{validate_api_mode, ApiMode, ApiSettings};
use twtsync_core::types::{PerformanceId, UpstreamRecord};

use crate::response;

pub const USER_AGENT: &str = concat!("twtsync/", env!("CARGO_PKG_VERSION"));

/// Date format of the `dateFrom` / `dateUntil` parameters.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `key=value` pairs sorted by key and URL-encoded, joined with `&`.
/// Returns `None` for an empty parameter set.
pub fn generate_query_string(params: &BTreeMap<&str, String>) -> Option<String> {
    if params.is_empty() {
        return None;
    }
    let parts: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    Some(parts.join("&"))
}

/// Connection to one of the two configured environments.
pub struct ApiConnection {
    settings: ApiSettings,
    mode: ApiMode,
    agent: ureq::Agent,
}

impl ApiConnection {
    pub fn new(settings: &ApiSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build();
        ApiConnection {
            mode: settings.mode,
            settings: settings.clone(),
            agent,
        }
    }

    /// Switch environment. An invalid mode leaves the current one active.
    pub fn set_api_mode(&mut self, mode: &str) -> Result<ApiMode, ApiError> {
        self.mode = validate_api_mode(mode)?;
        Ok(self.mode)
    }

    pub fn api_mode(&self) -> ApiMode {
        self.mode
    }

    pub fn api_url(&self) -> &str {
        self.settings.endpoint(self.mode).url.trim_end_matches('/')
    }

    pub fn api_key(&self) -> &str {
        &self.settings.endpoint(self.mode).api_key
    }

    /// Full request URL for `path` with `params` plus the API key.
    pub fn request_url(&self, path: &str, mut params: BTreeMap<&str, String>) -> String {
        params.insert("key", self.api_key().to_string());
        let mut url = format!("{}{}", self.api_url(), path);
        if let Some(query) = generate_query_string(&params) {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    pub fn performance_list_url(&self, date_from: NaiveDate, date_until: NaiveDate) -> String {
        self.request_url("/performances", window_params(date_from, date_until))
    }

    pub fn performance_url(&self, id: &PerformanceId) -> String {
        let path = format!("/performances/{}", urlencoding::encode(id.as_str()));
        self.request_url(&path, BTreeMap::new())
    }

    pub fn arrangement_list_url(
        &self,
        id: &PerformanceId,
        date_from: NaiveDate,
        date_until: NaiveDate,
    ) -> String {
        let mut params = window_params(date_from, date_until);
        params.insert("performanceId", id.to_string());
        self.request_url("/arrangements", params)
    }

    /// GET `url`, returning the body. A 404 maps to `not_found` when given.
    fn get(&self, url: &str, not_found: Option<&PerformanceId>) -> Result<String, ApiError> {
        debug!("GET {}", redact_key(url));
        let result = self
            .agent
            .get(url)
            .set("Accept", "application/json")
            .set("Content-Type", "application/json")
            .set("User-Agent", USER_AGENT)
            .call();

        match result {
            Ok(resp) => resp
                .into_string()
                .map_err(|e| ApiError::ResponseHandling(format!("cannot read response body: {e}"))),
            Err(ureq::Error::Status(404, _)) => match not_found {
                Some(id) => Err(ApiError::PerformanceNotFound(id.clone())),
                None => Err(ApiError::ResponseHandling("HTTP 404 for a list endpoint".into())),
            },
            Err(ureq::Error::Status(code, _)) => Err(ApiError::ResponseHandling(format!(
                "unexpected HTTP status {code}"
            ))),
            Err(ureq::Error::Transport(t)) => Err(ApiError::Request(t.to_string())),
        }
    }
}

impl TicketingApi for ApiConnection {
    fn performance_list_by_date(
        &self,
        date_from: NaiveDate,
        date_until: NaiveDate,
    ) -> Result<Vec<UpstreamRecord>, ApiError> {
        let body = self.get(&self.performance_list_url(date_from, date_until), None)?;
        response::parse_performance_list(&body)
    }

    fn performance_availability(&self, id: &PerformanceId) -> Result<UpstreamRecord, ApiError> {
        let body = self.get(&self.performance_url(id), Some(id))?;
        response::parse_performance(&body, id)
    }

    fn arrangement_list_by_performance_id(
        &self,
        id: &PerformanceId,
        date_from: NaiveDate,
        date_until: NaiveDate,
    ) -> Result<Vec<UpstreamRecord>, ApiError> {
        let body = self.get(&self.arrangement_list_url(id, date_from, date_until), None)?;
        response::parse_arrangement_list(&body)
    }
}

fn window_params(date_from: NaiveDate, date_until: NaiveDate) -> BTreeMap<&'static str, String> {
    let mut params = BTreeMap::new();
    params.insert("dateFrom", date_from.format(DATE_FORMAT).to_string());
    params.insert("dateUntil", date_until.format(DATE_FORMAT).to_string());
    params
}

/// Mask the `key` parameter for logging.
fn redact_key(url: &str) -> String {
    match url.split_once("key=") {
        Some((head, tail)) => {
            let rest = tail.find('&').map(|i| &tail[i..]).unwrap_or("");
            format!("{head}key=***{rest}")
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twtsync_core::settings::Endpoint;

    fn settings() -> ApiSettings {
        ApiSettings {
            test: Endpoint {
                url: "https://park.tst.example.nl/mtTicketingAPI/".into(),
                api_key: "d437c0cb-34ab-480f-851f-aba9a".into(),
            },
            prod: Endpoint {
                url: "https://park.example.nl/mtTicketingAPI".into(),
                api_key: "aaaa-bbbb-cccc-dddd-eeee".into(),
            },
            mode: ApiMode::Test,
            timeout_secs: 5,
        }
    }

    #[test]
    fn query_string_is_sorted_and_encoded() {
        let mut params = BTreeMap::new();
        params.insert("zeta", "a b".to_string());
        params.insert("alpha", "x&y".to_string());
        assert_eq!(
            generate_query_string(&params).as_deref(),
            Some("alpha=x%26y&zeta=a%20b")
        );
        assert_eq!(generate_query_string(&BTreeMap::new()), None);
    }

    #[test]
    fn list_url_carries_window_and_key() {
        let conn = ApiConnection::new(&settings());
        let url = conn.performance_list_url(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        );
        assert_eq!(
            url,
            "https://park.tst.example.nl/mtTicketingAPI/performances\
             ?dateFrom=2024-01-01&dateUntil=2024-12-31&key=d437c0cb-34ab-480f-851f-aba9a"
        );
    }

    #[test]
    fn arrangement_url_adds_performance_id() {
        let conn = ApiConnection::new(&settings());
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let url = conn.arrangement_list_url(&PerformanceId::from("1409"), day, day);
        assert!(url.contains("/arrangements?"));
        assert!(url.ends_with("&performanceId=1409"));
    }

    #[test]
    fn set_api_mode_switches_endpoint() {
        let mut conn = ApiConnection::new(&settings());
        assert_eq!(conn.set_api_mode("prod").unwrap(), ApiMode::Prod);
        assert_eq!(conn.api_key(), "aaaa-bbbb-cccc-dddd-eeee");
        assert!(conn.performance_url(&PerformanceId::from("7")).starts_with(
            "https://park.example.nl/mtTicketingAPI/performances/7?key="
        ));
    }

    #[test]
    fn invalid_mode_is_setup_error_and_keeps_current() {
        let mut conn = ApiConnection::new(&settings());
        assert!(matches!(conn.set_api_mode("staging"), Err(ApiError::RequestSetup(_))));
        assert_eq!(conn.api_mode(), ApiMode::Test);
    }

    #[test]
    fn key_is_redacted_in_logs() {
        assert_eq!(
            redact_key("https://h/p?dateFrom=1&key=secret&z=2"),
            "https://h/p?dateFrom=1&key=***&z=2"
        );
        assert_eq!(redact_key("https://h/p?key=secret"), "https://h/p?key=***");
    }
}
