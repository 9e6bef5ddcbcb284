use std::{net::SocketAddr, time::Duration};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";
pub const DEFAULT_TRAVELLER: &str = "friend";
pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_REPLAY_INTERVAL_MS: u64 = 1000;
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Trip backend serving saved trips and the SMS endpoint.
    pub backend_url: String,
    pub osrm_url: String,
    /// Name used in the welcome and goodbye announcements.
    pub traveller: String,
    pub lang: String,
    pub display_addr: Option<SocketAddr>,
    pub replay_interval: Duration,
}

impl NavigatorConfig {
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
    }
}

/// Base URLs are joined with paths that start with '/'.
pub fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[test]
fn base_urls_lose_trailing_slashes() {
    assert_eq!(trim_base_url("http://localhost:3000/"), "http://localhost:3000");
    assert_eq!(trim_base_url(DEFAULT_OSRM_URL), DEFAULT_OSRM_URL);
}
