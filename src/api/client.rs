use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::redirect::Policy;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::profile::{parse_profile, ItemProfile};
use super::records::parse_page;
use crate::feed::{
    FeedMode, FeedPage, FeedSource, ItemId, ItemKind, PageBody, PageRequest, ThumbQuality,
};
use crate::resolution::{CategoryInfo, LookupStatus, MetadataSource, IN_PROGRESS_SENTINEL};

const MAX_PAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_LOOKUP_SIZE: usize = 1024 * 1024; // 1MB
const MAX_PROFILE_SIZE: usize = 4 * 1024 * 1024; // 4MB

/// Item the health probe asks the metadata service about.
pub const HEALTH_PROBE_ID: ItemId = ItemId(475764);

/// Errors from talking to the content API or the metadata service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    /// Body was not the JSON shape we expect
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Subscriptions need a member id and none is configured
    #[error("No user id configured for subscriptions")]
    MissingUserId,
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(e)
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Result of probing the metadata service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Probe item came back resolved
    Ok,
    /// Service answered but had nothing for the probe item
    Degraded,
    /// Request failed
    Down,
}

/// Base URLs for the two upstream services.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    /// Root of the content API, e.g. `https://gamebanana.com/apiv11`
    pub base_url: Url,
    pub game_id: u64,
    /// Batch category lookup, called as `{metadata_url}?ids=1,2,3`
    pub metadata_url: Url,
}

impl ApiEndpoints {
    pub fn new(base_url: &str, game_id: u64, metadata_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let metadata_url = Url::parse(metadata_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", metadata_url, e)))?;
        Ok(Self {
            base_url,
            game_id,
            metadata_url,
        })
    }

    /// Builds the listing URL for a page request.
    ///
    /// Sort modes hit `Game/{id}/Subfeed` with the content filter applied;
    /// subscriptions hit `Member/{user}/Subscriptions` and need a user id.
    pub fn page_url(&self, request: &PageRequest) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            match request.mode.sort_param() {
                Some(_) => {
                    segments
                        .push("Game")
                        .push(&self.game_id.to_string())
                        .push("Subfeed");
                }
                None => {
                    let user_id = request
                        .filters
                        .user_id
                        .as_deref()
                        .map(str::trim)
                        .filter(|u| !u.is_empty())
                        .ok_or(ApiError::MissingUserId)?;
                    segments.push("Member").push(user_id).push("Subscriptions");
                }
            }
        }

        {
            let mut query = url.query_pairs_mut();
            if let Some(sort) = request.mode.sort_param() {
                query.append_pair("_sSort", sort);
                if let Some(models) = request.filters.content.model_inclusions() {
                    query.append_pair("_csvModelInclusions", models);
                }
            }
            query.append_pair("_nPage", &request.page.to_string());
        }
        Ok(url)
    }

    /// `{base}/{Model}/{id}/ProfilePage`.
    pub fn profile_url(&self, kind: &ItemKind, id: ItemId) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(kind.name())
            .push(&id.to_string())
            .push("ProfilePage");
        Ok(url)
    }

    pub fn lookup_url(&self, ids: &[ItemId]) -> Url {
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut url = self.metadata_url.clone();
        url.query_pairs_mut().append_pair("ids", &joined);
        url
    }
}

/// Limits redirects to 3 hops and refuses loops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

/// Builds the shared HTTP client: pooled keepalive connections, bounded
/// redirects and a per-request timeout.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(timeout)
        .user_agent(concat!("bananaview/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ApiError::Network)
}

/// Client for the content API and the metadata service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: ApiEndpoints,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, endpoints: ApiEndpoints) -> Self {
        Self { http, endpoints }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, ApiError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = %status, "Upstream returned error status");
            return Err(ApiError::HttpStatus(status.as_u16()));
        }
        Ok(response)
    }

    /// Fetches and normalizes one page in a single call.
    ///
    /// # Arguments
    ///
    /// * `request` - Mode, page number and filters to send
    ///
    /// # Returns
    ///
    /// The parsed page, with the raw record count alongside the usable items.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, upstream answers with a
    /// non-success status, or the body is oversized or not a page object.
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<FeedPage, ApiError> {
        self.open_page(request).await?.into_page().await
    }

    /// Asks the metadata service about a batch of ids.
    ///
    /// The reply is an object keyed by id. Ids the service did not mention
    /// are absent from the returned map.
    ///
    /// # Arguments
    ///
    /// * `ids` - Items to look up, sent as one comma-separated `ids` query
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success,
    /// or the reply is oversized or not a JSON object.
    pub async fn lookup_categories(
        &self,
        ids: &[ItemId],
    ) -> Result<HashMap<ItemId, LookupStatus>, ApiError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let response = self.get(self.endpoints.lookup_url(ids)).await?;
        let bytes = read_limited_bytes(response, MAX_LOOKUP_SIZE).await?;
        parse_lookup(&bytes)
    }

    /// Fetches the profile page behind the detail overlay.
    ///
    /// # Arguments
    ///
    /// * `kind` - Model segment of the URL (`Mod`, `Tool`, ...)
    /// * `id` - Item to fetch
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success,
    /// or the body is oversized or not a JSON object.
    pub async fn fetch_profile(&self, kind: ItemKind, id: ItemId) -> Result<ItemProfile, ApiError> {
        let url = self.endpoints.profile_url(&kind, id)?;
        tracing::debug!(model = kind.name(), id = %id, url = %url, "Fetching profile");
        let response = self.get(url).await?;
        let bytes = read_limited_bytes(response, MAX_PROFILE_SIZE).await?;
        Ok(parse_profile(&bytes, kind, id)?)
    }

    /// Probes the metadata service with a well-known item.
    pub async fn health_check(&self) -> HealthStatus {
        match self.lookup_categories(&[HEALTH_PROBE_ID]).await {
            Ok(map) => match map.get(&HEALTH_PROBE_ID) {
                Some(LookupStatus::Resolved(_)) => HealthStatus::Ok,
                _ => HealthStatus::Degraded,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Health probe failed");
                HealthStatus::Down
            }
        }
    }
}

/// Parses a lookup reply.
///
/// `{category, catid}` is a resolution (unless the category is the
/// in-progress sentinel), `{status: "failed"}` is a definitive failure and
/// anything else is still pending.
pub fn parse_lookup(bytes: &[u8]) -> Result<HashMap<ItemId, LookupStatus>, ApiError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let Value::Object(map) = root else {
        return Err(ApiError::Decode("lookup reply is not an object".into()));
    };

    let mut out = HashMap::with_capacity(map.len());
    for (key, value) in map {
        let Ok(id) = key.parse::<ItemId>() else {
            tracing::debug!(key = %key, "Ignoring non-numeric lookup key");
            continue;
        };
        out.insert(id, lookup_status(&value));
    }
    Ok(out)
}

fn lookup_status(value: &Value) -> LookupStatus {
    if let Some(category) = value.get("category").and_then(Value::as_str) {
        let category = category.trim();
        if !category.is_empty() && category != IN_PROGRESS_SENTINEL {
            let category_id = match value.get("catid") {
                Some(Value::Number(n)) => n.as_u64(),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            };
            return LookupStatus::Resolved(CategoryInfo::new(category, category_id));
        }
    }
    match value.get("status").and_then(Value::as_str) {
        Some("failed") => LookupStatus::Failed,
        _ => LookupStatus::Pending,
    }
}

/// Reads a response body, refusing anything over `limit` bytes and
/// reporting bodies cut short of their declared length.
pub async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ApiError> {
    let expected_length = response.content_length();
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(ApiError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::from_reqwest)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(ApiError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }
    Ok(bytes)
}

struct HttpPageBody {
    response: reqwest::Response,
    mode: FeedMode,
    quality: ThumbQuality,
}

#[async_trait]
impl PageBody for HttpPageBody {
    async fn into_page(self: Box<Self>) -> Result<FeedPage, ApiError> {
        let bytes = read_limited_bytes(self.response, MAX_PAGE_SIZE).await?;
        Ok(parse_page(&bytes, self.mode, self.quality)?)
    }
}

#[async_trait]
impl FeedSource for ApiClient {
    async fn open_page(&self, request: &PageRequest) -> Result<Box<dyn PageBody>, ApiError> {
        let url = self.endpoints.page_url(request)?;
        tracing::debug!(mode = %request.mode, page = request.page, url = %url, "Fetching page");
        let response = self.get(url).await?;
        Ok(Box::new(HttpPageBody {
            response,
            mode: request.mode,
            quality: request.filters.thumb_quality,
        }))
    }
}

#[async_trait]
impl MetadataSource for ApiClient {
    async fn lookup(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, LookupStatus>, ApiError> {
        self.lookup_categories(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ContentFilter, FeedFilters};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoints(base: &str) -> ApiEndpoints {
        ApiEndpoints::new(&format!("{}/apiv11", base), 8552, &format!("{}/mod/api/subcat", base)).unwrap()
    }

    fn client(base: &str) -> ApiClient {
        ApiClient::new(
            build_http_client(Duration::from_secs(5)).unwrap(),
            endpoints(base),
        )
    }

    fn request(mode: FeedMode, page: u32, content: ContentFilter, user: Option<&str>) -> PageRequest {
        PageRequest {
            mode,
            page,
            filters: FeedFilters {
                content,
                user_id: user.map(String::from),
                thumb_quality: ThumbQuality::Large,
            },
        }
    }

    #[test]
    fn test_page_url_sort_modes() {
        let ep = endpoints("https://gamebanana.com");
        let url = ep
            .page_url(&request(FeedMode::Latest, 2, ContentFilter::Mods, None))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gamebanana.com/apiv11/Game/8552/Subfeed?_sSort=new&_csvModelInclusions=Mod&_nPage=2"
        );

        let url = ep
            .page_url(&request(FeedMode::Recommended, 1, ContentFilter::All, None))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gamebanana.com/apiv11/Game/8552/Subfeed?_sSort=default&_nPage=1"
        );
    }

    #[test]
    fn test_page_url_subscriptions() {
        let ep = endpoints("https://gamebanana.com");
        let url = ep
            .page_url(&request(FeedMode::Subscriptions, 3, ContentFilter::Posts, Some("1234")))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gamebanana.com/apiv11/Member/1234/Subscriptions?_nPage=3"
        );

        let missing = ep.page_url(&request(FeedMode::Subscriptions, 1, ContentFilter::Mods, Some("  ")));
        assert!(matches!(missing, Err(ApiError::MissingUserId)));
    }

    #[test]
    fn test_profile_url_uses_model_name() {
        let ep = endpoints("https://gamebanana.com");
        assert_eq!(
            ep.profile_url(&ItemKind::Mod, ItemId(500)).unwrap().as_str(),
            "https://gamebanana.com/apiv11/Mod/500/ProfilePage"
        );
        assert_eq!(
            ep.profile_url(&ItemKind::Other("Wip".into()), ItemId(7)).unwrap().as_str(),
            "https://gamebanana.com/apiv11/Wip/7/ProfilePage"
        );
    }

    #[test]
    fn test_lookup_url_joins_ids() {
        let ep = endpoints("https://example.com");
        let url = ep.lookup_url(&[ItemId(1), ItemId(22), ItemId(333)]);
        assert_eq!(url.query(), Some("ids=1%2C22%2C333"));
    }

    #[test]
    fn test_parse_lookup_statuses() {
        let body = r#"{
            "1": {"category": "Characters", "catid": 18140},
            "2": {"status": "failed"},
            "3": {"status": "pending"},
            "4": {"category": "获取中..."},
            "x": {"category": "ignored"}
        }"#;
        let map = parse_lookup(body.as_bytes()).unwrap();

        assert_eq!(
            map.get(&ItemId(1)),
            Some(&LookupStatus::Resolved(CategoryInfo::new("Characters", Some(18140))))
        );
        assert_eq!(map.get(&ItemId(2)), Some(&LookupStatus::Failed));
        assert_eq!(map.get(&ItemId(3)), Some(&LookupStatus::Pending));
        assert_eq!(map.get(&ItemId(4)), Some(&LookupStatus::Pending));
        assert_eq!(map.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_page_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apiv11/Game/8552/Subfeed"))
            .and(query_param("_sSort", "updated"))
            .and(query_param("_nPage", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"_aRecords": [{"_idRow": 10, "_sModelName": "Mod", "_sName": "Skin"}]}"#,
            ))
            .mount(&server)
            .await;

        let page = client(&server.uri())
            .fetch_page(&request(FeedMode::Updated, 1, ContentFilter::All, None))
            .await
            .unwrap();
        assert_eq!(page.raw, 1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, ItemId(10));
    }

    #[tokio::test]
    async fn test_fetch_page_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .fetch_page(&request(FeedMode::Latest, 1, ContentFilter::Mods, None))
            .await;
        assert!(matches!(result, Err(ApiError::HttpStatus(503))));
    }

    #[tokio::test]
    async fn test_fetch_page_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .fetch_page(&request(FeedMode::Latest, 1, ContentFilter::Mods, None))
            .await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[tokio::test]
    async fn test_lookup_sends_batched_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mod/api/subcat"))
            .and(query_param("ids", "5,6"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"5": {"category": "Weapons", "catid": "3"}, "6": {"status": "pending"}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let map = client(&server.uri())
            .lookup_categories(&[ItemId(5), ItemId(6)])
            .await
            .unwrap();
        assert_eq!(
            map[&ItemId(5)],
            LookupStatus::Resolved(CategoryInfo::new("Weapons", Some(3)))
        );
        assert_eq!(map[&ItemId(6)], LookupStatus::Pending);
    }

    #[tokio::test]
    async fn test_health_check_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("ids", "475764"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"475764": {"category": "Characters", "catid": 1}}"#,
            ))
            .mount(&server)
            .await;
        assert_eq!(client(&server.uri()).health_check().await, HealthStatus::Ok);

        let pending = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"475764": {"status": "pending"}}"#))
            .mount(&pending)
            .await;
        assert_eq!(client(&pending.uri()).health_check().await, HealthStatus::Degraded);

        let down = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&down)
            .await;
        assert_eq!(client(&down.uri()).health_check().await, HealthStatus::Down);
    }

    #[tokio::test]
    async fn test_fetch_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apiv11/Mod/500/ProfilePage"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"_sName": "Dress", "_nDownloadCount": 9,
                    "_aFiles": [{"_idRow": 77, "_sFile": "dress.7z", "_nFilesize": 2048}],
                    "_aSubmitter": {"_sName": "modder", "_sUserTitle": "Tailor"}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let profile = client(&server.uri())
            .fetch_profile(ItemKind::Mod, ItemId(500))
            .await
            .unwrap();
        assert_eq!(profile.id, ItemId(500));
        assert_eq!(profile.name, "Dress");
        assert_eq!(profile.downloads, 9);
        assert_eq!(profile.files[0].download_url(), "https://gamebanana.com/dl/77");
        assert_eq!(profile.submitter.unwrap().title.as_deref(), Some("Tailor"));
    }

    #[tokio::test]
    async fn test_fetch_profile_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apiv11/Mod/1/ProfilePage"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/apiv11/Mod/2/ProfilePage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let api = client(&server.uri());
        assert!(matches!(
            api.fetch_profile(ItemKind::Mod, ItemId(1)).await,
            Err(ApiError::HttpStatus(404))
        ));
        assert!(matches!(
            api.fetch_profile(ItemKind::Mod, ItemId(2)).await,
            Err(ApiError::Decode(_))
        ));
    }
}
