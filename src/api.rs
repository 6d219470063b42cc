//! Async HTTP client for the appliance management API.
//!
//! One session per run: [`ApiClient::authorize`] trades the operator's
//! credentials for a bearer token and stores it, then
//! [`ApiClient::list_hosts`] and [`ApiClient::upload_license`] reuse it.
//!
//! Every endpoint lives under the fixed base `https://<ip>:9993/api/v1`:
//!
//! - `POST /oauth2/token` — password-grant form
//!   (`grant_type=password&username=…&password=…`), answers a JSON object
//!   with `access_token`, `expires_in`, `refresh_token` and `token_type`.
//! - `GET /hosts` — bearer-authorized, answers `[{id, name}, …]`.
//! - `POST /hosts/<id>/licenses` — bearer-authorized multipart upload with
//!   a single file part named `license`; 200 means the host took it.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{header, multipart, redirect, StatusCode};
use serde::Deserialize;

use crate::models::{Host, UploadStatus};

/// HTTPS port the appliance management API listens on.
pub const API_PORT: u16 = 9993;
/// Path prefix shared by every endpoint.
pub const API_PREFIX: &str = "/api/v1";
/// Per-request timeout, covering connect through body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Cap on a call's redirect chain, counting the original request.
pub const REDIRECT_LIMIT: usize = 10;

const USER_AGENT: &str = concat!("license-pushr/", env!("CARGO_PKG_VERSION"));

fn base_url_for(ip: &str) -> String {
    format!("https://{ip}:{API_PORT}{API_PREFIX}")
}

/// Answer of the token endpoint. The wire also carries `expires_in`,
/// `refresh_token` and `token_type`; nothing here uses them, so serde drops
/// them. `access_token` defaults to empty when absent, which the caller
/// rejects the same way as an explicitly blank one.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

/// One client session against one appliance.
///
/// The token slot is written exactly once, by a successful
/// [`authorize`](Self::authorize); authorized requests read it through a
/// single checkpoint, so a call made out of order fails fast instead of
/// sending an empty `Authorization` header.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Build a session for `https://<ip>:9993/api/v1`.
    ///
    /// `accept_invalid_certs` disables TLS certificate verification.
    /// Appliances ship self-signed certificates, so the CLI passes `true`
    /// unless `--verify-tls` was given.
    pub fn new(ip: &str, accept_invalid_certs: bool) -> Result<Self> {
        Self::with_base_url(base_url_for(ip), accept_invalid_certs)
    }

    /// Like [`new`](Self::new), against an explicit base URL. Tests point
    /// this at a plain-HTTP mock server.
    pub fn with_base_url(base_url: String, accept_invalid_certs: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            // `Policy::limited(n)` refuses only past n chain entries; the
            // cap here binds the chain itself, original request included.
            .redirect(redirect::Policy::custom(|attempt| {
                if attempt.previous().len() >= REDIRECT_LIMIT {
                    attempt.error("too many redirects")
                } else {
                    attempt.follow()
                }
            }))
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("building the HTTP client")?;

        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    /// Exchange `username` and `password` for a bearer token and store it
    /// for the rest of the session.
    ///
    /// Anything but a 200 is an error carrying the answered status; so is a
    /// 200 whose `access_token` is missing or blank.
    pub async fn authorize(&mut self, username: &str, password: &str) -> Result<()> {
        let url = format!("{}/oauth2/token", self.base_url);
        let form = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ];

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .context("sending the token request")?;

        let status = response.status();
        if status != StatusCode::OK {
            bail!("token endpoint answered {status}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("decoding the token response")?;
        if token.access_token.is_empty() {
            bail!("token response carries no access_token");
        }

        self.token = Some(token.access_token);
        Ok(())
    }

    /// List the managed hosts, in the order the appliance answers them.
    ///
    /// The status code is not inspected: an error answer surfaces as a
    /// decode failure, since its body is not a host array.
    pub async fn list_hosts(&self) -> Result<Vec<Host>> {
        let url = format!("{}/hosts", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.bearer()?)
            .send()
            .await
            .context("requesting the host list")?;

        let hosts = response.json().await.context("decoding the host list")?;
        Ok(hosts)
    }

    /// Upload the license file at `license_path` to one host.
    ///
    /// The file is read whole and sent as a multipart part named `license`,
    /// with its base name as the part's filename. A non-200 answer is a
    /// [`UploadStatus::Rejected`] value, not an error; only filesystem and
    /// transport failures come back as `Err`.
    pub async fn upload_license(&self, host_id: &str, license_path: &Path) -> Result<UploadStatus> {
        let contents = std::fs::read(license_path)
            .with_context(|| format!("reading license file {}", license_path.display()))?;
        let file_name = license_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("license path {} has no file name", license_path.display()))?;

        let part = multipart::Part::bytes(contents)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .context("labeling the license part")?;
        let form = multipart::Form::new().part("license", part);

        let url = format!("{}/hosts/{}/licenses", self.base_url, host_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.bearer()?)
            // The appliance drops the connection after a license POST.
            .header(header::CONNECTION, "close")
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("sending the license to host {host_id}"))?;

        let status = response.status();
        if status == StatusCode::OK {
            Ok(UploadStatus::Accepted)
        } else {
            Ok(UploadStatus::Rejected {
                status: status.as_u16(),
            })
        }
    }

    /// The stored bearer token. Authorized requests go through here, so
    /// "token present and non-blank" has one enforcement point.
    fn bearer(&self) -> Result<&str> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(anyhow!("not authorized: call authorize() first")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn token_body(token: &str) -> serde_json::Value {
        json!({
            "access_token": token,
            "expires_in": 3600,
            "refresh_token": "refresh-0001",
            "token_type": "bearer"
        })
    }

    /// Mock the token endpoint with `tok-123` and authorize against it.
    async fn authorized_client(server: &MockServer) -> ApiClient {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/token");
                then.status(200).json_body(token_body("tok-123"));
            })
            .await;

        let mut client = ApiClient::with_base_url(server.base_url(), false).unwrap();
        client.authorize("admin", "hunter2").await.unwrap();
        client
    }

    fn license_fixture(dir: &tempfile::TempDir, name: &str, payload: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, payload).unwrap();
        path
    }

    #[test]
    fn test_base_url_is_fixed_port_and_prefix() {
        assert_eq!(base_url_for("192.0.2.7"), "https://192.0.2.7:9993/api/v1");
    }

    #[tokio::test]
    async fn test_authorize_sends_password_grant_and_stores_token() {
        let server = MockServer::start_async().await;

        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth2/token")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .header("user-agent", concat!("license-pushr/", env!("CARGO_PKG_VERSION")))
                    .body_includes("grant_type=password")
                    .body_includes("username=admin")
                    .body_includes("password=hunter2");
                then.status(200).json_body(token_body("tok-123"));
            })
            .await;

        // The stored token is observable through the next call's header.
        let hosts_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/hosts")
                    .header("authorization", "Bearer tok-123");
                then.status(200).json_body(json!([]));
            })
            .await;

        let mut client = ApiClient::with_base_url(server.base_url(), false).unwrap();
        client.authorize("admin", "hunter2").await.unwrap();
        let hosts = client.list_hosts().await.unwrap();

        token_mock.assert_async().await;
        hosts_mock.assert_async().await;
        assert!(hosts.is_empty());
    }

    #[tokio::test]
    async fn test_authorize_rejects_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/token");
                then.status(401).json_body(json!({"error": "invalid_grant"}));
            })
            .await;

        let mut client = ApiClient::with_base_url(server.base_url(), false).unwrap();
        let err = client.authorize("admin", "wrong").await.unwrap_err();
        assert!(err.to_string().contains("401"), "err: {err:#}");
    }

    #[tokio::test]
    async fn test_authorize_rejects_blank_token() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/token");
                then.status(200).json_body(token_body(""));
            })
            .await;

        let mut client = ApiClient::with_base_url(server.base_url(), false).unwrap();
        let err = client.authorize("admin", "hunter2").await.unwrap_err();
        assert!(err.to_string().contains("access_token"), "err: {err:#}");
    }

    #[tokio::test]
    async fn test_authorize_rejects_missing_token_field() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/token");
                // 200 with no access_token at all decodes as blank.
                then.status(200).json_body(json!({"expires_in": 3600}));
            })
            .await;

        let mut client = ApiClient::with_base_url(server.base_url(), false).unwrap();
        let err = client.authorize("admin", "hunter2").await.unwrap_err();
        assert!(err.to_string().contains("access_token"), "err: {err:#}");
    }

    #[tokio::test]
    async fn test_requests_before_authorize_are_refused() {
        let server = MockServer::start_async().await;
        let catch_all = server
            .mock_async(|when, then| {
                when.path_includes("/");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = ApiClient::with_base_url(server.base_url(), false).unwrap();

        let err = client.list_hosts().await.unwrap_err();
        assert!(err.to_string().contains("not authorized"), "err: {err:#}");

        // A real file, so the refusal is about the token, not the path.
        let dir = tempfile::tempdir().unwrap();
        let license = license_fixture(&dir, "fleet.lic", "LICENSE");
        let err = client.upload_license("h-1", &license).await.unwrap_err();
        assert!(err.to_string().contains("not authorized"), "err: {err:#}");

        catch_all.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_list_hosts_preserves_order_and_defaults_name() {
        let server = MockServer::start_async().await;
        let client = authorized_client(&server).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/hosts");
                then.status(200).json_body(json!([
                    {"id": "h-2", "name": "edge-b"},
                    {"id": "h-1", "name": "edge-a"},
                    {"id": "h-9"}
                ]));
            })
            .await;

        let hosts = client.list_hosts().await.unwrap();
        let ids: Vec<&str> = hosts.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["h-2", "h-1", "h-9"]);
        assert_eq!(hosts[0].name, "edge-b");
        assert_eq!(hosts[2].name, "");
    }

    #[tokio::test]
    async fn test_list_hosts_error_body_surfaces_as_decode_failure() {
        let server = MockServer::start_async().await;
        let client = authorized_client(&server).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/hosts");
                then.status(401).json_body(json!({"error": "token expired"}));
            })
            .await;

        let err = client.list_hosts().await.unwrap_err();
        assert!(
            format!("{err:#}").contains("decoding the host list"),
            "err: {err:#}"
        );
    }

    #[tokio::test]
    async fn test_upload_license_sends_multipart_file() {
        let server = MockServer::start_async().await;
        let client = authorized_client(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let license = license_fixture(&dir, "fleet-2026.lic", "LICENSE-PAYLOAD-0001");

        let upload_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hosts/h-1/licenses")
                    .header("authorization", "Bearer tok-123")
                    .header("connection", "close")
                    .body_includes("name=\"license\"")
                    .body_includes("filename=\"fleet-2026.lic\"")
                    .body_includes("application/octet-stream")
                    .body_includes("LICENSE-PAYLOAD-0001");
                then.status(200);
            })
            .await;

        let status = client.upload_license("h-1", &license).await.unwrap();

        upload_mock.assert_async().await;
        assert_eq!(status, UploadStatus::Accepted);
    }

    #[tokio::test]
    async fn test_upload_rejection_is_a_value_not_an_error() {
        let server = MockServer::start_async().await;
        let client = authorized_client(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let license = license_fixture(&dir, "fleet.lic", "LICENSE");

        let upload_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/hosts/h-9/licenses");
                then.status(500);
            })
            .await;

        let status = client.upload_license("h-9", &license).await.unwrap();

        upload_mock.assert_async().await;
        assert_eq!(status, UploadStatus::Rejected { status: 500 });
    }

    #[tokio::test]
    async fn test_upload_missing_file_fails_without_a_request() {
        let server = MockServer::start_async().await;
        let client = authorized_client(&server).await;

        let upload_mock = server
            .mock_async(|when, then| {
                when.path_includes("/licenses");
                then.status(200);
            })
            .await;

        let err = client
            .upload_license("h-1", Path::new("/nonexistent/fleet.lic"))
            .await
            .unwrap_err();

        assert!(
            format!("{err:#}").contains("reading license file"),
            "err: {err:#}"
        );
        upload_mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_redirect_chains_stop_at_the_cap() {
        let server = MockServer::start_async().await;
        let client = authorized_client(&server).await;

        let loop_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/hosts");
                then.status(302).header("location", "/hosts");
            })
            .await;

        let err = client.list_hosts().await.unwrap_err();
        let chain = format!("{err:#}").to_lowercase();
        assert!(chain.contains("redirect"), "err: {chain}");

        // The original request plus nine followed hops; the tenth hop is
        // refused before it is sent.
        loop_mock.assert_calls_async(10).await;
    }
}
