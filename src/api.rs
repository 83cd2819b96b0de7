// API client module: a small blocking HTTP client for the one Discord
// endpoint this tool needs, plus the transport seam used to fetch avatars.

use crate::avatar::EncodedAvatar;
use crate::config::Config;
use crate::error::ApiError;
use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A fully read HTTP response. The connection is released by the time the
/// caller sees it.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn read(res: Response) -> reqwest::Result<Self> {
        let status = res.status();
        let body = res.bytes()?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

/// The two HTTP calls a run can make.
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient {
    /// GET `url`, giving up after `timeout`.
    fn get(&self, url: &str, timeout: Duration) -> reqwest::Result<HttpResponse>;

    /// PATCH `url` with a JSON `body` and the given `Authorization` value.
    fn patch_json(
        &self,
        url: &str,
        authorization: HeaderValue,
        body: Vec<u8>,
    ) -> reqwest::Result<HttpResponse>;
}

/// `HttpClient` backed by reqwest's blocking client.
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("updatebot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ReqwestClient { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, timeout: Duration) -> reqwest::Result<HttpResponse> {
        let res = self.client.get(url).timeout(timeout).send()?;
        HttpResponse::read(res)
    }

    fn patch_json(
        &self,
        url: &str,
        authorization: HeaderValue,
        body: Vec<u8>,
    ) -> reqwest::Result<HttpResponse> {
        let res = self
            .client
            .patch(url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;
        HttpResponse::read(res)
    }
}

/// Partial update for the current user. Absent fields are left out of the
/// JSON entirely.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<EncodedAvatar>,
}

/// The account as returned after the update.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpdatedAccount {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    /// Avatar hash; null for accounts without an avatar.
    pub avatar: Option<String>,
}

/// Client for the Discord REST API. Holds the transport and the base URLs
/// taken from `Config`.
#[derive(Clone, Debug)]
pub struct ApiClient<H = ReqwestClient> {
    http: H,
    base_url: String,
    cdn_url: String,
}

impl ApiClient<ReqwestClient> {
    /// Create an ApiClient on a fresh reqwest client.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(ReqwestClient::new()?, config))
    }
}

impl<H: HttpClient> ApiClient<H> {
    pub fn new(http: H, config: &Config) -> Self {
        ApiClient {
            http,
            base_url: config.api_base_url.clone(),
            cdn_url: config.cdn_base_url.clone(),
        }
    }

    /// The underlying transport, shared with the avatar fetch.
    pub fn http(&self) -> &H {
        &self.http
    }

    /// PATCH `/users/@me` with `req`, authenticating as a bot.
    pub fn modify_current_user(
        &self,
        token: &str,
        req: &UpdateRequest,
    ) -> std::result::Result<UpdatedAccount, ApiError> {
        let body = serde_json::to_vec(req).map_err(ApiError::Serialize)?;

        let mut auth =
            HeaderValue::from_str(&format!("Bot {token}")).map_err(ApiError::InvalidToken)?;
        auth.set_sensitive(true);

        let url = format!("{}/users/@me", self.base_url);
        log::debug!("PATCH {url} ({} byte payload)", body.len());
        let res = self
            .http
            .patch_json(&url, auth, body)
            .map_err(ApiError::Request)?;

        if res.status != StatusCode::OK {
            return Err(ApiError::Status(res.status.to_string()));
        }

        serde_json::from_slice(&res.body).map_err(ApiError::Decode)
    }

    /// CDN link for the account's avatar. Always `.png`, whatever format
    /// was uploaded.
    pub fn avatar_url(&self, account: &UpdatedAccount) -> Option<String> {
        account
            .avatar
            .as_ref()
            .map(|hash| format!("{}/avatars/{}/{}.png", self.cdn_url, account.id, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            api_base_url: "http://api.test/v10".into(),
            cdn_base_url: "http://cdn.test".into(),
        }
    }

    fn response(status: StatusCode, body: &str) -> reqwest::Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        })
    }

    const ACCOUNT_JSON: &str =
        r#"{"id":"42","username":"newname","discriminator":"0001","avatar":"abc","bot":true}"#;

    #[test]
    fn username_only_payload_omits_avatar() {
        let req = UpdateRequest {
            username: Some("newname".into()),
            avatar: None,
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"username":"newname"}"#
        );
    }

    #[test]
    fn sends_bot_authorization_to_users_me() {
        let mut http = MockHttpClient::new();
        http.expect_patch_json()
            .withf(|url, auth, body| {
                url == "http://api.test/v10/users/@me"
                    && auth.to_str().ok() == Some("Bot T1")
                    && auth.is_sensitive()
                    && body.as_slice() == br#"{"username":"newname"}"#
            })
            .times(1)
            .returning(|_, _, _| response(StatusCode::OK, ACCOUNT_JSON));
        http.expect_get().never();

        let api = ApiClient::new(http, &config());
        let req = UpdateRequest {
            username: Some("newname".into()),
            avatar: None,
        };
        let account = api.modify_current_user("T1", &req).unwrap();
        assert_eq!(
            account,
            UpdatedAccount {
                id: "42".into(),
                username: "newname".into(),
                discriminator: "0001".into(),
                avatar: Some("abc".into()),
            }
        );
        assert_eq!(
            api.avatar_url(&account).as_deref(),
            Some("http://cdn.test/avatars/42/abc.png")
        );
    }

    #[test]
    fn non_200_surfaces_status_text() {
        let mut http = MockHttpClient::new();
        http.expect_patch_json()
            .returning(|_, _, _| response(StatusCode::UNAUTHORIZED, r#"{"message":"401"}"#));

        let api = ApiClient::new(http, &config());
        let err = api
            .modify_current_user("T1", &UpdateRequest::default())
            .unwrap_err();
        assert!(matches!(&err, ApiError::Status(s) if s == "401 Unauthorized"));
        assert!(err.to_string().contains("401 Unauthorized"));
    }

    #[test]
    fn undecodable_body_is_an_error() {
        let mut http = MockHttpClient::new();
        http.expect_patch_json()
            .returning(|_, _, _| response(StatusCode::OK, "<html>oops</html>"));

        let api = ApiClient::new(http, &config());
        let err = api
            .modify_current_user("T1", &UpdateRequest::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn unusable_token_fails_before_sending() {
        let mut http = MockHttpClient::new();
        http.expect_patch_json().never();

        let api = ApiClient::new(http, &config());
        let err = api
            .modify_current_user("bad\ntoken", &UpdateRequest::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken(_)));
    }

    #[test]
    fn null_avatar_has_no_url() {
        let api = ApiClient::new(MockHttpClient::new(), &config());
        let account: UpdatedAccount = serde_json::from_str(
            r#"{"id":"42","username":"newname","discriminator":"0","avatar":null}"#,
        )
        .unwrap();
        assert_eq!(api.avatar_url(&account), None);
    }

    mod transport {
        use super::*;
        use crate::avatar::{resolve_avatar, FETCH_TIMEOUT};
        use crate::AvatarError;
        use std::io::{BufRead, BufReader, Read, Write};
        use std::net::TcpListener;
        use std::thread::{self, JoinHandle};

        struct Received {
            request_line: String,
            headers: Vec<(String, String)>,
            body: Vec<u8>,
        }

        impl Received {
            fn header(&self, name: &str) -> Option<&str> {
                self.headers
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.as_str())
            }
        }

        /// Accept one connection, record the request and answer with
        /// `status` and `body`.
        fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<Received>) {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let handle = thread::spawn(move || {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);

                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();

                let mut headers = Vec::new();
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
                    }
                }

                let len = headers
                    .iter()
                    .find(|(k, _)| k == "content-length")
                    .map(|(_, v)| v.parse::<usize>().unwrap())
                    .unwrap_or(0);
                let mut req_body = vec![0; len];
                reader.read_exact(&mut req_body).unwrap();

                let mut stream = reader.into_inner();
                write!(
                    stream,
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
                stream.flush().unwrap();

                Received {
                    request_line: request_line.trim_end().to_string(),
                    headers,
                    body: req_body,
                }
            });
            (format!("http://{addr}"), handle)
        }

        #[test]
        fn patch_goes_out_with_bot_auth_and_json() {
            let (base, server) = serve_once("200 OK", ACCOUNT_JSON);
            let api = ApiClient::from_config(&Config {
                api_base_url: base,
                cdn_base_url: "http://cdn.test".into(),
            })
            .unwrap();

            let req = UpdateRequest {
                username: Some("newname".into()),
                avatar: None,
            };
            let account = api.modify_current_user("T1", &req).unwrap();
            assert_eq!(account.username, "newname");
            assert_eq!(account.discriminator, "0001");

            let received = server.join().unwrap();
            assert_eq!(received.request_line, "PATCH /users/@me HTTP/1.1");
            assert_eq!(received.header("authorization"), Some("Bot T1"));
            assert_eq!(received.header("content-type"), Some("application/json"));
            assert_eq!(received.body, br#"{"username":"newname"}"#);
        }

        #[test]
        fn patch_error_status_is_reported() {
            let (base, server) = serve_once("401 Unauthorized", r#"{"message":"401: Unauthorized"}"#);
            let api = ApiClient::from_config(&Config {
                api_base_url: base,
                cdn_base_url: "http://cdn.test".into(),
            })
            .unwrap();

            let err = api
                .modify_current_user("T1", &UpdateRequest::default())
                .unwrap_err();
            assert!(matches!(&err, ApiError::Status(s) if s == "401 Unauthorized"));
            server.join().unwrap();
        }

        #[test]
        fn fetch_non_200_carries_status_text() {
            let (base, server) = serve_once("404 Not Found", "");
            let http = ReqwestClient::new().unwrap();

            let err = resolve_avatar(&format!("{base}/a.png"), &http).unwrap_err();
            assert!(matches!(&err, AvatarError::Status(s) if s == "404 Not Found"));
            assert!(err.to_string().contains("404 Not Found"));

            let received = server.join().unwrap();
            assert_eq!(received.request_line, "GET /a.png HTTP/1.1");
        }

        #[test]
        fn fetch_gives_up_after_timeout() {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            // never answers; holds the connection until the client drops it
            thread::spawn(move || {
                if let Ok((mut stream, _)) = listener.accept() {
                    let mut sink = Vec::new();
                    let _ = stream.read_to_end(&mut sink);
                }
            });

            let http = ReqwestClient::new().unwrap();
            let err = http
                .get(&format!("http://{addr}/slow.png"), Duration::from_millis(200))
                .unwrap_err();
            assert!(err.is_timeout());
            assert_eq!(FETCH_TIMEOUT, Duration::from_secs(10));
        }
    }
}
