// Session client
//
// Cookie-based session login/logout plus CSRF token handling. The login
// endpoint sets a session cookie in the client's jar; subsequent requests
// use that cookie automatically. State-changing requests additionally echo
// the CSRF token captured at login.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::ApiResponse;
use crate::transport::TransportConfig;

/// Path prefix the controller's reverse proxy puts in front of the
/// network application's API.
const PROXY_PREFIX: &str = "/proxy/network";

const LOGIN_PATH: &str = "/api/auth/login";
const LOGOUT_PATH: &str = "/api/auth/logout";

/// Which login-response header carries the CSRF token.
///
/// The controller moved the token between headers across firmware
/// versions, so the extraction strategy is an explicit, caller-selected
/// option rather than a silent branch:
/// - [`CsrfToken`](Self::CsrfToken): `x-csrf-token` (firmware before 3.2.7)
/// - [`UpdatedCsrfToken`](Self::UpdatedCsrfToken): `x-updated-csrf-token`
///   (firmware 3.2.7 and later)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsrfTokenHeader {
    #[default]
    CsrfToken,
    UpdatedCsrfToken,
}

impl CsrfTokenHeader {
    /// The response-header name the token is read from.
    pub fn header_name(self) -> &'static str {
        match self {
            Self::CsrfToken => "x-csrf-token",
            Self::UpdatedCsrfToken => "x-updated-csrf-token",
        }
    }
}

/// HTTP client for one authenticated controller session.
///
/// Owns the cookie jar and the CSRF token. One session is active per
/// client instance at a time: `login` replaces any previous session
/// state in place, `logout` invalidates it.
pub struct SessionClient {
    http: reqwest::Client,
    base_url: Url,
    site: String,
    csrf_header: CsrfTokenHeader,
    /// CSRF token captured from login response headers and echoed on all
    /// POST/PUT requests. Rotated whenever a response carries a fresh one.
    csrf_token: RwLock<Option<String>>,
}

impl SessionClient {
    /// Create a new session client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically (session auth requires cookies). The `base_url` should
    /// be the controller root, e.g. `https://192.168.1.1`.
    pub fn new(
        base_url: Url,
        site: String,
        csrf_header: CsrfTokenHeader,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            site,
            csrf_header,
            csrf_token: RwLock::new(None),
        })
    }

    /// Create a session client with a pre-built `reqwest::Client`.
    ///
    /// Use this when the client already carries a cookie jar (tests, or a
    /// shared transport).
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        site: String,
        csrf_header: CsrfTokenHeader,
    ) -> Self {
        Self {
            http,
            base_url,
            site,
            csrf_header,
            csrf_token: RwLock::new(None),
        }
    }

    /// The site identifier this client operates on.
    pub fn site(&self) -> &str {
        &self.site
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Authenticate with the controller using username/password.
    ///
    /// `POST /api/auth/login`. On success the session cookie is stored in
    /// the cookie jar and the CSRF token is captured from the configured
    /// response header. Any non-success status is an authentication error.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.base_url.join(LOGIN_PATH).map_err(Error::InvalidUrl)?;

        debug!(%url, username, "logging in");

        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        // Capture the CSRF token — required for all state-changing
        // requests through the proxy.
        match resp
            .headers()
            .get(self.csrf_header.header_name())
            .and_then(|v| v.to_str().ok())
        {
            Some(token) => self.set_csrf_token(token.to_owned()),
            None => debug!(
                header = self.csrf_header.header_name(),
                "login response carried no CSRF token"
            ),
        }

        debug!("login successful");
        Ok(())
    }

    /// End the current session.
    ///
    /// `POST /api/auth/logout` with the stored CSRF token. Callers treat
    /// failures as best-effort cleanup and log rather than escalate.
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.base_url.join(LOGOUT_PATH).map_err(Error::InvalidUrl)?;

        debug!(%url, "logging out");

        let builder = self.apply_csrf(self.http.post(url));
        let resp = builder.send().await.map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: format!("logout failed: {body}"),
            });
        }

        debug!("logout complete");
        Ok(())
    }

    // ── CSRF token management ────────────────────────────────────────

    /// Store a CSRF token (captured from login response headers).
    fn set_csrf_token(&self, token: String) {
        debug!("storing CSRF token");
        *self.csrf_token.write().expect("CSRF lock poisoned") = Some(token);
    }

    /// Update the CSRF token if the response carries a rotated value.
    fn update_csrf_from_response(&self, headers: &reqwest::header::HeaderMap) {
        let new_token = headers
            .get(self.csrf_header.header_name())
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        if let Some(token) = new_token {
            trace!("CSRF token rotated");
            *self.csrf_token.write().expect("CSRF lock poisoned") = Some(token);
        }
    }

    /// Apply the stored CSRF token to a request builder.
    fn apply_csrf(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self
            .csrf_token
            .read()
            .expect("CSRF lock poisoned")
            .clone();
        match token {
            Some(token) => builder.header("x-csrf-token", token),
            None => builder,
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a site-scoped URL: `{base}/proxy/network/api/s/{site}/{path}`
    pub(crate) fn site_url(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(&format!("{PROXY_PREFIX}/api/s/{}/{path}", self.site))
            .map_err(Error::InvalidUrl)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and unwrap the response envelope.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;

        self.parse_envelope(resp).await
    }

    /// Send a PUT request with JSON body and unwrap the response envelope.
    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<Vec<T>, Error> {
        debug!("PUT {}", url);

        let builder = self.apply_csrf(self.http.put(url).json(body));
        let resp = builder.send().await.map_err(Error::Transport)?;

        self.parse_envelope(resp).await
    }

    /// Parse the `{ meta?, data }` envelope, returning `data` on success
    /// or an error if the status or `meta.rc` says otherwise.
    async fn parse_envelope<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<Vec<T>, Error> {
        let status = resp.status();

        // Capture any CSRF token rotation before consuming the response.
        self.update_csrf_from_response(resp.headers());

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "session expired or invalid credentials".into(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body[..body.len().min(200)].to_owned(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            let preview = &body[..body.len().min(200)];
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })?;

        if let Some(meta) = &envelope.meta {
            if meta.rc != "ok" {
                return Err(Error::Api {
                    status: status.as_u16(),
                    message: meta
                        .msg
                        .clone()
                        .unwrap_or_else(|| format!("rc={}", meta.rc)),
                });
            }
        }

        Ok(envelope.data)
    }
}
