use std::sync::Arc;

use reqwest::{
    cookie::{CookieStore, Jar},
    header::{HeaderMap, HeaderValue, COOKIE},
    Client,
};
use url::Url;

pub mod download;
pub mod errors;
pub mod login;
mod rest;

use errors::ApiError;

pub const URL_AUTHENTICATION: &str =
    "https://edocperso.fr/index.php?api=Authenticate&a=doAuthentication";
pub const URL_GET_FOLDERS_AND_FILES: &str =
    "https://v2-app.edocperso.fr/edocPerso/V1/edpUser/getFoldersAndFiles";
pub const URL_GET_CONTENT: &str = "https://v2-app.edocperso.fr/edocPerso/V1/edpDoc/getContent";

/// Authenticated session
///
/// Handed out by [`Api::authenticate`] and only ever read afterwards.
#[derive(Debug, Clone)]
pub struct Context {
    /// Session token, sent as `sessionId`
    token: String,
    /// Cookies set by the service during login
    cookie_jar: Arc<Jar>,
}

impl Context {
    pub fn new(token: impl Into<String>, cookie_jar: Arc<Jar>) -> Self {
        Context {
            token: token.into(),
            cookie_jar,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Cookie header of this session for a request to `url`
    pub fn cookies_for(&self, url: &str) -> Option<HeaderValue> {
        let url = Url::parse(url).ok()?;
        self.cookie_jar.cookies(&url)
    }
}

/// Headers carrying the session cookies for a request to `url`
fn session_cookies(context: &Context, url: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(cookies) = context.cookies_for(url) {
        headers.insert(COOKIE, cookies);
    }
    headers
}

/// The main api struct
#[derive(Debug, Clone)]
pub struct Api {
    /// The cookie jar that will contain the session cookies
    cookie_jar: Arc<Jar>,
    /// The client used for requests
    client: Client,
}

impl Api {
    pub fn new() -> Result<Self, ApiError> {
        let cookie_jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(cookie_jar.clone())
            .build()?;
        Ok(Api { cookie_jar, client })
    }
}
