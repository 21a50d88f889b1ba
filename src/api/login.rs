use reqwest::header::ACCEPT;
use serde_json::{json, Value};
use tracing::{debug, info, trace};
use url::Url;

use super::{errors::ApiError, Api, Context, URL_AUTHENTICATION};

impl Api {
    /// Logs in with username and password
    ///
    /// The service answers with a login url whose last path segment is the
    /// session token. Visiting that url registers the session server side.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Context, ApiError> {
        let response: Value = self
            .client
            .post(URL_AUTHENTICATION)
            .header(ACCEPT, "application/json")
            .json(&json!({ "login": login, "password": password }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        trace!("Response for authentication: {:?}", response);

        if response["status"].as_str() != Some("success") {
            return Err(ApiError::Rejected(match &response["content"] {
                Value::String(message) => message.clone(),
                other => other.to_string(),
            }));
        }
        info!("Authenticated");

        let login_url = response["content"]["loginUrl"]
            .as_str()
            .ok_or(ApiError::MissingLoginUrl)?;
        let token = token_from_login_url(login_url)?;
        debug!("Login url: {}", login_url);

        // Server side session state
        self.client
            .get(login_url)
            .send()
            .await?
            .error_for_status()?;
        debug!("Login ok");

        Ok(Context::new(token, self.cookie_jar.clone()))
    }
}

/// Extracts the session token (the last path segment) from a login url
fn token_from_login_url(login_url: &str) -> Result<String, ApiError> {
    let invalid = || ApiError::InvalidLoginUrl(login_url.to_string());
    let url = Url::parse(login_url).map_err(|_| invalid())?;
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(invalid)
}
