use reqwest::header::ACCEPT;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{errors::ApiError, session_cookies, Api, Context, URL_GET_FOLDERS_AND_FILES};

impl Api {
    /// Fetches the raw folder and file listing of the logged in user
    pub async fn get_folders_and_files(&self, context: &Context) -> Result<Value, ApiError> {
        debug!("Requesting folders and files");
        let listing = self
            .client
            .post(URL_GET_FOLDERS_AND_FILES)
            .header(ACCEPT, "application/json")
            .json(&json!({ "sessionId": context.token() }))
            .headers(session_cookies(context, URL_GET_FOLDERS_AND_FILES))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!("Got files list");
        Ok(listing)
    }
}
