use indicatif::ProgressStyle;
use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use super::{errors::DownloadError, session_cookies, Api, Context, URL_GET_CONTENT};
use crate::materialize::Downloader;

const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

impl Downloader for Api {
    async fn download(&self, context: &Context, document_id: &str) -> Result<Vec<u8>, DownloadError> {
        self.get_content(URL_GET_CONTENT, context, document_id).await
    }
}

impl Api {
    /// Downloads the contents of a document with a progress bar
    #[instrument(skip(self, url, context))]
    async fn get_content(
        &self,
        url: &str,
        context: &Context,
        document_id: &str,
    ) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/octet-stream")
            .json(&json!({ "sessionId": context.token(), "documentId": document_id }))
            .headers(session_cookies(context, url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DownloadError::Http {
                status: response.status().as_u16(),
                document_id: document_id.to_string(),
            });
        }

        let total_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|ct_len| ct_len.to_str().ok())
            .and_then(|ct_len| ct_len.parse::<u64>().ok());

        // Animation
        let style = match total_size {
            Some(total_size) => {
                Span::current().pb_set_length(total_size);
                let mut template = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) Document: ".to_string();
                template.push_str(document_id);
                ProgressStyle::default_bar()
                    .template(&template)
                    .map(|style| style.progress_chars("#>-"))
            }
            None => {
                let mut template = "{spinner:.green} [{elapsed_precise}] {bytes} Document: ".to_string();
                template.push_str(document_id);
                ProgressStyle::default_spinner().template(&template)
            }
        };
        if let Ok(style) = style {
            Span::current().pb_set_style(&style);
        }
        Span::current().pb_set_position(0);

        // Content-Length is only a hint
        let mut contents = Vec::with_capacity(total_size.unwrap_or(0).min(MAX_PREALLOCATION) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            contents.extend_from_slice(&chunk);
            Span::current().pb_set_position(contents.len() as u64);
        }

        Ok(contents)
    }
}
