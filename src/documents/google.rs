//! Google Drive / Sheets Document Service
//!
//! - Template copies, HTML export and media re-upload go through Drive v3
//! - Domain sharing uses Drive permissions
//! - Transcript rows are appended with the Sheets v4 values API

use super::auth::TokenProvider;
use super::{Document, DocumentError, DocumentService};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Base URLs for the Google APIs in use
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub drive: String,
    pub upload: String,
    pub sheets: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            drive: "https://www.googleapis.com/drive/v3".to_string(),
            upload: "https://www.googleapis.com/upload/drive/v3".to_string(),
            sheets: "https://sheets.googleapis.com/v4".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// All APIs under one root, laid out like the public hosts
    pub fn rooted(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            drive: format!("{}/drive/v3", base),
            upload: format!("{}/upload/drive/v3", base),
            sheets: format!("{}/v4", base),
        }
    }
}

/// Column range transcript rows are appended to
const TRANSCRIPT_RANGE: &str = "A:D";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

/// Google-backed document service
#[derive(Clone)]
pub struct GoogleDocs {
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    endpoints: GoogleEndpoints,
}

impl GoogleDocs {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        endpoints: GoogleEndpoints,
        timeout: Duration,
    ) -> Result<Self, DocumentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DocumentError::Request(e.to_string()))?;

        Ok(Self {
            client,
            tokens,
            endpoints,
        })
    }

    async fn send(
        &self,
        doc_id: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DocumentError> {
        let token = self.tokens.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DocumentError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == 404 {
            return Err(DocumentError::NotFound(doc_id.to_string()));
        }

        let message = response.text().await.unwrap_or_default();
        Err(DocumentError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DocumentService for GoogleDocs {
    async fn create_from_template(
        &self,
        title: &str,
        template_id: &str,
    ) -> Result<Document, DocumentError> {
        debug!("Copying template {} as {:?}", template_id, title);
        let url = format!("{}/files/{}/copy", self.endpoints.drive, template_id);
        let request = self
            .client
            .post(url)
            .query(&[("fields", "id,webViewLink"), ("supportsAllDrives", "true")])
            .json(&json!({ "name": title }));

        let file: DriveFile = self
            .send(template_id, request)
            .await?
            .json()
            .await
            .map_err(|e| DocumentError::Malformed(e.to_string()))?;

        let link = file
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/open?id={}", file.id));
        Ok(Document { id: file.id, link })
    }

    async fn fetch_content(&self, doc_id: &str, mime: &str) -> Result<String, DocumentError> {
        let url = format!("{}/files/{}/export", self.endpoints.drive, doc_id);
        let request = self.client.get(url).query(&[("mimeType", mime)]);

        self.send(doc_id, request)
            .await?
            .text()
            .await
            .map_err(|e| DocumentError::Malformed(e.to_string()))
    }

    async fn replace_content(&self, doc_id: &str, html: &str) -> Result<(), DocumentError> {
        let url = format!("{}/files/{}", self.endpoints.upload, doc_id);
        let request = self
            .client
            .patch(url)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, super::HTML_MIME)
            .body(html.to_string());

        self.send(doc_id, request).await?;
        Ok(())
    }

    async fn share_with_domain(
        &self,
        doc_id: &str,
        domain: &str,
        role: &str,
    ) -> Result<(), DocumentError> {
        let url = format!("{}/files/{}/permissions", self.endpoints.drive, doc_id);
        let request = self
            .client
            .post(url)
            .query(&[("supportsAllDrives", "true")])
            .json(&json!({ "type": "domain", "role": role, "domain": domain }));

        self.send(doc_id, request).await?;
        Ok(())
    }

    async fn append_row(&self, doc_id: &str, row: Vec<String>) -> Result<(), DocumentError> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append",
            self.endpoints.sheets, doc_id, TRANSCRIPT_RANGE
        );
        let request = self
            .client
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": [row] }));

        self.send(doc_id, request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::StaticToken;
    use httpmock::prelude::*;

    fn docs_for(server: &MockServer) -> GoogleDocs {
        GoogleDocs::new(
            Arc::new(StaticToken("ya29.test".to_string())),
            GoogleEndpoints::rooted(&server.base_url()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_from_template_copies_with_title() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/drive/v3/files/tmpl-1/copy")
                .header("authorization", "Bearer ya29.test")
                .body_includes("\"name\":\"Flare: db down\"");
            then.status(200).json_body(json!({
                "id": "doc-9",
                "webViewLink": "https://docs.google.com/document/d/doc-9/edit"
            }));
        });

        let doc = docs_for(&server)
            .create_from_template("Flare: db down", "tmpl-1")
            .await
            .unwrap();
        assert_eq!(doc.id, "doc-9");
        assert_eq!(doc.link, "https://docs.google.com/document/d/doc-9/edit");
        mock.assert();
    }

    #[tokio::test]
    async fn test_fetch_content_exports_mime() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/drive/v3/files/doc-1/export")
                .query_param("mimeType", "text/html");
            then.status(200).body("<p>[SUMMARY]</p>");
        });

        let html = docs_for(&server)
            .fetch_content("doc-1", crate::documents::HTML_MIME)
            .await
            .unwrap();
        assert_eq!(html, "<p>[SUMMARY]</p>");
    }

    #[tokio::test]
    async fn test_replace_content_uploads_media() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/upload/drive/v3/files/doc-1")
                .query_param("uploadType", "media")
                .header("content-type", "text/html")
                .body("<p>done</p>");
            then.status(200).json_body(json!({"id": "doc-1"}));
        });

        docs_for(&server)
            .replace_content("doc-1", "<p>done</p>")
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_share_with_domain_posts_permission() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/drive/v3/files/doc-1/permissions")
                .body_includes("\"type\":\"domain\"")
                .body_includes("\"domain\":\"example.com\"")
                .body_includes("\"role\":\"writer\"");
            then.status(200).json_body(json!({"id": "perm-1"}));
        });

        docs_for(&server)
            .share_with_domain("doc-1", "example.com", "writer")
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_append_row_posts_values() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v4/spreadsheets/sheet-1/values/A:D:append")
                .query_param("valueInputOption", "RAW")
                .body_includes("\"values\":[[\"1.2\",\"t\",\"ada\",\"hi\"]]");
            then.status(200).json_body(json!({"updates": {}}));
        });

        docs_for(&server)
            .append_row(
                "sheet-1",
                vec!["1.2".into(), "t".into(), "ada".into(), "hi".into()],
            )
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_missing_document_maps_to_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/drive/v3/files/gone/export");
            then.status(404).body("not found");
        });

        let err = docs_for(&server)
            .fetch_content("gone", crate::documents::CSV_MIME)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(id) if id == "gone"));
    }

    #[tokio::test]
    async fn test_server_error_carries_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/drive/v3/files/tmpl/copy");
            then.status(500).body("backend error");
        });

        let err = docs_for(&server)
            .create_from_template("x", "tmpl")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Api { status: 500, .. }));
    }
}
