//! Document Service Layer
//!
//! Tracking and transcript documents live in Google Drive. The incident core only
//! sees the [`DocumentService`] trait; `google` implements it over Drive v3 and
//! Sheets v4, `auth` mints the service-account bearer tokens.

pub mod auth;
pub mod google;

pub use auth::{ServiceAccountKey, ServiceAccountTokens, StaticToken, TokenProvider};
pub use google::{GoogleDocs, GoogleEndpoints};

use async_trait::async_trait;

/// MIME type used to read and rewrite tracking documents
pub const HTML_MIME: &str = "text/html";

/// MIME type used to read transcript spreadsheets
pub const CSV_MIME: &str = "text/csv";

/// Document service errors
///
/// `Clone` to match [`crate::channels::ChannelError`]; both end up in incident reports.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DocumentError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Document API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// A document created from a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    /// Stable browser link
    pub link: String,
}

/// Document operations the incident core needs
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Copy a template into a new document with the given title
    async fn create_from_template(
        &self,
        title: &str,
        template_id: &str,
    ) -> Result<Document, DocumentError>;

    /// Export a document's content in the given MIME type
    async fn fetch_content(&self, doc_id: &str, mime: &str) -> Result<String, DocumentError>;

    /// Replace a document's content with HTML
    async fn replace_content(&self, doc_id: &str, html: &str) -> Result<(), DocumentError>;

    /// Grant `role` on a document to everyone in `domain`
    async fn share_with_domain(
        &self,
        doc_id: &str,
        domain: &str,
        role: &str,
    ) -> Result<(), DocumentError>;

    /// Append one row to a spreadsheet document
    async fn append_row(&self, doc_id: &str, row: Vec<String>) -> Result<(), DocumentError>;
}
