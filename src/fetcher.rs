//! Catalogue export API client.
//!
//! One blocking POST per catalogue. The provider sometimes prepends banner
//! or diagnostic lines to the XML body; those are stripped before the
//! payload is handed to the flattener.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{CatalogueError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://openapi.efsa.europa.eu/api/catalogues/catalogue-file";
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const EXPORT_TYPE: &str = "catalogFullDefinition";
const FILE_TYPE: &str = "XML";

/// Anything that can produce the raw XML export of a catalogue.
pub trait CatalogueSource {
    fn fetch(&self, catalogue_code: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExportRequest<'a> {
    export_catalogue_file: ExportCatalogueFile<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportCatalogueFile<'a> {
    catalogue_code: &'a str,
    /// Empty selects the latest published version.
    catalogue_version: &'a str,
    export_type: &'a str,
    group: &'a str,
    dc_code: &'a str,
    file_type: &'a str,
}

impl<'a> ExportRequest<'a> {
    fn full_definition(catalogue_code: &'a str) -> Self {
        Self {
            export_catalogue_file: ExportCatalogueFile {
                catalogue_code,
                catalogue_version: "",
                export_type: EXPORT_TYPE,
                group: "",
                dc_code: "",
                file_type: FILE_TYPE,
            },
        }
    }
}

/// Drops every line whose trimmed content does not start with `<` and
/// joins the remainder with `\n`.
pub fn strip_preamble(body: &str) -> String {
    let mut dropped = 0usize;
    let kept: Vec<&str> = body
        .lines()
        .filter(|line| {
            let keep = line.trim().starts_with('<');
            if !keep && !line.trim().is_empty() {
                dropped += 1;
            }
            keep
        })
        .collect();

    if dropped > 0 {
        warn!(lines = dropped, "Stripped non-XML lines from export body");
    }
    kept.join("\n")
}

/// HTTP client for the catalogue export endpoint.
pub struct CatalogueFetcher {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl CatalogueFetcher {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogueError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.require_api_key()?,
            settings.endpoint.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

impl CatalogueSource for CatalogueFetcher {
    fn fetch(&self, catalogue_code: &str) -> Result<String> {
        let fail = |reason: String| CatalogueError::Fetch {
            catalogue: catalogue_code.to_string(),
            reason,
        };

        debug!(endpoint = %self.endpoint, catalogue = catalogue_code, "Requesting catalogue export");

        let response = self
            .http
            .post(&self.endpoint)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .json(&ExportRequest::full_definition(catalogue_code))
            .send()
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(fail(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response
            .text()
            .map_err(|e| fail(format!("unreadable response body: {}", e)))?;

        let xml = strip_preamble(&body);
        info!(catalogue = catalogue_code, bytes = xml.len(), "Fetched catalogue export");
        Ok(xml)
    }
}

/// One-shot fetch against the default endpoint.
pub fn fetch(api_key: &str, catalogue_code: &str) -> Result<String> {
    CatalogueFetcher::new(api_key, DEFAULT_ENDPOINT, Duration::from_secs(DEFAULT_TIMEOUT_SECS))?
        .fetch(catalogue_code)
}
