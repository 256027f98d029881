use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{read_limited_bytes, ApiError};
use crate::util::atomic_write;

/// Term lists from the dictionary dataset run to a few megabytes.
const MAX_TERMS_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TermsError {
    #[error("Failed to read term list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid term list JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Term list too large ({size} bytes, max {max} bytes)")]
    TooLarge { size: u64, max: u64 },
    #[error("Downloaded term list is empty")]
    Empty,
    #[error(transparent)]
    Fetch(#[from] ApiError),
}

/// One source → target pair. Extra fields in the dataset are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TermEntry {
    #[serde(rename = "en", alias = "sourceTerm", default, deserialize_with = "nullable")]
    pub en: String,
    #[serde(rename = "zhCN", alias = "targetTerm", default, deserialize_with = "nullable")]
    pub zh_cn: String,
}

impl TermEntry {
    pub fn new(en: impl Into<String>, zh_cn: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            zh_cn: zh_cn.into(),
        }
    }
}

fn nullable<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn parse_terms(bytes: &[u8]) -> Result<Vec<TermEntry>, TermsError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Reads a term list file (a JSON array of entries).
pub fn read_term_file(path: &Path) -> Result<Vec<TermEntry>, TermsError> {
    let io_err = |source| TermsError::Io {
        path: path.display().to_string(),
        source,
    };
    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > MAX_TERMS_SIZE as u64 {
        return Err(TermsError::TooLarge {
            size,
            max: MAX_TERMS_SIZE as u64,
        });
    }
    let bytes = std::fs::read(path).map_err(io_err)?;
    parse_terms(&bytes)
}

/// Reads the default list and, if given, the custom list after it.
///
/// The default list must be readable. A missing or broken custom list is
/// logged and skipped so one bad local edit does not disable translation.
///
/// # Arguments
///
/// * `default` - Downloaded list; its entries come first
/// * `custom` - Optional user list appended after the default one
///
/// # Errors
///
/// Returns an error if the default list is missing, oversized or not a
/// JSON array of entries.
pub fn read_term_lists(default: &Path, custom: Option<&Path>) -> Result<Vec<TermEntry>, TermsError> {
    let mut terms = read_term_file(default)?;
    tracing::debug!(path = %default.display(), entries = terms.len(), "Read default term list");

    if let Some(custom) = custom {
        match read_term_file(custom) {
            Ok(extra) => {
                tracing::debug!(path = %custom.display(), entries = extra.len(), "Read custom term list");
                terms.extend(extra);
            }
            Err(TermsError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %custom.display(), "No custom term list");
            }
            Err(e) => {
                tracing::warn!(path = %custom.display(), error = %e, "Skipping custom term list");
            }
        }
    }
    Ok(terms)
}

/// Downloads the remote term list and stores it at `dest`.
///
/// The body is parsed before anything is written, so on any failure the
/// existing file stays as it was.
///
/// # Arguments
///
/// * `client` - Shared HTTP client (redirect policy and timeout applied)
/// * `url` - Location of the JSON term list
/// * `dest` - File to replace, usually `words.json` in the config directory
///
/// # Returns
///
/// The number of entries stored.
///
/// # Errors
///
/// * `TermsError::Fetch` - Request failed, non-success status, or body over the size limit
/// * `TermsError::Parse` - Body is not a JSON array of entries
/// * `TermsError::Empty` - Array parsed but held no entries
/// * `TermsError::Io` - Writing `dest` failed
pub async fn update_terms(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<usize, TermsError> {
    tracing::info!(url, "Downloading term list");
    let response = client.get(url).send().await.map_err(ApiError::from_reqwest)?;
    if !response.status().is_success() {
        return Err(ApiError::HttpStatus(response.status().as_u16()).into());
    }

    let bytes = read_limited_bytes(response, MAX_TERMS_SIZE).await?;
    let terms = parse_terms(&bytes)?;
    if terms.is_empty() {
        return Err(TermsError::Empty);
    }

    atomic_write(dest, &bytes).map_err(|source| TermsError::Io {
        path: dest.display().to_string(),
        source,
    })?;
    tracing::info!(path = %dest.display(), entries = terms.len(), "Term list updated");
    Ok(terms.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("bananaview-terms-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_accepts_both_field_spellings() {
        let json = r#"[
            {"en": "Ganyu", "zhCN": "甘雨", "ja": "甘雨", "tags": ["character"]},
            {"sourceTerm": "Vision", "targetTerm": "神之眼"},
            {"en": "Orphan", "zhCN": null}
        ]"#;
        let terms = parse_terms(json.as_bytes()).unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0], TermEntry::new("Ganyu", "甘雨"));
        assert_eq!(terms[1], TermEntry::new("Vision", "神之眼"));
        assert_eq!(terms[2].zh_cn, "");
    }

    #[test]
    fn test_custom_list_appended_after_default() {
        let dir = scratch("merge");
        let default = dir.join("words.json");
        let custom = dir.join("custom-words.json");
        std::fs::write(&default, r#"[{"en":"a","zhCN":"甲"}]"#).unwrap();
        std::fs::write(&custom, r#"[{"en":"b","zhCN":"乙"}]"#).unwrap();

        let terms = read_term_lists(&default, Some(&custom)).unwrap();
        assert_eq!(terms, vec![TermEntry::new("a", "甲"), TermEntry::new("b", "乙")]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_broken_custom_list_is_skipped() {
        let dir = scratch("broken");
        let default = dir.join("words.json");
        let custom = dir.join("custom-words.json");
        std::fs::write(&default, r#"[{"en":"a","zhCN":"甲"}]"#).unwrap();
        std::fs::write(&custom, "{oops").unwrap();

        let terms = read_term_lists(&default, Some(&custom)).unwrap();
        assert_eq!(terms.len(), 1);

        let missing = dir.join("nope.json");
        assert!(read_term_lists(&missing, None).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_update_terms_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/words.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"en":"Nahida","zhCN":"纳西妲"}]"#))
            .mount(&server)
            .await;

        let dir = scratch("update");
        let dest = dir.join("words.json");
        let client = reqwest::Client::new();
        let count = update_terms(&client, &format!("{}/words.json", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(read_term_file(&dest).unwrap()[0].zh_cn, "纳西妲");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_update_terms_failure_keeps_existing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let dir = scratch("keep");
        let dest = dir.join("words.json");
        std::fs::write(&dest, r#"[{"en":"old","zhCN":"旧"}]"#).unwrap();

        let client = reqwest::Client::new();
        let result = update_terms(&client, &format!("{}/words.json", server.uri()), &dest).await;

        assert!(matches!(result, Err(TermsError::Fetch(ApiError::HttpStatus(502)))));
        assert_eq!(read_term_file(&dest).unwrap()[0].en, "old");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
