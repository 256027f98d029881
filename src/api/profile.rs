//! Item profile pages (`{Model}/{id}/ProfilePage`): files, requirements,
//! submitter and gallery for the detail overlay.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::records::{clean, lenient_i64, lenient_object, lenient_u64, truthy};
use crate::feed::{ItemId, ItemKind};
use crate::util::html_to_text;

/// Direct file downloads live at `{DOWNLOAD_BASE}/{file id}`.
pub const DOWNLOAD_BASE: &str = "https://gamebanana.com/dl";

/// Everything the detail overlay shows about one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProfile {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub added_at: Option<DateTime<Utc>>,
    pub views: u64,
    pub likes: u64,
    pub downloads: u64,
    /// Plain text converted from the HTML body; empty when there is none.
    pub description: String,
    pub license: Option<String>,
    pub page_url: Option<String>,
    pub download_url: Option<String>,
    /// Full-size image URLs in upstream order.
    pub gallery: Vec<String>,
    pub requirements: Vec<Requirement>,
    pub files: Vec<ProfileFile>,
    pub submitter: Option<Submitter>,
    pub game: Option<String>,
}

/// Another item this one depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFile {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub size: u64,
    pub downloads: u64,
    pub md5: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
}

impl ProfileFile {
    pub fn download_url(&self) -> String {
        format!("{}/{}", DOWNLOAD_BASE, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitter {
    pub name: String,
    pub title: Option<String>,
    pub profile_url: Option<String>,
    pub online: bool,
    /// Medal titles, normal then rare then legendary.
    pub medals: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProfile {
    #[serde(rename = "_sName", default)]
    name: Option<String>,
    #[serde(rename = "_tsDateAdded", default, deserialize_with = "lenient_i64")]
    date_added: Option<i64>,
    #[serde(rename = "_nViewCount", default, deserialize_with = "lenient_u64")]
    views: Option<u64>,
    #[serde(rename = "_nLikeCount", default, deserialize_with = "lenient_u64")]
    likes: Option<u64>,
    #[serde(rename = "_nDownloadCount", default, deserialize_with = "lenient_u64")]
    downloads: Option<u64>,
    #[serde(rename = "_sText", default)]
    text: Option<String>,
    #[serde(rename = "_sDescription", default)]
    description: Option<String>,
    #[serde(rename = "_sLicense", default)]
    license: Option<String>,
    #[serde(rename = "_sProfileUrl", default)]
    profile_url: Option<String>,
    #[serde(rename = "_sDownloadUrl", default)]
    download_url: Option<String>,
    #[serde(rename = "_aPreviewMedia", default)]
    preview_media: Option<Value>,
    #[serde(rename = "_aRequirements", default)]
    requirements: Option<Value>,
    #[serde(rename = "_aFiles", default)]
    files: Option<Value>,
    #[serde(rename = "_aSubmitter", default, deserialize_with = "lenient_object")]
    submitter: Option<RawSubmitter>,
    #[serde(rename = "_aGame", default, deserialize_with = "lenient_object")]
    game: Option<RawGame>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    #[serde(rename = "_idRow", default, deserialize_with = "lenient_u64")]
    id: Option<u64>,
    #[serde(rename = "_sFile", default)]
    name: Option<String>,
    #[serde(rename = "_sDescription", default)]
    description: Option<String>,
    #[serde(rename = "_nFilesize", default, deserialize_with = "lenient_u64")]
    size: Option<u64>,
    #[serde(rename = "_nDownloadCount", default, deserialize_with = "lenient_u64")]
    downloads: Option<u64>,
    #[serde(rename = "_sMd5Checksum", default)]
    md5: Option<String>,
    #[serde(rename = "_tsDateAdded", default, deserialize_with = "lenient_i64")]
    date_added: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSubmitter {
    #[serde(rename = "_sName", default)]
    name: Option<String>,
    #[serde(rename = "_sUserTitle", default)]
    title: Option<String>,
    #[serde(rename = "_sProfileUrl", default)]
    profile_url: Option<String>,
    #[serde(rename = "_bIsOnline", default, deserialize_with = "truthy")]
    online: bool,
    #[serde(rename = "_aNormalMedals", default)]
    normal_medals: Option<Value>,
    #[serde(rename = "_aRareMedals", default)]
    rare_medals: Option<Value>,
    #[serde(rename = "_aLegendaryMedals", default)]
    legendary_medals: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGame {
    #[serde(rename = "_sName", default)]
    name: Option<String>,
}

/// Parses a ProfilePage body.
///
/// Like feed records, every field is optional: files without an id and
/// requirements without a name are skipped, missing counters read as zero.
///
/// # Arguments
///
/// * `bytes` - Response body
/// * `kind` - Model the page was requested for
/// * `id` - Item id the page was requested for
///
/// # Errors
///
/// Returns an error if the body is not a JSON object.
pub fn parse_profile(
    bytes: &[u8],
    kind: ItemKind,
    id: ItemId,
) -> Result<ItemProfile, serde_json::Error> {
    let raw: RawProfile = serde_json::from_slice(bytes)?;

    let description = raw
        .text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or(raw.description.as_deref())
        .map(html_to_text)
        .unwrap_or_default();

    Ok(ItemProfile {
        id,
        kind,
        name: raw.name.map(|n| clean(&n)).unwrap_or_default(),
        added_at: timestamp(raw.date_added),
        views: raw.views.unwrap_or(0),
        likes: raw.likes.unwrap_or(0),
        downloads: raw.downloads.unwrap_or(0),
        description,
        license: raw
            .license
            .map(|l| html_to_text(&l))
            .filter(|l| !l.is_empty()),
        page_url: raw.profile_url.filter(|u| !u.is_empty()),
        download_url: raw.download_url.filter(|u| !u.is_empty()),
        gallery: raw.preview_media.as_ref().map(gallery).unwrap_or_default(),
        requirements: raw
            .requirements
            .as_ref()
            .map(requirements)
            .unwrap_or_default(),
        files: raw.files.map(files).unwrap_or_default(),
        submitter: raw.submitter.map(submitter),
        game: raw.game.and_then(|g| g.name).map(|n| clean(&n)),
    })
}

fn timestamp(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.filter(|ts| *ts > 0)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| clean(&s)).filter(|s| !s.is_empty())
}

fn gallery(media: &Value) -> Vec<String> {
    let Some(images) = media.get("_aImages").and_then(Value::as_array) else {
        return Vec::new();
    };
    images
        .iter()
        .filter_map(|image| {
            let file = image.get("_sFile").and_then(Value::as_str)?;
            let base = image
                .get("_sBaseUrl")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim_end_matches('/');
            Some(format!("{}/{}", base, file))
        })
        .collect()
}

/// Requirements arrive as `[name, url]` pairs.
fn requirements(value: &Value) -> Vec<Requirement> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let pair = entry.as_array()?;
            let name = pair.first()?.as_str().map(clean).filter(|n| !n.is_empty())?;
            let url = pair
                .get(1)
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
                .map(String::from);
            Some(Requirement { name, url })
        })
        .collect()
}

fn files(value: Value) -> Vec<ProfileFile> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawFile>(entry) {
            Ok(raw) => Some(ProfileFile {
                id: raw.id?,
                name: non_empty(raw.name).unwrap_or_else(|| "(unnamed)".to_string()),
                description: non_empty(raw.description),
                size: raw.size.unwrap_or(0),
                downloads: raw.downloads.unwrap_or(0),
                md5: non_empty(raw.md5),
                added_at: timestamp(raw.date_added),
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed file entry");
                None
            }
        })
        .collect()
}

fn submitter(raw: RawSubmitter) -> Submitter {
    let medals = [raw.normal_medals, raw.rare_medals, raw.legendary_medals]
        .into_iter()
        .flatten()
        .filter_map(|list| match list {
            Value::Array(items) => Some(items),
            _ => None,
        })
        .flatten()
        .filter_map(|medal| medal.get(1).and_then(Value::as_str).map(clean))
        .collect();
    Submitter {
        name: non_empty(raw.name).unwrap_or_else(|| "Unknown".to_string()),
        title: non_empty(raw.title),
        profile_url: raw.profile_url.filter(|u| !u.is_empty()),
        online: raw.online,
        medals,
    }
}

/// Human-readable byte count: `0 B`, `512 B`, `1.5 KB`, `2.25 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        return format!("{} B", bytes);
    }
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}
