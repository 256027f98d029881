//! Upstream record shapes and their normalization into [`ResolvedItem`].
//!
//! The API is loose about types (ids and counters arrive as numbers or
//! strings, empty objects as `[]`), so every field is optional and parsed
//! leniently. A record that still fails to parse is skipped on its own
//! without failing the page.

use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::feed::{
    Author, Category, FeedMode, FeedPage, ItemId, ItemKind, ItemStats, ResolvedItem, ThumbQuality,
};
use crate::util::strip_control_chars;

const UNKNOWN_AUTHOR: &str = "Unknown";

/// Top level of a Subfeed or Subscriptions page.
#[derive(Debug, Default, Deserialize)]
pub struct RawPage {
    #[serde(rename = "_aRecords", alias = "records", default)]
    records: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "_idRow", default, deserialize_with = "lenient_u64")]
    pub id: Option<u64>,
    #[serde(rename = "_sModelName", default)]
    pub model_name: Option<String>,
    #[serde(rename = "_sName", default)]
    pub name: Option<String>,
    #[serde(rename = "_sProfileUrl", default)]
    pub profile_url: Option<String>,
    #[serde(rename = "_aSubmitter", default, deserialize_with = "lenient_object")]
    pub submitter: Option<RawSubmitter>,
    #[serde(rename = "_aPreviewMedia", default)]
    pub preview_media: Option<Value>,
    #[serde(rename = "_sSnippet", default)]
    pub snippet: Option<String>,
    #[serde(rename = "_tsDateAdded", default, deserialize_with = "lenient_i64")]
    pub date_added: Option<i64>,
    #[serde(rename = "_nLikeCount", default, deserialize_with = "lenient_u64")]
    pub likes: Option<u64>,
    #[serde(rename = "_nViewCount", default, deserialize_with = "lenient_u64")]
    pub views: Option<u64>,
    #[serde(rename = "_bHasContentRatings", default, deserialize_with = "truthy")]
    pub has_content_ratings: bool,
    #[serde(rename = "_aSubscription", default, deserialize_with = "lenient_object")]
    pub subscription: Option<Box<RawRecord>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawSubmitter {
    #[serde(rename = "_sName", default)]
    pub name: Option<String>,
    #[serde(rename = "_sProfileUrl", default)]
    pub profile_url: Option<String>,
}

/// Parses a page body and normalizes its records.
///
/// An absent, null or empty record array yields a page with `raw == 0`,
/// which the controller treats as the end of the feed. Records that fail to
/// normalize still count towards `raw`.
///
/// # Errors
///
/// Returns an error if the body is not a JSON object.
pub fn parse_page(
    bytes: &[u8],
    mode: FeedMode,
    quality: ThumbQuality,
) -> Result<FeedPage, serde_json::Error> {
    let page: RawPage = serde_json::from_slice(bytes)?;
    let records = page.records.unwrap_or_default();
    let raw = records.len();

    let items: Vec<ResolvedItem> = records
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawRecord>(value) {
            Ok(record) => normalize(record, mode, quality),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed record");
                None
            }
        })
        .collect();

    if items.len() < raw {
        tracing::warn!(
            mode = %mode,
            skipped = raw - items.len(),
            total = raw,
            "Records without a usable id were skipped"
        );
    }
    Ok(FeedPage { raw, items })
}

/// Converts one upstream record into a [`ResolvedItem`].
///
/// Subscription pages wrap the actual item under `_aSubscription`. Records
/// without an id are dropped.
pub fn normalize(mut record: RawRecord, mode: FeedMode, quality: ThumbQuality) -> Option<ResolvedItem> {
    let source = match record.subscription.take() {
        Some(inner) if mode == FeedMode::Subscriptions => *inner,
        _ => record,
    };

    let id = ItemId(source.id?);
    let kind = ItemKind::from_model_name(source.model_name.as_deref().unwrap_or("Unknown"));
    let category = if kind.needs_lookup() {
        Category::Pending
    } else {
        Category::Resolved {
            label: kind.name().to_string(),
            id: None,
        }
    };

    let thumbnail_url = source
        .preview_media
        .as_ref()
        .and_then(|media| thumbnail_url(media, quality));

    let author = match source.submitter {
        Some(s) => Author {
            name: s
                .name
                .map(|n| clean(&n))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            profile_url: s.profile_url,
        },
        None => Author {
            name: UNKNOWN_AUTHOR.to_string(),
            profile_url: None,
        },
    };

    Some(ResolvedItem {
        id,
        kind,
        name: source.name.map(|n| clean(&n)).unwrap_or_default(),
        author,
        page_url: source.profile_url,
        thumbnail_url,
        snippet: source.snippet.map(|s| clean(&s)).filter(|s| !s.is_empty()),
        category,
        stats: ItemStats {
            likes: source.likes.unwrap_or(0),
            views: source.views.unwrap_or(0),
        },
        added_at: source
            .date_added
            .filter(|ts| *ts > 0)
            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        has_advisory: source.has_content_ratings,
    })
}

pub(super) fn clean(s: &str) -> String {
    strip_control_chars(s).trim().to_string()
}

/// Builds the preview URL from the first image: `{_sBaseUrl}/{file}` where
/// the file is the one for the requested size, falling back to any other.
fn thumbnail_url(media: &Value, quality: ThumbQuality) -> Option<String> {
    let image = media.get("_aImages")?.as_array()?.first()?;
    let file_field = |key: &str| {
        image
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    let preferred = match quality {
        ThumbQuality::Small => file_field("_sFile220"),
        ThumbQuality::Large => file_field("_sFile530"),
    };
    let file = preferred
        .or_else(|| file_field("_sFile530"))
        .or_else(|| file_field("_sFile220"))
        .or_else(|| file_field("_sFile"))?;

    let base = image
        .get("_sBaseUrl")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim_end_matches('/');
    Some(format!("{}/{}", base, file))
}

fn number_from(value: Value) -> Option<serde_json::Number> {
    match value {
        Value::Number(n) => Some(n),
        Value::String(s) => s.trim().parse::<serde_json::Number>().ok(),
        _ => None,
    }
}

pub(super) fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from(value).and_then(|n| n.as_u64()))
}

pub(super) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from(value).and_then(|n| n.as_i64()))
}

pub(super) fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Accepts an object, treating `[]`, `null` or anything unparsable as absent.
pub(super) fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => Ok(serde_json::from_value(value).ok()),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(records: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({ "_aRecords": records })).unwrap()
    }

    fn mod_record(id: u64) -> Value {
        json!({
            "_idRow": id,
            "_sModelName": "Mod",
            "_sName": "Furina Outfit",
            "_sProfileUrl": format!("https://gamebanana.com/mods/{}", id),
            "_aSubmitter": {"_sName": "modder", "_sProfileUrl": "https://gamebanana.com/members/9"},
            "_aPreviewMedia": {"_aImages": [{
                "_sBaseUrl": "https://images.gamebanana.com/img/ss/mods/",
                "_sFile": "full.jpg",
                "_sFile220": "220-90_full.jpg",
                "_sFile530": "530-90_full.jpg"
            }]},
            "_tsDateAdded": 1_700_000_000,
            "_nLikeCount": 12,
            "_nViewCount": "345",
            "_bHasContentRatings": false
        })
    }

    #[test]
    fn test_mod_record_normalized() {
        let items = parse_page(&page(json!([mod_record(5)])), FeedMode::Latest, ThumbQuality::Large).unwrap().items;
        let item = &items[0];

        assert_eq!(item.id, ItemId(5));
        assert_eq!(item.kind, ItemKind::Mod);
        assert_eq!(item.category, Category::Pending);
        assert_eq!(item.name, "Furina Outfit");
        assert_eq!(item.author.name, "modder");
        assert_eq!(
            item.thumbnail_url.as_deref(),
            Some("https://images.gamebanana.com/img/ss/mods/530-90_full.jpg")
        );
        assert_eq!(item.stats, ItemStats { likes: 12, views: 345 });
        assert_eq!(item.added_at.unwrap().timestamp(), 1_700_000_000);
        assert!(!item.has_advisory);
    }

    #[test]
    fn test_small_thumbnail_and_fallbacks() {
        let items = parse_page(&page(json!([mod_record(5)])), FeedMode::Latest, ThumbQuality::Small).unwrap().items;
        assert!(items[0].thumbnail_url.as_deref().unwrap().ends_with("/220-90_full.jpg"));

        let media = json!({"_aImages": [{"_sBaseUrl": "https://x/", "_sFile": "only.jpg"}]});
        assert_eq!(thumbnail_url(&media, ThumbQuality::Large).as_deref(), Some("https://x/only.jpg"));
        assert_eq!(thumbnail_url(&json!([]), ThumbQuality::Large), None);
    }

    #[test]
    fn test_non_mod_kind_is_pre_resolved() {
        let record = json!({"_idRow": 8, "_sModelName": "Question", "_sName": "How?", "_aPreviewMedia": []});
        let items = parse_page(&page(json!([record])), FeedMode::Latest, ThumbQuality::Large).unwrap().items;

        assert_eq!(items[0].kind, ItemKind::Question);
        assert_eq!(
            items[0].category,
            Category::Resolved { label: "Question".into(), id: None }
        );
        assert_eq!(items[0].author.name, UNKNOWN_AUTHOR);
        assert_eq!(items[0].thumbnail_url, None);
    }

    #[test]
    fn test_subscription_records_are_unwrapped() {
        let wrapped = json!({"_idRow": 1, "_aSubscription": mod_record(77)});
        let items = parse_page(&page(json!([wrapped])), FeedMode::Subscriptions, ThumbQuality::Large).unwrap().items;
        assert_eq!(items[0].id, ItemId(77));
        assert_eq!(items[0].name, "Furina Outfit");
    }

    #[test]
    fn test_missing_or_empty_records_is_empty_page() {
        for body in [r#"{}"#, r#"{"_aRecords": []}"#, r#"{"_aRecords": null}"#, r#"{"records": []}"#] {
            let page = parse_page(body.as_bytes(), FeedMode::Recommended, ThumbQuality::Large).unwrap();
            assert!(page.is_end(), "body {}", body);
            assert!(page.items.is_empty());
        }
    }

    #[test]
    fn test_bad_records_skipped_individually() {
        let records = json!([{"_sName": "no id"}, "not an object", mod_record(3)]);
        let parsed = parse_page(&page(records), FeedMode::Updated, ThumbQuality::Large).unwrap();
        assert_eq!(parsed.raw, 3);
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].id, ItemId(3));
    }

    #[test]
    fn test_page_of_unusable_records_is_not_the_end() {
        let records = json!([{"_sName": "no id", "_sModelName": "Mod"}]);
        let parsed = parse_page(&page(records), FeedMode::Latest, ThumbQuality::Large).unwrap();
        assert_eq!(parsed.raw, 1);
        assert!(parsed.items.is_empty());
        assert!(!parsed.is_end());
    }

    #[test]
    fn test_control_sequences_removed_from_names() {
        let record = json!({"_idRow": 4, "_sModelName": "Mod", "_sName": "\u{1b}[31mRed\u{1b}[0m Skin"});
        let items = parse_page(&page(json!([record])), FeedMode::Latest, ThumbQuality::Large).unwrap().items;
        assert_eq!(items[0].name, "Red Skin");
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(parse_page(b"<html>", FeedMode::Latest, ThumbQuality::Large).is_err());
    }
}
