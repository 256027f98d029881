use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resolution::CategoryInfo;

/// Upstream item id. Ids are positive integers on the wire, sometimes sent
/// as strings (metadata keys, snapshot keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ItemId)
    }
}

// ============================================================================
// Feed modes and user filters
// ============================================================================

/// Which upstream listing a track mirrors. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum FeedMode {
    #[default]
    Recommended,
    Latest,
    Updated,
    Subscriptions,
}

impl FeedMode {
    pub const ALL: [FeedMode; 4] = [
        FeedMode::Recommended,
        FeedMode::Latest,
        FeedMode::Updated,
        FeedMode::Subscriptions,
    ];

    /// Stable index into per-mode storage.
    pub fn index(self) -> usize {
        match self {
            FeedMode::Recommended => 0,
            FeedMode::Latest => 1,
            FeedMode::Updated => 2,
            FeedMode::Subscriptions => 3,
        }
    }

    /// Value of the `_sSort` query parameter; `None` for subscriptions,
    /// which use a separate endpoint.
    pub fn sort_param(self) -> Option<&'static str> {
        match self {
            FeedMode::Recommended => Some("default"),
            FeedMode::Latest => Some("new"),
            FeedMode::Updated => Some("updated"),
            FeedMode::Subscriptions => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            FeedMode::Recommended => "Recommended",
            FeedMode::Latest => "Latest",
            FeedMode::Updated => "Updated",
            FeedMode::Subscriptions => "Subscriptions",
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeedMode::Recommended => "recommended",
            FeedMode::Latest => "latest",
            FeedMode::Updated => "updated",
            FeedMode::Subscriptions => "subscriptions",
        };
        f.write_str(s)
    }
}

impl TryFrom<String> for FeedMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for FeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recommended" | "default" => Ok(FeedMode::Recommended),
            "latest" | "new" => Ok(FeedMode::Latest),
            "updated" => Ok(FeedMode::Updated),
            "subscriptions" | "subs" => Ok(FeedMode::Subscriptions),
            other => Err(format!(
                "unknown mode '{}' (expected recommended, latest, updated or subscriptions)",
                other
            )),
        }
    }
}

/// Which record kinds the Subfeed endpoint should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFilter {
    All,
    #[default]
    Mods,
    Posts,
}

impl ContentFilter {
    /// Value of `_csvModelInclusions`, if any.
    pub fn model_inclusions(self) -> Option<&'static str> {
        match self {
            ContentFilter::All => None,
            ContentFilter::Mods => Some("Mod"),
            ContentFilter::Posts => Some("Tool,Question,Thread,Request"),
        }
    }

    pub fn next(self) -> Self {
        match self {
            ContentFilter::All => ContentFilter::Mods,
            ContentFilter::Mods => ContentFilter::Posts,
            ContentFilter::Posts => ContentFilter::All,
        }
    }
}

impl fmt::Display for ContentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContentFilter::All => "all",
            ContentFilter::Mods => "mods",
            ContentFilter::Posts => "posts",
        })
    }
}

/// Preview image size the API serves (`_sFile220` / `_sFile530`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ThumbQuality {
    Small,
    #[default]
    Large,
}

impl TryFrom<u32> for ThumbQuality {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            220 => Ok(ThumbQuality::Small),
            530 => Ok(ThumbQuality::Large),
            other => Err(format!("thumb_quality must be 220 or 530, got {}", other)),
        }
    }
}

impl From<ThumbQuality> for u32 {
    fn from(q: ThumbQuality) -> u32 {
        match q {
            ThumbQuality::Small => 220,
            ThumbQuality::Large => 530,
        }
    }
}

/// How items flagged with a content advisory are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryMode {
    #[default]
    Show,
    Blur,
    Hide,
    Only,
}

impl AdvisoryMode {
    pub fn next(self) -> Self {
        match self {
            AdvisoryMode::Show => AdvisoryMode::Blur,
            AdvisoryMode::Blur => AdvisoryMode::Hide,
            AdvisoryMode::Hide => AdvisoryMode::Only,
            AdvisoryMode::Only => AdvisoryMode::Show,
        }
    }

    /// Whether an item with the given advisory flag is listed at all.
    pub fn is_visible(self, has_advisory: bool) -> bool {
        match self {
            AdvisoryMode::Show | AdvisoryMode::Blur => true,
            AdvisoryMode::Hide => !has_advisory,
            AdvisoryMode::Only => has_advisory,
        }
    }

    /// Whether the item's name and preview are masked.
    pub fn is_masked(self, has_advisory: bool) -> bool {
        self == AdvisoryMode::Blur && has_advisory
    }
}

impl fmt::Display for AdvisoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdvisoryMode::Show => "show",
            AdvisoryMode::Blur => "blur",
            AdvisoryMode::Hide => "hide",
            AdvisoryMode::Only => "only",
        })
    }
}

/// User-configurable inputs to every page request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedFilters {
    pub content: ContentFilter,
    /// Member id whose subscriptions are listed. Required for
    /// [`FeedMode::Subscriptions`].
    pub user_id: Option<String>,
    pub thumb_quality: ThumbQuality,
}

// ============================================================================
// Normalized items
// ============================================================================

/// Record kind as reported by the API's `_sModelName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Mod,
    Tool,
    Question,
    Thread,
    Request,
    Other(String),
}

impl ItemKind {
    pub fn from_model_name(name: &str) -> Self {
        match name {
            "Mod" => ItemKind::Mod,
            "Tool" => ItemKind::Tool,
            "Question" => ItemKind::Question,
            "Thread" => ItemKind::Thread,
            "Request" => ItemKind::Request,
            other => ItemKind::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ItemKind::Mod => "Mod",
            ItemKind::Tool => "Tool",
            ItemKind::Question => "Question",
            ItemKind::Thread => "Thread",
            ItemKind::Request => "Request",
            ItemKind::Other(name) => name,
        }
    }

    /// Only mods carry a category that has to be looked up separately.
    pub fn needs_lookup(&self) -> bool {
        matches!(self, ItemKind::Mod)
    }
}

/// Secondary metadata state of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Pending,
    Resolved { label: String, id: Option<u64> },
    Unknown,
}

impl Category {
    pub fn is_pending(&self) -> bool {
        matches!(self, Category::Pending)
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Category::Resolved { label, .. } => Some(label),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Author {
    pub name: String,
    pub profile_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemStats {
    pub likes: u64,
    pub views: u64,
}

/// A feed entry after normalization at the API boundary.
///
/// Everything except `category` is fixed at construction; `category` moves
/// out of `Pending` at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub author: Author,
    pub page_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub snippet: Option<String>,
    pub category: Category,
    pub stats: ItemStats,
    pub added_at: Option<DateTime<Utc>>,
    pub has_advisory: bool,
}

impl ResolvedItem {
    pub fn needs_resolution(&self) -> bool {
        self.category.is_pending()
    }

    /// Settles a pending category. `None` means the lookup gave up.
    ///
    /// Returns false (and changes nothing) if the category was already
    /// settled.
    pub fn settle_category(&mut self, info: Option<&CategoryInfo>) -> bool {
        if !self.category.is_pending() {
            return false;
        }
        self.category = match info {
            Some(info) => Category::Resolved {
                label: info.name.clone(),
                id: info.category_id,
            },
            None => Category::Unknown,
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_item(id: u64) -> ResolvedItem {
        ResolvedItem {
            id: ItemId(id),
            kind: ItemKind::Mod,
            name: "Outfit".into(),
            author: Author::default(),
            page_url: None,
            thumbnail_url: None,
            snippet: None,
            category: Category::Pending,
            stats: ItemStats::default(),
            added_at: None,
            has_advisory: false,
        }
    }

    #[test]
    fn test_mode_parse_is_case_insensitive() {
        assert_eq!("LATEST".parse::<FeedMode>().unwrap(), FeedMode::Latest);
        assert_eq!(" Updated ".parse::<FeedMode>().unwrap(), FeedMode::Updated);
        assert_eq!("subs".parse::<FeedMode>().unwrap(), FeedMode::Subscriptions);
        assert!("trending".parse::<FeedMode>().is_err());
    }

    #[test]
    fn test_mode_indexes_are_distinct() {
        let mut seen: Vec<usize> = FeedMode::ALL.iter().map(|m| m.index()).collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_content_filter_inclusions() {
        assert_eq!(ContentFilter::All.model_inclusions(), None);
        assert_eq!(ContentFilter::Mods.model_inclusions(), Some("Mod"));
        assert_eq!(
            ContentFilter::Posts.model_inclusions(),
            Some("Tool,Question,Thread,Request")
        );
        assert_eq!(ContentFilter::Posts.next(), ContentFilter::All);
    }

    #[test]
    fn test_thumb_quality_from_number() {
        assert_eq!(ThumbQuality::try_from(220).unwrap(), ThumbQuality::Small);
        assert_eq!(ThumbQuality::try_from(530).unwrap(), ThumbQuality::Large);
        assert!(ThumbQuality::try_from(100).is_err());
    }

    #[test]
    fn test_advisory_visibility() {
        assert!(AdvisoryMode::Show.is_visible(true));
        assert!(!AdvisoryMode::Hide.is_visible(true));
        assert!(AdvisoryMode::Hide.is_visible(false));
        assert!(!AdvisoryMode::Only.is_visible(false));
        assert!(AdvisoryMode::Blur.is_masked(true));
        assert!(!AdvisoryMode::Show.is_masked(true));
    }

    #[test]
    fn test_kind_fallback() {
        assert_eq!(ItemKind::from_model_name("Mod"), ItemKind::Mod);
        assert_eq!(
            ItemKind::from_model_name("Wip"),
            ItemKind::Other("Wip".into())
        );
        assert!(!ItemKind::Thread.needs_lookup());
    }

    #[test]
    fn test_settle_category_only_once() {
        let mut item = pending_item(1);
        let info = CategoryInfo::new("Characters", Some(18140));
        assert!(item.settle_category(Some(&info)));
        assert_eq!(item.category.label(), Some("Characters"));

        assert!(!item.settle_category(None));
        assert_eq!(item.category.label(), Some("Characters"));
    }

    #[test]
    fn test_settle_category_failure_is_unknown() {
        let mut item = pending_item(2);
        assert!(item.settle_category(None));
        assert_eq!(item.category, Category::Unknown);
        assert!(!item.needs_resolution());
    }
}
