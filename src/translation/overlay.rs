use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use super::terms::{read_term_lists, TermEntry, TermsError};

#[derive(Debug)]
struct TermTable {
    /// lowercase source term → translation
    map: HashMap<String, String>,
    /// keys of `map`, longest first
    keys: Vec<String>,
}

/// Word-list based display string translation.
///
/// The table is installed once; until then every method returns its input
/// untouched. Safe to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct TranslationOverlay {
    table: OnceLock<TermTable>,
}

impl TranslationOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the term table. Only the first call has any effect; returns
    /// whether this call was the one that loaded it.
    ///
    /// Surrounding double quotes are stripped from source terms, entries
    /// with an empty side are dropped, and the first entry for a given
    /// lowercase term wins.
    pub fn load<I>(&self, terms: I) -> bool
    where
        I: IntoIterator<Item = TermEntry>,
    {
        if self.table.get().is_some() {
            return false;
        }

        let mut map: HashMap<String, String> = HashMap::new();
        for term in terms {
            let key = term.en.trim_matches('"').to_lowercase();
            if key.is_empty() || term.zh_cn.is_empty() {
                continue;
            }
            map.entry(key).or_insert(term.zh_cn);
        }

        let mut keys: Vec<String> = map.keys().cloned().collect();
        // Ties broken alphabetically so the scan order is deterministic.
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let count = map.len();
        let loaded = self.table.set(TermTable { map, keys }).is_ok();
        if loaded {
            tracing::info!(terms = count, "Translation table loaded");
        }
        loaded
    }

    /// Reads the default list and an optional custom list, then loads
    /// them. Entries in the default list take precedence.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when a table was already installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the default list cannot be read; the overlay
    /// stays unloaded and passes text through unchanged.
    pub fn load_from_files(&self, default: &Path, custom: Option<&Path>) -> Result<bool, TermsError> {
        let terms = read_term_lists(default, custom)?;
        Ok(self.load(terms))
    }

    pub fn is_loaded(&self) -> bool {
        self.table.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.table.get().map_or(0, |t| t.map.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Translates an item name.
    ///
    /// Terms are tried longest first. For each term only its first
    /// case-insensitive occurrence is considered, and it is replaced only if
    /// neither neighbour is an ASCII letter. Later terms see the text as
    /// rewritten by earlier ones.
    pub fn translate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let Some(table) = self.table.get() else {
            return Cow::Borrowed(text);
        };
        if text.is_empty() {
            return Cow::Borrowed(text);
        }

        let mut result = Cow::Borrowed(text);
        for key in &table.keys {
            let Some((start, end)) = find_case_insensitive(&result, key) else {
                continue;
            };
            if !is_word_boundary(&result, start, end) {
                continue;
            }
            let replacement = &table.map[key];
            let replacement = match_case(&result[start..end], replacement);
            let mut next = String::with_capacity(result.len() + replacement.len());
            next.push_str(&result[..start]);
            next.push_str(&replacement);
            next.push_str(&result[end..]);
            result = Cow::Owned(next);
        }
        result
    }

    /// Translates a whole category label (exact, case-insensitive).
    pub fn translate_category<'a>(&self, label: &'a str) -> Cow<'a, str> {
        let Some(table) = self.table.get() else {
            return Cow::Borrowed(label);
        };
        if label.is_empty() {
            return Cow::Borrowed(label);
        }
        match table.map.get(&label.to_lowercase()) {
            Some(translated) => Cow::Owned(translated.clone()),
            None => Cow::Borrowed(label),
        }
    }
}

/// Byte range in `haystack` of the first occurrence of `needle_lower`,
/// comparing against the lowercased haystack.
fn find_case_insensitive(haystack: &str, needle_lower: &str) -> Option<(usize, usize)> {
    // Lowercasing can change byte lengths, so keep a map from each
    // original char to where its lowercase form starts.
    let mut lowered = String::with_capacity(haystack.len());
    let mut offsets: Vec<(usize, usize)> = Vec::with_capacity(haystack.len());
    for (orig, c) in haystack.char_indices() {
        offsets.push((lowered.len(), orig));
        lowered.extend(c.to_lowercase());
    }

    let lower_start = lowered.find(needle_lower)?;
    let lower_end = lower_start + needle_lower.len();

    let start = offsets
        .binary_search_by_key(&lower_start, |&(l, _)| l)
        .ok()
        .map(|i| offsets[i].1)?;
    let end = if lower_end == lowered.len() {
        haystack.len()
    } else {
        offsets
            .binary_search_by_key(&lower_end, |&(l, _)| l)
            .ok()
            .map(|i| offsets[i].1)?
    };
    Some((start, end))
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_alphabetic()) && !after.is_some_and(|c| c.is_ascii_alphabetic())
}

fn match_case(original: &str, replacement: &str) -> String {
    if original.to_uppercase() == original {
        return replacement.to_uppercase();
    }
    let first_is_upper = original
        .chars()
        .next()
        .is_some_and(|c| c.to_uppercase().eq(std::iter::once(c)));
    if first_is_upper {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn overlay(pairs: &[(&str, &str)]) -> TranslationOverlay {
        let overlay = TranslationOverlay::new();
        overlay.load(pairs.iter().map(|(en, zh)| TermEntry::new(*en, *zh)));
        overlay
    }

    #[test]
    fn test_unloaded_overlay_is_identity() {
        let overlay = TranslationOverlay::new();
        assert_eq!(overlay.translate("Cat Mod"), "Cat Mod");
        assert_eq!(overlay.translate_category("Skins"), "Skins");
        assert!(!overlay.is_loaded());
    }

    #[test]
    fn test_whole_word_replaced() {
        let overlay = overlay(&[("cat", "猫")]);
        assert_eq!(overlay.translate("Cat Mod"), "猫 Mod");
    }

    #[test]
    fn test_partial_word_not_replaced() {
        let overlay = overlay(&[("cat", "猫")]);
        assert_eq!(overlay.translate("Category"), "Category");
        // Only the first occurrence is checked for each term.
        assert_eq!(overlay.translate("Concat cat"), "Concat cat");
    }

    #[test]
    fn test_longest_term_wins() {
        let overlay = overlay(&[("raiden", "雷电"), ("raiden shogun", "雷电将军")]);
        assert_eq!(overlay.translate("Raiden Shogun Outfit"), "雷电将军 Outfit");
    }

    #[test]
    fn test_case_preservation() {
        let overlay = overlay(&[("sword", "blade")]);
        assert_eq!(overlay.translate("SWORD skin"), "BLADE skin");
        assert_eq!(overlay.translate("Sword skin"), "Blade skin");
        assert_eq!(overlay.translate("my sword"), "my blade");
    }

    #[test]
    fn test_non_letter_neighbours_are_boundaries() {
        let overlay = overlay(&[("klee", "可莉")]);
        assert_eq!(overlay.translate("[Klee]-v2"), "[可莉]-v2");
        assert_eq!(overlay.translate("Klee2"), "可莉2");
        assert_eq!(overlay.translate("可莉Klee"), "可莉可莉");
    }

    #[test]
    fn test_quotes_stripped_and_first_duplicate_wins() {
        let overlay = overlay(&[("\"Hu Tao\"", "胡桃"), ("hu tao", "其他"), ("", "x"), ("y", "")]);
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.translate("Hu Tao Skin"), "胡桃 Skin");
    }

    #[test]
    fn test_load_only_once() {
        let overlay = overlay(&[("cat", "猫")]);
        assert!(!overlay.load(vec![TermEntry::new("dog", "狗")]));
        assert_eq!(overlay.translate("dog"), "dog");
    }

    #[test]
    fn test_category_exact_lookup() {
        let overlay = overlay(&[("characters", "角色")]);
        assert_eq!(overlay.translate_category("Characters"), "角色");
        assert_eq!(overlay.translate_category("Character Skins"), "Character Skins");
        assert_eq!(overlay.translate_category(""), "");
    }

    #[test]
    fn test_lowercase_expansion_does_not_misalign() {
        // 'İ' lowercases to two chars; the match must still map back cleanly.
        let overlay = overlay(&[("mod", "模组")]);
        assert_eq!(overlay.translate("İstanbul mod"), "İstanbul 模组");
    }

    proptest! {
        #[test]
        fn prop_text_without_terms_is_unchanged(s in "[0-9 ,.!?]{0,40}") {
            let overlay = overlay(&[("cat", "猫"), ("dog", "狗")]);
            prop_assert_eq!(overlay.translate(&s), s.as_str());
        }

        #[test]
        fn prop_term_embedded_in_word_is_kept(prefix in "[a-z]{1,5}", suffix in "[a-z]{0,5}") {
            let overlay = overlay(&[("cat", "猫")]);
            let word = format!("{}cat{}", prefix, suffix);
            prop_assume!(!word.starts_with("cat"));
            prop_assert_eq!(overlay.translate(&word), word.as_str());
        }
    }
}
