//! Term files on disk feeding the translation overlay.

use bananaview::translation::{read_term_lists, TranslationOverlay};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bananaview-it-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_default_list_wins_over_custom() {
    let dir = scratch("precedence");
    let default = dir.join("words.json");
    let custom = dir.join("custom-words.json");
    std::fs::write(
        &default,
        r#"[{"en": "\"Hair\"", "zhCN": "头发"}, {"en": "Weapon", "zhCN": "武器"}]"#,
    )
    .unwrap();
    std::fs::write(
        &custom,
        r#"[{"sourceTerm": "hair", "targetTerm": "发型"}, {"sourceTerm": "Hat", "targetTerm": "帽子"}]"#,
    )
    .unwrap();

    let overlay = TranslationOverlay::new();
    assert!(overlay.load_from_files(&default, Some(&custom)).unwrap());
    assert!(!overlay.load_from_files(&default, None).unwrap());

    assert_eq!(overlay.len(), 3);
    assert_eq!(overlay.translate("Long Hair"), "Long 头发");
    assert_eq!(overlay.translate("HAT pack"), "帽子 pack");
    assert_eq!(overlay.translate("Weaponry"), "Weaponry");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_broken_custom_list_is_skipped() {
    let dir = scratch("broken");
    let default = dir.join("words.json");
    let custom = dir.join("custom-words.json");
    std::fs::write(&default, r#"[{"en": "Skin", "zhCN": "皮肤"}]"#).unwrap();
    std::fs::write(&custom, "{ not json").unwrap();

    let terms = read_term_lists(&default, Some(&custom)).unwrap();
    assert_eq!(terms.len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_default_list_is_an_error() {
    let dir = scratch("missing");
    assert!(read_term_lists(&dir.join("words.json"), None).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}
