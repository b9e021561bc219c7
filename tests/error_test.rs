//! エラーケーステスト
//!
//! 読み込み・設定・登録のエラー条件を検証

use catalog_match::dataset::load_dataset;
use catalog_match::error::CatalogMatchError;
use catalog_match::matcher::{MatchSettings, SettingsOverrides};
use catalog_match::registry::CatalogRegistry;
use std::path::Path;
use tempfile::tempdir;

/// 存在しないファイルを読み込んだ場合
#[test]
fn test_load_nonexistent_file() {
    let result = load_dataset(Path::new("/nonexistent/path/export.csv"), None);
    assert!(matches!(result, Err(CatalogMatchError::FileNotFound(_))));
}

/// 存在しないシートを指定した場合
#[test]
fn test_load_missing_sheet() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("catalog.xlsx");

    let mut workbook = rust_xlsxwriter::Workbook::new();
    workbook.add_worksheet().write_string(0, 0, "sku").unwrap();
    workbook.save(&path).unwrap();

    let result = load_dataset(&path, Some("NoSuchSheet"));
    assert!(result.is_err());
}

/// 空の CSV（ヘッダーなし）
#[test]
fn test_load_empty_csv() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("empty.csv");
    std::fs::write(&path, "").unwrap();

    let result = load_dataset(&path, None);
    assert!(matches!(result, Err(CatalogMatchError::Load(_))));
}

/// 壊れた設定ファイル
#[test]
fn test_invalid_settings_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"rules": "sku"}"#).unwrap();

    let result = MatchSettings::load(&path);
    assert!(matches!(result, Err(CatalogMatchError::Config(_))));
}

/// 書式の誤ったルール指定
#[test]
fn test_invalid_rule_override() {
    let result = MatchSettings::default().apply_overrides(SettingsOverrides {
        rules: vec!["SKU:sku".into()],
        ..Default::default()
    });
    assert!(matches!(result, Err(CatalogMatchError::Common(_))));
}

/// 未登録のカタログ
#[test]
fn test_unknown_catalog() {
    let dir = tempdir().expect("Failed to create temp dir");
    let registry = CatalogRegistry::load(&dir.path().join("catalog_files.json")).unwrap();

    let err = registry.handle("caskets").unwrap_err();
    assert!(matches!(err, CatalogMatchError::UnknownCatalog(_)));
    assert!(err.to_string().contains("caskets"));
}

/// CatalogMatchErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        CatalogMatchError::Config("テスト設定エラー".to_string()),
        CatalogMatchError::FileNotFound("export.csv".to_string()),
        CatalogMatchError::Load("3行目".to_string()),
        CatalogMatchError::Service("HTTP 503".to_string()),
        CatalogMatchError::Timeout("run_1".to_string()),
        CatalogMatchError::Parse("JSON".to_string()),
        CatalogMatchError::UnknownCatalog("urns".to_string()),
        CatalogMatchError::MissingApiKey,
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}
