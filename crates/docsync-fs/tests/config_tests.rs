use docsync_fs::{ConfigStore, Error, NormalizedPath, RobustnessConfig};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct VaultSettings {
    vault: String,
    interval_secs: u64,
}

fn store_in(temp: &TempDir, name: &str) -> NormalizedPath {
    NormalizedPath::new(temp.path().join(name))
}

#[test]
fn test_load_toml() {
    let temp = TempDir::new().unwrap();
    let path = store_in(&temp, "docsync.toml");
    fs::write(path.to_native(), "vault = \"notes\"\ninterval_secs = 30").unwrap();

    let settings: VaultSettings = ConfigStore::new().load(&path).unwrap();

    assert_eq!(
        settings,
        VaultSettings {
            vault: "notes".into(),
            interval_secs: 30
        }
    );
}

#[test]
fn test_load_json_and_yaml() {
    let temp = TempDir::new().unwrap();
    let json = store_in(&temp, "settings.json");
    let yaml = store_in(&temp, "settings.yml");
    fs::write(json.to_native(), r#"{"vault": "a", "interval_secs": 1}"#).unwrap();
    fs::write(yaml.to_native(), "vault: a\ninterval_secs: 1\n").unwrap();

    let store = ConfigStore::new();
    let from_json: VaultSettings = store.load(&json).unwrap();
    let from_yaml: VaultSettings = store.load(&yaml).unwrap();

    assert_eq!(from_json, from_yaml);
}

#[test]
fn test_load_or_default_when_missing() {
    let temp = TempDir::new().unwrap();
    let path = store_in(&temp, "absent.toml");

    let settings: VaultSettings = ConfigStore::new().load_or_default(&path).unwrap();

    assert_eq!(settings, VaultSettings::default());
    assert!(!path.exists());
}

#[test]
fn test_parse_error_names_format() {
    let temp = TempDir::new().unwrap();
    let path = store_in(&temp, "broken.toml");
    fs::write(path.to_native(), "vault = ").unwrap();

    let err = ConfigStore::new().load::<VaultSettings>(&path).unwrap_err();

    assert!(matches!(err, Error::ConfigParse { ref format, .. } if format == "TOML"));
}

#[test]
fn test_unsupported_format() {
    let temp = TempDir::new().unwrap();
    let path = store_in(&temp, "settings.xyz");
    fs::write(path.to_native(), "data").unwrap();

    let result: docsync_fs::Result<VaultSettings> = ConfigStore::new().load(&path);

    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
}

#[test]
fn test_roundtrip_toml_without_fsync() {
    let temp = TempDir::new().unwrap();
    let path = store_in(&temp, "docsync.toml");
    let store = ConfigStore::with_robustness(RobustnessConfig {
        enable_fsync: false,
        ..RobustnessConfig::default()
    });
    let original = VaultSettings {
        vault: "roundtrip".into(),
        interval_secs: 123,
    };

    store.save(&path, &original).unwrap();
    let loaded: VaultSettings = store.load(&path).unwrap();

    assert_eq!(original, loaded);
    let text = fs::read_to_string(path.to_native()).unwrap();
    assert!(text.contains("interval_secs = 123"));
}
