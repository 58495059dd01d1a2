use std::fs;

use page_translator::ServiceKind;
use page_translator::settings::{self, load_layers};
use tempfile::tempdir;

#[test]
fn explicit_settings_path_must_exist() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = settings::load_settings(Some(missing.as_path())).unwrap_err();
    assert!(err.to_string().contains("settings file not found"));
}

#[test]
fn explicit_settings_file_is_applied_last() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("site.toml");
    fs::write(
        &path,
        r#"
[translation]
target_language = "ko"
service = "azure"
batch_size = 10

[azure]
endpoint = "https://contoso.openai.azure.com"
deployment = "translator"
"#,
    )
    .unwrap();

    let settings = settings::load_settings(Some(path.as_path())).unwrap();
    assert_eq!(settings.target_language, "ko");
    assert_eq!(settings.service, ServiceKind::Azure);
    assert_eq!(settings.batch_size, 10);
    assert_eq!(settings.azure.deployment.as_deref(), Some("translator"));
}

#[test]
fn invalid_toml_names_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[translation\ntarget_language = ").unwrap();
    let err = load_layers(&[path.clone()]).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));
}
