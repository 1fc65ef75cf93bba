//! Config file loading tests for dw-config.

use dw_config::{load_config, ConfigError, ConfigOptions, ConfigSource, Overrides};
use std::fs;
use tempfile::tempdir;

#[test]
fn loads_explicit_file_and_records_hash() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("docker-watcher.toml");
    fs::write(
        &path,
        r#"
schema_version = "1.0.0"

[retention]
image_lifetime_secs = 86400
keep_images = ["myapp"]
keep_containers = ["/web-1"]

[watch]
interval_secs = 600
dry_run = true
"#,
    )
    .expect("write config");

    let resolved = load_config(&ConfigOptions {
        config_path: Some(path.clone()),
        overrides: Overrides::default(),
    })
    .expect("load");

    assert_eq!(resolved.source, ConfigSource::CliArgument);
    assert_eq!(resolved.path.as_deref(), Some(path.as_path()));
    assert_eq!(resolved.config.retention.image_lifetime_secs, 86_400);
    assert_eq!(resolved.config.retention.container_lifetime_secs, 259_200);
    assert_eq!(resolved.config.retention.keep_images, vec!["myapp"]);
    assert_eq!(resolved.config.watch.interval_secs, 600);
    assert!(resolved.config.watch.dry_run);
    assert!(resolved.snapshot.file_hash.is_some());
}

#[test]
fn cli_overrides_win_over_file_values() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dw.toml");
    fs::write(&path, "[watch]\ninterval_secs = 600\n").expect("write config");

    let resolved = load_config(&ConfigOptions {
        config_path: Some(path),
        overrides: Overrides {
            interval_secs: Some(1200),
            keep_containers: vec!["db".to_string()],
            ..Overrides::default()
        },
    })
    .expect("load");

    assert_eq!(resolved.config.watch.interval_secs, 1200);
    assert_eq!(resolved.config.retention.keep_containers, vec!["db"]);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let err = load_config(&ConfigOptions {
        config_path: Some(dir.path().join("absent.toml")),
        overrides: Overrides::default(),
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
}

#[test]
fn semantic_errors_surface_after_merge() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dw.toml");
    fs::write(&path, "[watch]\ninterval_secs = 600\n").expect("write config");

    let err = load_config(&ConfigOptions {
        config_path: Some(path),
        overrides: Overrides {
            interval_secs: Some(0),
            ..Overrides::default()
        },
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn mistyped_value_is_a_parse_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dw.toml");
    fs::write(&path, "[retention]\nimage_lifetime_secs = \"soon\"\n").expect("write config");

    let err = load_config(&ConfigOptions {
        config_path: Some(path),
        overrides: Overrides::default(),
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn docker_host_from_file_yields_to_cli() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dw.toml");
    fs::write(&path, "[watch]\ndocker_host = \"tcp://build-1:2375\"\n").expect("write config");

    let from_file = load_config(&ConfigOptions {
        config_path: Some(path.clone()),
        overrides: Overrides::default(),
    })
    .expect("load");
    assert_eq!(
        from_file.config.watch.docker_host.as_deref(),
        Some("tcp://build-1:2375")
    );

    let overridden = load_config(&ConfigOptions {
        config_path: Some(path),
        overrides: Overrides {
            docker_host: Some("unix:///run/docker.sock".to_string()),
            ..Overrides::default()
        },
    })
    .expect("load");
    assert_eq!(
        overridden.config.watch.docker_host.as_deref(),
        Some("unix:///run/docker.sock")
    );
    assert_eq!(
        overridden.snapshot.summary.docker_host.as_deref(),
        Some("unix:///run/docker.sock")
    );
}
