//! CLI surface tests for docker-watcher.
//!
//! These run the real binary. Runtime-dependent commands point `--docker-host`
//! at a socket that does not exist so no daemon is ever contacted.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const MISSING_SOCKET: &str = "unix:///nonexistent/dw-test/docker.sock";

fn docker_watcher() -> Command {
    let mut cmd = cargo_bin_cmd!("docker-watcher");
    cmd.env_remove("DW_CONFIG")
        .env_remove("DW_IMAGE_LIFETIME")
        .env_remove("DW_CONTAINER_LIFETIME")
        .env_remove("DW_WATCH_INTERVAL")
        .env_remove("DW_DOCKER_HOST")
        .env_remove("DOCKER_HOST")
        .env("DW_CONFIG_DIR", "/nonexistent/dw-test/config")
        .env("XDG_CONFIG_HOME", "/nonexistent/dw-test/xdg")
        .env("DW_LOG", "error");
    cmd
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ============================================================================
// Help and version
// ============================================================================

mod top_level {
    use super::*;

    #[test]
    fn help_flag_works() {
        docker_watcher()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Docker Watcher"))
            .stdout(predicate::str::contains("watch"))
            .stdout(predicate::str::contains("check-config"))
            .stdout(predicate::str::contains("status"));
    }

    #[test]
    fn help_shows_retention_flags() {
        docker_watcher()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--image-lifetime"))
            .stdout(predicate::str::contains("--container-lifetime"))
            .stdout(predicate::str::contains("--keep-image"))
            .stdout(predicate::str::contains("--keep-container"))
            .stdout(predicate::str::contains("--watch-interval"))
            .stdout(predicate::str::contains("--dry-run"));
    }

    #[test]
    fn version_flag_works() {
        docker_watcher()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("docker-watcher"));
    }

    #[test]
    fn watch_help_lists_once() {
        docker_watcher()
            .args(["watch", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--once"))
            .stdout(predicate::str::contains("--max-passes"));
    }
}

// ============================================================================
// check-config
// ============================================================================

mod check_config {
    use super::*;

    #[test]
    fn defaults_are_reported() {
        docker_watcher()
            .arg("check-config")
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration OK"))
            .stdout(predicate::str::contains("259200s"));
    }

    #[test]
    fn camel_case_aliases_are_accepted() {
        docker_watcher()
            .args([
                "check-config",
                "--imageLifetime",
                "60",
                "--keepImage",
                "myapp",
                "--keepContainer",
                "web-1",
                "--format",
                "json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"image_lifetime_secs\": 60"))
            .stdout(predicate::str::contains("myapp"))
            .stdout(predicate::str::contains("web-1"));
    }

    #[test]
    fn file_values_are_merged_with_flags() {
        let file = config_file(
            "[retention]\nimage_lifetime_secs = 120\nkeep_images = [\"redis\"]\n\n[watch]\ninterval_secs = 30\n",
        );
        docker_watcher()
            .arg("check-config")
            .arg("--config")
            .arg(file.path())
            .args(["--keep-image", "nginx", "--format", "summary"])
            .assert()
            .success()
            .stdout(predicate::str::contains("image_lifetime=120s"))
            .stdout(predicate::str::contains("keep_images=2"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        docker_watcher()
            .args(["check-config", "--watch-interval", "0"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("interval"));
    }

    #[test]
    fn missing_config_file_is_an_args_error() {
        docker_watcher()
            .args(["check-config", "--config", "/nonexistent/dw-test/nope.toml"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("runtime unavailable"));
    }

    #[test]
    fn invalid_toml_is_an_args_error() {
        let file = config_file("[retention\nimage_lifetime_secs = ");
        docker_watcher()
            .arg("check-config")
            .arg("--config")
            .arg(file.path())
            .assert()
            .code(10);
    }
}

// ============================================================================
// Runtime unavailable
// ============================================================================

mod runtime_unavailable {
    use super::*;

    #[test]
    fn watch_once_exits_with_runtime_unavailable() {
        docker_watcher()
            .args(["watch", "--once", "--docker-host", MISSING_SOCKET])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("runtime unavailable"));
    }

    #[test]
    fn status_exits_with_runtime_unavailable() {
        docker_watcher()
            .args(["status", "--docker-host", MISSING_SOCKET])
            .assert()
            .code(11);
    }
}
