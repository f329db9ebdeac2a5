//! Integration tests for simplemirror

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn simplemirror() -> Command {
        cargo_bin_cmd!("simplemirror")
    }

    /// Command reading its configuration from `dir/config.toml`
    fn with_config(dir: &Path) -> Command {
        let mut cmd = simplemirror();
        cmd.env("SIMPLEMIRROR_CONFIG", dir.join("config.toml"));
        cmd
    }

    fn write_config(dir: &Path, body: &str) {
        let state_dir = dir.join("state");
        let content = format!("[storage]\nstate_dir = {:?}\n\n{}", state_dir, body);
        std::fs::write(dir.join("config.toml"), content).unwrap();
    }

    #[test]
    fn help_displays() {
        simplemirror()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("caching mirror"));
    }

    #[test]
    fn version_displays() {
        simplemirror()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("simplemirror"));
    }

    #[test]
    fn config_path_honours_env() {
        let temp = TempDir::new().unwrap();
        with_config(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        with_config(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[mirror]"))
            .stdout(predicate::str::contains("cache_expiry_secs = 1800"));
    }

    #[test]
    fn config_init_creates_file() {
        let temp = TempDir::new().unwrap();
        with_config(temp.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(temp.path().join("config.toml").exists());

        with_config(temp.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[mirror]\nrole = 3\n").unwrap();
        with_config(temp.path())
            .args(["links", "py"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn replica_without_master_url_fails() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[mirror]\nrole = \"replica\"\n");
        with_config(temp.path())
            .args(["projects"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("master_url"));
    }

    #[test]
    fn replica_is_refused_without_replicated_store() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            "[mirror]\nrole = \"replica\"\nmaster_url = \"http://127.0.0.1:9/\"\n",
        );
        with_config(temp.path())
            .args(["links", "py"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("mirror.role"))
            .stderr(predicate::str::contains("replicated transaction store"));
        assert!(!temp.path().join("state/mirror/name2serials.json").exists());
    }

    #[test]
    fn init_fails_when_upstream_unreachable() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            "[mirror]\nsimple_url = \"http://127.0.0.1:9/simple/\"\nrequest_timeout_secs = 5\n",
        );
        with_config(temp.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Mirror initialization failed"))
            .stderr(predicate::str::contains("Hint:"));
        assert!(!temp.path().join("state/mirror/name2serials.json").exists());
    }

    #[test]
    fn projects_reads_existing_snapshot() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "");
        let snapshot = temp.path().join("state/mirror");
        std::fs::create_dir_all(&snapshot).unwrap();
        std::fs::write(
            snapshot.join("name2serials.json"),
            r#"{"Zope.Interface": 12, "py": 3}"#,
        )
        .unwrap();

        with_config(temp.path())
            .args(["projects", "--format", "plain"])
            .assert()
            .success()
            .stdout("py\nzope-interface\n");
    }
}
