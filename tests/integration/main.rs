//! Integration tests for Tunecast

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn tunecast() -> Command {
        cargo_bin_cmd!("tunecast")
    }

    /// Command bound to a config file inside `dir`
    fn with_config(dir: &TempDir) -> Command {
        let mut cmd = tunecast();
        cmd.env("TUNECAST_CONFIG", dir.path().join("config.toml"));
        cmd
    }

    #[test]
    fn help_displays() {
        tunecast()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("autonomous chat radio"));
    }

    #[test]
    fn version_displays() {
        tunecast()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("tunecast"));
    }

    #[test]
    fn config_path_honours_env() {
        let temp = TempDir::new().unwrap();
        with_config(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_prints_sections() {
        let temp = TempDir::new().unwrap();
        with_config(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[scheduler]").and(predicate::str::contains("[voting]")));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        with_config(&temp).args(["config", "init"]).assert().success();
        assert!(temp.path().join("config.toml").exists());
    }

    #[test]
    fn config_init_repairs_broken_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "not [valid").unwrap();

        with_config(&temp)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));

        with_config(&temp)
            .args(["config", "init", "--force"])
            .assert()
            .success();
        with_config(&temp).args(["config", "show"]).assert().success();
    }

    #[test]
    fn moods_lists_defaults() {
        let temp = TempDir::new().unwrap();
        with_config(&temp)
            .arg("moods")
            .assert()
            .success()
            .stdout(predicate::str::contains("chill").and(predicate::str::contains("lofi")));
    }

    #[test]
    fn cache_stats_on_fresh_dir() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        std::fs::write(
            temp.path().join("config.toml"),
            format!("[cache]\ndir = {:?}\n", cache_dir.display().to_string()),
        )
        .unwrap();

        with_config(&temp)
            .args(["cache", "stats", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"entries\": 0"));
    }

    #[test]
    fn run_rejects_unknown_mood() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.toml"),
            format!(
                "[cache]\ndir = {:?}\n[retrieval]\ndownloads_dir = {:?}\n",
                temp.path().join("cache").display().to_string(),
                temp.path().join("downloads").display().to_string()
            ),
        )
        .unwrap();

        with_config(&temp)
            .args(["run", "--mood", "grumpy", "--no-cache"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown mood").and(predicate::str::contains("tunecast moods")));
    }

    #[test]
    fn search_requires_query() {
        tunecast()
            .arg("search")
            .assert()
            .failure()
            .stderr(predicate::str::contains("required"));
    }

    #[test]
    fn fetch_rejects_blank_query() {
        let temp = TempDir::new().unwrap();
        with_config(&temp)
            .args(["fetch", "   "])
            .assert()
            .failure()
            .stderr(predicate::str::contains("query too short"));
    }

    #[test]
    fn fetch_rejects_overlong_query() {
        let temp = TempDir::new().unwrap();
        with_config(&temp)
            .args(["fetch", &"x".repeat(151)])
            .assert()
            .failure()
            .stderr(predicate::str::contains("query too long"));
    }

    #[test]
    fn fetch_requires_query() {
        tunecast()
            .arg("fetch")
            .assert()
            .failure()
            .stderr(predicate::str::contains("required"));
    }
}
