use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// Hermetic environment for tz CLI tests: isolated data dir and config file.
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        fs::create_dir_all(dir.path().join("data")).expect("failed to create data dir");
        Self { dir }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("taskzen.toml")
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<()> {
        fs::write(self.config_path(), contents)
    }

    /// Build a tz command wired to this environment.
    pub fn tz(&self) -> Command {
        let mut cmd = Command::cargo_bin("tz").expect("binary");
        cmd.env("TASKZEN_DATA_DIR", self.data_dir())
            .env("TASKZEN_CONFIG", self.config_path())
            .env_remove("TASKZEN_TOKEN")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn login_guest(&self) {
        self.tz().args(["login", "--guest"]).assert().success();
    }

    /// Create a task and return its id from the JSON envelope.
    pub fn add_task(&self, title: &str) -> String {
        let output = self
            .tz()
            .args(["--json", "add", title])
            .output()
            .expect("run tz add");
        assert!(output.status.success(), "tz add failed: {output:?}");
        let envelope: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("parse add output");
        envelope["data"]["id"]
            .as_str()
            .expect("task id in output")
            .to_string()
    }

    pub fn list_json(&self) -> serde_json::Value {
        let output = self
            .tz()
            .args(["--json", "list"])
            .output()
            .expect("run tz list");
        assert!(output.status.success(), "tz list failed: {output:?}");
        serde_json::from_slice(&output.stdout).expect("parse list output")
    }
}
