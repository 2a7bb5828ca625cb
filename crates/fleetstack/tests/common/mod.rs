#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const STACK_KDL: &str = r#"
workspace "data"

environment "dev" {
    component "superset" #true
}

environment "prd" {
    component "superset" #true
    backing "superset-db" "self-hosted"
}

gate "superset-db" component="superset" {
    alternative "managed" "superset-rds"
    alternative "self-hosted" "superset-db-volume" "ss-db"
}
"#;

pub const SUPERSET_KDL: &str = r#"
group "superset" layer="build" component="superset" {
    image "superset-image" {
        name "repo/superset"
    }
}

group "superset" layer="cloud" component="superset" {
    volume "superset-db-volume" skip-delete=#true {
        size 32
    }
    managed-database "superset-rds" {
        engine "postgres"
    }
}

group "superset" layer="cluster" component="superset" {
    app "ss-db" {
        volume (ref)"superset-db-volume.volume-id"
    }
    app "superset-ws" {
        image (ref)"superset-image.image"
        db-host (ref)"ss-db.host" (ref)"superset-rds.host"
    }
    app "superset-init" {
        image (ref)"superset-image.image"
        once {
            db-migrate #true
            create-admin-user #false
        }
    }
}
"#;

pub struct TestProject {
    pub root: TempDir,
    config: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            config: tempfile::tempdir().unwrap(),
        }
    }

    /// stack.kdl と groups/superset.kdl を持つプロジェクト
    pub fn superset() -> Self {
        let project = Self::new();
        project.write_stack_kdl(STACK_KDL);
        project.write_group("superset", SUPERSET_KDL);
        project
    }

    pub fn write_stack_kdl(&self, content: &str) {
        fs::write(self.root.path().join("stack.kdl"), content).unwrap();
    }

    pub fn write_group(&self, name: &str, content: &str) {
        let dir = self.root.path().join("groups");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.kdl", name)), content).unwrap();
    }

    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// ユーザー設定（~/.config/fleetstack/config.yaml 相当）
    pub fn write_user_config(&self, content: &str) {
        let dir = self.config.path().join("fleetstack");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// プロジェクト内で実行する stack コマンド（外部の設定・環境変数は遮断）
    pub fn stack(&self) -> Command {
        stack_in(self.root.path(), self.config.path())
    }
}

pub fn stack_in(dir: &Path, config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.current_dir(dir)
        .env_remove("STACK_ENV")
        .env_remove("FLEETSTACK_PROJECT_ROOT")
        .env_remove("FLEETSTACK_CONFIG_PATH")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", config_home)
        .env("NO_COLOR", "1");
    cmd
}
