//! Install-instruction detection.
//!
//! Derives per-platform install commands from conventional manifests in a
//! server's repository, fetched through the shared repository cache. One
//! instruction per (server, platform); new detections overwrite prior ones.
//! Failures here are logged by the caller and never affect detection status.

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::github::{GithubClient, RepoRef};

const NODE_ICON: &str =
    "https://nodejs.org/static/images/logos/nodejs-new-pantone-black.svg";
const YARN_ICON: &str = "https://yarnpkg.com/favicon.svg";
const PYTHON_ICON: &str = "https://www.python.org/static/favicon.ico";
const RUST_ICON: &str = "https://www.rust-lang.org/favicon.ico";
const GO_ICON: &str = "https://go.dev/favicon.ico";
const DOCKER_ICON: &str = "https://www.docker.com/favicon.ico";

lazy_static! {
    /// `name = "pkg"` in a pyproject/Cargo [package]/[project] section
    static ref TOML_NAME: Regex =
        Regex::new(r#"(?m)^\s*name\s*=\s*"([^"]+)""#).expect("toml name pattern is valid");
    /// `module path/to/mod` in go.mod
    static ref GO_MODULE: Regex =
        Regex::new(r"(?m)^module\s+(\S+)").expect("go module pattern is valid");
}

/// A platform-specific install command for a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallInstruction {
    pub platform: String,
    pub install_command: String,
    pub icon_url: Option<String>,
    pub source_file: Option<String>,
}

impl InstallInstruction {
    fn new(platform: &str, command: String, icon: &str, source_file: &str) -> Self {
        Self {
            platform: platform.to_string(),
            install_command: command,
            icon_url: Some(icon.to_string()),
            source_file: Some(source_file.to_string()),
        }
    }
}

/// Probe a repository's conventional manifests and derive install commands.
pub async fn detect_install_instructions(
    github: &GithubClient,
    repo: &RepoRef,
) -> Result<Vec<InstallInstruction>> {
    let mut instructions = Vec::new();

    if let Some(content) = github.file_content(repo, "package.json").await? {
        instructions.extend(from_package_json(&content));
    }
    if let Some(content) = github.file_content(repo, "pyproject.toml").await? {
        instructions.extend(from_pyproject(&content));
    } else if github.file_content(repo, "requirements.txt").await?.is_some() {
        instructions.push(InstallInstruction::new(
            "pip",
            "pip install -r requirements.txt".to_string(),
            PYTHON_ICON,
            "requirements.txt",
        ));
    }
    if let Some(content) = github.file_content(repo, "Cargo.toml").await? {
        instructions.extend(from_cargo_toml(&content));
    }
    if let Some(content) = github.file_content(repo, "go.mod").await? {
        instructions.extend(from_go_mod(&content));
    }
    if github.file_content(repo, "Dockerfile").await?.is_some() {
        instructions.push(InstallInstruction::new(
            "docker",
            format!("docker build -t {} .", repo.repo),
            DOCKER_ICON,
            "Dockerfile",
        ));
    }

    Ok(instructions)
}

/// npm + yarn commands from a package.json `name` field.
#[must_use]
pub fn from_package_json(content: &str) -> Vec<InstallInstruction> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return Vec::new();
    };
    let Some(name) = value.get("name").and_then(serde_json::Value::as_str) else {
        return Vec::new();
    };
    vec![
        InstallInstruction::new(
            "npm",
            format!("npm install {name}"),
            NODE_ICON,
            "package.json",
        ),
        InstallInstruction::new("yarn", format!("yarn add {name}"), YARN_ICON, "package.json"),
    ]
}

#[must_use]
pub fn from_pyproject(content: &str) -> Vec<InstallInstruction> {
    TOML_NAME
        .captures(content)
        .map(|captures| {
            vec![InstallInstruction::new(
                "pip",
                format!("pip install {}", &captures[1]),
                PYTHON_ICON,
                "pyproject.toml",
            )]
        })
        .unwrap_or_default()
}

#[must_use]
pub fn from_cargo_toml(content: &str) -> Vec<InstallInstruction> {
    TOML_NAME
        .captures(content)
        .map(|captures| {
            vec![InstallInstruction::new(
                "cargo",
                format!("cargo add {}", &captures[1]),
                RUST_ICON,
                "Cargo.toml",
            )]
        })
        .unwrap_or_default()
}

#[must_use]
pub fn from_go_mod(content: &str) -> Vec<InstallInstruction> {
    GO_MODULE
        .captures(content)
        .map(|captures| {
            vec![InstallInstruction::new(
                "go",
                format!("go get {}", &captures[1]),
                GO_ICON,
                "go.mod",
            )]
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_json_yields_npm_and_yarn() {
        let instructions =
            from_package_json(r#"{"name": "@acme/mcp-server", "version": "1.0.0"}"#);
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].platform, "npm");
        assert_eq!(instructions[0].install_command, "npm install @acme/mcp-server");
        assert_eq!(instructions[1].install_command, "yarn add @acme/mcp-server");
    }

    #[test]
    fn malformed_package_json_yields_nothing() {
        assert!(from_package_json("{broken").is_empty());
        assert!(from_package_json(r#"{"version": "1.0.0"}"#).is_empty());
    }

    #[test]
    fn pyproject_name() {
        let instructions = from_pyproject("[project]\nname = \"acme-tools\"\nversion = \"0.1\"\n");
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].install_command, "pip install acme-tools");
    }

    #[test]
    fn cargo_package_name() {
        let instructions = from_cargo_toml("[package]\nname = \"acme\"\nedition = \"2021\"\n");
        assert_eq!(instructions[0].install_command, "cargo add acme");
        assert_eq!(instructions[0].platform, "cargo");
    }

    #[test]
    fn go_module_path() {
        let instructions = from_go_mod("module github.com/acme/server\n\ngo 1.22\n");
        assert_eq!(
            instructions[0].install_command,
            "go get github.com/acme/server"
        );
    }
}
