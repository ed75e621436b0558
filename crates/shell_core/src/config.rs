use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use shared::{domain::HandoffMode, error::ShellError, protocol::PageDescriptor};

pub const DEFAULT_HOME_PAGE: &str = "home";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default)]
    pub pages: Vec<PageDescriptor>,
    #[serde(default = "default_home_page", alias = "homePage")]
    pub home_page: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub handoff: HandoffMode,
}

fn default_home_page() -> String {
    DEFAULT_HOME_PAGE.to_string()
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            home_page: default_home_page(),
            namespace: None,
            handoff: HandoffMode::default(),
        }
    }
}

impl ShellConfig {
    pub fn with_pages<I, P>(pages: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PageDescriptor>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ShellError> {
        if self.pages.is_empty() {
            return Err(ShellError::configuration(
                "you must include a non-empty list of pages in the shell configuration",
            ));
        }
        if self.home_page.trim().is_empty() {
            return Err(ShellError::configuration("home_page must not be empty"));
        }
        Ok(())
    }

    /// Applies overrides from `lookup`, normally `std::env::var`. The
    /// `APP__` form wins over the `SHELL_` form.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ShellError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SHELL_HOME_PAGE") {
            self.home_page = v;
        }
        if let Some(v) = lookup("APP__HOME_PAGE") {
            self.home_page = v;
        }

        if let Some(v) = lookup("SHELL_NAMESPACE") {
            self.namespace = Some(v);
        }
        if let Some(v) = lookup("APP__NAMESPACE") {
            self.namespace = Some(v);
        }

        for key in ["SHELL_HANDOFF", "APP__HANDOFF"] {
            if let Some(v) = lookup(key) {
                self.handoff = v
                    .parse()
                    .map_err(|err: String| ShellError::configuration(format!("{key}: {err}")))?;
            }
        }
        Ok(())
    }
}

pub fn parse_config(raw: &str) -> Result<ShellConfig, ShellError> {
    toml::from_str(raw)
        .map_err(|err| ShellError::configuration(format!("invalid shell configuration: {err}")))
}

/// Reads `path`, applies environment overrides and validates the result.
pub fn load_config(path: impl AsRef<Path>) -> Result<ShellConfig, ShellError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|err| {
        ShellError::configuration(format!("failed to read {}: {err}", path.display()))
    })?;
    let mut config = parse_config(&raw)?;
    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    tracing::info!(
        path = %path.display(),
        pages = config.pages.len(),
        home_page = %config.home_page,
        handoff = ?config.handoff,
        "shell configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
