use std::env;

use anyhow::{Context, Result};
use tracing::info;

/// Renderer configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Abort after this many render passes. `None` renders until converged.
    pub max_passes: Option<u32>,

    /// Wrap the cycle diagnostic header in ANSI colors.
    pub color_diagnostics: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_passes: None,
            color_diagnostics: true,
        }
    }
}

impl RenderConfig {
    /// Load from `UNIVERSAL_MAX_PASSES` and `UNIVERSAL_COLOR`. Unset vars keep defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let max_passes = match lookup("UNIVERSAL_MAX_PASSES") {
            Some(raw) if !raw.trim().is_empty() => {
                let limit: u32 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("UNIVERSAL_MAX_PASSES must be a number, got {raw:?}"))?;
                anyhow::ensure!(limit > 0, "UNIVERSAL_MAX_PASSES must be positive");
                Some(limit)
            }
            _ => defaults.max_passes,
        };

        let color_diagnostics = match lookup("UNIVERSAL_COLOR") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("UNIVERSAL_COLOR must be true/false, got {raw:?}"))?,
            None => defaults.color_diagnostics,
        };

        Ok(Self {
            max_passes,
            color_diagnostics,
        })
    }

    pub fn with_max_passes(mut self, limit: u32) -> Self {
        self.max_passes = Some(limit);
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color_diagnostics = color;
        self
    }

    pub fn log_summary(&self) {
        info!(
            max_passes = ?self.max_passes,
            color_diagnostics = self.color_diagnostics,
            "Render config loaded"
        );
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
