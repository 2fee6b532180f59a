use super::defaults::{MAX_FRAME_BYTES_LIMIT, MIN_FRAME_BYTES};
use super::HostConfig;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::{
    env,
    path::{Component, Path, PathBuf},
};

impl HostConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize paths.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_FRAME_BYTES..=MAX_FRAME_BYTES_LIMIT).contains(&self.max_frame_bytes) {
            bail!(
                "--max-frame-bytes must be between {MIN_FRAME_BYTES} and {MAX_FRAME_BYTES_LIMIT}, got {}",
                self.max_frame_bytes
            );
        }

        let label = self.label.trim();
        if !is_single_component(label) {
            bail!("--label must be a single directory name, got '{}'", self.label);
        }
        self.label = label.to_string();

        if let Some(root) = self.tmp_root.take() {
            self.tmp_root = Some(absolute_dir(&root)?);
        }
        Ok(())
    }

    /// Per-run directory: `<tmp root>/<label>/<pid>`.
    pub fn run_dir(&self) -> PathBuf {
        let base = self.tmp_root.clone().unwrap_or_else(env::temp_dir);
        base.join(&self.label).join(std::process::id().to_string())
    }
}

/// True when `name` is exactly one normal path component.
pub(crate) fn is_single_component(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

fn absolute_dir(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .context("failed to resolve current directory")?
            .join(path)
    };
    if absolute.exists() && !absolute.is_dir() {
        bail!("--tmp-root '{}' is not a directory", absolute.display());
    }
    Ok(absolute)
}
