use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::generators;
use crate::parser::{metadata_text, Parsed};

const FALLBACK_NAME: &str = "output";

/// Lower-case, dash for spaces, keep only alphanumerics, `-` and `_`.
pub fn sanitize_filename(name: &str) -> String {
    let safe: String = name
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if safe.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        safe
    }
}

/// Project name for a parse result: its title, else `fallback`.
pub fn project_name(parsed: &Parsed, fallback: &str) -> String {
    let title = metadata_text(&parsed.metadata, "title").unwrap_or_else(|| fallback.to_string());
    sanitize_filename(&title)
}

/// Where one converted item lands: `<base>/<name>/<name>.{py,ipynb}`.
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub dir: PathBuf,
}

impl Project {
    pub fn create(base: &Path, name: String) -> Result<Self> {
        let dir = base.join(&name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { name, dir })
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir.join(format!("{}.py", self.name))
    }

    pub fn notebook_path(&self) -> PathBuf {
        self.dir.join(format!("{}.ipynb", self.name))
    }

    pub fn write(&self, parsed: &Parsed) -> Result<()> {
        generators::write_script(&parsed.blocks, &parsed.metadata, &self.script_path())?;
        generators::write_notebook(&parsed.blocks, &parsed.metadata, &self.notebook_path())?;
        debug!(
            "Wrote {} blocks to {}",
            parsed.blocks.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Move the source file next to its outputs, replacing any earlier copy.
    pub fn adopt_source(&self, source: &Path) -> Result<PathBuf> {
        let file_name = source
            .file_name()
            .with_context(|| format!("No file name in {}", source.display()))?;
        let dest = self.dir.join(file_name);

        if dest.exists() {
            std::fs::remove_file(&dest)
                .with_context(|| format!("Failed to replace {}", dest.display()))?;
        }

        if std::fs::rename(source, &dest).is_err() {
            // rename fails across filesystems
            std::fs::copy(source, &dest)
                .with_context(|| format!("Failed to copy {} to {}", source.display(), dest.display()))?;
            std::fs::remove_file(source)
                .with_context(|| format!("Failed to remove {}", source.display()))?;
        }
        Ok(dest)
    }
}
