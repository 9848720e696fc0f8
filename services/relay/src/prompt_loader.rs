use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Reads the server instructions that every session is pinned to.
pub fn load_system_prompt(path: &Path) -> Result<String> {
    let prompt = fs::read_to_string(path)
        .with_context(|| format!("Failed to read system prompt file: {}", path.display()))?;

    let prompt = prompt.trim();
    if prompt.is_empty() {
        bail!("System prompt file is empty: {}", path.display());
    }

    Ok(prompt.to_string())
}
