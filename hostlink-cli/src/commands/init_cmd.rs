use std::path::Path;

use anyhow::Context;
use hostlink_runtime::RuntimeConfig;

/// Writes the default config to `path`.
pub fn run(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let text = RuntimeConfig::default().to_toml_string()?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
