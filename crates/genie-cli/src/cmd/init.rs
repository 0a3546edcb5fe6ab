use anyhow::Context;
use genie_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing reqgenie in: {}", root.display());

    for p in [
        paths::genie_dir(root),
        root.join(paths::RUNS_DIR),
        paths::profiles_dir(root),
    ] {
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config = serde_yaml::to_string(&Config::default()).context("failed to encode default config")?;
    let created = io::write_if_missing(&paths::config_path(root), config.as_bytes())
        .context("failed to write config.yaml")?;
    if created {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    println!("\nNext: export OPENAI_API_KEY, then run `reqgenie run \"<requirement>\"`.");
    Ok(())
}
