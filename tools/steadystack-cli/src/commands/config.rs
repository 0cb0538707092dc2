//! Show or save the effective configuration.

use steadystack_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, path_only: bool, save: bool) -> anyhow::Result<()> {
    let path = config_file_path();
    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    if save {
        config.save()?;
        println!("Saved configuration to {}", path.display());
    }

    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
