use anyhow::{Result, bail};
use feastline_core::config::AppConfig;
use feastline_infrastructure::{ConfigService, FeastlinePaths};

pub fn show(paths: &FeastlinePaths) -> Result<()> {
    let config = ConfigService::new(paths).get_config();
    println!("# {}", paths.config_file()?.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Writes the default configuration so it can be edited by hand.
pub fn init(paths: &FeastlinePaths, force: bool) -> Result<()> {
    let path = paths.config_file()?;
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    ConfigService::with_path(path.clone()).save(&AppConfig::default())?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
