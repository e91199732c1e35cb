use anyhow::Context;
use tagtrace::config::{AnalyzerConfig, get_config_path};
use tagtrace::styling::{AnstyleStyle, HINT, HINT_EMOJI, INFO_EMOJI, println};

/// Handle the config show command
pub fn handle_config_show() -> anyhow::Result<()> {
    let bold = AnstyleStyle::new().bold();

    match get_config_path() {
        Some(path) => {
            println!("{INFO_EMOJI} Config: {bold}{}{bold:#}", path.display());
            if !path.exists() {
                println!("{HINT_EMOJI} {HINT}Not found (using defaults){HINT:#}");
            }
        }
        None => println!("{HINT_EMOJI} {HINT}No config directory (using defaults){HINT:#}"),
    }
    println!();

    let config = AnalyzerConfig::load().map_err(tagtrace::TraceError::from)?;
    let toml = toml::to_string(&config).context("Failed to serialize config")?;
    println!("{}", toml.trim_end());

    Ok(())
}
