use colored::Colorize;
use stackflow_config::EngineConfig;

pub fn handle(config: &EngineConfig) -> anyhow::Result<()> {
    match stackflow_config::find_config_file()? {
        Some(path) => println!("Config file: {}", path.display().to_string().cyan()),
        None => println!("{}", "No config file found, using defaults".yellow()),
    }
    println!();
    print!("{}", config.to_yaml()?);
    Ok(())
}
