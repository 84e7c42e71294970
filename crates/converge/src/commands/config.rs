use colored::Colorize;
use converge_config::Settings;

pub fn handle() -> anyhow::Result<()> {
    let (settings, source) = Settings::load()?;

    match source {
        Some(path) => println!("{} {}", "Settings file:".bold(), path.display()),
        None => println!("{}", "No settings file found, using defaults".yellow()),
    }
    println!();
    print!("{}", settings.to_yaml()?);
    Ok(())
}
