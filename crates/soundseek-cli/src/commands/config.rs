use anyhow::{Context, Result};
use soundseek_etl::{config, Config};
use toml_edit::{value, DocumentMut};

/// Keys `config get` and `config set` understand.
const KEYS: [&str; 6] = [
    "freesound_api_key",
    "database_path",
    "data_dir",
    "sample_rate",
    "page_size",
    "requests_per_second",
];

const NUMERIC_KEYS: [&str; 3] = ["sample_rate", "page_size", "requests_per_second"];

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!("Unknown config key: {}\n\nValid keys: {}", key, KEYS.join(", "))
}

fn mask(key: &str) -> String {
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", key.chars().take(4).collect::<String>())
    }
}

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    let path = config::config_file_path();
    println!("Config file: {}", path.display());
    println!(
        "File exists: {}\n",
        if path.exists() { "yes" } else { "no (using defaults)" }
    );

    println!("Settings:");
    println!(
        "  freesound_api_key: {}",
        config
            .resolve_api_key()
            .map_or_else(|| "<not set>".to_string(), |k| mask(&k))
    );
    println!("  database_path: {}", config.database_path().display());
    println!("  data_dir: {}", config.data_dir.display());
    println!("  sample_rate: {}", config.sample_rate);
    println!("  page_size: {}", config.page_size);
    println!("  requests_per_second: {}", config.requests_per_second);

    println!("\nPriority: CLI args > ENV vars (SOUNDSEEK_*) > Config file > Defaults");

    Ok(())
}

/// Print one effective value, or the whole config file when no key is given.
pub fn get_config(config: &Config, key: Option<String>) -> Result<()> {
    let Some(key) = key else {
        let config_path = config::config_file_path();
        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'soundseek config init' to create it.");
        }
        return Ok(());
    };

    let shown = match key.as_str() {
        "freesound_api_key" => config
            .resolve_api_key()
            .unwrap_or_else(|| "<not set>".to_string()),
        "database_path" => config.database_path().display().to_string(),
        "data_dir" => config.data_dir.display().to_string(),
        "sample_rate" => config.sample_rate.to_string(),
        "page_size" => config.page_size.to_string(),
        "requests_per_second" => config.requests_per_second.to_string(),
        _ => return Err(unknown_key(&key)),
    };
    println!("{}", shown);
    Ok(())
}

/// Set `key = value` in a TOML document, keeping its comments.
pub fn set_in_document(contents: &str, key: &str, raw: &str) -> Result<String> {
    if !KEYS.contains(&key) {
        return Err(unknown_key(key));
    }

    let mut doc: DocumentMut = contents.parse().context("Config file is not valid TOML")?;
    if NUMERIC_KEYS.contains(&key) {
        let number: u32 = raw
            .parse()
            .with_context(|| format!("{} must be a positive integer, got '{}'", key, raw))?;
        doc[key] = value(i64::from(number));
    } else {
        doc[key] = value(raw);
    }
    Ok(doc.to_string())
}

/// Set a config value in the config file.
pub fn set_config(key: String, raw: String) -> Result<()> {
    let config_path = config::config_file_path();
    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
    let updated = set_in_document(&contents, &key, &raw)?;
    std::fs::write(&config_path, updated).context("Failed to write config file")?;

    println!("✓ Updated {} = {}", key, raw);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure soundseek.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
