use anyhow::Result;
use soundseek_core::schema::Database;
use soundseek_etl::Config;

fn presence(path: &std::path::Path) -> &'static str {
    if path.exists() {
        "✓"
    } else {
        "✗"
    }
}

pub fn show_status(config: &Config) -> Result<()> {
    let db_path = config.database_path();
    let layout = config.layout();
    let db = Database::open(&db_path)?;

    let samples = db.count_samples()?;
    let downloaded = db.count_downloaded_samples()?;
    let features = db.count_features()?;
    let missing = db.list_samples_missing_features()?.len();

    println!("\n📊 SoundSeek Status\n");
    println!("  Database: {}", db_path.display());
    println!("  Samples: {samples}");
    println!("  Downloaded: {downloaded}");
    println!("  With features: {features}");
    println!("  Missing features: {missing}");

    println!("\n  Files");
    println!("    {} {}", presence(&layout.metadata_path), layout.metadata_path.display());
    println!("    {} {}", presence(&layout.features_path), layout.features_path.display());
    println!("    {} {}", presence(&layout.index_path), layout.index_path.display());

    if samples == 0 {
        println!("\n  Run `soundseek fetch <query>` to download samples");
    } else if missing > 0 {
        println!("\n  Run `soundseek extract` to analyse the remaining samples");
    }

    Ok(())
}
