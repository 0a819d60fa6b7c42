use anyhow::{bail, Context, Result};
use clap::Parser;
use std::env;
use std::fs;
use std::path::PathBuf;

mod config;
mod error;
mod images;
mod render;
mod seatable;

use config::CatalogConfig;
use error::CatalogError;
use images::FetchStatus;
use render::FieldMap;
use seatable::SeaTableClient;

/// Table holding the artwork rows. Overridable via SEATABLE_TABLE_NAME.
pub const TABLE_NAME: &str = "Works & Exhibits";

#[derive(Parser)]
#[command(name = "seatable-catalog")]
#[command(about = "Static HTML catalog generator for a SeaTable base")]
struct Cli {
    /// Catalog configuration file (JSON)
    #[arg(value_name = "CONFIG_FILE")]
    config: PathBuf,

    /// Image cache directory, shared across all catalog variants
    #[arg(long, default_value = "art/images")]
    images_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CatalogConfig::load(&cli.config)?;
    let client = SeaTableClient::from_env()?;
    let table_name = env::var("SEATABLE_TABLE_NAME").unwrap_or_else(|_| TABLE_NAME.to_string());

    println!("SeaTable Static Catalog Generator");
    println!("Config: {}", cli.config.display());
    println!("View:   {}", config.view_name);
    println!("Output: {}", config.output_file.display());

    if let Some(parent) = config.output_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
    }
    fs::create_dir_all(&cli.images_dir)
        .with_context(|| format!("Failed to create {:?}", cli.images_dir))?;

    println!("\n1. Authenticating...");
    let session = client.authenticate()?;
    let uuid_prefix = &session.dtable_uuid[..8.min(session.dtable_uuid.len())];
    println!("   Connected to base: {}...", uuid_prefix);

    println!("\n2. Loading base structure...");
    let metadata = client.fetch_metadata(&session)?;
    let table = metadata
        .tables
        .iter()
        .find(|t| t.name == table_name)
        .with_context(|| format!("Table '{}' not found in base", table_name))?;
    println!("   Using table: {}", table.name);

    let Some(image_column) = table.image_column_key() else {
        bail!(CatalogError::NoImageColumnFound(table.name.clone()));
    };
    println!("   Image column: {}", image_column);

    println!("\n3. Loading rows from view: {}...", config.view_name);
    let rows = client.fetch_rows(&session, &table.name, &config.view_name)?;
    println!("   Found {} rows", rows.len());

    let fields = FieldMap::default();
    println!("   Field map: v{}", fields.version);

    println!("\n4. Downloading images to {}...", cli.images_dir.display());
    let mut image_count = 0u32;
    for (i, row) in rows.iter().enumerate() {
        let Some(image_url) = render::primary_image_url(row, &image_column) else {
            continue;
        };

        let title =
            render::cell_text(row, fields.title).unwrap_or_else(|| "Untitled".to_string());
        println!("   [{}/{}] {}", i + 1, rows.len(), title);

        match images::ensure_downloaded(&client, &image_url, &cli.images_dir) {
            Ok((filename, FetchStatus::Cached)) => {
                println!("     Already exists: {}", filename);
            }
            Ok((filename, FetchStatus::Downloaded)) => {
                println!("     Downloaded: {}", filename);
            }
            // Unrecognized paths skip this image; anything else kills the run
            Err(e) => match e.downcast_ref::<CatalogError>() {
                Some(CatalogError::ImagePathUnrecognized(_)) => {
                    eprintln!("     Skipping image: {}", e);
                    continue;
                }
                _ => return Err(e.context(format!("Failed to download image for '{}'", title))),
            },
        }
        image_count += 1;
    }
    println!("   Processed {} images", image_count);

    println!("\n5. Generating {}...", config.output_file.display());
    let html = render::render_catalog(&rows, &image_column, &fields, &config);
    fs::write(&config.output_file, html)
        .with_context(|| format!("Failed to write {:?}", config.output_file))?;
    println!("   Catalog generated!");

    Ok(())
}
