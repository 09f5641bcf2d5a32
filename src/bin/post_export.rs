use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use post_export::config::ExportConfig;
use post_export::db_migration::run_migrations;
use post_export::domains::content::SqliteContentRepository;
use post_export::domains::export::{ExportService, FileDelivery, Selection};
use sqlx::sqlite::SqlitePoolOptions;

#[derive(Parser, Debug)]
#[command(name = "post_export", version, about = "Export posts and their custom fields to CSV")]
struct Cli {
    #[arg(long, global = true, help = "SQLite database URL (overrides POST_EXPORT_DATABASE_URL)")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List exportable record types
    Types {
        #[arg(long, help = "Output machine-readable JSON")]
        json: bool,
    },
    /// Show the fields available for a record type
    Fields {
        record_type: String,
        #[arg(long, help = "Output machine-readable JSON")]
        json: bool,
    },
    /// Export every record of a type to CSV
    Export {
        record_type: String,
        #[arg(long = "field", value_name = "KEY", help = "Field key to include (repeatable)")]
        fields: Vec<String>,
        #[arg(long, help = "Write the CSV to stdout instead of a file")]
        stdout: bool,
        #[arg(long, help = "Directory for the CSV file (overrides POST_EXPORT_OUTPUT_DIR)")]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = ExportConfig::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.require_database_url()?)
        .await?;
    run_migrations(&pool).await?;

    let service = ExportService::from_content(Arc::new(SqliteContentRepository::new(pool)));

    match cli.command {
        Commands::Types { json } => {
            let types = service.list_record_types().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&types)?);
            } else {
                for info in types {
                    println!("{}\t{}", info.name, info.label);
                }
            }
        }
        Commands::Fields { record_type, json } => {
            let fields = service.discovery().discover_fields(&record_type).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else if fields.is_empty() {
                eprintln!("No fields registered for {}", record_type);
            } else {
                for field in fields {
                    println!("{}\t{}\t{}", field.key, field.name, field.label);
                }
            }
        }
        Commands::Export {
            record_type,
            fields,
            stdout,
            output_dir,
        } => {
            let selection: Selection = fields.into_iter().collect();
            if selection.is_empty() {
                log::info!("No fields selected; exporting title and taxonomies only");
            }
            if stdout {
                let mut out = tokio::io::stdout();
                let stats = service
                    .write_csv(&record_type, &selection, &mut out, &config.csv_config())
                    .await?;
                log::info!("Exported {} records ({} bytes)", stats.records_written, stats.bytes_written);
            } else {
                let dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
                let delivery = FileDelivery::new(dir, config.csv_config());
                let delivered = delivery.deliver(&service, &record_type, &selection).await?;
                println!("{}", delivered.path.display());
            }
        }
    }

    Ok(())
}
