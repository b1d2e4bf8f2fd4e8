//! Widgetry CLI - drive the widget list service from the command line.
//!
//! Each subcommand maps to one service operation and prints its result as
//! JSON, matching the payloads a hosting API layer would return.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use widgetry_core::{JsonMap, WidgetService, WidgetryConfig};

#[derive(Parser)]
#[command(name = "widgetry")]
#[command(version = widgetry_core::VERSION)]
#[command(about = "Pluggable widget-list content engine", long_about = None)]
struct Cli {
    /// Path to a widgetry.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema if it does not exist
    InitDb,

    /// Print the ids of all widget lists
    Lists,

    /// Create a new, empty widget list
    CreateList,

    /// Print the rendered widgets of a list, in position order
    GetList {
        /// Widget list id
        list_id: i64,
    },

    /// Delete a widget list and everything in it
    DeleteList {
        /// Widget list id
        list_id: i64,
    },

    /// Print every widget class's form configuration
    Configurations,

    /// Validate and add a widget to a list
    AddWidget {
        /// Widget list id
        list_id: i64,

        /// Widget class name, e.g. "Text"
        #[arg(long)]
        class: String,

        /// Widget title
        #[arg(long)]
        title: String,

        /// Raw configuration as a JSON object
        #[arg(long, default_value = "{}")]
        data: String,

        /// Insert at this position instead of appending
        #[arg(long)]
        position: Option<i64>,
    },

    /// Print a widget's form data and its class configuration
    GetWidget {
        /// Widget id
        widget_id: i64,
    },

    /// Re-validate and overwrite a widget's title and configuration
    UpdateWidget {
        /// Widget id
        widget_id: i64,

        /// Widget title
        #[arg(long)]
        title: String,

        /// Raw configuration as a JSON object
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Reposition a widget within its list
    MoveWidget {
        /// Widget id
        widget_id: i64,

        /// Target position (clamped into range)
        position: i64,
    },

    /// Delete a widget and compact its list
    DeleteWidget {
        /// Widget id
        widget_id: i64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => WidgetryConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => WidgetryConfig::default(),
    };
    let service = WidgetService::from_config(&config).context("failed to start service")?;

    match cli.command {
        Commands::InitDb => {
            // Opening the store above already ran the migrations.
            println!("database ready at {}", config.db_path.display());
        }
        Commands::Lists => print_json(&service.list_lists()?)?,
        Commands::CreateList => print_json(&service.create_list()?)?,
        Commands::GetList { list_id } => print_json(&service.get_list(list_id)?)?,
        Commands::DeleteList { list_id } => print_json(&service.delete_list(list_id)?)?,
        Commands::Configurations => print_json(&service.describe_configurations()?)?,
        Commands::AddWidget {
            list_id,
            class,
            title,
            data,
            position,
        } => {
            let raw = parse_data(&data)?;
            print_json(&service.add_widget(list_id, &class, &title, &raw, position)?)?;
        }
        Commands::GetWidget { widget_id } => print_json(&service.get_widget(widget_id)?)?,
        Commands::UpdateWidget {
            widget_id,
            title,
            data,
        } => {
            let raw = parse_data(&data)?;
            print_json(&service.update_widget(widget_id, &title, &raw)?)?;
        }
        Commands::MoveWidget {
            widget_id,
            position,
        } => print_json(&service.move_widget(widget_id, position)?)?,
        Commands::DeleteWidget { widget_id } => print_json(&service.delete_widget(widget_id)?)?,
    }
    Ok(())
}

fn parse_data(data: &str) -> Result<JsonMap> {
    serde_json::from_str(data).context("--data must be a JSON object")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
