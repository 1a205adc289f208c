use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dynamo::catalog::{ENTITY_TABLE, FIELD_TABLE, NAMESPACE_TABLE};
use dynamo::{
    Dynamo, DynamoConfig, EntityDef, EntityKey, FieldDef, InMemoryStorage, NamespaceDef,
    SynthesizedType,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "dynamo")]
#[command(about = "Load entity definitions and inspect the synthesized types and tables")]
struct Cli {
    /// JSON file of namespaces, entities and fields to define
    #[arg(long)]
    manifest: PathBuf,

    /// Optional JSON engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every synthesized type as JSON
    Types,
    /// Print the field-type choices offered to operators
    Choices,
    /// Print the CREATE TABLE statements of the resulting tables
    Ddl {
        /// Include the catalog system tables
        #[arg(long)]
        system: bool,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Manifest {
    namespaces: Vec<NamespaceDef>,
    entities: Vec<EntityDef>,
    fields: Vec<FieldDef>,
}

impl Manifest {
    fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid manifest '{}'", path.display()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DynamoConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => DynamoConfig::default(),
    };
    let manifest = Manifest::load(&cli.manifest)?;

    let dynamo = Dynamo::new(Arc::new(InMemoryStorage::new()), config);
    dynamo.install().await?;
    apply(&dynamo, &manifest).await?;

    match cli.command {
        Command::Types => {
            let mut types = Vec::new();
            for key in entity_keys(&manifest) {
                types.push(dynamo.get_type(&key.namespace, &key.name).await?);
            }
            println!("{}", render_types(&types)?);
        }
        Command::Choices => {
            println!("{}", serde_json::to_string_pretty(&dynamo.choices().await)?);
        }
        Command::Ddl { system } => {
            for table in dynamo.storage().list_tables().await {
                let is_system = [NAMESPACE_TABLE, ENTITY_TABLE, FIELD_TABLE].contains(&table.as_str());
                if is_system && !system {
                    continue;
                }
                let schema = dynamo.storage().get_schema(&table).await?;
                println!("{};", schema.to_create_sql());
            }
        }
    }
    Ok(())
}

async fn apply(dynamo: &Dynamo, manifest: &Manifest) -> Result<()> {
    for def in &manifest.namespaces {
        dynamo
            .save_namespace(def.clone())
            .await
            .with_context(|| format!("Namespace '{}'", def.name))?;
    }
    for def in &manifest.entities {
        dynamo
            .save_entity(def.clone())
            .await
            .with_context(|| format!("Entity '{}'", def.key()))?;
    }
    for def in &manifest.fields {
        dynamo
            .save_field(def.clone())
            .await
            .with_context(|| format!("Field '{}' of '{}'", def.name, def.entity_key()))?;
    }
    info!(
        "Applied {} namespaces, {} entities, {} fields",
        manifest.namespaces.len(),
        manifest.entities.len(),
        manifest.fields.len()
    );
    Ok(())
}

fn entity_keys(manifest: &Manifest) -> Vec<EntityKey> {
    manifest.entities.iter().map(EntityDef::key).collect()
}

fn render_types(types: &[Arc<SynthesizedType>]) -> Result<String> {
    let types: Vec<&SynthesizedType> = types.iter().map(Arc::as_ref).collect();
    Ok(serde_json::to_string_pretty(&types)?)
}
