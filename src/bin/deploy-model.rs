//! deploy-model CLI - inspect the deployment data model
//!
//! Prints the SQL schema, resolved options menus and the relation list for
//! a given settings file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use deploy_model::store::sql::{create_order, schema_sql, Dialect};
use deploy_model::{all_modules, resolve_options_menu, Model, RequestContext, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deploy-model")]
#[command(version, about = "Deployment and alert data model tools", long_about = None)]
struct Cli {
    /// Settings file (defaults to $DEPLOY_SETTINGS, then built-in defaults)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print CREATE TABLE statements for every enabled relation
    Schema {
        /// SQL dialect (postgres, mysql)
        #[arg(short, long, default_value = "postgres")]
        dialect: String,
    },

    /// Print the resolved options menu of a controller as JSON
    Menu {
        /// Controller name (inv, org, req, deploy)
        controller: String,

        /// Role held by the user; may be repeated
        #[arg(short, long = "role")]
        roles: Vec<String>,
    },

    /// Load the settings and check the model for dangling references
    Validate,

    /// List relations in creation order
    Tables,

    /// Create missing tables in the database at $DATABASE_URL
    #[cfg(any(feature = "postgres", feature = "mysql"))]
    Migrate,
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_settings(cli.settings).and_then(|settings| match cli.command {
        Commands::Schema { dialect } => print_schema(&settings, &dialect),
        Commands::Menu { controller, roles } => print_menu(settings, &controller, roles),
        Commands::Validate => validate(&settings),
        Commands::Tables => print_tables(&settings),
        #[cfg(any(feature = "postgres", feature = "mysql"))]
        Commands::Migrate => migrate(&settings),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings, String> {
    let path = path.or_else(|| std::env::var("DEPLOY_SETTINGS").ok().map(PathBuf::from));
    match path {
        Some(path) => Settings::load_from_file(&path).map_err(|e| e.to_string()),
        None => Ok(Settings::default()),
    }
}

fn load_model(settings: &Settings) -> Result<Model, String> {
    Model::load(&all_modules(), settings).map_err(|e| e.to_string())
}

fn print_schema(settings: &Settings, dialect: &str) -> Result<(), String> {
    let dialect: Dialect = dialect.parse()?;
    let model = load_model(settings)?;
    let sql = schema_sql(&model, dialect).map_err(|e| e.to_string())?;
    println!("{}", sql);
    Ok(())
}

fn print_menu(settings: Settings, controller: &str, roles: Vec<String>) -> Result<(), String> {
    let ctx = roles
        .into_iter()
        .fold(RequestContext::new(Arc::new(settings)), |ctx, role| ctx.with_role(role));

    let menu = resolve_options_menu(&ctx, controller)
        .ok_or_else(|| format!("No options menu for controller '{}'", controller))?;
    let json = serde_json::to_string_pretty(&menu).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn validate(settings: &Settings) -> Result<(), String> {
    let model = load_model(settings)?;
    model.check().map_err(|e| e.to_string())?;

    println!("✓ {} modules enabled", settings.modules.len());
    println!("✓ {} relations defined", model.tables().count());
    Ok(())
}

fn print_tables(settings: &Settings) -> Result<(), String> {
    let model = load_model(settings)?;
    for table in create_order(&model).map_err(|e| e.to_string())? {
        let super_entity = table
            .super_entity
            .as_ref()
            .map(|s| format!(" ({})", s.name))
            .unwrap_or_default();
        println!("{}{}", table.name, super_entity);
    }
    Ok(())
}

#[cfg(any(feature = "postgres", feature = "mysql"))]
fn migrate(settings: &Settings) -> Result<(), String> {
    let url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is not set".to_string())?;
    let model = load_model(settings)?;

    let database = deploy_model::Database::new(&url).map_err(|e| e.to_string())?;
    database.test_connection().map_err(|e| e.to_string())?;
    let created = database.migrate(&model).map_err(|e| e.to_string())?;

    println!("✓ {} tables ensured", created);
    Ok(())
}
