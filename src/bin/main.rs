use actix_web::middleware::{NormalizePath, TrailingSlash};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scribe::config::Config;
use scribe::core::db;
use scribe::{groups, handlers, AppState};

#[derive(Parser)]
#[command(name = "scribe", about = "Blogging platform server and admin tasks")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (the default)
    Serve,
    /// Create a group posts can be filed under
    CreateGroup {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Fill the database with a few demo users, posts and a follow
    SeedDemo,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = db::connect(&config.database_url).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pool).await,
        Command::CreateGroup {
            title,
            slug,
            description,
        } => {
            let group = groups::create_group(&pool, &title, &slug, &description).await?;
            println!("created group {} ({})", group.title, group.slug);
            Ok(())
        }
        Command::SeedDemo => db::init_demo_data(&pool).await,
    }
}

async fn serve(config: Config, pool: sqlx::SqlitePool) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.media_root)
        .await
        .with_context(|| format!("failed to create media root {}", config.media_root.display()))?;

    let bind_addr = config.bind_addr.clone();
    let state = web::Data::new(AppState::new(config, pool));

    tracing::info!(addr = %bind_addr, "server listening");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(NormalizePath::new(TrailingSlash::Always))
            .wrap(TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .run()
    .await?;

    Ok(())
}
