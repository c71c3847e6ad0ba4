//! rum CLI - drive the sync engine and browse synced groups from the terminal

mod cli;
mod commands;
mod error;

use clap::Parser;
use rum_core::models::{CounterKind, RelationKind};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::load_settings;
use crate::commands::feed::{
    run_clear, run_comments, run_groups, run_notifications, run_posts, run_relations,
    run_status,
};
use crate::commands::publish::{
    run_comment, run_delete, run_post, run_profile, run_react, run_relate,
};
use crate::commands::run::run_engine;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref(), cli.db_path)?;

    match cli.command {
        Commands::Run { active } => run_engine(&settings, active).await?,
        Commands::Groups { json } => run_groups(&settings, json).await?,
        Commands::Posts {
            group,
            publisher,
            limit,
            json,
        } => run_posts(&settings, &group, publisher.as_deref(), limit, json).await?,
        Commands::Comments { post, limit, json } => {
            run_comments(&settings, &post, limit, json).await?;
        }
        Commands::Post {
            group,
            title,
            content,
        } => run_post(&settings, &group, title, &content).await?,
        Commands::Comment {
            group,
            post,
            reply_to,
            content,
        } => run_comment(&settings, &group, &post, reply_to.as_deref(), &content).await?,
        Commands::Like(args) => {
            run_react(&settings, &args.group, &args.object, CounterKind::Like).await?;
        }
        Commands::Dislike(args) => {
            run_react(&settings, &args.group, &args.object, CounterKind::Dislike).await?;
        }
        Commands::UndoLike(args) => {
            run_react(&settings, &args.group, &args.object, CounterKind::UndoLike).await?;
        }
        Commands::UndoDislike(args) => {
            run_react(&settings, &args.group, &args.object, CounterKind::UndoDislike).await?;
        }
        Commands::Delete { group, post } => run_delete(&settings, &group, &post).await?,
        Commands::Profile {
            group,
            name,
            wallet,
        } => run_profile(&settings, &group, &name, wallet).await?,
        Commands::Follow(args) => {
            run_relate(&settings, &args.group, &args.target, RelationKind::Follow).await?;
        }
        Commands::Unfollow(args) => {
            run_relate(&settings, &args.group, &args.target, RelationKind::Unfollow).await?;
        }
        Commands::Block(args) => {
            run_relate(&settings, &args.group, &args.target, RelationKind::Block).await?;
        }
        Commands::Unblock(args) => {
            run_relate(&settings, &args.group, &args.target, RelationKind::Unblock).await?;
        }
        Commands::Relations {
            group,
            publisher,
            json,
        } => run_relations(&settings, &group, publisher.as_deref(), json).await?,
        Commands::Notifications {
            group,
            read,
            limit,
            json,
        } => run_notifications(&settings, &group, read, limit, json).await?,
        Commands::Status { group, json } => run_status(&settings, &group, json).await?,
        Commands::Clear { yes } => run_clear(&settings, yes).await?,
    }

    Ok(())
}
