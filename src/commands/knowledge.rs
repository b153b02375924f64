//! Knowledge base commands

use super::{format_size, format_time, with_store_message, Context};
use crate::api::KnowledgeStats;
use crate::cli::KnowledgeCommand;
use crate::error::Result;
use crate::knowledge::KnowledgeStore;

use colored::Colorize;
use prettytable::{format, Table};

/// Handle knowledge commands
pub async fn handle_knowledge(ctx: &Context, command: KnowledgeCommand) -> Result<()> {
    let store = ctx.knowledge_store();
    let outcome = run(&store, command).await;
    outcome.map_err(|e| with_store_message(e, store.snapshot().error))
}

async fn run(store: &KnowledgeStore, command: KnowledgeCommand) -> Result<()> {
    match command {
        KnowledgeCommand::Stats => {
            let stats = store.load_stats().await?;
            print_stats(&stats);
        }
        KnowledgeCommand::Files => {
            store.load_files().await?;
            print_files(store);
        }
        KnowledgeCommand::Upload { path } => {
            let response = store.upload_file(&path).await?;
            println!("{}", response.message.green());
            println!(
                "Stored as {} ({})",
                response.file_path,
                format_size(response.size)
            );
            warn_stale(store);
        }
        KnowledgeCommand::Delete { name } => {
            store.delete_file(&name).await?;
            println!("{}", format!("Deleted {}", name).green());
            warn_stale(store);
        }
        KnowledgeCommand::Reindex => {
            store.reindex_knowledge().await?;
            println!("{}", "Knowledge base reindexed.".green());
            warn_stale(store);
            if let Some(stats) = store.snapshot().stats {
                print_stats(&stats);
            }
        }
    }
    Ok(())
}

/// Report a refresh that failed after the server accepted the change
fn warn_stale(store: &KnowledgeStore) {
    if let Some(message) = store.snapshot().error {
        eprintln!("{} {}", "Warning: could not refresh:".yellow(), message);
    }
}

fn print_stats(stats: &KnowledgeStats) {
    println!("\nKnowledge Base\n");
    println!("Total documents:    {}", stats.total_documents);
    println!("Company profiles:   {}", stats.company_profiles);
    println!("Industry reports:   {}", stats.industry_reports);
    println!("Market data:        {}", stats.market_data);
    println!("User preferences:   {}", stats.user_preferences);
    println!("Last updated:       {}", format_time(&stats.last_updated));
    println!();
}

fn print_files(store: &KnowledgeStore) {
    let listing = store.snapshot().files;
    if let Some(message) = &listing.error {
        println!("{}", message.yellow());
    }
    if listing.files.is_empty() {
        println!("{}", "No knowledge documents found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "Name".bold(),
        "Category".bold(),
        "Size".bold(),
        "Modified".bold()
    ]);
    for file in &listing.files {
        let modified = file
            .modified
            .as_ref()
            .map(format_time)
            .unwrap_or_else(|| "-".to_string());
        table.add_row(prettytable::row![
            file.name.cyan(),
            file.category,
            format_size(file.size),
            modified
        ]);
    }

    println!("\nKnowledge Documents ({}):", listing.total);
    table.printstd();
    println!();
}
