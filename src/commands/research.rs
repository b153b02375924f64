//! Research job commands

use super::{format_time, status_label, truncate, with_store_message, Context};
use crate::api::{JobStatus, ResearchBackend, ResearchJob, ResearchRequest};
use crate::cli::ResearchCommand;
use crate::error::Result;
use crate::research::ResearchStore;
use crate::storage::pdf_file_name;

use colored::Colorize;
use prettytable::{format, Table};
use std::path::PathBuf;

/// Handle research commands
pub async fn handle_research(ctx: &Context, command: ResearchCommand) -> Result<()> {
    match command {
        ResearchCommand::Start {
            topic,
            request,
            user_id,
            no_wait,
        } => {
            let mut research = ResearchRequest::new(topic, request);
            research.user_id = user_id;
            start(ctx, research, no_wait).await
        }
        ResearchCommand::Status { id } => status(ctx, &id).await,
        ResearchCommand::Watch { id } => watch(ctx, &id).await,
        ResearchCommand::Result { id } => result(ctx, &id).await,
        ResearchCommand::History {
            limit,
            offset,
            search,
            status,
        } => {
            let limit = limit.unwrap_or(ctx.config.history.default_limit);
            history(ctx, limit, offset, search.as_deref().unwrap_or(""), status).await
        }
        ResearchCommand::Delete { id } => delete(ctx, &id).await,
        ResearchCommand::Download { id, output } => download(ctx, &id, output).await,
    }
}

async fn start(ctx: &Context, request: ResearchRequest, no_wait: bool) -> Result<()> {
    let store = ctx.research_store();
    let job = match store.start_research(request).await {
        Ok(job) => job,
        Err(e) => return Err(with_store_message(e, store.snapshot().error)),
    };

    println!(
        "{} research {} ({})",
        "Started".green().bold(),
        job.research_id.cyan(),
        status_label(job.status)
    );

    if no_wait || !job.status.is_active() {
        if job.status.is_active() {
            println!(
                "Follow it with {}",
                format!("mresearch research watch {}", job.research_id).cyan()
            );
        } else {
            print_outcome(&job);
        }
        return Ok(());
    }

    follow(&store).await
}

async fn status(ctx: &Context, id: &str) -> Result<()> {
    let job = ctx.client.research_status(id).await?;
    print_job(&job);
    Ok(())
}

async fn watch(ctx: &Context, id: &str) -> Result<()> {
    let job = ctx.client.research_status(id).await?;
    if job.status.is_terminal() {
        print_outcome(&job);
        return Ok(());
    }

    let store = ctx.research_store();
    store.set_current_research(Some(job));
    store.poll_research_status(id);
    follow(&store).await
}

/// Render snapshots until the followed job finishes or the user hits Ctrl+C
async fn follow(store: &ResearchStore) -> Result<()> {
    let mut updates = store.subscribe();
    let mut last_line = String::new();

    loop {
        let snapshot = updates.borrow_and_update().clone();
        if let Some(job) = snapshot {
            let line = progress_line(&job);
            if line != last_line {
                println!("{}", line);
                last_line = line;
            }
            if job.status.is_terminal() {
                print_outcome(&job);
                return Ok(());
            }
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                store.stop_polling();
                println!();
                println!("{}", "Stopped following; the job keeps running on the service.".yellow());
                return Ok(());
            }
        }
    }
}

fn progress_line(job: &ResearchJob) -> String {
    let mut line = format!(
        "[{:>3}%] {}",
        job.progress_percentage(),
        status_label(job.status)
    );
    if let Some(progress) = &job.progress {
        if !progress.current_phase.is_empty() {
            line.push_str(&format!("  {}", progress.current_phase));
        }
        if let Some(task) = &progress.active_task {
            line.push_str(&format!("  ({})", task.dimmed()));
        }
    }
    line
}

fn print_outcome(job: &ResearchJob) {
    match job.status {
        JobStatus::Completed => {
            println!(
                "{} Research {} completed.",
                "✓".green().bold(),
                job.research_id.cyan()
            );
            println!(
                "View it with {}",
                format!("mresearch research result {}", job.research_id).cyan()
            );
        }
        JobStatus::Failed => {
            println!(
                "{} Research {} failed: {}",
                "✗".red().bold(),
                job.research_id.cyan(),
                job.error.as_deref().unwrap_or("no error message")
            );
        }
        JobStatus::Pending | JobStatus::Running => {}
    }
}

fn print_job(job: &ResearchJob) {
    println!("\nResearch {}\n", job.research_id.cyan());
    println!("Status:     {}", status_label(job.status));
    println!("Progress:   {}%", job.progress_percentage());
    println!("Created:    {}", format_time(&job.created_at));
    if let Some(completed) = &job.completed_at {
        println!("Completed:  {}", format_time(completed));
    }
    if let Some(progress) = &job.progress {
        println!("Phase:      {}", progress.current_phase);
        if !progress.tasks.is_empty() {
            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
            table.add_row(prettytable::row![
                "Task".bold(),
                "Agent".bold(),
                "Status".bold()
            ]);
            for task in &progress.tasks {
                table.add_row(prettytable::row![
                    task.task_name,
                    task.agent,
                    format!("{:?}", task.status).to_lowercase()
                ]);
            }
            println!();
            table.printstd();
        }
    }
    if let Some(error) = &job.error {
        println!("Error:      {}", error.red());
    }
    println!();
}

async fn result(ctx: &Context, id: &str) -> Result<()> {
    let store = ctx.research_store();
    let result = match store.get_result(id).await {
        Ok(result) => result,
        Err(e) => return Err(with_store_message(e, store.snapshot().error)),
    };

    match result.result {
        Some(text) => println!("{}", text),
        None => println!("{}", "No result available for this research.".yellow()),
    }
    Ok(())
}

async fn history(
    ctx: &Context,
    limit: usize,
    offset: usize,
    search: &str,
    status: Option<JobStatus>,
) -> Result<()> {
    let store = ctx.research_store();
    if let Err(e) = store.load_history(limit, offset).await {
        return Err(with_store_message(e, store.snapshot().error));
    }

    let items = store.snapshot().filter_history(search, status);
    if items.is_empty() {
        println!("{}", "No research history found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "ID".bold(),
        "Topic".bold(),
        "Status".bold(),
        "Created".bold(),
        "Completed".bold()
    ]);

    for item in items {
        let completed = item
            .completed_at
            .as_ref()
            .map(format_time)
            .unwrap_or_else(|| "-".to_string());
        table.add_row(prettytable::row![
            item.research_id.cyan(),
            truncate(&item.research_topic, 40),
            status_label(item.status),
            format_time(&item.created_at),
            completed
        ]);
    }

    println!("\nResearch History:");
    table.printstd();
    println!();
    Ok(())
}

async fn delete(ctx: &Context, id: &str) -> Result<()> {
    let store = ctx.research_store();
    if let Err(e) = store.delete_research(id).await {
        return Err(with_store_message(e, store.snapshot().error));
    }
    println!("{}", format!("Deleted research {}", id).green());
    Ok(())
}

async fn download(ctx: &Context, id: &str, output: Option<PathBuf>) -> Result<()> {
    let store = ctx.research_store();
    let path = match output {
        Some(path) => path,
        None => PathBuf::from(default_pdf_name(&store, id)?),
    };

    let written = match store.download_pdf(id, &path).await {
        Ok(written) => written,
        Err(e) => return Err(with_store_message(e, store.snapshot().error)),
    };
    println!(
        "{} {} ({})",
        "Saved".green().bold(),
        path.display(),
        super::format_size(written as u64)
    );
    Ok(())
}

/// File name derived from the archived topic, falling back to the job id
fn default_pdf_name(store: &ResearchStore, id: &str) -> Result<String> {
    let topic = store
        .get_stored_reports()?
        .into_iter()
        .find(|report| report.research_id() == id)
        .map(|report| report.research_topic);
    Ok(match topic {
        Some(topic) => pdf_file_name(&topic),
        None => format!("research-{}.pdf", id),
    })
}
