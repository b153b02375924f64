//! Report listing command

use super::{format_time, truncate, Context};
use crate::cli::ReportsCommand;
use crate::error::Result;

use colored::Colorize;
use prettytable::{format, Table};

/// Handle report commands
///
/// The listing merges locally archived reports with completed jobs from the
/// service history. When the service is unreachable only archived reports
/// are shown.
pub async fn handle_reports(ctx: &Context, command: ReportsCommand) -> Result<()> {
    match command {
        ReportsCommand::List => {
            let store = ctx.research_store();
            if let Err(e) = store
                .load_history(ctx.config.history.default_limit, 0)
                .await
            {
                tracing::warn!("Showing archived reports only: {:#}", e);
                println!(
                    "{}",
                    "Service unavailable, showing archived reports only.".yellow()
                );
            }

            let reports = store.completed_reports()?;
            if reports.is_empty() {
                println!("{}", "No completed reports found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
            table.add_row(prettytable::row![
                "ID".bold(),
                "Topic".bold(),
                "Completed".bold(),
                "Archived".bold()
            ]);

            for report in reports {
                let completed = report
                    .completed_at
                    .as_ref()
                    .map(format_time)
                    .unwrap_or_else(|| "-".to_string());
                let archived = if report.stored {
                    "yes".green()
                } else {
                    "no".dimmed()
                };
                table.add_row(prettytable::row![
                    report.research_id.cyan(),
                    truncate(&report.research_topic, 40),
                    completed,
                    archived
                ]);
            }

            println!("\nCompleted Reports:");
            table.printstd();
            println!();
            println!(
                "Use {} to export a report.",
                "mresearch research download <ID>".cyan()
            );
            println!();
        }
    }

    Ok(())
}
