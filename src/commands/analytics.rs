//! Analytics commands

use super::{format_duration_ms, format_time, truncate, Context};
use crate::cli::AnalyticsCommand;
use crate::error::Result;

use colored::Colorize;
use prettytable::{format, Table};

/// Handle analytics commands
pub fn handle_analytics(ctx: &Context, command: AnalyticsCommand) -> Result<()> {
    let store = ctx.analytics_store();

    match command {
        AnalyticsCommand::Show => {
            let analytics = store.get_analytics();
            let downloads = ctx.storage.downloads_count()?;

            println!("\nResearch Analytics\n");
            println!("Total reports:      {}", analytics.total_reports);
            println!(
                "Completed:          {}",
                analytics.completed_reports.to_string().green()
            );
            println!(
                "Failed:             {}",
                analytics.failed_reports.to_string().red()
            );
            println!("Success rate:       {:.1}%", analytics.success_rate());
            println!(
                "Avg. completion:    {}",
                format_duration_ms(analytics.average_completion_time)
            );
            println!("Downloads:          {}", downloads);

            if analytics.recent_activity.is_empty() {
                println!();
                println!("{}", "No recent activity.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
            table.add_row(prettytable::row![
                "When".bold(),
                "Action".bold(),
                "Topic".bold(),
                "ID".bold()
            ]);
            for entry in &analytics.recent_activity {
                let action = if entry.action == "Report Generated" {
                    entry.action.green()
                } else {
                    entry.action.red()
                };
                table.add_row(prettytable::row![
                    format_time(&entry.timestamp),
                    action,
                    truncate(&entry.topic, 40),
                    entry.id.cyan()
                ]);
            }

            println!("\nRecent Activity:");
            table.printstd();
            println!();
        }
        AnalyticsCommand::Reset => {
            store.reset()?;
            println!("{}", "Analytics reset.".green());
        }
    }

    Ok(())
}
