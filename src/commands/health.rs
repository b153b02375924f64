//! Service health check

use super::{format_time, Context};
use crate::error::{MresearchError, Result};

use colored::Colorize;

/// Query `/health` and print the service status
///
/// # Errors
///
/// Returns error if the service is unreachable or reports itself unhealthy
pub async fn check_health(ctx: &Context) -> Result<()> {
    let health = ctx.client.health().await?;

    let status = if health.is_healthy() {
        health.status.green()
    } else {
        health.status.red()
    };

    println!("\nService {}\n", ctx.client.base_url().as_str().cyan());
    println!("Status:             {}", status);
    println!("Checked at:         {}", format_time(&health.timestamp));
    println!("Research crew:      {}", ready(health.crew_initialized));
    println!("Knowledge (RAG):    {}", ready(health.rag_initialized));
    if let Some(stats) = &health.knowledge_stats {
        println!("Documents:          {}", stats.total_documents);
    }
    println!();

    if !health.is_healthy() {
        return Err(MresearchError::Api {
            status: 503,
            detail: Some(format!("Service reported status '{}'", health.status)),
        }
        .into());
    }
    Ok(())
}

fn ready(flag: bool) -> colored::ColoredString {
    if flag {
        "ready".green()
    } else {
        "not initialized".yellow()
    }
}
