use crate::cmd::{block_on, config_or_default};
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use genie_core::tickets::{publish_plan, JiraClient, TicketPlan};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum TicketsSubcommand {
    /// Create the epic, stories, sub-tasks and tests of a plan in Jira
    Publish {
        /// Ticket plan JSON (e.g. tickets.json from a run directory)
        plan: PathBuf,
        /// Jira project key (default: jira.project_key from config)
        #[arg(long)]
        project: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: TicketsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TicketsSubcommand::Publish { plan, project } => publish(root, &plan, project, json),
    }
}

fn publish(root: &Path, plan_path: &Path, project: Option<String>, json: bool) -> anyhow::Result<()> {
    let config = config_or_default(root)?;
    let data = std::fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read {}", plan_path.display()))?;
    let plan: TicketPlan = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a ticket plan", plan_path.display()))?;

    let project = project
        .or_else(|| config.jira.project_key.clone())
        .context("no Jira project given (use --project or set jira.project_key)")?;

    let jira = &config.jira;
    let client = JiraClient::from_env(&jira.base_url_env, &jira.email_env, &jira.token_env)?;
    let published = block_on(publish_plan(&client, &project, &plan))?
        .context("failed to publish tickets")?;

    if json {
        print_json(&published)?;
    } else {
        println!("Epic:    {}", published.epic);
        for key in &published.stories {
            println!("Story:   {key}");
        }
        for key in &published.tasks {
            println!("Task:    {key}");
        }
        for key in &published.tests {
            println!("Test:    {key}");
        }
        println!("\nCreated {} issue(s) in {project}.", plan.issue_count());
    }
    Ok(())
}
