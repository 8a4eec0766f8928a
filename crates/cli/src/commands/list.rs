//! Listing cached items

use anyhow::{Context, Result};
use silauto::{drafts_for, model::CacheDomain, projects_page, scriptures_matching};

use crate::{ListCommand, format};

/// Scan once, then list one domain through the query helpers
pub async fn cmd_list(command: ListCommand) -> Result<()> {
  let config = super::load_config()?;
  let orchestrator = super::scanned_orchestrator(&config).await?;

  let domain = match &command {
    ListCommand::Scriptures { .. } => CacheDomain::Scripture,
    ListCommand::Projects { .. } => CacheDomain::Project,
    ListCommand::Drafts { .. } => CacheDomain::Translation,
  };
  let entries = orchestrator.entries(domain).await;
  orchestrator.shutdown().await;
  let entries = entries.with_context(|| format!("Failed to list {domain} entries"))?;

  match command {
    ListCommand::Scriptures { query, json } => {
      let scriptures = scriptures_matching(&entries, query.as_deref());
      if json {
        println!("{}", serde_json::to_string_pretty(&scriptures)?);
      } else {
        print!("{}", format::format_scriptures(&scriptures));
      }
    }
    ListCommand::Projects {
      skip,
      limit,
      scripture_filename,
      json,
    } => {
      let projects = projects_page(&entries, skip, limit, scripture_filename.as_deref());
      if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
      } else {
        print!("{}", format::format_projects(&projects));
      }
    }
    ListCommand::Drafts {
      project_id,
      experiment,
      json,
    } => {
      let drafts = drafts_for(&entries, project_id.as_deref(), experiment.as_deref())?;
      if json {
        println!("{}", serde_json::to_string_pretty(&drafts)?);
      } else {
        print!("{}", format::format_drafts(&drafts));
      }
    }
  }
  Ok(())
}
