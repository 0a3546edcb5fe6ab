use crate::cmd::{block_on, config_or_default};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use genie_core::profile::{ProfileClient, ProfileLookup, ProfileStore};
use std::path::Path;

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// Fetch a profile by email or LinkedIn URL and save it
    Fetch {
        #[arg(long, conflicts_with = "linkedin", required_unless_present = "linkedin")]
        email: Option<String>,
        #[arg(long)]
        linkedin: Option<String>,
    },

    /// List saved profiles
    List,

    /// Show a saved profile's personality summary
    Show { name: String },

    /// Delete a saved profile
    Delete { name: String },
}

pub fn run(root: &Path, subcmd: ProfileSubcommand, json: bool) -> anyhow::Result<()> {
    let store = ProfileStore::new(root);
    match subcmd {
        ProfileSubcommand::Fetch { email, linkedin } => {
            let lookup = match (email, linkedin) {
                (Some(e), _) => ProfileLookup::Email(e),
                (None, Some(u)) => ProfileLookup::LinkedIn(u),
                (None, None) => anyhow::bail!("pass --email or --linkedin"),
            };
            fetch(root, &store, &lookup, json)
        }
        ProfileSubcommand::List => list(&store, json),
        ProfileSubcommand::Show { name } => show(&store, &name, json),
        ProfileSubcommand::Delete { name } => {
            store
                .delete(&name)
                .with_context(|| format!("failed to delete profile '{name}'"))?;
            println!("Deleted profile '{name}'.");
            Ok(())
        }
    }
}

fn fetch(root: &Path, store: &ProfileStore, lookup: &ProfileLookup, json: bool) -> anyhow::Result<()> {
    let config = config_or_default(root)?;
    let client = ProfileClient::from_env(config.profiles.base_url.clone(), &config.profiles.token_env)?;
    let profile = block_on(client.fetch(lookup))?
        .with_context(|| format!("failed to fetch profile for {lookup}"))?;
    let stem = store.save(&profile).context("failed to save profile")?;

    if json {
        print_json(&serde_json::json!({ "saved": stem, "profile": profile }))?;
    } else {
        println!("Saved profile for {} as '{stem}'.", profile.display_name());
    }
    Ok(())
}

fn list(store: &ProfileStore, json: bool) -> anyhow::Result<()> {
    let entries = store.list().context("failed to list profiles")?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No saved profiles. Use `reqgenie profile fetch --email <address>`.");
        return Ok(());
    }
    let rows = entries
        .into_iter()
        .map(|e| vec![e.stem, e.name])
        .collect();
    print_table(&["STEM", "NAME"], rows);
    Ok(())
}

fn show(store: &ProfileStore, name: &str, json: bool) -> anyhow::Result<()> {
    let profile = store.load(name)?;
    if json {
        print_json(&profile)?;
    } else {
        println!("{}\n", profile.display_name());
        println!("{}", profile.personality_context());
    }
    Ok(())
}
