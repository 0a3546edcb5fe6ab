use crate::cmd::block_on;
use crate::output::print_json;
use anyhow::Context;
use genie_agent::ChatMessage;
use genie_core::prompt::{build_prompt, PromptContext, PromptKind};
use genie_core::{agents, profile::ProfileStore, Config};
use std::io::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub fn run(root: &Path, name: &str, message: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let profile = ProfileStore::new(root).load(name)?;
    let person = profile.display_name();
    let context = profile.personality_context();

    let prompt = build_prompt(
        PromptKind::Advice,
        &PromptContext {
            profile: Some(context.as_str()),
            person: Some(person.as_str()),
            message: Some(message),
            ..Default::default()
        },
    )?;
    let invoker = config.build_invoker()?;
    let advisor = agents::advisor(&config.model);

    let advice = block_on(async {
        let cancel = CancellationToken::new();
        let watcher = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                watcher.cancel();
            }
        });
        invoker
            .invoke_streamed(&advisor, &[ChatMessage::user(prompt)], &cancel, |delta| {
                if !json {
                    let mut out = std::io::stdout().lock();
                    let _ = out.write_all(delta.as_bytes());
                    let _ = out.flush();
                }
            })
            .await
    })?
    .context("advisor call failed")?;

    if json {
        print_json(&serde_json::json!({ "person": person, "advice": advice }))?;
    } else {
        println!();
    }
    Ok(())
}
