//! Terminal answers for the engine's credential and plugin questions.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use storm_sync::{CredentialPrompt, PluginPrompt};
use tracing::warn;

/// Print `question` and read one line from stdin off the runtime.
async fn ask(question: String) -> Option<String> {
    let answer = tokio::task::spawn_blocking(move || {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{question}");
        let _ = stderr.flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    })
    .await;

    match answer {
        Ok(answer) => answer,
        Err(e) => {
            warn!("stdin prompt failed: {}", e);
            None
        }
    }
}

pub struct StdinCredentials;

#[async_trait]
impl CredentialPrompt for StdinCredentials {
    async fn api_key(&self) -> Option<String> {
        ask("storm daemon requires an API key: ".to_string())
            .await
            .filter(|key| !key.is_empty())
    }
}

pub struct StdinPlugins;

#[async_trait]
impl PluginPrompt for StdinPlugins {
    async fn confirm_enable(&self, plugin: &str) -> bool {
        let answer = ask(format!("the {plugin} plugin is disabled; enable it? [y/N] ")).await;
        matches!(answer.as_deref(), Some("y" | "Y" | "yes"))
    }
}
