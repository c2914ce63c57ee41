//! Status command implementation
//!
//! Shows the stored upload status, credential expiry and device watermarks
//! per subject.

use crate::adapters::store::JsonFileStateStore;
use crate::config::load_config;
use crate::core::state::{StateManager, SubjectState};
use chrono::Utc;
use clap::Args;
use std::sync::Arc;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this subject
    #[arg(long)]
    pub subject: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking upload status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let state_manager = StateManager::new_with_storage(Arc::new(JsonFileStateStore::new(
            &config.state.path,
        )));

        let states = match state_manager.all_states().await {
            Ok(s) => s,
            Err(e) => {
                println!("Failed to read state file {}", config.state.path);
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let mut states: Vec<SubjectState> = states
            .into_iter()
            .filter(|s| {
                self.subject
                    .as_deref()
                    .map_or(true, |wanted| s.subject.as_str() == wanted)
            })
            .collect();
        states.sort_by(|a, b| a.subject.as_str().cmp(b.subject.as_str()));

        if states.is_empty() {
            println!("No upload history found.");
            println!("Run 'glucobridge upload --subject <id>' to start uploading data.");
            return Ok(0);
        }

        println!("Upload Status ({} subject(s))", states.len());
        println!();
        for state in &states {
            print_state(state);
        }

        Ok(0)
    }
}

fn print_state(state: &SubjectState) {
    println!("Subject: {}", state.subject);
    println!("  Last Upload: {:?}", state.last_upload_status);
    if let Some(started) = state.last_upload_started_at {
        println!("  Started: {}", started.to_rfc3339());
    }
    if let Some(duration) = state.last_upload_duration() {
        println!("  Duration: {}ms", duration.num_milliseconds());
    }

    match &state.credential {
        Some(credential) if credential.expires <= Utc::now() => {
            println!("  Credential: expired at {}", credential.expires.to_rfc3339())
        }
        Some(credential) => println!("  Credential: valid until {}", credential.expires.to_rfc3339()),
        None => println!("  Credential: none"),
    }

    if state.latest_dates.is_empty() {
        println!("  Watermarks: none");
    } else {
        println!("  Watermarks:");
        let mut devices: Vec<_> = state.latest_dates.iter().collect();
        devices.sort_by(|a, b| a.0.cmp(b.0));
        for (device, latest) in devices {
            println!("    {device}: {}", latest.to_rfc3339());
        }
    }
    println!();
}
