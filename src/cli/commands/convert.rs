//! Convert command implementation
//!
//! Runs the conversion step alone and prints the resources as a JSON array.
//! Nothing is sent to the repository and no state is touched.

use crate::config::load_config;
use crate::core::convert::{self, ConverterOptions};
use crate::domain::SubjectId;
use clap::Args;
use tokio::io::AsyncWriteExt;

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Patient resource id used as the subject reference
    #[arg(long)]
    pub subject: String,

    /// Input file with a JSON array of telemetry entries (`-` for stdin)
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Where to write the resources (`-` for stdout)
    #[arg(short, long, default_value = "-")]
    pub output: String,

    /// Emit compact JSON instead of pretty-printed output
    #[arg(long)]
    pub compact: bool,
}

impl ConvertArgs {
    /// Execute the convert command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        let subject = match SubjectId::new(self.subject.clone()) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Invalid subject: {e}");
                return Ok(2);
            }
        };

        let options = ConverterOptions::from_config(
            subject,
            &config.conversion,
            config.repository.converter_name.clone(),
        )?;

        let entries = super::read_entries(&self.input).await?;
        let conversion = match convert::convert_values(&entries, &options) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Conversion failed: {e}");
                return Ok(5);
            }
        };

        let resources: Vec<_> = conversion.records.iter().map(|r| &r.resource).collect();
        let mut json = if self.compact {
            serde_json::to_vec(&resources)?
        } else {
            serde_json::to_vec_pretty(&resources)?
        };
        json.push(b'\n');

        let mut out = super::open_output(&self.output).await?;
        out.write_all(&json).await?;
        out.flush().await?;

        tracing::info!(
            input = entries.len(),
            converted = conversion.records.len(),
            rejected = conversion.rejected.len(),
            ignored = conversion.ignored,
            "Conversion written"
        );
        for rejected in &conversion.rejected {
            eprintln!(
                "Entry {} ({}) skipped: {}",
                rejected.index, rejected.kind, rejected.error
            );
        }

        Ok(0)
    }
}
