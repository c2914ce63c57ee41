//! Upload command implementation
//!
//! Converts a telemetry file for one subject, delivers it to the FHIR
//! repository and streams the JSON summary to stdout (or `--output`).

use crate::adapters::auth::{PemSigner, TokenEndpointClient};
use crate::adapters::fhir::{FhirClient, ResourceRepository};
use crate::adapters::store::{InMemoryStateStore, JsonFileStateStore, StateStorage};
use crate::config::{load_config, secret_string, BridgeConfig};
use crate::core::convert::ConverterOptions;
use crate::core::credential::CredentialRefresher;
use crate::core::state::StateManager;
use crate::core::upload::{DeliveryOptions, UploadOrchestrator};
use crate::domain::{Credential, SubjectId};
use clap::Args;
use std::sync::Arc;

/// Arguments for the upload command
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Patient resource id the data belongs to
    #[arg(long)]
    pub subject: String,

    /// Input file with a JSON array of telemetry entries (`-` for stdin)
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Where to write the JSON summary (`-` for stdout)
    #[arg(short, long, default_value = "-")]
    pub output: String,

    /// Bearer token to use when no credential is stored for the subject
    #[arg(long, env = "GLUCOBRIDGE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Ignore stored watermarks and resend everything
    #[arg(long)]
    pub full: bool,

    /// Keep state in memory only; nothing is read from or written to the state file
    #[arg(long)]
    pub no_state: bool,

    /// Submit chunks as batch bundles
    #[arg(long)]
    pub batch: bool,

    /// Override the number of delivery lanes
    #[arg(long)]
    pub lanes: Option<usize>,

    /// Override the narrative language (fi, en, sv, de)
    #[arg(long)]
    pub language: Option<String>,

    /// Override the resource profile (full, kanta_phr, diabetes_dossier)
    #[arg(long)]
    pub profile: Option<String>,
}

impl UploadArgs {
    fn apply_overrides(&self, config: &mut BridgeConfig) {
        if self.batch {
            tracing::info!("Enabling batch delivery from CLI");
            config.repository.batch_enabled = true;
        }
        if let Some(lanes) = self.lanes {
            tracing::info!(lanes, "Overriding delivery lanes from CLI");
            config.delivery.lanes = lanes;
        }
        if let Some(language) = &self.language {
            config.conversion.language = language.clone();
        }
        if let Some(profile) = &self.profile {
            config.conversion.profile = profile.clone();
        }
        if self.full {
            config.conversion.skip_old_records = false;
        }
    }

    /// Execute the upload command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(subject = %self.subject, input = %self.input, "Starting upload command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };
        self.apply_overrides(&mut config);
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let subject = match SubjectId::new(self.subject.clone()) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Invalid subject: {e}");
                return Ok(2);
            }
        };

        let converter = match ConverterOptions::from_config(
            subject.clone(),
            &config.conversion,
            config.repository.converter_name.clone(),
        ) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Invalid conversion settings: {e}");
                return Ok(2);
            }
        };

        let entries = super::read_entries(&self.input).await?;

        let storage: Arc<dyn StateStorage> = if self.no_state {
            Arc::new(InMemoryStateStore::new())
        } else {
            Arc::new(JsonFileStateStore::new(&config.state.path))
        };
        let state = StateManager::new_with_storage(storage);

        let client = match FhirClient::new(&config.repository) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create FHIR client");
                eprintln!("Failed to initialize repository client: {e}");
                return Ok(4);
            }
        };
        let repository: Arc<dyn ResourceRepository> = Arc::new(client);

        let credential = state.load_credential(&subject).await?;
        let refresher = self
            .credential_setup(&config, &subject, credential, repository.as_ref(), &state)
            .await?;

        let converter = if config.conversion.skip_old_records {
            let marks = state.latest_dates(&subject).await?;
            tracing::debug!(devices = marks.len(), "Applying stored watermarks");
            converter.with_skip_before(marks)
        } else {
            converter
        };

        let mut orchestrator = UploadOrchestrator::new(
            Arc::clone(&repository),
            DeliveryOptions::from_config(&config.delivery, &config.repository),
        );
        if let Some(refresher) = refresher {
            orchestrator = orchestrator.with_refresher(refresher);
        }

        state.begin_upload(&subject).await?;
        let out = super::open_output(&self.output).await?;

        let result = match orchestrator.upload_values(&entries, &converter, out).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, phase = %orchestrator.phase(), "Upload failed");
                eprintln!("Upload failed: {e}");
                state.fail_upload(&subject).await?;
                return Ok(5);
            }
        };

        state
            .finish_upload(&subject, &result.latest_seen_dates, result.success())
            .await?;

        if result.success() {
            Ok(0)
        } else {
            eprintln!(
                "Upload completed with {} failed record(s) out of {}",
                result.errors,
                result.total()
            );
            Ok(1)
        }
    }

    /// Installs the initial bearer token and builds the refresher when configured
    async fn credential_setup(
        &self,
        config: &BridgeConfig,
        subject: &SubjectId,
        stored: Option<Credential>,
        repository: &dyn ResourceRepository,
        state: &StateManager,
    ) -> anyhow::Result<Option<Arc<CredentialRefresher>>> {
        match (&stored, &self.access_token) {
            (Some(credential), _) => {
                repository
                    .set_bearer_token(credential.access_token.clone())
                    .await
            }
            (None, Some(token)) => {
                repository
                    .set_bearer_token(secret_string(token.clone()))
                    .await
            }
            (None, None) => {
                tracing::warn!(subject = %subject, "No stored credential; sending without a bearer token")
            }
        }

        let (Some(credential), Some(key_path)) = (stored, &config.credentials.private_key_path)
        else {
            return Ok(None);
        };
        let Some(endpoint) = TokenEndpointClient::from_config(&config.credentials)? else {
            return Ok(None);
        };

        let signer = PemSigner::from_pem_file(key_path)?;
        let refresher = CredentialRefresher::new(
            subject.clone(),
            credential,
            Arc::new(signer),
            Arc::new(endpoint),
            state.token_store(),
        )
        .with_margin(chrono::Duration::minutes(
            config.credentials.refresh_margin_minutes,
        ))
        .with_retry_backoff(chrono::Duration::seconds(
            config.credentials.retry_backoff_seconds,
        ));

        Ok(Some(Arc::new(refresher)))
    }
}
