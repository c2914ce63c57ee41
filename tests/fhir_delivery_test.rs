//! End-to-end delivery against a mock FHIR repository and token endpoint

use chrono::{Duration, TimeZone, Utc};
use glucobridge::adapters::auth::{PemSigner, TokenEndpointClient};
use glucobridge::adapters::fhir::FhirClient;
use glucobridge::adapters::store::JsonFileStateStore;
use glucobridge::config::{secret_string, RepositoryConfig};
use glucobridge::core::convert::ConverterOptions;
use glucobridge::core::credential::CredentialRefresher;
use glucobridge::core::state::{StateManager, UploadStatus};
use glucobridge::core::upload::{DeliveryOptions, UploadOrchestrator};
use glucobridge::domain::{Credential, DeviceId, EntryKind, SubjectId, TelemetryEntry};
use mockito::Matcher;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

const PRIVATE_KEY: &[u8] = include_bytes!("fixtures/assertion_key.pem");

fn subject() -> SubjectId {
    SubjectId::new("patient-42").unwrap()
}

fn repository_config(url: &str) -> RepositoryConfig {
    RepositoryConfig {
        base_url: url.to_string(),
        timeout_seconds: 5,
        ..Default::default()
    }
}

fn entries() -> Vec<TelemetryEntry> {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let mut cbg = TelemetryEntry::new(EntryKind::Cbg, start, "libre-1");
    cbg.value = Some(6.4);
    cbg.units = Some("mmol/L".to_string());

    let mut smbg = TelemetryEntry::new(EntryKind::Smbg, start + Duration::minutes(30), "meter-1");
    smbg.value = Some(110.0);
    smbg.units = Some("mg/dL".to_string());

    let mut bolus = TelemetryEntry::new(EntryKind::Bolus, start + Duration::hours(1), "pump-1");
    bolus.normal = Some(4.5);

    vec![cbg, smbg, bolus]
}

#[tokio::test]
async fn test_upload_refreshes_credential_and_checkpoints_state() {
    let mut server = mockito::Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .match_header("authorization", "Bearer old-refresh")
        .match_body(Matcher::PartialJson(serde_json::json!({"refresh": "old-refresh"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"accessToken": "new-access", "refreshToken": "new-refresh",
                "expires": "2099-01-01T00:00:00Z"}"#,
        )
        .expect(1)
        .create_async()
        .await;
    let observation_mock = server
        .mock("POST", "/Observation")
        .match_header("authorization", "Bearer new-access")
        .with_status(201)
        .with_header("Location", "Observation/1/_history/1")
        .expect(2)
        .create_async()
        .await;
    let medication_mock = server
        .mock("POST", "/MedicationAdministration")
        .match_header("authorization", "Bearer new-access")
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let state = StateManager::new_with_storage(Arc::new(JsonFileStateStore::new(
        dir.path().join("state.json"),
    )));
    let credential = Credential::new("old-access", "old-refresh", Utc::now() + Duration::minutes(1));

    let repository = Arc::new(
        FhirClient::new(&repository_config(&server.url()))
            .unwrap()
            .with_bearer_token(secret_string("old-access".to_string())),
    );
    let endpoint =
        TokenEndpointClient::new(format!("{}/token", server.url()), std::time::Duration::from_secs(5))
            .unwrap();
    let refresher = Arc::new(CredentialRefresher::new(
        subject(),
        credential,
        Arc::new(PemSigner::from_pem(PRIVATE_KEY).unwrap()),
        Arc::new(endpoint),
        state.token_store(),
    ));

    state.begin_upload(&subject()).await.unwrap();
    let mut orchestrator = UploadOrchestrator::new(
        repository,
        DeliveryOptions {
            lanes: 3,
            ..DeliveryOptions::default()
        },
    )
    .with_refresher(refresher);
    let mut out = Vec::new();

    let result = orchestrator
        .upload(&entries(), &ConverterOptions::new(subject()), &mut out)
        .await
        .unwrap();
    state
        .finish_upload(&subject(), &result.latest_seen_dates, result.success())
        .await
        .unwrap();

    token_mock.assert_async().await;
    observation_mock.assert_async().await;
    medication_mock.assert_async().await;

    let summary: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(summary["created"], 3);
    assert_eq!(summary["success"], 1);

    let saved = state.subject_state(&subject()).await.unwrap().unwrap();
    assert_eq!(saved.last_upload_status, UploadStatus::Completed);
    let stored = saved.credential.unwrap();
    assert_eq!(stored.access_token.expose_secret().as_str(), "new-access");
    assert_eq!(stored.refresh_token.expose_secret().as_str(), "new-refresh");
    assert_eq!(saved.latest_dates.len(), 3);
    assert_eq!(
        saved.latest_dates[&DeviceId::new("pump-1")],
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_second_upload_skips_watermarked_entries() {
    let server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let state = StateManager::new_with_storage(Arc::new(JsonFileStateStore::new(
        dir.path().join("state.json"),
    )));

    let mut watermarks = std::collections::HashMap::new();
    for entry in entries() {
        watermarks.insert(entry.device_id.clone(), entry.time.unwrap());
    }
    state.finish_upload(&subject(), &watermarks, true).await.unwrap();

    let repository = Arc::new(FhirClient::new(&repository_config(&server.url())).unwrap());
    let options = ConverterOptions::new(subject())
        .with_skip_before(state.latest_dates(&subject()).await.unwrap());
    let mut orchestrator = UploadOrchestrator::new(repository, DeliveryOptions::default());
    let mut out = Vec::new();

    let result = orchestrator.upload(&entries(), &options, &mut out).await.unwrap();

    assert_eq!(result.stale, 3);
    assert_eq!(result.total(), 0);
    let summary: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(summary["records"], serde_json::json!([]));
    assert_eq!(summary["success"], 1);
}

#[tokio::test]
async fn test_resubmission_counts_as_skipped() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", Matcher::Regex(r"^/(Observation|MedicationAdministration)$".to_string()))
        .match_header("If-None-Exist", Matcher::Regex(r"^identifier=urn:uuid:".to_string()))
        .with_status(200)
        .expect(3)
        .create_async()
        .await;

    let repository = Arc::new(FhirClient::new(&repository_config(&server.url())).unwrap());
    let mut orchestrator = UploadOrchestrator::new(repository, DeliveryOptions::default());
    let mut out = Vec::new();

    let result = orchestrator
        .upload(&entries(), &ConverterOptions::new(subject()), &mut out)
        .await
        .unwrap();

    assert_eq!((result.created, result.skipped, result.errors), (0, 3, 0));
    let summary: Value = serde_json::from_slice(&out).unwrap();
    assert!(summary["records"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["status"] == "skipped"));
}

#[tokio::test]
async fn test_unreachable_repository_still_emits_summary() {
    let repository = Arc::new(FhirClient::new(&repository_config("http://127.0.0.1:9")).unwrap());
    let mut orchestrator = UploadOrchestrator::new(repository, DeliveryOptions::default());
    let mut out = Vec::new();

    let result = orchestrator
        .upload(&entries(), &ConverterOptions::new(subject()), &mut out)
        .await
        .unwrap();

    assert_eq!(result.errors, 3);
    assert!(result.latest_seen_dates.is_empty());
    let summary: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(summary["errors"], 3);
    assert_eq!(summary["success"], 0);
}
