//! HTTP binding of [`DriveStore`].
//!
//! All paths are relative to the drive URL:
//!
//! | Call | Request |
//! |------|---------|
//! | attach | `POST /attach` |
//! | drive snapshot | `GET /drive` |
//! | sync status | `GET /sync-status` (polled) |
//! | fetch | `GET /documents/{id}` |
//! | submit (drive) | `POST /operations` |
//! | submit (document) | `POST /documents/{id}/operations` |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::{Backoff, DriveStore, SyncWatch};
use crate::error::{Error, Result};
use crate::model::{
    Acknowledgment, Drive, DriveAttachConfig, RemoteDocument, SyncEvent, SyncStatus,
};
use crate::mutation::MutationRecord;

/// Remote drive reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDriveStore {
    base_url: String,
    http: reqwest::Client,
    auth_token: Option<String>,
    poll_interval: Duration,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    operations: &'a [MutationRecord],
}

/// Body of a submission response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    status: SyncStatus,
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    state: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

impl HttpDriveStore {
    /// Build a client for the drive at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            auth_token,
            poll_interval,
        })
    }

    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref token) = self.auth_token {
            req.bearer_auth(token)
        } else {
            req
        }
    }

    fn operations_url(&self, drive_id: &str, target_id: &str) -> String {
        if target_id == drive_id {
            format!("{}/operations", self.base_url)
        } else {
            format!("{}/documents/{}/operations", self.base_url, target_id)
        }
    }

    async fn poll_status(&self) -> Result<SyncEvent> {
        let url = format!("{}/sync-status", self.base_url);
        let resp = self.add_auth(self.http.get(&url)).send().await?;
        if let Some(err) = unavailable(resp.status().as_u16(), &url) {
            return Err(err);
        }
        if !resp.status().is_success() {
            return Err(Error::Remote(format!(
                "Unexpected status {} from {url}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}

/// Gateway and overload statuses worth another try.
fn unavailable(status: u16, url: &str) -> Option<Error> {
    matches!(status, 502..=504).then(|| Error::Unavailable {
        status,
        url: url.to_string(),
    })
}

/// Turn a submission response body into an acknowledgment or an error.
fn interpret_submit(target_id: &str, body: SubmitResponse) -> Result<Acknowledgment> {
    match body.status {
        SyncStatus::Success => Ok(Acknowledgment {
            target_id: target_id.to_string(),
            revision: body.revision,
            state: body.state,
        }),
        SyncStatus::Missing => Err(Error::OrderingViolation {
            child: target_id.to_string(),
            parent: body
                .error
                .unwrap_or_else(|| "unacknowledged parent".to_string()),
        }),
        status => Err(Error::Rejected {
            target: target_id.to_string(),
            status: status.to_string(),
            message: body.error.unwrap_or_default(),
        }),
    }
}

impl DriveStore for HttpDriveStore {
    async fn attach_drive(&self, config: &DriveAttachConfig) -> Result<Drive> {
        let url = format!("{}/attach", self.base_url);
        let resp = self
            .add_auth(self.http.post(&url))
            .json(config)
            .send()
            .await?;

        match resp.status().as_u16() {
            200 | 201 => {
                let drive: Drive = resp.json().await?;
                debug!(drive_id = %drive.id, revision = drive.revision, "Attached drive");
                Ok(drive)
            }
            404 => Err(Error::DriveNotFound {
                id: self.base_url.clone(),
            }),
            status => Err(unavailable(status, &url).unwrap_or_else(|| {
                Error::Remote(format!("Attach failed with status {status} for {url}"))
            })),
        }
    }

    async fn fetch_drive(&self, drive_id: &str) -> Result<Drive> {
        let url = format!("{}/drive", self.base_url);
        let resp = self.add_auth(self.http.get(&url)).send().await?;

        match resp.status().as_u16() {
            200 => {
                let drive: Drive = resp.json().await?;
                trace!(drive_id = %drive.id, revision = drive.revision, "Fetched drive");
                Ok(drive)
            }
            404 => Err(Error::DriveNotFound {
                id: drive_id.to_string(),
            }),
            status => Err(unavailable(status, &url).unwrap_or_else(|| {
                Error::Remote(format!("Unexpected status {status} from {url}"))
            })),
        }
    }

    async fn watch_sync(&self, drive_id: &str, tx: mpsc::Sender<SyncEvent>) -> Result<SyncWatch> {
        let store = self.clone();
        let drive_id = drive_id.to_string();

        let task = tokio::spawn(async move {
            let base_ms = u64::try_from(store.poll_interval.as_millis()).unwrap_or(1_000);
            let mut backoff = Backoff::new(base_ms, 30_000);
            let mut last = None;
            loop {
                match store.poll_status().await {
                    Ok(event) => {
                        backoff.reset();
                        if last != Some(event.status) {
                            trace!(drive_id = %event.drive_id, status = %event.status, "Sync status");
                        }
                        last = Some(event.status);
                        if tx.send(event).await.is_err() {
                            break;
                        }
                        tokio::time::sleep(store.poll_interval).await;
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        warn!(drive_id = %drive_id, error = %e, "Sync status poll failed, retrying in {:?}", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        });

        Ok(SyncWatch::spawned(task))
    }

    async fn fetch_document(&self, _drive_id: &str, document_id: &str) -> Result<RemoteDocument> {
        let url = format!("{}/documents/{}", self.base_url, document_id);
        let resp = self.add_auth(self.http.get(&url)).send().await?;

        match resp.status().as_u16() {
            200 => Ok(resp.json().await?),
            404 => Err(Error::DocumentNotFound {
                id: document_id.to_string(),
            }),
            status => Err(unavailable(status, &url).unwrap_or_else(|| {
                Error::Remote(format!("Unexpected status {status} from {url}"))
            })),
        }
    }

    async fn submit_mutations(
        &self,
        drive_id: &str,
        target_id: &str,
        records: &[MutationRecord],
    ) -> Result<Acknowledgment> {
        let url = self.operations_url(drive_id, target_id);
        let resp = self
            .add_auth(self.http.post(&url))
            .json(&SubmitRequest {
                operations: records,
            })
            .send()
            .await?;

        match resp.status().as_u16() {
            200..=299 | 409 | 422 => interpret_submit(target_id, resp.json().await?),
            404 => Err(Error::DocumentNotFound {
                id: target_id.to_string(),
            }),
            status => Err(unavailable(status, &url).unwrap_or_else(|| {
                Error::Remote(format!("Submit failed with status {status} for {target_id}"))
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpDriveStore {
        HttpDriveStore::new(
            "http://localhost:4001/d/grants/",
            None,
            Duration::from_secs(1),
            Duration::from_millis(100),
        )
        .unwrap()
    }

    #[test]
    fn test_operations_url_targets() {
        let store = store();
        assert_eq!(
            store.operations_url("grants", "grants"),
            "http://localhost:4001/d/grants/operations"
        );
        assert_eq!(
            store.operations_url("grants", "doc-1"),
            "http://localhost:4001/d/grants/documents/doc-1/operations"
        );
    }

    #[test]
    fn test_gateway_statuses_are_retryable() {
        for status in [502, 503, 504] {
            let err = unavailable(status, "http://x/operations").unwrap();
            assert!(err.error_code().is_retryable(), "{status}");
        }
        assert!(unavailable(500, "http://x/operations").is_none());
        assert!(unavailable(404, "http://x/operations").is_none());
    }

    #[test]
    fn test_submit_success_is_acknowledged() {
        let body: SubmitResponse = serde_json::from_str(
            r#"{"status":"SUCCESS","revision":3,"state":{"granteeName":"Frank"}}"#,
        )
        .unwrap();
        let ack = interpret_submit("doc-1", body).unwrap();
        assert_eq!(ack.revision, 3);
        assert_eq!(ack.state["granteeName"], "Frank");
    }

    #[test]
    fn test_submit_missing_is_ordering_violation() {
        let body: SubmitResponse =
            serde_json::from_str(r#"{"status":"MISSING","error":"bucket-a-f"}"#).unwrap();
        match interpret_submit("doc-1", body) {
            Err(Error::OrderingViolation { child, parent }) => {
                assert_eq!(child, "doc-1");
                assert_eq!(parent, "bucket-a-f");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_submit_conflict_is_rejection() {
        let body: SubmitResponse =
            serde_json::from_str(r#"{"status":"CONFLICT","error":"index 2 expected 4"}"#).unwrap();
        let err = interpret_submit("grants", body).unwrap_err();
        assert!(matches!(err, Error::Rejected { ref status, .. } if status == "CONFLICT"));
        assert!(!err.error_code().is_retryable());
    }
}
