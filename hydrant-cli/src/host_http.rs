//! HTTP review host client.
//!
//! Speaks a small JSON protocol over the host's REST surface:
//!
//! ```text
//! GET  <base>/units/<id>            review unit record
//! POST <base>/units/<id>/commits    compare-and-set commit
//! GET  <base>/units/<id>/metadata   provenance records, oldest first
//! POST <base>/units/<id>/metadata   append one provenance record
//! ```
//!
//! A commit request names the snapshotted parent; a host whose head has
//! moved answers `409` with its actual head, which surfaces as
//! [`HostError::HeadMoved`]. File contents travel hex-encoded so the
//! payload stays valid JSON for any byte sequence.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use hydrant_core::{Change, Changeset, CommitId, ProvenanceRecord, ReviewUnit, ReviewUnitId};
use hydrant_sync::{CommitAuthor, HostError, ReviewHost};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote review host reached over HTTP with optional bearer auth.
pub struct HttpHost {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl HttpHost {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        HttpHost {
            agent,
            base_url,
            token,
        }
    }

    fn unit_url(&self, id: &ReviewUnitId, tail: &str) -> String {
        if tail.is_empty() {
            format!("{}/units/{id}", self.base_url)
        } else {
            format!("{}/units/{id}/{tail}", self.base_url)
        }
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let req = self.agent.request(method, url);
        match &self.token {
            Some(token) => req.set("Authorization", &format!("Bearer {token}")),
            None => req,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CommitRequest<'a> {
    parent: &'a str,
    author: &'a CommitAuthor,
    message: &'a str,
    changes: Vec<WireChange>,
}

#[derive(Serialize)]
struct WireChange {
    op: &'static str,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_hex: Option<String>,
}

#[derive(Deserialize)]
struct CommitReply {
    commit: String,
}

#[derive(Deserialize)]
struct ConflictReply {
    head: String,
}

fn wire_change(change: &Change) -> WireChange {
    let path = change.path().to_string_lossy().replace('\\', "/");
    match change {
        Change::Added { contents, .. } => WireChange {
            op: "add",
            path,
            content_hex: Some(hex::encode(contents)),
        },
        Change::Modified { contents, .. } => WireChange {
            op: "modify",
            path,
            content_hex: Some(hex::encode(contents)),
        },
        Change::Removed { .. } => WireChange {
            op: "remove",
            path,
            content_hex: None,
        },
    }
}

fn transport_err(context: &str, err: ureq::Error) -> HostError {
    HostError::Http {
        detail: format!("{context}: {err}"),
    }
}

fn body_err(context: &str, err: std::io::Error) -> HostError {
    HostError::Http {
        detail: format!("{context}: unreadable response body: {err}"),
    }
}

// ---------------------------------------------------------------------------
// ReviewHost over HTTP
// ---------------------------------------------------------------------------

impl ReviewHost for HttpHost {
    fn review_unit(&self, id: &ReviewUnitId) -> Result<ReviewUnit, HostError> {
        let url = self.unit_url(id, "");
        match self.request("GET", &url).call() {
            Ok(response) => response
                .into_json::<ReviewUnit>()
                .map_err(|e| body_err("fetch unit", e)),
            Err(ureq::Error::Status(404, _)) => {
                Err(HostError::UnknownUnit { unit: id.clone() })
            }
            Err(e) => Err(transport_err("fetch unit", e)),
        }
    }

    fn commit(
        &self,
        id: &ReviewUnitId,
        parent: &CommitId,
        changeset: &Changeset,
        author: &CommitAuthor,
        message: &str,
    ) -> Result<CommitId, HostError> {
        let url = self.unit_url(id, "commits");
        let payload = CommitRequest {
            parent: &parent.0,
            author,
            message,
            changes: changeset.changes().iter().map(wire_change).collect(),
        };
        match self.request("POST", &url).send_json(&payload) {
            Ok(response) => {
                let reply: CommitReply = response
                    .into_json()
                    .map_err(|e| body_err("commit", e))?;
                Ok(CommitId(reply.commit))
            }
            Err(ureq::Error::Status(409, response)) => {
                let reply: ConflictReply = response
                    .into_json()
                    .map_err(|e| body_err("commit conflict", e))?;
                Err(HostError::HeadMoved {
                    expected: parent.clone(),
                    actual: CommitId(reply.head),
                })
            }
            Err(ureq::Error::Status(404, _)) => {
                Err(HostError::UnknownUnit { unit: id.clone() })
            }
            Err(ureq::Error::Status(423, _)) => {
                Err(HostError::UnitClosed { unit: id.clone() })
            }
            Err(ureq::Error::Status(code, response)) => Err(HostError::Http {
                detail: format!(
                    "commit rejected ({code}): {}",
                    response.into_string().unwrap_or_default().trim()
                ),
            }),
            Err(e) => Err(transport_err("commit", e)),
        }
    }

    fn append_metadata(
        &self,
        id: &ReviewUnitId,
        record: &ProvenanceRecord,
    ) -> Result<(), HostError> {
        let url = self.unit_url(id, "metadata");
        match self.request("POST", &url).send_json(record) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(404, _)) => {
                Err(HostError::UnknownUnit { unit: id.clone() })
            }
            Err(e) => Err(transport_err("append metadata", e)),
        }
    }

    fn list_metadata(&self, id: &ReviewUnitId) -> Result<Vec<ProvenanceRecord>, HostError> {
        let url = self.unit_url(id, "metadata");
        match self.request("GET", &url).call() {
            Ok(response) => response
                .into_json::<Vec<ProvenanceRecord>>()
                .map_err(|e| body_err("list metadata", e)),
            Err(ureq::Error::Status(404, _)) => {
                Err(HostError::UnknownUnit { unit: id.clone() })
            }
            Err(e) => Err(transport_err("list metadata", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn trailing_slash_is_trimmed() {
        let host = HttpHost::new("https://review.example.com/api/", None);
        assert_eq!(
            host.unit_url(&ReviewUnitId::from("ru-1"), "commits"),
            "https://review.example.com/api/units/ru-1/commits"
        );
        assert_eq!(
            host.unit_url(&ReviewUnitId::from("ru-1"), ""),
            "https://review.example.com/api/units/ru-1"
        );
    }

    #[test]
    fn wire_changes_carry_content_only_when_present() {
        let added = wire_change(&Change::Added {
            path: PathBuf::from("prod/app.yaml"),
            contents: b"region: x\n".to_vec(),
        });
        assert_eq!(added.op, "add");
        assert_eq!(added.path, "prod/app.yaml");
        assert_eq!(added.content_hex.as_deref(), Some(hex::encode(b"region: x\n").as_str()));

        let removed = wire_change(&Change::Removed {
            path: PathBuf::from("prod/old.yaml"),
            previous: b"gone".to_vec(),
        });
        assert_eq!(removed.op, "remove");
        assert!(removed.content_hex.is_none());
    }
}
