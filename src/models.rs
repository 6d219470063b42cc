use serde::{Deserialize, Serialize};

/// A host managed by the appliance, as listed by `GET /hosts`.
///
/// `id` is required; it keys the license endpoint. The listing may omit
/// `name`, which then decodes as empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.id, self.name)
        }
    }
}

/// How the appliance answered one license upload.
///
/// A rejection is a value, not an error: the run keeps going and counts it,
/// unless `--strict` promotes it to a fatal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum UploadStatus {
    Accepted,
    Rejected { status: u16 },
}

impl UploadStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UploadStatus::Accepted)
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadStatus::Accepted => write!(f, "accepted"),
            UploadStatus::Rejected { status } => write!(f, "rejected (HTTP {status})"),
        }
    }
}

/// Per-host record the reports are built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostOutcome {
    pub id: String,
    pub name: String,
    pub upload: UploadStatus,
}
