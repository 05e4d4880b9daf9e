use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    #[serde(rename = "nama")]
    pub name: String,
}

/// Role of an account. Only department heads carry a department.
///
/// `Unknown` keeps the stored tag (and any department) so accounts written
/// by a newer build survive being saved again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Supervisor,
    DepartmentHead {
        department_id: Option<String>,
    },
    Unknown {
        tag: String,
        department_id: Option<String>,
    },
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Supervisor => "supervisor",
            Role::DepartmentHead { .. } => "department head",
            Role::Unknown { .. } => "unknown",
        }
    }

    fn from_stored(tag: String, department_id: Option<String>) -> Self {
        match tag.as_str() {
            "ADMIN" => Role::Admin,
            "SUPERVISOR" => Role::Supervisor,
            "BIDANG" => Role::DepartmentHead { department_id },
            _ => Role::Unknown { tag, department_id },
        }
    }

    fn into_stored(self) -> (String, Option<String>) {
        match self {
            Role::Admin => ("ADMIN".to_string(), None),
            Role::Supervisor => ("SUPERVISOR".to_string(), None),
            Role::DepartmentHead { department_id } => ("BIDANG".to_string(), department_id),
            Role::Unknown { tag, department_id } => (tag, department_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredUser", into = "StoredUser")]
pub struct User {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub password: Option<String>,
    pub role: Role,
}

/// Stored account layout: role tag plus an optional `bidangId`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    id: String,
    username: String,
    full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bidang_id: Option<String>,
}

impl From<StoredUser> for User {
    fn from(stored: StoredUser) -> Self {
        User {
            id: stored.id,
            username: stored.username,
            full_name: stored.full_name,
            password: stored.password,
            role: Role::from_stored(stored.role, stored.bidang_id),
        }
    }
}

impl From<User> for StoredUser {
    fn from(user: User) -> Self {
        let (role, bidang_id) = user.role.into_stored();
        StoredUser {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            password: user.password,
            role,
            bidang_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "Terkirim")]
    Submitted,
    #[serde(rename = "Dibaca")]
    Read,
    #[serde(rename = "Diterima")]
    Acknowledged,
    #[serde(rename = "Ditindaklanjuti")]
    Resolved,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Submitted,
        ReportStatus::Read,
        ReportStatus::Acknowledged,
        ReportStatus::Resolved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Submitted => "Terkirim",
            ReportStatus::Read => "Dibaca",
            ReportStatus::Acknowledged => "Diterima",
            ReportStatus::Resolved => "Ditindaklanjuti",
        }
    }

    /// Accepts the stored literal or the English name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        ReportStatus::ALL.into_iter().find(|status| {
            status.as_str().eq_ignore_ascii_case(value)
                || format!("{status:?}").eq_ignore_ascii_case(value)
        })
    }

    pub fn is_pending(self) -> bool {
        matches!(self, ReportStatus::Submitted | ReportStatus::Read)
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    #[serde(rename = "userId")]
    pub author_id: String,
    #[serde(rename = "userName")]
    pub author_name: String,
    #[serde(rename = "bidangId")]
    pub department_id: String,
    #[serde(rename = "namaSekolah")]
    pub school_name: String,
    #[serde(rename = "jenjang")]
    pub level: String,
    #[serde(rename = "kecamatan")]
    pub district: String,
    #[serde(rename = "tanggalKunjungan")]
    pub visit_date: NaiveDate,
    #[serde(rename = "uraianTemuan")]
    pub findings: String,
    #[serde(rename = "rekomendasi")]
    pub recommendation: String,
    pub status: ReportStatus,
    #[serde(rename = "fotos", default)]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        rename = "feedbackKabid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub department_head_feedback: Option<String>,
}

/// Fields a supervisor fills in before submitting.
#[derive(Debug, Clone)]
pub struct ReportDraft {
    pub department_id: String,
    pub school_name: String,
    pub level: String,
    pub district: String,
    pub visit_date: NaiveDate,
    pub findings: String,
    pub recommendation: String,
    pub attachment_urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub resolved: usize,
}
