use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public part of a subject, returned to callers as `account`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Profile {
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// Salted PBKDF2 digest of a password, both parts hex encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash {
    pub salt: String,
    pub hash: String,
}

/// Stored subject. Never serialized to callers directly.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub profile: Profile,
    pub token: String,
    pub token_digest: String,
    pub password: PasswordHash,
    pub created_at: DateTime<Utc>,
}

/// Authenticated caller, threaded explicitly through the request pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Subject {
    pub id: String,
    pub email: String,
    pub token: String,
    pub profile: Profile,
}

impl From<UserRecord> for Subject {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            token: record.token,
            profile: record.profile,
        }
    }
}

/// A credential presented by a caller.
#[derive(Clone, Debug)]
pub enum Credential {
    Password { identifier: String, password: String },
    Bearer { token: String },
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct LogInRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

/// Body returned by sign up, log in and password change.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SessionResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub token: String,
    pub account: Profile,
}

impl From<Subject> for SessionResponse {
    fn from(subject: Subject) -> Self {
        Self {
            id: subject.id,
            token: subject.token,
            account: subject.profile,
        }
    }
}

/// Body returned by profile lookup.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProfileResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub account: Profile,
}

/// File received from the caller, not yet uploaded.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// One object to store: `bytes` go to `namespace/key`.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadJob {
    pub key: String,
    pub source: IncomingFile,
    pub namespace: String,
}

impl UploadJob {
    pub fn object_path(&self) -> String {
        format!("{}/{}", self.namespace, self.key)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UploadResult {
    pub key: String,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_response_uses_underscore_id() {
        let response = SessionResponse {
            id: "u1".to_string(),
            token: "t".to_string(),
            account: Profile {
                username: "alice".to_string(),
                ..Profile::default()
            },
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["_id"], "u1");
        assert_eq!(value["account"]["username"], "alice");
        assert_eq!(value["account"]["photos"], serde_json::json!([]));
        assert!(value.get("password").is_none());
    }

    #[test]
    fn object_path_joins_namespace_and_key() {
        let job = UploadJob {
            key: "k1".to_string(),
            source: IncomingFile {
                file_name: "a.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: vec![1, 2, 3],
            },
            namespace: "airbnb/u1".to_string(),
        };
        assert_eq!(job.object_path(), "airbnb/u1/k1");
        assert_eq!(job.source.size(), 3);
    }
}
