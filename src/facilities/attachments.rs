use actix_web::http::StatusCode;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{ApiError, AttachmentData, ErrorCode};

/// In-memory store of uploaded attachment payloads.
pub struct AttachmentStore {
    attachments: DashMap<String, AttachmentData>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self {
            attachments: DashMap::new(),
        }
    }

    pub fn upload(&self, data: AttachmentData) -> Result<String, ApiError> {
        if data.original_base64.is_none() {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                ErrorCode::MissingProperty,
                "original_base64 missing",
            ));
        }
        let id = Uuid::new_v4().to_string();
        self.attachments.insert(id.clone(), data);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<AttachmentData> {
        self.attachments.get(id).map(|entry| entry.value().clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        self.attachments.remove(id).is_some()
    }
}

impl Default for AttachmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_requires_original_payload() {
        let store = AttachmentStore::new();

        let err = store
            .upload(AttachmentData {
                content_type: "image/png".into(),
                name: "cat.png".into(),
                original_base64: None,
                thumbnail_base64: None,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingProperty);

        let id = store
            .upload(AttachmentData {
                content_type: "image/png".into(),
                name: "cat.png".into(),
                original_base64: Some("aGVsbG8=".into()),
                thumbnail_base64: None,
            })
            .unwrap();
        assert_eq!(store.get(&id).unwrap().name, "cat.png");
        assert!(store.delete(&id));
        assert!(store.get(&id).is_none());
    }
}
