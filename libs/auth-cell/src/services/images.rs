//! Profile pictures sent with a registration form.

use base64::{engine::general_purpose::STANDARD, Engine};

/// A picture as submitted by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileImage {
    /// Already hosted somewhere; stored as is.
    Url(String),
    /// `data:<mime>;base64,<payload>`, still to be uploaded.
    Inline {
        content_type: String,
        extension: String,
        payload: String,
    },
}

impl ProfileImage {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        let Some(rest) = value.strip_prefix("data:") else {
            return Some(ProfileImage::Url(value.to_string()));
        };
        let (meta, payload) = rest.split_once(',')?;
        let content_type = meta.strip_suffix(";base64")?.to_string();
        let extension = content_type
            .split('/')
            .nth(1)
            .map(|subtype| subtype.split('+').next().unwrap_or(subtype))
            .filter(|subtype| !subtype.is_empty())
            .unwrap_or("png")
            .to_string();

        Some(ProfileImage::Inline {
            content_type,
            extension,
            payload: payload.to_string(),
        })
    }
}

pub fn decode_payload(payload: &str) -> Result<Vec<u8>, String> {
    STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("Invalid image encoding: {}", e))
}

/// Storage key for an uploaded picture: `{user_id}_{unix_millis}.{ext}`.
pub fn object_name(user_id: &str, millis: i64, extension: &str) -> String {
    format!("{}_{}.{}", user_id, millis, extension)
}

/// Stand-in used when an upload fails, so registration can still complete.
pub fn placeholder_url(extension: &str) -> String {
    format!(
        "https://via.placeholder.com/150x150/cccccc/666666?text=Imagen+{}",
        extension.to_uppercase()
    )
}
