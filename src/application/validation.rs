//! Field-level validation errors rendered as a `field -> messages` map.

use std::collections::BTreeMap;

use serde::Serialize;

/// Accumulated validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Extensions the image endpoints accept.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["jpeg", "png", "jpg", "gif", "webp"];

pub fn is_allowed_image_name(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_messages_per_field() {
        let mut errors = FieldErrors::default();
        errors.push("title", "The title field is required.");
        errors.push("title", "The title may not be greater than 255 characters.");
        errors.push("content", "The content field is required.");

        assert!(!errors.is_empty());
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["content", "title"]);

        let json = serde_json::to_value(&errors).expect("serialized errors");
        assert_eq!(
            json["title"],
            serde_json::json!([
                "The title field is required.",
                "The title may not be greater than 255 characters."
            ])
        );
    }

    #[test]
    fn image_extension_allowlist() {
        assert!(is_allowed_image_name("photo.jpg"));
        assert!(is_allowed_image_name("photo.JPEG"));
        assert!(is_allowed_image_name("photo.webp"));
        assert!(!is_allowed_image_name("photo.svg"));
        assert!(!is_allowed_image_name("photo"));
    }
}
