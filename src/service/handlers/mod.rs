//! Route handlers. Authenticated handlers take a [`Session`](crate::service::Session)
//! before any body extractor.

pub mod account;
pub mod camera;
pub mod face;
pub mod frame;
pub mod upload;

use crate::common::{Result, WatcherError};
use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;

const IMAGE_FIELD: &str = "image";

/// A multipart body with one image part and any number of text fields.
#[derive(Debug, Default)]
pub(crate) struct ImageForm {
    fields: HashMap<String, String>,
    image: Option<Bytes>,
}

impl ImageForm {
    pub(crate) async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = ImageForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| WatcherError::Validation(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == IMAGE_FIELD {
                if field.file_name() == Some("") {
                    return Err(WatcherError::Validation("No selected file".into()));
                }
                let data = field.bytes().await.map_err(|e| WatcherError::Validation(e.body_text()))?;
                form.image = Some(data);
            } else {
                let value = field.text().await.map_err(|e| WatcherError::Validation(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub(crate) fn field(&self, name: &str) -> Result<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| WatcherError::Validation(format!("Missing field {}", name)))
    }

    pub(crate) fn take_image(&mut self) -> Result<Bytes> {
        self.image
            .take()
            .filter(|data| !data.is_empty())
            .ok_or_else(|| WatcherError::Validation("No image part".into()))
    }
}
