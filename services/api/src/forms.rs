//! Multipart catalog forms

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request, multipart::MultipartError},
};
use std::collections::HashMap;

use crate::{
    error::{ApiError, ApiResult},
    models::{ThreatDraft, ThreatPatch},
};

const IMAGE_FIELD: &str = "image";

/// Uploaded image file
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Text fields and the optional image of a catalog form
#[derive(Debug, Default)]
pub struct ThreatForm {
    fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

fn bad_multipart(e: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("invalid multipart body: {}", e))
}

impl ThreatForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == IMAGE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;

                if !bytes.is_empty() {
                    form.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field.text().await.map_err(bad_multipart)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn number(&self, name: &str) -> ApiResult<Option<i32>> {
        self.text(name)
            .map(|raw| {
                raw.parse::<i32>()
                    .map_err(|_| ApiError::BadRequest(format!("{} must be an integer", name)))
            })
            .transpose()
    }

    /// Fields of a new item. Name, count and a positive price are required.
    pub fn draft(&self) -> ApiResult<ThreatDraft> {
        let name = self
            .text("name")
            .ok_or_else(|| ApiError::BadRequest("name cannot be empty".to_string()))?;
        let count = self
            .number("count")?
            .ok_or_else(|| ApiError::BadRequest("count is required".to_string()))?;
        let price = self
            .number("price")?
            .ok_or_else(|| ApiError::BadRequest("price is required".to_string()))?;

        if count < 0 {
            return Err(ApiError::BadRequest("count cannot be negative".to_string()));
        }
        if price <= 0 {
            return Err(ApiError::BadRequest("price must be positive".to_string()));
        }

        Ok(ThreatDraft {
            name,
            description: self.text("description").unwrap_or_default(),
            summary: self.text("summary").unwrap_or_default(),
            image: String::new(),
            count,
            price,
        })
    }

    /// Partial update; absent or empty fields are left alone
    pub fn patch(&self) -> ApiResult<ThreatPatch> {
        let count = self.number("count")?;
        let price = self.number("price")?;

        if count.is_some_and(|c| c < 0) {
            return Err(ApiError::BadRequest("count cannot be negative".to_string()));
        }
        if price.is_some_and(|p| p < 0) {
            return Err(ApiError::BadRequest("price must be positive".to_string()));
        }

        Ok(ThreatPatch {
            name: self.text("name"),
            description: self.text("description"),
            summary: self.text("summary"),
            image: None,
            count,
            price,
        })
    }
}

#[async_trait]
impl<S> FromRequest<S> for ThreatForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        Self::read(multipart).await
    }
}
