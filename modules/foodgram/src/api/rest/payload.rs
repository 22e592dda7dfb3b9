//! Request body extractors with problem+json rejections.

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use modkit::{bad_request, ProblemResponse};
use serde::de::DeserializeOwned;

use crate::api::rest::dto::{IngredientAmountReq, RecipeWriteReq};
use crate::api::rest::image::{decode_data_uri, upload_ext};
use crate::contract::model::{NewImage, RecipeDraft};
use crate::domain::error::DomainError;

/// `axum::Json` whose rejection is a 400 problem.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ProblemResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(bad_request(rejection.body_text())),
        }
    }
}

/// Recipe create/update body, either JSON (image as a data URI) or
/// `multipart/form-data` (image as a file part).
pub struct RecipePayload(pub RecipeDraft);

impl<S: Send + Sync> FromRequest<S> for RecipePayload {
    type Rejection = ProblemResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| bad_request(e.body_text()))?;
            return Ok(Self(read_multipart(multipart).await?));
        }

        let JsonBody(body) = JsonBody::<RecipeWriteReq>::from_request(req, state).await?;
        Ok(Self(draft_from_json(body)?))
    }
}

pub fn draft_from_json(body: RecipeWriteReq) -> Result<RecipeDraft, DomainError> {
    let image = match body.image.as_deref().map(str::trim) {
        Some(uri) if !uri.is_empty() => Some(decode_data_uri(uri)?),
        _ => None,
    };
    Ok(RecipeDraft {
        name: body.name,
        text: body.text,
        cooking_time: body.cooking_time,
        tags: body.tags,
        ingredients: body.ingredients.into_iter().map(Into::into).collect(),
        image,
    })
}

fn json_field<T: DeserializeOwned>(field: &str, raw: &str) -> Result<T, DomainError> {
    serde_json::from_str(raw)
        .map_err(|e| DomainError::validation(field, format!("Invalid JSON: {e}")))
}

/// `tags` may come as repeated parts or as one JSON array.
fn push_tags(tags: &mut Vec<i64>, raw: &str) -> Result<(), DomainError> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        tags.extend(json_field::<Vec<i64>>("tags", raw)?);
    } else {
        let id = raw
            .parse()
            .map_err(|_| DomainError::validation("tags", format!("Invalid tag id \"{raw}\".")))?;
        tags.push(id);
    }
    Ok(())
}

async fn read_multipart(mut multipart: Multipart) -> Result<RecipeDraft, ProblemResponse> {
    let mut draft = RecipeDraft {
        name: String::new(),
        text: String::new(),
        cooking_time: 0,
        tags: Vec::new(),
        ingredients: Vec::new(),
        image: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let ext = upload_ext(field.file_name(), field.content_type()).ok_or_else(|| {
                DomainError::validation("image", "Cannot determine the image type.")
            })?;
            let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
            if !bytes.is_empty() {
                draft.image = Some(NewImage {
                    ext,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await.map_err(|e| bad_request(e.body_text()))?;
        match name.as_str() {
            "name" => draft.name = value,
            "text" => draft.text = value,
            "cooking_time" => {
                draft.cooking_time = value.trim().parse().map_err(|_| {
                    DomainError::validation("cooking_time", "A valid integer is required.")
                })?;
            }
            "tags" => push_tags(&mut draft.tags, &value)?,
            "ingredients" => {
                let items: Vec<IngredientAmountReq> = json_field("ingredients", &value)?;
                draft.ingredients = items.into_iter().map(Into::into).collect();
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }
    Ok(draft)
}
