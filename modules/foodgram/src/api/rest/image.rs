use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::contract::model::NewImage;
use crate::domain::error::DomainError;

fn invalid(message: &str) -> DomainError {
    DomainError::validation("image", message)
}

/// Decode `data:image/<ext>;base64,<payload>`.
pub fn decode_data_uri(uri: &str) -> Result<NewImage, DomainError> {
    let (meta, payload) = uri
        .trim()
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| invalid("Expected a data URI: data:image/<type>;base64,<data>."))?;
    let ext = meta
        .strip_suffix(";base64")
        .and_then(|mime| mime.strip_prefix("image/"))
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| invalid("Only base64 encoded images are supported."))?
        .to_ascii_lowercase();
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid("The image data is not valid base64."))?;
    if bytes.is_empty() {
        return Err(invalid("The submitted image is empty."));
    }
    Ok(NewImage { ext, bytes })
}

/// Extension for an uploaded file: from the file name, else from the content type.
pub fn upload_ext(file_name: Option<&str>, content_type: Option<&str>) -> Option<String> {
    file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .or_else(|| content_type.and_then(|ct| ct.strip_prefix("image/")))
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_data_uri() {
        let img = decode_data_uri("data:image/PNG;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(img.ext, "png");
        assert_eq!(img.bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn rejects_malformed_uris() {
        for bad in [
            "iVBORw0KGgo=",
            "data:text/plain;base64,aGk=",
            "data:image/png,plain",
            "data:image/png;base64,***",
            "data:image/png;base64,",
        ] {
            match decode_data_uri(bad) {
                Err(DomainError::Validation { field, .. }) => assert_eq!(field, "image"),
                other => panic!("{bad}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn upload_extension() {
        assert_eq!(upload_ext(Some("Cake.JPG"), None).as_deref(), Some("jpg"));
        assert_eq!(upload_ext(Some("blob"), Some("image/webp")).as_deref(), Some("webp"));
        assert_eq!(upload_ext(None, None), None);
    }
}
