//! Pick the image to display from the available sources.

use crate::model::Payload;

use super::CoverArt;

/// Where the resolved image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverSource {
    /// Supplied by the user for the whole playlist
    Override,
    /// Embedded in the audio file's tags
    Embedded,
}

/// An image ready to be turned into a display resource.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub payload: Payload,
    pub mime_type: Option<String>,
    pub source: CoverSource,
}

/// Resolve an image: the user override wins, then the embedded cover.
pub fn resolve_image(
    user_override: Option<&Payload>,
    embedded: Option<&CoverArt>,
) -> Option<ResolvedImage> {
    if let Some(payload) = user_override {
        return Some(ResolvedImage {
            mime_type: mime_from_extension(payload),
            payload: payload.clone(),
            source: CoverSource::Override,
        });
    }

    embedded.map(|cover| ResolvedImage {
        payload: Payload::memory("embedded-cover", cover.data.clone()),
        mime_type: Some(cover.mime_type.clone()),
        source: CoverSource::Embedded,
    })
}

fn mime_from_extension(payload: &Payload) -> Option<String> {
    let mime = match payload.extension()?.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded() -> CoverArt {
        CoverArt {
            data: vec![9u8; 16].into(),
            mime_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_override_wins() {
        let user = Payload::file("/art/Cover.JPG");
        let cover = embedded();

        let resolved = resolve_image(Some(&user), Some(&cover)).unwrap();
        assert_eq!(resolved.source, CoverSource::Override);
        assert_eq!(resolved.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(resolved.payload.name(), "Cover.JPG");
    }

    #[test]
    fn test_embedded_when_no_override() {
        let cover = embedded();

        let resolved = resolve_image(None, Some(&cover)).unwrap();
        assert_eq!(resolved.source, CoverSource::Embedded);
        assert_eq!(resolved.mime_type.as_deref(), Some("image/png"));
        assert_eq!(resolved.payload.read_bytes().unwrap().len(), 16);
    }

    #[test]
    fn test_nothing_to_resolve() {
        assert!(resolve_image(None, None).is_none());
    }

    #[test]
    fn test_unknown_override_extension_has_no_mime() {
        let user = Payload::memory("background", vec![0u8; 2]);
        let resolved = resolve_image(Some(&user), None).unwrap();
        assert!(resolved.mime_type.is_none());
    }
}
