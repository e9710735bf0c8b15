//! Extract cover art embedded in audio file tags.
//!
//! Works on an already-read lofty [`Tag`]:
//! - ID3v2 tags (MP3)
//! - Vorbis comments (FLAC, OGG)
//! - MP4 atoms (M4A/AAC)

use lofty::picture::{MimeType, PictureType};
use lofty::tag::Tag;

use super::CoverArt;

/// Extract the front cover from a tag, falling back to the first picture.
pub fn extract_embedded_cover(tag: &Tag) -> Option<CoverArt> {
    let pictures = tag.pictures();

    let picture = pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())?;

    if picture.data().is_empty() {
        return None;
    }

    let mime_type = match picture.mime_type() {
        Some(MimeType::Jpeg) => "image/jpeg",
        Some(MimeType::Png) => "image/png",
        Some(MimeType::Gif) => "image/gif",
        Some(MimeType::Bmp) => "image/bmp",
        Some(MimeType::Tiff) => "image/tiff",
        _ => "image/jpeg", // Default assumption
    };

    Some(CoverArt {
        data: picture.data().into(),
        mime_type: mime_type.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::picture::Picture;
    use lofty::tag::TagType;

    fn picture(kind: PictureType, mime: MimeType, data: &[u8]) -> Picture {
        Picture::new_unchecked(kind, Some(mime), None, data.to_vec())
    }

    #[test]
    fn test_no_pictures() {
        let tag = Tag::new(TagType::Id3v2);
        assert!(extract_embedded_cover(&tag).is_none());
    }

    #[test]
    fn test_prefers_front_cover() {
        let mut tag = Tag::new(TagType::Id3v2);
        tag.push_picture(picture(PictureType::Artist, MimeType::Jpeg, b"artist"));
        tag.push_picture(picture(PictureType::CoverFront, MimeType::Png, b"front"));

        let cover = extract_embedded_cover(&tag).unwrap();
        assert_eq!(&*cover.data, b"front");
        assert_eq!(cover.mime_type, "image/png");
    }

    #[test]
    fn test_falls_back_to_first_picture() {
        let mut tag = Tag::new(TagType::VorbisComments);
        tag.push_picture(picture(PictureType::Other, MimeType::Gif, b"gif!"));

        let cover = extract_embedded_cover(&tag).unwrap();
        assert_eq!(cover.mime_type, "image/gif");
        assert_eq!(cover.len(), 4);
    }
}
