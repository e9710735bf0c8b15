//! Cover art sources and resolution.
//!
//! Artwork and the background image are resolved with the same priority:
//!
//! 1. **User override** - one image supplied for the whole playlist
//! 2. **Embedded tags** - cover art embedded in the audio file
//! 3. **None** - the view renders without an image
//!
//! Missing art is fine: resolution never fails, it just returns `None`.

mod embedded;
mod resolver;

pub use embedded::extract_embedded_cover;
pub use resolver::{CoverSource, ResolvedImage, resolve_image};

use std::sync::Arc;

/// Cover art bytes read from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    /// Raw image data (JPEG or PNG)
    pub data: Arc<[u8]>,
    /// MIME type (image/jpeg, image/png)
    pub mime_type: String,
}

impl CoverArt {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
