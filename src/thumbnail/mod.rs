//! Thumbnail requests parsed from inbound URL paths.
//!
//! Three path shapes are served:
//!
//! - `/{id}/pictures/thumb/{W}X-{H}X-{name}.{ext}` ([`Variant::SizedPicture`])
//! - `/{id}/pictures/thumb/{W}X-{name}.{ext}` ([`Variant::LegacySizedPicture`])
//! - `/{id}/dosyalar/_thumbs/{name}.{ext}` ([`Variant::FixedFileThumb`])
//!
//! A parsed [`ThumbnailRequest`] knows where its source lives in the object
//! store and where its derivative is cached.

mod grammar;

pub use grammar::resolve;

/// Width and height of the fixed-size `_thumbs` derivative
pub const FIXED_THUMB_SIZE: u32 = 100;

/// Extensions accepted by the path grammar (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] =
    &["jpg", "jfif", "jpeg", "gif", "png", "webp", "svg", "bmp"];

/// Which path shape produced the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Explicit width and height
    SizedPicture,
    /// Width only, height mirrors width
    LegacySizedPicture,
    /// Fixed 100x100 file thumbnail
    FixedFileThumb,
}

/// Immutable description of one thumbnail request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub owner_id: u32,
    pub variant: Variant,
    pub base_name: String,
    pub extension: String,
    pub target_width: u32,
    pub target_height: u32,
}

impl ThumbnailRequest {
    /// `{name}.{ext}` as it appears in both object keys
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.base_name, self.extension)
    }

    /// Object-store key of the original image
    pub fn source_key(&self) -> String {
        match self.variant {
            Variant::SizedPicture | Variant::LegacySizedPicture => {
                format!("{}/pictures/{}", self.owner_id, self.file_name())
            }
            Variant::FixedFileThumb => {
                format!("{}/dosyalar/{}", self.owner_id, self.file_name())
            }
        }
    }

    /// Object-store key of the cached derivative
    pub fn cache_key(&self) -> String {
        match self.variant {
            Variant::SizedPicture => format!(
                "{}/pictures/thumb/{}X-{}X-{}",
                self.owner_id,
                self.target_width,
                self.target_height,
                self.file_name()
            ),
            Variant::LegacySizedPicture => format!(
                "{}/pictures/thumb/{}X-{}",
                self.owner_id,
                self.target_width,
                self.file_name()
            ),
            Variant::FixedFileThumb => {
                format!("{}/dosyalar/_thumbs/{}", self.owner_id, self.file_name())
            }
        }
    }
}
