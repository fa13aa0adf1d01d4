use image::RgbaImage;
use std::sync::Arc;
use tabula_traits::{FetchedResource, ResourceError};
use tabula_types::{ResourceKey, Size};

/// A decoded image. Immutable once built; consumers share it by `Arc`.
#[derive(Debug, Clone)]
pub struct ImageResource {
    pub key: ResourceKey,
    pub bitmap: Arc<RgbaImage>,
    pub content_type: Option<String>,
}

impl ImageResource {
    /// Decodes fetched bytes, sniffing the format from the content itself.
    pub fn decode(key: ResourceKey, fetched: &FetchedResource) -> Result<Self, ResourceError> {
        let decoded = image::load_from_memory(&fetched.bytes).map_err(|e| {
            ResourceError::DecodeFailure {
                url: key.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            key,
            bitmap: Arc::new(decoded.to_rgba8()),
            content_type: fetched.content_type.clone(),
        })
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    /// Natural size in pixels.
    pub fn size(&self) -> Size {
        Size::new(self.width() as f32, self.height() as f32)
    }
}

/// Encodes a solid-colour PNG for tests.
#[cfg(test)]
pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_png_dimensions() {
        let fetched = FetchedResource::new(png(40, 20), Some("image/png".into()));
        let res = ImageResource::decode(ResourceKey::from("https://cdn/a.png"), &fetched).unwrap();

        assert_eq!(res.size(), Size::new(40.0, 20.0));
        assert_eq!(res.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_garbage_is_a_decode_failure() {
        let fetched = FetchedResource::new(b"<html>oops</html>".to_vec(), None);
        let err = ImageResource::decode(ResourceKey::from("https://cdn/a.png"), &fetched)
            .unwrap_err();

        assert!(matches!(err, ResourceError::DecodeFailure { .. }));
        assert!(err.to_string().contains("https://cdn/a.png"));
    }
}
