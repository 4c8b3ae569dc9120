//! Source images for material texture maps
//!
//! Images are owned by the scene and identified by their
//! [`TextureKey`](crate::foundation::collections::TextureKey). The compiler only
//! reads their dimensions and RGBA8 pixels when packing them into array layers.

use image::RgbaImage;

/// An RGBA8 image referenced by material texture parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    image: RgbaImage,
    name: Option<String>,
}

impl TextureImage {
    /// Wrap an already decoded image
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self { image, name: None }
    }

    /// Build an image from raw RGBA8 pixels
    ///
    /// Returns `None` when the buffer length does not match `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, pixels).map(Self::from_rgba)
    }

    /// Create a single-color image (useful for testing)
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::from_rgba(RgbaImage::from_pixel(width, height, image::Rgba(color)))
    }

    /// Set the debug name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Debug name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Tightly packed RGBA8 pixel bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Number of mip levels in a full chain for the given size
pub fn full_mip_chain(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}
