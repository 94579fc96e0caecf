use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tiny_skia::{ColorU8, Pixmap};

use crate::error::{RenderError, RenderResult};

/// Shared font database used for text rendering.
pub type FontDatabase = Arc<usvg::fontdb::Database>;

/// Images and fonts needed by render tasks.
///
/// Images are decoded once and shared between drawers. The map lock is never
/// held across an await point.
pub struct ResourceCache {
    images: Mutex<HashMap<String, Arc<Pixmap>>>,
    fonts: FontDatabase,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("images", &self.images.lock().len())
            .field("fonts", &self.fonts.len())
            .finish()
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCache {
    /// Empty cache with no fonts loaded.
    pub fn new() -> Self {
        Self {
            images: Mutex::new(HashMap::new()),
            fonts: Arc::new(usvg::fontdb::Database::new()),
        }
    }

    /// Cache backed by the fonts installed on this system.
    pub fn with_system_fonts() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded system fonts");
        Self {
            images: Mutex::new(HashMap::new()),
            fonts: Arc::new(db),
        }
    }

    pub fn fonts(&self) -> &FontDatabase {
        &self.fonts
    }

    /// Register an already decoded bitmap under `source`.
    pub fn register_image(&self, source: impl Into<String>, image: Pixmap) {
        self.images.lock().insert(source.into(), Arc::new(image));
    }

    /// Whether `source` is already decoded.
    pub fn has_image(&self, source: &str) -> bool {
        self.images.lock().contains_key(source)
    }

    /// Drop every cached image.
    pub fn clear_images(&self) {
        self.images.lock().clear();
    }

    /// Resolve an image, reading and decoding it on first use.
    pub async fn image(&self, source: &str) -> RenderResult<Arc<Pixmap>> {
        if let Some(hit) = self.images.lock().get(source).cloned() {
            return Ok(hit);
        }

        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| RenderError::ResourceUnavailable(format!("{source}: {e}")))?;
        let pixmap = Arc::new(decode_pixmap(&bytes)?);

        self.images
            .lock()
            .insert(source.to_string(), Arc::clone(&pixmap));
        tracing::debug!(source, "decoded image");
        Ok(pixmap)
    }
}

/// Decode any format supported by `image` into a premultiplied pixmap.
pub fn decode_pixmap(bytes: &[u8]) -> RenderResult<Pixmap> {
    let rgba = image::load_from_memory(bytes)
        .map_err(|e| RenderError::Decode(e.to_string()))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| RenderError::Decode(format!("empty image {width}x{height}")))?;

    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &tempfile::TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([0, 255, 0, 255]));
        img.save(&path).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_image_loaded_once_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_png(&dir, "green.png");
        let cache = ResourceCache::new();

        let first = cache.image(&source).await.unwrap();
        assert_eq!((first.width(), first.height()), (3, 2));
        assert!(cache.has_image(&source));

        std::fs::remove_file(&source).unwrap();
        let second = cache.image(&source).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_missing_image_is_unavailable() {
        let cache = ResourceCache::new();
        let result = cache.image("/definitely/not/here.png").await;
        assert!(matches!(result, Err(RenderError::ResourceUnavailable(_))));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            decode_pixmap(b"not an image"),
            Err(RenderError::Decode(_))
        ));
    }

    #[test]
    fn test_registered_image_is_served() {
        let cache = ResourceCache::new();
        cache.register_image("mem://dot", Pixmap::new(1, 1).unwrap());
        assert!(cache.has_image("mem://dot"));
        cache.clear_images();
        assert!(!cache.has_image("mem://dot"));
    }
}
