// Image I/O for the pipeline's debug dump.

pub mod image_helper {
    use image::RgbImage;
    use std::path::Path;

    /// Writes `image` as PNG, creating parent directories as needed.
    pub fn save_png(path: &Path, image: &RgbImage) -> Result<(), image::error::ImageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        image.save_with_format(path, image::ImageFormat::Png)
    }
}
