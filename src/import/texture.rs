use std::path::{Path, PathBuf};

use crate::scene::{Image, Scene, Texture, TextureKey};

/// Absolute form of `path` relative to `base_dir`. Files that do not exist
/// keep the joined, non-canonical path.
pub fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    let joined = base_dir.join(path);
    std::fs::canonicalize(&joined).unwrap_or(joined)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Returns the texture for `path`, loading the image the first time the
/// path is seen. An unreadable file gives a 1x1 placeholder image.
pub fn load_texture(scene: &mut Scene, path: &Path, use_mipmap: bool) -> TextureKey {
    if let Some(key) = scene.texture_by_path(path) {
        return key;
    }
    let image = match scene.image_by_path(path) {
        Some(key) => key,
        None => {
            let image = match image::image_dimensions(path) {
                Ok((width, height)) => Image::new(&file_name(path), path.to_path_buf(), width, height),
                Err(e) => {
                    log::warn!("cannot create a texture for {}: {}", path.display(), e);
                    Image::placeholder(&file_name(path), path.to_path_buf())
                }
            };
            scene.add_image(image)
        }
    };
    let mut texture = Texture::new(&display_name(path), image);
    texture.use_mipmap = use_mipmap;
    scene.add_texture(texture, path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        let path = resolve(dir.path(), Path::new("tex/missing.png"));
        let key = load_texture(&mut scene, &path, true);
        let image = &scene.images[scene.textures[key].image];
        assert!(image.placeholder);
        assert!(image.width == 1 && image.height == 1);
        assert!(scene.textures[key].name == "missing");
    }

    #[test]
    fn same_path_is_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::new(4, 2)
            .save(dir.path().join("body.png"))
            .unwrap();
        let mut scene = Scene::new();
        let a = load_texture(&mut scene, &resolve(dir.path(), Path::new("body.png")), true);
        let b = load_texture(&mut scene, &resolve(dir.path(), Path::new("./body.png")), false);
        assert!(a == b);
        assert!(scene.images.len() == 1);
        let image = &scene.images[scene.textures[a].image];
        assert!(!image.placeholder);
        assert!(image.width == 4 && image.height == 2);
    }
}
