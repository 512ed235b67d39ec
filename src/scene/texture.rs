use std::path::PathBuf;

use super::ImageKey;

#[derive(Clone, Debug)]
pub struct Image {
    pub name: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Set when the file could not be read and a 1x1 stand-in was created.
    pub placeholder: bool,
    pub use_alpha: bool,
    pub users: u32,
}

impl Image {
    pub fn new(name: &str, path: PathBuf, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            path,
            width,
            height,
            placeholder: false,
            use_alpha: true,
            users: 0,
        }
    }

    pub fn placeholder(name: &str, path: PathBuf) -> Self {
        Self {
            placeholder: true,
            ..Self::new(name, path, 1, 1)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Extension {
    Repeat,
    Extend,
}

#[derive(Clone, Debug)]
pub struct Texture {
    pub name: String,
    pub image: ImageKey,
    pub use_mipmap: bool,
    pub use_alpha: bool,
    pub extension: Extension,
    pub users: u32,
}

impl Texture {
    pub fn new(name: &str, image: ImageKey) -> Self {
        Self {
            name: name.to_string(),
            image,
            use_mipmap: true,
            use_alpha: true,
            extension: Extension::Repeat,
            users: 0,
        }
    }
}
