pub mod convert;
pub mod edge;
mod error;
pub mod import;
pub mod material;
pub mod pmx;
pub mod scene;
pub mod shader;

pub use error::*;
pub use import::{import_file, ImportOptions, ImportTypes, ImportedModel, Importer};
