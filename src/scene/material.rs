use std::path::PathBuf;

use glam::Vec3;

use super::{MaterialKey, ObjectKey, TextureKey};
use crate::pmx::SphereMode;
use crate::shader::Graph;

pub const BASE_TEX_SLOT: usize = 0;
pub const TOON_TEX_SLOT: usize = 1;
pub const SPHERE_TEX_SLOT: usize = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Mmd,
    Edge,
    /// Helper material feeding a lighting value into another material's graph.
    Proxy,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TexCoords {
    Uv,
    Normal,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlendType {
    Mix,
    Multiply,
    Add,
}

#[derive(Clone, Debug)]
pub struct TextureSlot {
    pub texture: TextureKey,
    pub coords: TexCoords,
    pub blend: BlendType,
    pub use_map_alpha: bool,
    pub enabled: bool,
    pub diffuse_color_factor: f32,
}

impl TextureSlot {
    pub fn new(texture: TextureKey, coords: TexCoords, blend: BlendType) -> Self {
        Self {
            texture,
            coords,
            blend,
            use_map_alpha: false,
            enabled: true,
            diffuse_color_factor: 1.0,
        }
    }
}

/// Fixed-function surface settings, used by proxy materials.
#[derive(Clone, Debug)]
pub struct Surface {
    pub diffuse_color: Vec3,
    pub diffuse_intensity: f32,
    pub specular_color: Vec3,
    pub specular_intensity: f32,
    pub specular_hardness: f32,
    pub alpha: f32,
    pub use_shadows: bool,
    pub use_transparency: bool,
    pub use_cast_shadows: bool,
    pub use_cast_buffer_shadows: bool,
    pub use_raytrace: bool,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            diffuse_color: Vec3::ONE,
            diffuse_intensity: 1.0,
            specular_color: Vec3::ONE,
            specular_intensity: 0.0,
            specular_hardness: 50.0,
            alpha: 1.0,
            use_shadows: true,
            use_transparency: false,
            use_cast_shadows: true,
            use_cast_buffer_shadows: true,
            use_raytrace: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MmdMaterial {
    pub name_j: String,
    pub name_e: String,
    pub ambient_color: Vec3,
    pub diffuse_color: Vec3,
    pub alpha: f32,
    pub specular_color: Vec3,
    pub shininess: f32,
    pub is_double_sided: bool,
    pub enabled_drop_shadow: bool,
    pub enabled_self_shadow_map: bool,
    pub enabled_self_shadow: bool,
    pub enabled_toon_edge: bool,
    pub edge_color: [f32; 4],
    pub edge_weight: f32,
    pub sphere_texture_type: SphereMode,
    pub is_shared_toon_texture: bool,
    /// Index 0..=9 of the shared toon ramp, -1 when unused.
    pub shared_toon_texture: i32,
    pub toon_texture: Option<PathBuf>,
    pub comment: String,
    pub edge_material: Option<MaterialKey>,
    pub spw_material: Option<MaterialKey>,
    pub alpha_material: Option<MaterialKey>,
}

impl Default for MmdMaterial {
    fn default() -> Self {
        Self {
            name_j: String::new(),
            name_e: String::new(),
            ambient_color: Vec3::splat(0.4),
            diffuse_color: Vec3::splat(0.8),
            alpha: 1.0,
            specular_color: Vec3::splat(0.625),
            shininess: 50.0,
            is_double_sided: false,
            enabled_drop_shadow: true,
            enabled_self_shadow_map: true,
            enabled_self_shadow: true,
            enabled_toon_edge: false,
            edge_color: [0.0, 0.0, 0.0, 1.0],
            edge_weight: 0.5,
            sphere_texture_type: SphereMode::Off,
            is_shared_toon_texture: false,
            shared_toon_texture: -1,
            toon_texture: None,
            comment: String::new(),
            edge_material: None,
            spw_material: None,
            alpha_material: None,
        }
    }
}

/// A material's claim on one mesh object: the vertex group holding the
/// vertices that use it and the weight-mix modifier scaling their outline.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeBinding {
    pub object: ObjectKey,
    pub slot: usize,
    pub group: String,
    pub modifier: String,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub role: Role,
    pub mmd: MmdMaterial,
    pub surface: Surface,
    pub node_tree: Option<Graph>,
    pub texture_slots: [Option<TextureSlot>; 3],
    pub bindings: Vec<EdgeBinding>,
}

impl Material {
    pub fn new(name: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            role,
            mmd: MmdMaterial::default(),
            surface: Surface::default(),
            node_tree: None,
            texture_slots: [None, None, None],
            bindings: vec![],
        }
    }

    pub fn texture(&self, slot: usize) -> Option<TextureKey> {
        self.texture_slots
            .get(slot)
            .and_then(|s| s.as_ref())
            .map(|s| s.texture)
    }
}
