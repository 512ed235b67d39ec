//! Small in-memory models for importer tests.

use crate::pmx::{self, Bdef1, SphereMode, Toon, Weight};

pub fn vertex(position: [f32; 3], weight: Weight) -> pmx::Vertex {
    pmx::Vertex {
        position,
        normal: [0.0, 2.0, 0.0],
        uv: [0.0; 2],
        additional_uvs: vec![],
        weight,
        edge_scale: 1.0,
    }
}

pub fn material(name: &str, index_count: u32) -> pmx::Material {
    pmx::Material {
        name: name.to_string(),
        name_en: String::new(),
        diffuse: [0.8, 0.8, 0.8, 1.0],
        specular: [0.0; 3],
        shininess: 5.0,
        ambient: [0.4; 3],
        double_sided: false,
        drop_shadow: true,
        self_shadow_map: true,
        self_shadow: true,
        toon_edge: true,
        edge_color: [0.0, 0.0, 0.0, 1.0],
        edge_size: 1.0,
        texture: None,
        sphere: None,
        sphere_mode: SphereMode::Off,
        toon: Toon::Shared(0),
        comment: String::new(),
        index_count,
    }
}

/// One root bone, one opaque material, one triangle.
pub fn minimal_model() -> pmx::Model {
    let bind = || Weight::Bdef1(Bdef1 { bone: Some(0) });
    let mut vertices = vec![
        vertex([0.0, 0.0, 0.0], bind()),
        vertex([1.0, 0.0, 0.0], bind()),
        vertex([0.0, 1.0, 0.0], bind()),
    ];
    vertices[1].uv = [1.0, 0.0];
    vertices[2].uv = [0.0, 1.0];
    pmx::Model {
        version: 2.0,
        name: "model".to_string(),
        name_en: "model".to_string(),
        comment: "line 1\r\nline 2".to_string(),
        comment_en: String::new(),
        vertices,
        faces: vec![[0, 1, 2]],
        textures: vec![],
        materials: vec![material("body", 3)],
        bones: vec![crate::import::skeleton::tests::bone("センター", [0.0; 3], None)],
        ..Default::default()
    }
}
