use glam::{Vec2, Vec3};
use rustc_hash::FxHashSet;

use super::MaterialKey;

#[derive(Clone, Debug)]
pub struct UvLayer {
    pub name: String,
    pub uvs: Vec<Vec2>,
}

/// Sparse per-vertex offsets relative to the rest positions.
#[derive(Clone, Debug)]
pub struct ShapeKey {
    pub name: String,
    pub offsets: Vec<(usize, Vec3)>,
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Custom split normals, one per vertex.
    pub normals: Vec<Vec3>,
    pub faces: Vec<[usize; 3]>,
    /// Material slot index per face.
    pub face_materials: Vec<usize>,
    pub uv_layers: Vec<UvLayer>,
    pub edge_scale: Vec<f32>,
    pub shape_keys: Vec<ShapeKey>,
    pub materials: Vec<Option<MaterialKey>>,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn uv_layer(&self, name: &str) -> Option<&UvLayer> {
        self.uv_layers.iter().find(|l| l.name == name)
    }

    pub fn shape_key(&self, name: &str) -> Option<&ShapeKey> {
        self.shape_keys.iter().find(|k| k.name == name)
    }

    /// Vertices referenced by faces assigned to `slot`, sorted.
    pub fn slot_vertices(&self, slot: usize) -> Vec<usize> {
        let set = self
            .faces
            .iter()
            .zip(&self.face_materials)
            .filter(|(_, &m)| m == slot)
            .flat_map(|(f, _)| f.iter().copied())
            .collect::<FxHashSet<_>>();
        let mut v = set.into_iter().collect::<Vec<_>>();
        v.sort_unstable();
        v
    }

    pub fn slot_of(&self, material: MaterialKey) -> Option<usize> {
        self.materials.iter().position(|m| *m == Some(material))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_vertices() {
        let mesh = Mesh {
            faces: vec![[0, 1, 2], [2, 3, 0], [4, 5, 6]],
            face_materials: vec![0, 0, 2],
            ..Mesh::new("m")
        };
        assert!(mesh.slot_vertices(0) == vec![0, 1, 2, 3]);
        assert!(mesh.slot_vertices(2) == vec![4, 5, 6]);
        assert!(mesh.slot_vertices(1).is_empty());
    }
}
