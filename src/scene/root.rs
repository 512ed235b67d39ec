use glam::{Quat, Vec3, Vec4};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{MaterialKey, MeshKey, ObjectKey, TextKey};
use crate::pmx::{morph::MaterialOp, Category};
use crate::{Error, Result};

/// Which morph table an entry lives in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MorphType {
    Group,
    Vertex,
    Bone,
    Uv,
    Material,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DisplayItem {
    Bone(String),
    Morph(MorphType, String),
}

#[derive(Clone, Debug)]
pub struct DisplayFrame {
    pub name: String,
    pub name_e: String,
    pub is_special: bool,
    pub items: Vec<DisplayItem>,
}

#[derive(Clone, Debug)]
pub struct VertexMorph {
    pub name: String,
    pub name_e: String,
    pub category: Category,
}

#[derive(Clone, Debug)]
pub struct UvMorph {
    pub name: String,
    pub name_e: String,
    pub category: Category,
    pub uv_index: usize,
    pub data: Vec<(usize, Vec4)>,
}

#[derive(Clone, Debug)]
pub struct BoneMorphData {
    pub bone: String,
    pub location: Vec3,
    pub rotation: Quat,
}

#[derive(Clone, Debug)]
pub struct BoneMorph {
    pub name: String,
    pub name_e: String,
    pub category: Category,
    pub data: Vec<BoneMorphData>,
}

#[derive(Clone, Debug)]
pub struct MaterialMorphData {
    pub related_mesh: Option<MeshKey>,
    /// `None` applies the offset to every material.
    pub material: Option<MaterialKey>,
    pub offset_type: MaterialOp,
    pub diffuse_color: [f32; 4],
    pub specular_color: [f32; 3],
    pub shininess: f32,
    pub ambient_color: [f32; 3],
    pub edge_color: [f32; 4],
    pub edge_weight: f32,
    pub texture_factor: [f32; 4],
    pub sphere_texture_factor: [f32; 4],
    pub toon_texture_factor: [f32; 4],
}

#[derive(Clone, Debug)]
pub struct MaterialMorph {
    pub name: String,
    pub name_e: String,
    pub category: Category,
    pub data: Vec<MaterialMorphData>,
}

#[derive(Clone, Debug)]
pub struct GroupMorphData {
    pub name: String,
    pub morph_type: MorphType,
    pub factor: f32,
}

#[derive(Clone, Debug)]
pub struct GroupMorph {
    pub name: String,
    pub name_e: String,
    pub category: Category,
    pub data: Vec<GroupMorphData>,
}

#[derive(Clone, Debug)]
pub struct MmdRoot {
    pub name: String,
    pub name_e: String,
    pub scale: f32,
    pub comment_text: Option<TextKey>,
    pub comment_e_text: Option<TextKey>,
    pub armature: Option<ObjectKey>,
    pub show_meshes: bool,
    pub show_armature: bool,
    pub display_item_frames: Vec<DisplayFrame>,
    pub vertex_morphs: Vec<VertexMorph>,
    pub uv_morphs: Vec<UvMorph>,
    pub bone_morphs: Vec<BoneMorph>,
    pub material_morphs: Vec<MaterialMorph>,
    pub group_morphs: Vec<GroupMorph>,
}

impl MmdRoot {
    pub fn new(name: &str, name_e: &str, scale: f32) -> Self {
        Self {
            name: name.to_string(),
            name_e: name_e.to_string(),
            scale,
            comment_text: None,
            comment_e_text: None,
            armature: None,
            show_meshes: false,
            show_armature: false,
            display_item_frames: vec![],
            vertex_morphs: vec![],
            uv_morphs: vec![],
            bone_morphs: vec![],
            material_morphs: vec![],
            group_morphs: vec![],
        }
    }

    /// The two frames every model carries when none were imported.
    pub fn initial_display_frames(&mut self) {
        for (name, name_e) in [("Root", "Root"), ("表情", "Exp")] {
            if !self.display_item_frames.iter().any(|f| f.name == name) {
                self.display_item_frames.push(DisplayFrame {
                    name: name.to_string(),
                    name_e: name_e.to_string(),
                    is_special: true,
                    items: vec![],
                });
            }
        }
    }

    pub fn has_morph(&self, morph_type: MorphType, name: &str) -> bool {
        match morph_type {
            MorphType::Group => self.group_morphs.iter().any(|m| m.name == name),
            MorphType::Vertex => self.vertex_morphs.iter().any(|m| m.name == name),
            MorphType::Bone => self.bone_morphs.iter().any(|m| m.name == name),
            MorphType::Uv => self.uv_morphs.iter().any(|m| m.name == name),
            MorphType::Material => self.material_morphs.iter().any(|m| m.name == name),
        }
    }

    /// Resolves a group morph into the non-group morphs it drives, with
    /// nested factors multiplied and repeated targets summed. Entries whose
    /// target no longer exists are skipped.
    pub fn flatten_group_morph(&self, name: &str) -> Result<Vec<(MorphType, String, f32)>> {
        let mut out = vec![];
        let mut index = FxHashMap::default();
        let mut visiting = FxHashSet::default();
        self.flatten_into(name, 1.0, &mut visiting, &mut out, &mut index)?;
        Ok(out)
    }

    fn flatten_into(
        &self,
        name: &str,
        factor: f32,
        visiting: &mut FxHashSet<String>,
        out: &mut Vec<(MorphType, String, f32)>,
        index: &mut FxHashMap<(MorphType, String), usize>,
    ) -> Result<()> {
        let group = self
            .group_morphs
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::invalid_data(format!("group morph {} not found", name)))?;
        if !visiting.insert(name.to_string()) {
            return Err(Error::dependency_cycle(format!(
                "group morph {} refers to itself",
                name
            )));
        }
        for data in &group.data {
            let factor = factor * data.factor;
            if data.morph_type == MorphType::Group {
                if self.has_morph(MorphType::Group, &data.name) {
                    self.flatten_into(&data.name, factor, visiting, out, index)?;
                }
                continue;
            }
            if !self.has_morph(data.morph_type, &data.name) {
                continue;
            }
            let key = (data.morph_type, data.name.clone());
            match index.get(&key) {
                Some(&i) => out[i].2 += factor,
                None => {
                    index.insert(key, out.len());
                    out.push((data.morph_type, data.name.clone(), factor));
                }
            }
        }
        visiting.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, data: &[(MorphType, &str, f32)]) -> GroupMorph {
        GroupMorph {
            name: name.to_string(),
            name_e: String::new(),
            category: Category::Other,
            data: data
                .iter()
                .map(|(t, n, f)| GroupMorphData {
                    name: n.to_string(),
                    morph_type: *t,
                    factor: *f,
                })
                .collect(),
        }
    }

    fn vertex(name: &str) -> VertexMorph {
        VertexMorph {
            name: name.to_string(),
            name_e: String::new(),
            category: Category::Mouth,
        }
    }

    #[test]
    fn flatten_nested() {
        let mut root = MmdRoot::new("m", "m", 1.0);
        root.vertex_morphs = vec![vertex("a"), vertex("i")];
        root.group_morphs = vec![
            group("outer", &[(MorphType::Group, "inner", 0.5), (MorphType::Vertex, "a", 1.0)]),
            group("inner", &[(MorphType::Vertex, "a", 0.5), (MorphType::Vertex, "i", 1.0)]),
        ];
        let flat = root.flatten_group_morph("outer").unwrap();
        assert!(flat.len() == 2);
        assert!(flat[0].1 == "a" && (flat[0].2 - 1.25).abs() < 1e-6);
        assert!(flat[1].1 == "i" && (flat[1].2 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn flatten_cycle() {
        let mut root = MmdRoot::new("m", "m", 1.0);
        root.group_morphs = vec![
            group("x", &[(MorphType::Group, "y", 1.0)]),
            group("y", &[(MorphType::Group, "x", 1.0)]),
        ];
        assert!(matches!(
            root.flatten_group_morph("x"),
            Err(Error::DependencyCycle(_))
        ));
    }

    #[test]
    fn initial_frames() {
        let mut root = MmdRoot::new("m", "m", 1.0);
        root.initial_display_frames();
        root.initial_display_frames();
        assert!(root.display_item_frames.len() == 2);
        assert!(root.display_item_frames.iter().all(|f| f.is_special));
    }
}
