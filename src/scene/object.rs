use glam::Vec3;
use rustc_hash::FxHashMap;

use super::{ArmatureKey, JointProxy, MeshKey, MmdRoot, ObjectKey, RigidBodyProxy};

#[derive(Clone, Debug)]
pub enum ObjectData {
    Empty,
    Root(Box<MmdRoot>),
    Mesh(MeshKey),
    Armature(ArmatureKey),
    RigidBody(Box<RigidBodyProxy>),
    Joint(Box<JointProxy>),
    Camera,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MmdType {
    None,
    Root,
    RigidGroup,
    JointGroup,
    RigidBody,
    Joint,
}

#[derive(Clone, Debug, Default)]
pub struct VertexGroup {
    pub name: String,
    weights: FxHashMap<usize, f32>,
}

impl VertexGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            weights: FxHashMap::default(),
        }
    }

    /// Sets the weight of `vertex`, replacing any earlier value.
    pub fn add(&mut self, vertex: usize, weight: f32) {
        self.weights.insert(vertex, weight);
    }

    pub fn remove(&mut self, vertex: usize) {
        self.weights.remove(&vertex);
    }

    pub fn weight(&self, vertex: usize) -> Option<f32> {
        self.weights.get(&vertex).copied()
    }

    pub fn clear(&mut self) {
        self.weights.clear();
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn vertices(&self) -> Vec<usize> {
        let mut v = self.weights.keys().copied().collect::<Vec<_>>();
        v.sort_unstable();
        v
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MixMode {
    Set,
    Add,
    Subtract,
    Multiply,
}

/// Vertices a weight mix touches.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MixSet {
    All,
    A,
    B,
    Or,
    And,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModifierKind {
    Armature {
        object: ObjectKey,
        use_vertex_groups: bool,
    },
    VertexWeightMix {
        group_a: String,
        group_b: String,
        mix_mode: MixMode,
        mix_set: MixSet,
        mask_constant: f32,
    },
    VertexWeightProximity {
        group: String,
        target: Option<ObjectKey>,
        min_dist: f32,
        max_dist: f32,
    },
    Solidify {
        thickness: f32,
        offset: f32,
        use_flip_normals: bool,
        use_rim: bool,
        material_offset: usize,
        vertex_group: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Modifier {
    pub name: String,
    pub kind: ModifierKind,
}

#[derive(Clone, Debug)]
pub struct Object {
    pub name: String,
    pub data: ObjectData,
    pub mmd_type: MmdType,
    pub parent: Option<ObjectKey>,
    pub hidden: bool,
    pub location: Vec3,
    pub rotation: Vec3,
    pub vertex_groups: Vec<VertexGroup>,
    pub modifiers: Vec<Modifier>,
}

impl Object {
    pub fn new(name: &str, data: ObjectData) -> Self {
        Self {
            name: name.to_string(),
            data,
            mmd_type: MmdType::None,
            parent: None,
            hidden: false,
            location: Vec3::ZERO,
            rotation: Vec3::ZERO,
            vertex_groups: vec![],
            modifiers: vec![],
        }
    }

    pub fn vertex_group(&self, name: &str) -> Option<&VertexGroup> {
        self.vertex_groups.iter().find(|g| g.name == name)
    }

    pub fn vertex_group_mut(&mut self, name: &str) -> Option<&mut VertexGroup> {
        self.vertex_groups.iter_mut().find(|g| g.name == name)
    }

    pub fn ensure_vertex_group(&mut self, name: &str) -> &mut VertexGroup {
        let index = match self.vertex_groups.iter().position(|g| g.name == name) {
            Some(i) => i,
            None => {
                self.vertex_groups.push(VertexGroup::new(name));
                self.vertex_groups.len() - 1
            }
        };
        &mut self.vertex_groups[index]
    }

    pub fn remove_vertex_group(&mut self, name: &str) -> Option<VertexGroup> {
        let index = self.vertex_groups.iter().position(|g| g.name == name)?;
        Some(self.vertex_groups.remove(index))
    }

    pub fn modifier(&self, name: &str) -> Option<&Modifier> {
        self.modifiers.iter().find(|m| m.name == name)
    }

    pub fn modifier_mut(&mut self, name: &str) -> Option<&mut Modifier> {
        self.modifiers.iter_mut().find(|m| m.name == name)
    }

    pub fn remove_modifier(&mut self, name: &str) -> Option<Modifier> {
        let index = self.modifiers.iter().position(|m| m.name == name)?;
        Some(self.modifiers.remove(index))
    }
}
