use glam::{Quat, Vec3};

#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    /// Placed on the last bone of the chain, pulling it towards `goal`.
    Ik {
        goal: usize,
        chain_count: usize,
        iterations: u32,
    },
    AdditionalRotation {
        source: usize,
        influence: f32,
    },
    AdditionalLocation {
        source: usize,
        influence: f32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IkLimits {
    pub min: Vec3,
    pub max: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct MmdBone {
    pub name_j: String,
    pub name_e: String,
    pub transform_order: i32,
    pub is_visible: bool,
    pub is_controllable: bool,
    pub transform_after_dynamics: bool,
    pub is_tip: bool,
    pub use_tail_location: bool,
    pub has_additional_rotation: bool,
    pub has_additional_location: bool,
    pub additional_transform_bone: Option<usize>,
    pub additional_transform_influence: f32,
    pub enabled_fixed_axis: bool,
    pub fixed_axis: Vec3,
    pub enabled_local_axes: bool,
    pub local_axis_x: Vec3,
    pub local_axis_z: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct Bone {
    pub name: String,
    pub head: Vec3,
    pub tail: Vec3,
    pub parent: Option<usize>,
    pub use_connect: bool,
    pub hide: bool,
    pub lock_rotation: [bool; 3],
    pub lock_location: [bool; 3],
    pub ik_limits: Option<IkLimits>,
    pub constraints: Vec<Constraint>,
    pub mmd: MmdBone,
}

impl Bone {
    pub fn length(&self) -> f32 {
        (self.tail - self.head).length()
    }

    /// Rest orientation, with the bone's Y axis along head to tail.
    pub fn rest_rotation(&self) -> Quat {
        let dir = (self.tail - self.head).normalize_or_zero();
        if dir == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            Quat::from_rotation_arc(Vec3::Y, dir)
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Armature {
    pub name: String,
    pub bones: Vec<Bone>,
}

impl Armature {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bones: vec![],
        }
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Whether `ancestor` appears on the parent chain of `bone`.
    /// Stops after visiting every bone once, so a cyclic chain terminates.
    pub fn is_ancestor(&self, ancestor: usize, bone: usize) -> bool {
        let mut current = self.bones.get(bone).and_then(|b| b.parent);
        for _ in 0..self.bones.len() {
            match current {
                Some(p) if p == ancestor => return true,
                Some(p) => current = self.bones.get(p).and_then(|b| b.parent),
                None => return false,
            }
        }
        false
    }

    /// Returns a bone that lies on a parent cycle, if any.
    pub fn find_parent_cycle(&self) -> Option<usize> {
        (0..self.bones.len()).find(|&i| self.is_ancestor(i, i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(parent: Option<usize>) -> Bone {
        Bone {
            parent,
            ..Default::default()
        }
    }

    #[test]
    fn ancestors() {
        let armature = Armature {
            name: "a".into(),
            bones: vec![bone(None), bone(Some(0)), bone(Some(1))],
        };
        assert!(armature.is_ancestor(0, 2));
        assert!(!armature.is_ancestor(2, 0));
        assert!(armature.find_parent_cycle().is_none());
    }

    #[test]
    fn cycle() {
        let armature = Armature {
            name: "a".into(),
            bones: vec![bone(Some(1)), bone(Some(0)), bone(None)],
        };
        assert!(armature.find_parent_cycle() == Some(0));
    }
}
