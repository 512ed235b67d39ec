use glam::Vec3;

use super::ObjectKey;
use crate::pmx::rigid;

#[derive(Clone, Debug)]
pub struct RigidBodyProxy {
    pub name_j: String,
    pub name_e: String,
    pub shape: rigid::Shape,
    pub mode: rigid::Mode,
    pub size: Vec3,
    pub mass: f32,
    pub friction: f32,
    pub bounce: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub collision_group: u8,
    /// `true` means the body does not collide with that group.
    pub collision_mask: [bool; 16],
    pub bone: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct JointProxy {
    pub name_j: String,
    pub name_e: String,
    pub kind: u8,
    pub size: f32,
    pub rigid_a: Option<ObjectKey>,
    pub rigid_b: Option<ObjectKey>,
    pub minimum_location: Vec3,
    pub maximum_location: Vec3,
    pub minimum_rotation: Vec3,
    pub maximum_rotation: Vec3,
    pub spring_linear: Vec3,
    pub spring_angular: Vec3,
}
