//! PMX 2.0/2.1 document model and reader.

mod header;
pub(crate) mod reader;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub use header::*;
pub use reader::*;

#[derive(Clone, Debug)]
pub struct Bdef1 {
    pub bone: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Bdef2 {
    pub bones: [Option<usize>; 2],
    pub weight: f32,
}

#[derive(Clone, Debug)]
pub struct Bdef4 {
    pub bones: [Option<usize>; 4],
    pub weights: [f32; 4],
}

#[derive(Clone, Debug)]
pub struct Sdef {
    pub bones: [Option<usize>; 2],
    pub weight: f32,
    pub c: [f32; 3],
    pub r0: [f32; 3],
    pub r1: [f32; 3],
}

/// PMX 2.1 dual-quaternion skinning.
#[derive(Clone, Debug)]
pub struct Qdef {
    pub bones: [Option<usize>; 4],
    pub weights: [f32; 4],
}

#[derive(Clone, Debug)]
pub enum Weight {
    Bdef1(Bdef1),
    Bdef2(Bdef2),
    Bdef4(Bdef4),
    Sdef(Sdef),
    Qdef(Qdef),
}

impl Weight {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Weight::Bdef1(_) => "BDEF1",
            Weight::Bdef2(_) => "BDEF2",
            Weight::Bdef4(_) => "BDEF4",
            Weight::Sdef(_) => "SDEF",
            Weight::Qdef(_) => "QDEF",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub additional_uvs: Vec<[f32; 4]>,
    pub weight: Weight,
    pub edge_scale: f32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SphereMode {
    Off,
    Multiply,
    Add,
    SubTexture,
}

impl SphereMode {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(SphereMode::Off),
            1 => Some(SphereMode::Multiply),
            2 => Some(SphereMode::Add),
            3 => Some(SphereMode::SubTexture),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            SphereMode::Off => 0,
            SphereMode::Multiply => 1,
            SphereMode::Add => 2,
            SphereMode::SubTexture => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Toon {
    Texture(Option<usize>),
    Shared(u8),
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub name_en: String,
    pub diffuse: [f32; 4],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub ambient: [f32; 3],
    pub double_sided: bool,
    pub drop_shadow: bool,
    pub self_shadow_map: bool,
    pub self_shadow: bool,
    pub toon_edge: bool,
    pub edge_color: [f32; 4],
    pub edge_size: f32,
    pub texture: Option<usize>,
    pub sphere: Option<usize>,
    pub sphere_mode: SphereMode,
    pub toon: Toon,
    pub comment: String,
    pub index_count: u32,
}

impl Material {
    pub fn face_count(&self) -> usize {
        self.index_count as usize / 3
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DisplayConnection {
    Offset([f32; 3]),
    Bone(Option<usize>),
}

impl DisplayConnection {
    /// No visible tail: no target bone, or a zero offset.
    pub fn is_tip(&self) -> bool {
        match self {
            DisplayConnection::Offset(v) => *v == [0.0; 3],
            DisplayConnection::Bone(b) => b.is_none(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Limit {
    pub lower: [f32; 3],
    pub upper: [f32; 3],
}

#[derive(Clone, Debug)]
pub struct IkLink {
    pub bone: Option<usize>,
    pub limit: Option<Limit>,
}

#[derive(Clone, Debug)]
pub struct Ik {
    pub target: Option<usize>,
    pub loop_count: u32,
    pub limit_angle: f32,
    pub links: Vec<IkLink>,
}

#[derive(Clone, Debug)]
pub struct AdditionalTransform {
    pub rotation: bool,
    pub location: bool,
    pub local: bool,
    pub bone: Option<usize>,
    pub influence: f32,
}

#[derive(Clone, Debug)]
pub struct LocalAxes {
    pub x: [f32; 3],
    pub z: [f32; 3],
}

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub name_en: String,
    pub position: [f32; 3],
    pub parent: Option<usize>,
    pub transform_order: i32,
    pub display_connection: DisplayConnection,
    pub rotatable: bool,
    pub movable: bool,
    pub visible: bool,
    pub controllable: bool,
    pub ik: Option<Ik>,
    pub additional: Option<AdditionalTransform>,
    pub transform_after_physics: bool,
    pub fixed_axis: Option<[f32; 3]>,
    pub local_axes: Option<LocalAxes>,
    pub external_parent: Option<i32>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Category {
    System,
    Eyebrow,
    Eye,
    Mouth,
    Other,
}

pub mod morph {
    #[derive(Clone, Debug)]
    pub struct Vertex {
        pub vertex: usize,
        pub offset: [f32; 3],
    }

    #[derive(Clone, Debug)]
    pub struct Uv {
        pub vertex: usize,
        pub offset: [f32; 4],
    }

    #[derive(Clone, Debug)]
    pub struct Bone {
        pub bone: Option<usize>,
        pub location: [f32; 3],
        pub rotation: [f32; 4],
    }

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum MaterialOp {
        Mul,
        Add,
    }

    #[derive(Clone, Debug)]
    pub struct Material {
        pub material: Option<usize>,
        pub op: MaterialOp,
        pub diffuse: [f32; 4],
        pub specular: [f32; 3],
        pub shininess: f32,
        pub ambient: [f32; 3],
        pub edge_color: [f32; 4],
        pub edge_size: f32,
        pub texture: [f32; 4],
        pub sphere: [f32; 4],
        pub toon: [f32; 4],
    }

    #[derive(Clone, Debug)]
    pub struct Group {
        pub morph: Option<usize>,
        pub factor: f32,
    }

    #[derive(Clone, Debug)]
    pub struct Impulse {
        pub rigid_body: Option<usize>,
        pub local: bool,
        pub velocity: [f32; 3],
        pub torque: [f32; 3],
    }

    #[derive(Clone, Debug)]
    pub enum Kind {
        Group(Vec<Group>),
        Vertex(Vec<Vertex>),
        Bone(Vec<Bone>),
        /// Channel 0 is the main UV, 1..=4 the additional UVs.
        Uv(usize, Vec<Uv>),
        Material(Vec<Material>),
        Flip(Vec<Group>),
        Impulse(Vec<Impulse>),
    }

    impl Kind {
        pub fn type_index(&self) -> u8 {
            match self {
                Kind::Group(_) => 0,
                Kind::Vertex(_) => 1,
                Kind::Bone(_) => 2,
                Kind::Uv(channel, _) => 3 + *channel as u8,
                Kind::Material(_) => 8,
                Kind::Flip(_) => 9,
                Kind::Impulse(_) => 10,
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Morph {
    pub name: String,
    pub name_en: String,
    pub category: Category,
    pub kind: morph::Kind,
}

#[derive(Clone, Debug)]
pub enum DisplayElement {
    Bone(Option<usize>),
    Morph(Option<usize>),
}

#[derive(Clone, Debug)]
pub struct DisplayFrame {
    pub name: String,
    pub name_en: String,
    pub special: bool,
    pub elements: Vec<DisplayElement>,
}

pub mod rigid {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum Shape {
        Sphere,
        Box,
        Capsule,
    }

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum Mode {
        Static,
        Dynamic,
        DynamicWithBone,
    }
}

#[derive(Clone, Debug)]
pub struct RigidBody {
    pub name: String,
    pub name_en: String,
    pub bone: Option<usize>,
    pub group: u8,
    pub non_collision_mask: u16,
    pub shape: rigid::Shape,
    pub size: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    pub mode: rigid::Mode,
}

#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    pub name_en: String,
    pub kind: u8,
    pub rigid_bodies: [Option<usize>; 2],
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub limit_location: Limit,
    pub limit_rotation: Limit,
    pub spring_location: [f32; 3],
    pub spring_rotation: [f32; 3],
}

/// A fully materialized PMX document.
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub version: f32,
    pub name: String,
    pub name_en: String,
    pub comment: String,
    pub comment_en: String,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<[usize; 3]>,
    pub textures: Vec<PathBuf>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
    pub morphs: Vec<Morph>,
    pub display_frames: Vec<DisplayFrame>,
    pub rigid_bodies: Vec<RigidBody>,
    pub joints: Vec<Joint>,
}

impl Model {
    pub fn read<T: Read>(reader: T) -> Result<Self, Error> {
        Reader::new(reader)?.to_model()
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<Model, Error> {
    let file = File::open(path.as_ref())?;
    Model::read(BufReader::new(file))
}
