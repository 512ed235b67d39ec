//! In-memory stand-in for the host scene graph.
//!
//! Every resource lives in a slot map and is referenced by a typed key, so
//! renaming a resource never breaks a reference to it.

mod armature;
mod material;
mod mesh;
mod object;
mod physics;
mod root;
mod texture;

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::convert::unique_name;
use crate::shader::Graph;

pub use armature::*;
pub use material::*;
pub use mesh::*;
pub use object::*;
pub use physics::*;
pub use root::*;
pub use texture::*;

new_key_type! {
    pub struct ObjectKey;
    pub struct MeshKey;
    pub struct ArmatureKey;
    pub struct MaterialKey;
    pub struct NodeGroupKey;
    pub struct TextureKey;
    pub struct ImageKey;
    pub struct TextKey;
}

#[derive(Clone, Debug, Default)]
pub struct Text {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct Scene {
    pub objects: SlotMap<ObjectKey, Object>,
    pub meshes: SlotMap<MeshKey, Mesh>,
    pub armatures: SlotMap<ArmatureKey, Armature>,
    pub materials: SlotMap<MaterialKey, Material>,
    pub node_groups: SlotMap<NodeGroupKey, Graph>,
    pub textures: SlotMap<TextureKey, Texture>,
    pub images: SlotMap<ImageKey, Image>,
    pub texts: SlotMap<TextKey, Text>,
    pub active: Option<ObjectKey>,
    pub selection: Vec<ObjectKey>,
    pub camera: Option<ObjectKey>,
    texture_paths: FxHashMap<PathBuf, TextureKey>,
    image_paths: FxHashMap<PathBuf, ImageKey>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, mut object: Object) -> ObjectKey {
        object.name = unique_name(&object.name, |n| self.find_object(n).is_some());
        self.objects.insert(object)
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectKey> {
        self.objects
            .iter()
            .find(|(_, o)| o.name == name)
            .map(|(k, _)| k)
    }

    pub fn children(&self, parent: ObjectKey) -> impl Iterator<Item = ObjectKey> + '_ {
        self.objects
            .iter()
            .filter(move |(_, o)| o.parent == Some(parent))
            .map(|(k, _)| k)
    }

    /// Removes an object and everything parented below it. Outline bindings
    /// pointing at removed objects are dropped.
    pub fn remove_object(&mut self, key: ObjectKey) -> Option<Object> {
        let children = self.children(key).collect::<Vec<_>>();
        for child in children {
            self.remove_object(child);
        }
        let object = self.objects.remove(key)?;
        for material in self.materials.values_mut() {
            material.bindings.retain(|b| b.object != key);
        }
        if self.active == Some(key) {
            self.active = None;
        }
        self.selection.retain(|k| *k != key);
        Some(object)
    }

    /// Removes a material, emptying the mesh slots that held it and
    /// releasing its textures. The vertex groups and weight-mix modifiers of
    /// its outline bindings go with it.
    pub fn remove_material(&mut self, key: MaterialKey) -> Option<Material> {
        let material = self.materials.remove(key)?;
        for binding in &material.bindings {
            if let Some(object) = self.objects.get_mut(binding.object) {
                object.remove_vertex_group(&binding.group);
                object.remove_modifier(&binding.modifier);
            }
        }
        for mesh in self.meshes.values_mut() {
            for slot in mesh.materials.iter_mut().filter(|s| **s == Some(key)) {
                *slot = None;
            }
        }
        for texture in material.texture_slots.iter().flatten().map(|s| s.texture) {
            self.release_texture(texture);
        }
        Some(material)
    }

    pub fn add_mesh(&mut self, mut mesh: Mesh) -> MeshKey {
        mesh.name = unique_name(&mesh.name, |n| self.meshes.values().any(|m| m.name == n));
        self.meshes.insert(mesh)
    }

    pub fn mesh_of(&self, object: ObjectKey) -> Option<MeshKey> {
        match self.objects.get(object)?.data {
            ObjectData::Mesh(key) => Some(key),
            _ => None,
        }
    }

    pub fn add_armature(&mut self, armature: Armature) -> ArmatureKey {
        self.armatures.insert(armature)
    }

    pub fn armature_of(&self, object: ObjectKey) -> Option<ArmatureKey> {
        match self.objects.get(object)?.data {
            ObjectData::Armature(key) => Some(key),
            _ => None,
        }
    }

    pub fn root_of(&self, object: ObjectKey) -> Option<&MmdRoot> {
        match &self.objects.get(object)?.data {
            ObjectData::Root(root) => Some(root),
            _ => None,
        }
    }

    pub fn root_of_mut(&mut self, object: ObjectKey) -> Option<&mut MmdRoot> {
        match &mut self.objects.get_mut(object)?.data {
            ObjectData::Root(root) => Some(root),
            _ => None,
        }
    }

    pub fn add_material(&mut self, mut material: Material) -> MaterialKey {
        material.name = unique_name(&material.name, |n| self.find_material(n).is_some());
        self.materials.insert(material)
    }

    pub fn find_material(&self, name: &str) -> Option<MaterialKey> {
        self.materials
            .iter()
            .find(|(_, m)| m.name == name)
            .map(|(k, _)| k)
    }

    pub fn add_node_group(&mut self, graph: Graph) -> NodeGroupKey {
        self.node_groups.insert(graph)
    }

    pub fn find_node_group(&self, name: &str) -> Option<NodeGroupKey> {
        self.node_groups
            .iter()
            .find(|(_, g)| g.name == name)
            .map(|(k, _)| k)
    }

    pub fn add_text(&mut self, name: &str, body: &str) -> TextKey {
        let name = unique_name(name, |n| self.texts.values().any(|t| t.name == n));
        self.texts.insert(Text {
            name,
            body: body.replace('\r', ""),
        })
    }

    pub fn texture_by_path(&self, path: &Path) -> Option<TextureKey> {
        self.texture_paths.get(path).copied()
    }

    pub fn image_by_path(&self, path: &Path) -> Option<ImageKey> {
        self.image_paths.get(path).copied()
    }

    pub fn add_image(&mut self, mut image: Image) -> ImageKey {
        image.name = unique_name(&image.name, |n| self.images.values().any(|i| i.name == n));
        let path = image.path.clone();
        let key = self.images.insert(image);
        self.image_paths.insert(path, key);
        key
    }

    /// Registers a texture for `path`. The image gains one user.
    pub fn add_texture(&mut self, mut texture: Texture, path: PathBuf) -> TextureKey {
        texture.name = unique_name(&texture.name, |n| {
            self.textures.values().any(|t| t.name == n)
        });
        if let Some(image) = self.images.get_mut(texture.image) {
            image.users += 1;
        }
        let key = self.textures.insert(texture);
        self.texture_paths.insert(path, key);
        key
    }

    pub fn use_texture(&mut self, key: TextureKey) {
        if let Some(texture) = self.textures.get_mut(key) {
            texture.users += 1;
        }
    }

    /// Drops one user of a texture. A texture left without users is removed,
    /// and so is its image once nothing else refers to it.
    pub fn release_texture(&mut self, key: TextureKey) {
        let Some(texture) = self.textures.get_mut(key) else {
            return;
        };
        texture.users = texture.users.saturating_sub(1);
        if texture.users > 0 {
            return;
        }
        let Some(texture) = self.textures.remove(key) else {
            return;
        };
        self.texture_paths.retain(|_, k| *k != key);
        log::debug!("remove texture {}", texture.name);
        let Some(image) = self.images.get_mut(texture.image) else {
            return;
        };
        image.users = image.users.saturating_sub(1);
        if image.users == 0 {
            let image_key = texture.image;
            if let Some(image) = self.images.remove(image_key) {
                log::debug!("remove image {}", image.name);
            }
            self.image_paths.retain(|_, k| *k != image_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_object_names() {
        let mut scene = Scene::new();
        let a = scene.add_object(Object::new("model", ObjectData::Empty));
        let b = scene.add_object(Object::new("model", ObjectData::Empty));
        assert!(scene.objects[a].name == "model");
        assert!(scene.objects[b].name == "model.001");
        assert!(scene.find_object("model.001") == Some(b));
    }

    #[test]
    fn texture_release_removes_unused_image() {
        let mut scene = Scene::new();
        let image = scene.add_image(Image::placeholder("a.png", PathBuf::from("/tmp/a.png")));
        let texture = scene.add_texture(Texture::new("a", image), PathBuf::from("/tmp/a.png"));
        scene.use_texture(texture);
        scene.use_texture(texture);
        scene.release_texture(texture);
        assert!(scene.textures.contains_key(texture));
        scene.release_texture(texture);
        assert!(!scene.textures.contains_key(texture));
        assert!(!scene.images.contains_key(image));
        assert!(scene.texture_by_path(Path::new("/tmp/a.png")).is_none());
        assert!(scene.image_by_path(Path::new("/tmp/a.png")).is_none());
    }

    #[test]
    fn removing_an_object_removes_its_children() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object::new("root", ObjectData::Empty));
        let mut child = Object::new("child", ObjectData::Empty);
        child.parent = Some(root);
        let child = scene.add_object(child);
        scene.active = Some(child);
        assert!(scene.remove_object(root).is_some());
        assert!(scene.objects.is_empty());
        assert!(scene.active.is_none());
        assert!(scene.remove_object(child).is_none());
    }

    #[test]
    fn removing_a_material_empties_its_slots() {
        let mut scene = Scene::new();
        let image = scene.add_image(Image::placeholder("a.png", PathBuf::from("/tmp/a.png")));
        let texture = scene.add_texture(Texture::new("a", image), PathBuf::from("/tmp/a.png"));
        let mut material = Material::new("m", Role::Mmd);
        material.texture_slots[BASE_TEX_SLOT] =
            Some(TextureSlot::new(texture, TexCoords::Uv, BlendType::Multiply));
        let material = scene.add_material(material);
        scene.use_texture(texture);
        let mut mesh = Mesh::new("mesh");
        mesh.materials = vec![Some(material), None];
        let mesh = scene.add_mesh(mesh);
        scene.remove_material(material);
        assert!(scene.meshes[mesh].materials == vec![None, None]);
        assert!(scene.textures.is_empty() && scene.images.is_empty());
    }

    #[test]
    fn texts_drop_carriage_returns() {
        let mut scene = Scene::new();
        let key = scene.add_text("m_comment", "a\r\nb");
        assert!(scene.texts[key].body == "a\nb");
    }
}
