//! Editing imported materials.
//!
//! [`MaterialEditor`] keeps the MMD properties of a material, its shader
//! graph, its proxy materials and its edge material in step. Slot level
//! operations on mesh objects live in [`swap_materials`] and
//! [`fix_material_order`].

use std::path::Path;

use glam::Vec3;

use crate::edge::{self, edge_material, EdgeSettings};
use crate::import::material::{shared_proxies, specular_intensity};
use crate::import::texture::{load_texture, resolve};
use crate::pmx::SphereMode;
use crate::scene::{
    BlendType, Extension, Material, MaterialKey, ModifierKind, ObjectKey, Role, Scene, TexCoords,
    TextureKey, TextureSlot, BASE_TEX_SLOT, SPHERE_TEX_SLOT, TOON_TEX_SLOT,
};
use crate::shader::group::SHADER_GROUP;
use crate::shader::material::{apply_sphere, apply_toon, set_texture};
use crate::shader::{Graph, NodeKind, Value};
use crate::{Error, Result};

fn rgb1(c: Vec3) -> Value {
    Value::Color([c.x, c.y, c.z, 1.0])
}

fn clear_slot(scene: &mut Scene, material: MaterialKey, slot: usize) {
    let texture = scene
        .materials
        .get_mut(material)
        .and_then(|m| m.texture_slots[slot].take())
        .map(|s| s.texture);
    if let Some(t) = texture {
        scene.release_texture(t);
    }
}

fn node_tree(material: &mut Material) -> Result<&mut Graph> {
    let name = material.name.clone();
    material
        .node_tree
        .as_mut()
        .ok_or_else(|| Error::graph(format!("{} has no node tree", name)))
}

pub struct MaterialEditor<'a> {
    scene: &'a mut Scene,
    key: MaterialKey,
    edge: EdgeSettings,
}

impl<'a> MaterialEditor<'a> {
    /// Fails unless `key` is an imported MMD material.
    pub fn new(scene: &'a mut Scene, key: MaterialKey) -> Result<Self> {
        match scene.materials.get(key).map(|m| (m.role, m.name.clone())) {
            Some((Role::Mmd, _)) => Ok(Self {
                scene,
                key,
                edge: EdgeSettings::default(),
            }),
            Some((_, name)) => Err(Error::MaterialNotFound(name)),
            None => Err(Error::MaterialNotFound(format!("{:?}", key))),
        }
    }

    /// Settings used when outline modifiers have to be recreated.
    pub fn with_edge_settings(mut self, settings: EdgeSettings) -> Self {
        self.edge = settings;
        self
    }

    pub fn material(&self) -> &Material {
        &self.scene.materials[self.key]
    }

    fn material_mut(&mut self) -> &mut Material {
        &mut self.scene.materials[self.key]
    }

    fn graph_mut(&mut self) -> Result<&mut Graph> {
        node_tree(self.material_mut())
    }

    fn proxy_mut(&mut self, key: Option<MaterialKey>) -> Option<&mut Material> {
        self.scene.materials.get_mut(key?)
    }

    pub fn set_diffuse_color(&mut self, color: Vec3) -> Result<()> {
        let m = self.material_mut();
        m.mmd.diffuse_color = color;
        m.surface.diffuse_color = color;
        self.graph_mut()?.set_input(SHADER_GROUP, "Diffuse Color", rgb1(color))
    }

    pub fn set_specular_color(&mut self, color: Vec3) -> Result<()> {
        let m = self.material_mut();
        m.mmd.specular_color = color;
        m.surface.specular_color = color;
        self.graph_mut()?.set_input(SHADER_GROUP, "Specular Color", rgb1(color))
    }

    pub fn set_ambient_color(&mut self, color: Vec3) -> Result<()> {
        self.material_mut().mmd.ambient_color = color;
        self.graph_mut()?.set_input(SHADER_GROUP, "Ambient Color", rgb1(color))
    }

    pub fn set_alpha(&mut self, alpha: f32) -> Result<()> {
        let m = self.material_mut();
        m.mmd.alpha = alpha;
        m.surface.alpha = alpha;
        let proxy = m.mmd.alpha_material;
        let proxy = self
            .proxy_mut(proxy)
            .ok_or_else(|| Error::invalid_data("alpha proxy material is missing"))?;
        proxy.surface.alpha = alpha;
        Ok(())
    }

    pub fn set_shininess(&mut self, shininess: f32) -> Result<()> {
        let m = self.material_mut();
        m.mmd.shininess = shininess;
        m.surface.specular_hardness = shininess;
        let proxy = m.mmd.spw_material;
        let spw = self
            .proxy_mut(proxy)
            .ok_or_else(|| Error::invalid_data("specular weight proxy material is missing"))?;
        spw.surface.specular_hardness = shininess;
        spw.surface.specular_intensity = specular_intensity(shininess);
        Ok(())
    }

    pub fn set_double_sided(&mut self, double_sided: bool) -> Result<()> {
        self.material_mut().mmd.is_double_sided = double_sided;
        let b = Value::Float(double_sided as u8 as f32);
        self.graph_mut()?.set_input("Is Single", "B", b)
    }

    pub fn set_drop_shadow(&mut self, enabled: bool) {
        let m = self.material_mut();
        m.mmd.enabled_drop_shadow = enabled;
        m.surface.use_cast_shadows = m.mmd.enabled_self_shadow_map || enabled;
        m.surface.use_cast_buffer_shadows = enabled;
    }

    pub fn set_self_shadow_map(&mut self, enabled: bool) {
        let m = self.material_mut();
        m.mmd.enabled_self_shadow_map = enabled;
        m.surface.use_cast_shadows = enabled || m.mmd.enabled_drop_shadow;
        m.surface.use_raytrace = enabled;
    }

    /// Points the lighting proxy of the graph at the shadowed or unshadowed
    /// shared material.
    pub fn set_self_shadow(&mut self, enabled: bool) -> Result<()> {
        let (base, no_shadow) = shared_proxies(self.scene);
        self.material_mut().mmd.enabled_self_shadow = enabled;
        let proxy = if enabled { base } else { no_shadow };
        self.graph_mut()?
            .set_kind("Pure Mat", NodeKind::ExtendedMaterial(Some(proxy)))
    }

    fn update_edge_material(&mut self) -> Result<()> {
        let edge = edge_material(self.scene, self.key)?;
        let mmd = &self.scene.materials[self.key].mmd;
        let (color, toon_edge) = (mmd.edge_color, mmd.enabled_toon_edge);
        let graph = node_tree(&mut self.scene.materials[edge])?;
        graph.set_input(
            "Edge Base",
            "Color",
            Value::Color([color[0], color[1], color[2], 1.0]),
        )?;
        graph.set_input(
            "Edge Alpha",
            "Value",
            Value::Float(toon_edge as u8 as f32 * color[3]),
        )
    }

    /// Also recomputes the outline weights of every object using the
    /// material.
    pub fn set_toon_edge(&mut self, enabled: bool) -> Result<()> {
        self.material_mut().mmd.enabled_toon_edge = enabled;
        self.update_edge_material()?;
        let mut objects = self
            .material()
            .bindings
            .iter()
            .map(|b| b.object)
            .collect::<Vec<_>>();
        objects.dedup();
        for object in objects {
            edge::reconcile(self.scene, object, &self.edge)?;
        }
        Ok(())
    }

    pub fn set_edge_color(&mut self, color: [f32; 4]) -> Result<()> {
        self.material_mut().mmd.edge_color = color;
        self.update_edge_material()
    }

    pub fn set_edge_weight(&mut self, weight: f32) {
        self.material_mut().mmd.edge_weight = weight;
        let bindings = self.material().bindings.clone();
        for b in bindings {
            let modifier = self
                .scene
                .objects
                .get_mut(b.object)
                .and_then(|o| o.modifier_mut(&b.modifier));
            if let Some(ModifierKind::VertexWeightMix { mask_constant, .. }) =
                modifier.map(|m| &mut m.kind)
            {
                *mask_constant = weight / 100.0;
            }
        }
    }

    pub fn set_sphere_texture_type(&mut self, mode: SphereMode) -> Result<()> {
        let m = self.material_mut();
        m.mmd.sphere_texture_type = mode;
        let has_texture = match &mut m.texture_slots[SPHERE_TEX_SLOT] {
            Some(slot) => {
                slot.enabled = mode != SphereMode::Off;
                slot.blend = match mode {
                    SphereMode::Add => BlendType::Add,
                    _ => BlendType::Multiply,
                };
                true
            }
            None => false,
        };
        apply_sphere(self.graph_mut()?, mode, has_texture)
    }

    fn opaque_texture(&mut self, path: &Path, use_mipmap: bool) -> TextureKey {
        let key = load_texture(self.scene, &resolve(Path::new(""), path), use_mipmap);
        let texture = &mut self.scene.textures[key];
        texture.use_alpha = false;
        let image = texture.image;
        if let Some(image) = self.scene.images.get_mut(image) {
            image.use_alpha = false;
        }
        key
    }

    /// Sets the base texture, replacing any previous one. The alpha proxy
    /// samples the same texture.
    pub fn create_texture(&mut self, path: &Path, use_mipmap: bool) -> Result<TextureKey> {
        self.remove_texture()?;
        let key = load_texture(self.scene, &resolve(Path::new(""), path), use_mipmap);
        let mut slot = TextureSlot::new(key, TexCoords::Uv, BlendType::Multiply);
        slot.use_map_alpha = true;
        self.material_mut().texture_slots[BASE_TEX_SLOT] = Some(slot.clone());
        self.scene.use_texture(key);
        let alpha = self.material().mmd.alpha_material;
        let shared = match self.proxy_mut(alpha) {
            Some(proxy) => {
                proxy.texture_slots[BASE_TEX_SLOT] = Some(slot);
                true
            }
            None => false,
        };
        if shared {
            self.scene.use_texture(key);
        }
        set_texture(self.graph_mut()?, Some(key))?;
        Ok(key)
    }

    pub fn remove_texture(&mut self) -> Result<()> {
        set_texture(self.graph_mut()?, None)?;
        if let Some(alpha) = self.material().mmd.alpha_material {
            clear_slot(self.scene, alpha, BASE_TEX_SLOT);
        }
        clear_slot(self.scene, self.key, BASE_TEX_SLOT);
        Ok(())
    }

    pub fn create_sphere_texture(&mut self, path: &Path, use_mipmap: bool) -> Result<TextureKey> {
        clear_slot(self.scene, self.key, SPHERE_TEX_SLOT);
        let key = self.opaque_texture(path, use_mipmap);
        let slot = TextureSlot::new(key, TexCoords::Normal, BlendType::Multiply);
        self.material_mut().texture_slots[SPHERE_TEX_SLOT] = Some(slot);
        self.scene.use_texture(key);
        self.graph_mut()?
            .set_kind("Sphere Tex", NodeKind::Texture(Some(key)))?;
        let mode = self.material().mmd.sphere_texture_type;
        self.set_sphere_texture_type(mode)?;
        Ok(key)
    }

    pub fn remove_sphere_texture(&mut self) -> Result<()> {
        clear_slot(self.scene, self.key, SPHERE_TEX_SLOT);
        let mode = self.material().mmd.sphere_texture_type;
        let graph = self.graph_mut()?;
        graph.set_kind("Sphere Tex", NodeKind::Texture(None))?;
        apply_sphere(graph, mode, false)
    }

    fn update_toon(&mut self) -> Result<()> {
        let m = self.material_mut();
        let toon = m.texture(TOON_TEX_SLOT);
        let name = &m.name;
        let graph = m
            .node_tree
            .as_mut()
            .ok_or_else(|| Error::graph(format!("{} has no node tree", name)))?;
        apply_toon(graph, &m.mmd, toon)
    }

    /// Switches to a custom toon texture.
    pub fn create_toon_texture(&mut self, path: &Path, use_mipmap: bool) -> Result<TextureKey> {
        clear_slot(self.scene, self.key, TOON_TEX_SLOT);
        let key = self.opaque_texture(path, use_mipmap);
        self.scene.textures[key].extension = Extension::Extend;
        let m = self.material_mut();
        m.texture_slots[TOON_TEX_SLOT] =
            Some(TextureSlot::new(key, TexCoords::Normal, BlendType::Multiply));
        m.mmd.is_shared_toon_texture = false;
        m.mmd.toon_texture = Some(path.to_path_buf());
        self.scene.use_texture(key);
        self.update_toon()?;
        Ok(key)
    }

    /// Switches to one of the shared toon ramps, dropping a custom toon
    /// texture.
    pub fn set_shared_toon_texture(&mut self, index: u8) -> Result<()> {
        clear_slot(self.scene, self.key, TOON_TEX_SLOT);
        let m = self.material_mut();
        m.mmd.is_shared_toon_texture = true;
        m.mmd.shared_toon_texture = index as i32;
        m.mmd.toon_texture = None;
        self.update_toon()
    }

    /// Leaves the material without any toon term.
    pub fn remove_toon_texture(&mut self) -> Result<()> {
        clear_slot(self.scene, self.key, TOON_TEX_SLOT);
        let m = self.material_mut();
        m.mmd.is_shared_toon_texture = false;
        m.mmd.toon_texture = None;
        self.update_toon()
    }
}

/// A material slot of a mesh, by index or by material name.
#[derive(Clone, Copy, Debug)]
pub enum SlotRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for SlotRef<'_> {
    fn from(index: usize) -> Self {
        SlotRef::Index(index)
    }
}

impl<'a> From<&'a str> for SlotRef<'a> {
    fn from(name: &'a str) -> Self {
        SlotRef::Name(name)
    }
}

fn find_slot(scene: &Scene, slots: &[Option<MaterialKey>], r: SlotRef) -> Result<(usize, MaterialKey)> {
    let material = match r {
        SlotRef::Index(i) => slots.get(i).copied().flatten(),
        SlotRef::Name(name) => slots
            .iter()
            .flatten()
            .copied()
            .find(|&k| scene.materials.get(k).is_some_and(|m| m.name == name)),
    };
    let not_found = || match r {
        SlotRef::Index(i) => Error::MaterialNotFound(format!("#{}", i)),
        SlotRef::Name(name) => Error::MaterialNotFound(name.to_string()),
    };
    let material = material.ok_or_else(not_found)?;
    // a material used by several slots is addressed by its first one
    let slot = slots
        .iter()
        .position(|&k| k == Some(material))
        .ok_or_else(not_found)?;
    Ok((slot, material))
}

/// Moves the faces of material `a` to material `b`, and the faces of `b` to
/// `a` when `reverse` is set. With `swap_slots` the two slots also exchange
/// materials. Returns the two materials.
///
/// Outline bindings are not touched; run [`edge::reconcile`] afterwards.
pub fn swap_materials<'r>(
    scene: &mut Scene,
    object: ObjectKey,
    a: impl Into<SlotRef<'r>>,
    b: impl Into<SlotRef<'r>>,
    reverse: bool,
    swap_slots: bool,
) -> Result<(MaterialKey, MaterialKey)> {
    let mesh_key = scene
        .mesh_of(object)
        .ok_or_else(|| Error::invalid_data("materials can only be swapped on meshes"))?;
    let slots = &scene.meshes[mesh_key].materials;
    let (a_slot, a) = find_slot(scene, slots, a.into())?;
    let (b_slot, b) = find_slot(scene, slots, b.into())?;

    let mesh = &mut scene.meshes[mesh_key];
    for m in mesh.face_materials.iter_mut() {
        if *m == a_slot {
            *m = b_slot;
        } else if reverse && *m == b_slot {
            *m = a_slot;
        }
    }
    if swap_slots {
        mesh.materials.swap(a_slot, b_slot);
    }
    Ok((a, b))
}

/// Restores the slot order given by `names`, carrying faces along.
pub fn fix_material_order(scene: &mut Scene, object: ObjectKey, names: &[&str]) -> Result<()> {
    let mesh_key = scene
        .mesh_of(object)
        .ok_or_else(|| Error::invalid_data("materials can only be ordered on meshes"))?;
    for (i, &name) in names.iter().enumerate() {
        let current = scene.meshes[mesh_key]
            .materials
            .get(i)
            .copied()
            .flatten()
            .and_then(|k| scene.materials.get(k));
        if current.is_some_and(|m| m.name == name) {
            continue;
        }
        swap_materials(scene, object, name, i, true, true)?;
    }
    Ok(())
}
