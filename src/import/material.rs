use std::path::Path;

use glam::Vec3;

use super::texture::{load_texture, resolve};
use super::ImportOptions;
use crate::edge::edge_material;
use crate::pmx::{self, SphereMode, Toon};
use crate::scene::{
    BlendType, Extension, Material, MaterialKey, MmdMaterial, NodeGroupKey, Role, Scene,
    TexCoords, TextureKey, TextureSlot, BASE_TEX_SLOT, SPHERE_TEX_SLOT, TOON_TEX_SLOT,
};
use crate::shader::material::{material_graph, Proxies, Textures, NODE_BASE, NODE_BASE_NO_SHADOW};
use crate::{Error, Result};

/// The two lighting proxies every material graph shares.
pub fn shared_proxies(scene: &mut Scene) -> (MaterialKey, MaterialKey) {
    let base = match scene.find_material(NODE_BASE) {
        Some(key) => key,
        None => {
            let mut m = Material::new(NODE_BASE, Role::Proxy);
            m.surface.specular_intensity = 0.0;
            scene.add_material(m)
        }
    };
    let no_shadow = match scene.find_material(NODE_BASE_NO_SHADOW) {
        Some(key) => key,
        None => {
            let mut m = Material::new(NODE_BASE_NO_SHADOW, Role::Proxy);
            m.surface.specular_intensity = 0.0;
            m.surface.use_shadows = false;
            scene.add_material(m)
        }
    };
    (base, no_shadow)
}

pub fn specular_intensity(shininess: f32) -> f32 {
    if shininess > 0.0 {
        0.2
    } else {
        0.0
    }
}

struct Loader<'a> {
    model: &'a pmx::Model,
    base_dir: &'a Path,
    options: &'a ImportOptions,
}

impl Loader<'_> {
    fn texture(&self, scene: &mut Scene, index: usize) -> Result<TextureKey> {
        let path = self
            .model
            .textures
            .get(index)
            .ok_or_else(|| Error::invalid_index("texture", index))?;
        let path = resolve(self.base_dir, path);
        Ok(load_texture(scene, &path, self.options.use_mipmap))
    }

    /// Sphere and toon maps are sampled without their alpha channel.
    fn opaque_texture(&self, scene: &mut Scene, index: usize) -> Result<TextureKey> {
        let key = self.texture(scene, index)?;
        let texture = &mut scene.textures[key];
        texture.use_alpha = false;
        let image = texture.image;
        if let Some(image) = scene.images.get_mut(image) {
            image.use_alpha = false;
        }
        Ok(key)
    }
}

fn mmd_material(record: &pmx::Material) -> MmdMaterial {
    let d = record.diffuse;
    let (is_shared, shared) = match record.toon {
        Toon::Shared(n) => (true, n as i32),
        Toon::Texture(_) => (false, -1),
    };
    MmdMaterial {
        name_j: record.name.clone(),
        name_e: record.name_en.clone(),
        ambient_color: Vec3::from(record.ambient),
        diffuse_color: Vec3::new(d[0], d[1], d[2]),
        alpha: d[3],
        specular_color: Vec3::from(record.specular),
        shininess: record.shininess,
        is_double_sided: record.double_sided,
        enabled_drop_shadow: record.drop_shadow,
        enabled_self_shadow_map: record.self_shadow_map,
        enabled_self_shadow: record.self_shadow,
        enabled_toon_edge: record.toon_edge,
        edge_color: record.edge_color,
        edge_weight: record.edge_size,
        sphere_texture_type: record.sphere_mode,
        is_shared_toon_texture: is_shared,
        shared_toon_texture: shared,
        comment: record.comment.clone(),
        ..Default::default()
    }
}

fn import_one(
    scene: &mut Scene,
    loader: &Loader,
    group: NodeGroupKey,
    shared: (MaterialKey, MaterialKey),
    record: &pmx::Material,
) -> Result<MaterialKey> {
    let textures = Textures {
        base: record.texture.map(|t| loader.texture(scene, t)).transpose()?,
        sphere: record.sphere.map(|t| loader.opaque_texture(scene, t)).transpose()?,
        toon: match record.toon {
            Toon::Texture(Some(t)) => Some(loader.opaque_texture(scene, t)?),
            _ => None,
        },
    };
    if let Some(toon) = textures.toon {
        scene.textures[toon].extension = Extension::Extend;
    }

    let mut mmd = mmd_material(record);
    if let Toon::Texture(Some(t)) = record.toon {
        mmd.toon_texture = loader.model.textures.get(t).map(|p| resolve(loader.base_dir, p));
    }

    let mut material = Material::new(&record.name, Role::Mmd);
    let surface = &mut material.surface;
    surface.diffuse_color = mmd.diffuse_color;
    surface.specular_color = mmd.specular_color;
    surface.specular_hardness = mmd.shininess;
    surface.alpha = mmd.alpha;
    surface.use_transparency = true;
    surface.use_cast_shadows = mmd.enabled_self_shadow_map || mmd.enabled_drop_shadow;
    surface.use_cast_buffer_shadows = mmd.enabled_drop_shadow;
    surface.use_raytrace = mmd.enabled_self_shadow_map;
    if let Some(t) = textures.base {
        let mut slot = TextureSlot::new(t, TexCoords::Uv, BlendType::Multiply);
        slot.use_map_alpha = true;
        material.texture_slots[BASE_TEX_SLOT] = Some(slot);
    }
    if let Some(t) = textures.toon {
        material.texture_slots[TOON_TEX_SLOT] =
            Some(TextureSlot::new(t, TexCoords::Normal, BlendType::Multiply));
    }
    if let Some(t) = textures.sphere {
        let (blend, factor) = match record.sphere_mode {
            SphereMode::Add => (BlendType::Add, loader.options.spa_blend_factor),
            _ => (BlendType::Multiply, loader.options.sph_blend_factor),
        };
        let mut slot = TextureSlot::new(t, TexCoords::Normal, blend);
        slot.enabled = record.sphere_mode != SphereMode::Off;
        slot.diffuse_color_factor = factor;
        material.texture_slots[SPHERE_TEX_SLOT] = Some(slot);
    }
    for t in material.texture_slots.iter().flatten().map(|s| s.texture) {
        scene.use_texture(t);
    }
    material.mmd = mmd.clone();
    let key = scene.add_material(material);
    let name = scene.materials[key].name.clone();

    let mut spw = Material::new(&format!("{}.spw", name), Role::Proxy);
    spw.surface.diffuse_intensity = 0.0;
    spw.surface.specular_color = Vec3::ONE;
    spw.surface.specular_intensity = specular_intensity(mmd.shininess);
    spw.surface.specular_hardness = mmd.shininess;
    let spw = scene.add_material(spw);

    let mut alpha = Material::new(&format!("{}.alp", name), Role::Proxy);
    alpha.surface.alpha = mmd.alpha;
    alpha.surface.use_transparency = true;
    if let Some(t) = textures.base {
        let mut slot = TextureSlot::new(t, TexCoords::Uv, BlendType::Multiply);
        slot.use_map_alpha = true;
        alpha.texture_slots[BASE_TEX_SLOT] = Some(slot);
        scene.use_texture(t);
    }
    let alpha = scene.add_material(alpha);

    let proxies = Proxies {
        base: shared.0,
        base_no_shadow: shared.1,
        specular_weight: spw,
        alpha,
    };
    let graph = material_graph(scene, group, &name, &mmd, &proxies, &textures)?;
    let material = &mut scene.materials[key];
    material.node_tree = Some(graph);
    material.mmd.spw_material = Some(spw);
    material.mmd.alpha_material = Some(alpha);
    edge_material(scene, key)?;
    log::debug!("material {} imported", name);
    Ok(key)
}

/// Imports every material of `model` in order, each followed by its edge
/// material.
pub fn import(
    scene: &mut Scene,
    model: &pmx::Model,
    base_dir: &Path,
    options: &ImportOptions,
    group: NodeGroupKey,
) -> Result<Vec<MaterialKey>> {
    let loader = Loader {
        model,
        base_dir,
        options,
    };
    let shared = shared_proxies(scene);
    model
        .materials
        .iter()
        .map(|record| import_one(scene, &loader, group, shared, record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::fixture;
    use crate::shader::{group, Value};
    use crate::shader::group::SHADER_GROUP;
    use crate::shader::ToonRamp;
    use std::path::PathBuf;

    fn run(model: &pmx::Model, dir: &Path) -> (Scene, Vec<MaterialKey>) {
        let mut scene = Scene::new();
        let group = group::ensure(&mut scene, ToonRamp::Stepped).unwrap();
        let keys = import(&mut scene, model, dir, &ImportOptions::default(), group).unwrap();
        (scene, keys)
    }

    #[test]
    fn proxies_and_edge_material() {
        let dir = tempfile::tempdir().unwrap();
        let (scene, keys) = run(&fixture::minimal_model(), dir.path());
        let m = &scene.materials[keys[0]];
        assert!(m.name == "body");
        let spw = &scene.materials[m.mmd.spw_material.unwrap()];
        assert!(spw.name == "body.spw" && spw.surface.specular_intensity == 0.2);
        assert!(scene.materials[m.mmd.alpha_material.unwrap()].name == "body.alp");
        assert!(scene.materials[m.mmd.edge_material.unwrap()].name == "body.edge");
        assert!(scene.find_material(NODE_BASE).is_some());
        let graph = m.node_tree.as_ref().unwrap();
        assert!(graph.input_value(SHADER_GROUP, "Toon Index").unwrap() == Value::Float(0.0));
    }

    #[test]
    fn textures_are_shared_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = fixture::minimal_model();
        model.textures = vec![PathBuf::from("tex/body.png"), PathBuf::from("sph/metal.sph")];
        let mut second = fixture::material("skin", 0);
        second.texture = Some(0);
        second.sphere = Some(1);
        second.sphere_mode = SphereMode::Add;
        model.materials[0].texture = Some(0);
        model.materials.push(second);
        let (scene, keys) = run(&model, dir.path());
        let base = scene.materials[keys[0]].texture(BASE_TEX_SLOT).unwrap();
        assert!(scene.materials[keys[1]].texture(BASE_TEX_SLOT) == Some(base));
        // two materials and their two alpha proxies
        assert!(scene.textures[base].users == 4);
        assert!(scene.images.values().all(|i| i.placeholder));
        let sphere = scene.materials[keys[1]].texture_slots[SPHERE_TEX_SLOT].as_ref().unwrap();
        assert!(sphere.blend == BlendType::Add && sphere.enabled);
        assert!(!scene.textures[sphere.texture].use_alpha);
    }

    #[test]
    fn missing_texture_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = fixture::minimal_model();
        model.materials[0].texture = Some(2);
        let mut scene = Scene::new();
        let group = group::ensure(&mut scene, ToonRamp::Stepped).unwrap();
        let err = import(&mut scene, &model, dir.path(), &ImportOptions::default(), group);
        assert!(matches!(err, Err(Error::InvalidIndex { kind: "texture", index: 2 })));
    }
}
