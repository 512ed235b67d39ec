//! Toon outlines.
//!
//! The outline of a mesh object is produced by a solidify modifier that
//! extrudes flagged vertices backwards into the edge material slot following
//! each material. The amount is a per-vertex weight in `edge_vtx`, scaled per
//! material by a weight-mix modifier over the material's own vertex group and
//! by the distance to the camera.
//!
//! The material/object pairs are kept consistent by [`reconcile`], which first
//! plans every change from a read-only view of the scene and then applies it.

use glam::Vec3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::scene::{
    EdgeBinding, Material, MaterialKey, MixMode, MixSet, Modifier, ModifierKind, ObjectKey, Role,
    Scene,
};
use crate::shader::material::edge_graph;
use crate::{Error, Result};

pub const EDGE_GROUP: &str = "edge_vtx";
pub const CAMERA_GROUP: &str = "cam_vtx";
pub const CAMERA_PROXIMITY: &str = "Camera Proximity";
pub const CAMERA_MIX: &str = "Camera Distance Mix";
pub const EDGE_SOLIDIFY: &str = "Edge Solidify";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeSettings {
    /// Solidify thickness for a vertex of weight 1.
    pub thickness: f32,
    pub camera_min_distance: f32,
    pub camera_max_distance: f32,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            thickness: 1.0,
            camera_min_distance: 0.0,
            camera_max_distance: 50.0,
        }
    }
}

/// Returns the edge material paired with `material`, creating `<name>.edge`
/// on first use.
pub fn edge_material(scene: &mut Scene, material: MaterialKey) -> Result<MaterialKey> {
    let source = scene
        .materials
        .get(material)
        .ok_or_else(|| Error::invalid_data("edge material requested for a missing material"))?;
    if let Some(edge) = source.mmd.edge_material {
        if scene.materials.contains_key(edge) {
            return Ok(edge);
        }
    }
    let name = format!("{}.edge", source.name);
    let graph = edge_graph(&name, source.mmd.edge_color, source.mmd.enabled_toon_edge)?;
    let mut edge = Material::new(&name, Role::Edge);
    edge.mmd.name_j = source.mmd.name_j.clone();
    edge.mmd.name_e = source.mmd.name_e.clone();
    edge.surface.use_shadows = false;
    edge.surface.use_cast_shadows = false;
    edge.surface.use_cast_buffer_shadows = false;
    edge.surface.use_transparency = true;
    edge.node_tree = Some(graph);
    let key = scene.add_material(edge);
    scene.materials[material].mmd.edge_material = Some(key);
    Ok(key)
}

#[derive(Clone, Debug, PartialEq)]
struct Wanted {
    material: MaterialKey,
    slot: usize,
    name: String,
    vertices: Vec<usize>,
    mask_constant: f32,
}

/// Changes [`apply`] will make to one mesh object.
#[derive(Clone, Debug)]
pub struct Plan {
    object: ObjectKey,
    wanted: Vec<Wanted>,
    stale: Vec<String>,
    edge_weights: Vec<(usize, f32)>,
    vertex_count: usize,
}

impl Plan {
    pub fn object(&self) -> ObjectKey {
        self.object
    }

    /// Vertex groups and weight-mix modifiers that will be removed.
    pub fn stale(&self) -> &[String] {
        &self.stale
    }

    pub fn binding_count(&self) -> usize {
        self.wanted.len()
    }
}

fn binding_name(material: &Material, usage: usize) -> String {
    if usage == 0 {
        format!("{}.vtx", material.name)
    } else {
        format!("{}.vtx.{}", material.name, usage)
    }
}

/// Works out the bindings `object` should have from its current material
/// slots, without touching the scene.
pub fn plan(scene: &Scene, object: ObjectKey) -> Result<Plan> {
    let mesh_key = scene
        .mesh_of(object)
        .ok_or_else(|| Error::invalid_data("outlines need a mesh object"))?;
    let mesh = &scene.meshes[mesh_key];

    let mut usage = FxHashMap::default();
    let mut wanted = vec![];
    let mut edge_weights = FxHashMap::default();
    for (slot, key) in mesh.materials.iter().enumerate() {
        let Some(key) = *key else {
            continue;
        };
        let Some(material) = scene.materials.get(key) else {
            continue;
        };
        if material.role != Role::Mmd {
            continue;
        }
        let n = usage.entry(key).or_insert(0usize);
        let vertices = mesh.slot_vertices(slot);
        if material.mmd.enabled_toon_edge {
            for &v in &vertices {
                let scale = mesh.edge_scale.get(v).copied().unwrap_or(1.0);
                edge_weights.insert(v, scale);
            }
        }
        wanted.push(Wanted {
            material: key,
            slot,
            name: binding_name(material, *n),
            vertices,
            mask_constant: material.mmd.edge_weight / 100.0,
        });
        *n += 1;
    }

    let mut stale = vec![];
    for material in scene.materials.values() {
        for binding in material.bindings.iter().filter(|b| b.object == object) {
            for name in [&binding.group, &binding.modifier] {
                if !wanted.iter().any(|w| w.name == *name) && !stale.contains(name) {
                    stale.push(name.clone());
                }
            }
        }
    }

    let mut edge_weights = edge_weights.into_iter().collect::<Vec<_>>();
    edge_weights.sort_unstable_by_key(|(v, _)| *v);
    Ok(Plan {
        object,
        wanted,
        stale,
        edge_weights,
        vertex_count: mesh.positions.len(),
    })
}

fn is_edge_modifier(name: &str, plan: &Plan) -> bool {
    matches!(name, CAMERA_PROXIMITY | CAMERA_MIX | EDGE_SOLIDIFY)
        || plan.wanted.iter().any(|w| w.name == name)
}

/// Applies a plan made by [`plan`].
pub fn apply(scene: &mut Scene, plan: Plan, settings: &EdgeSettings) -> Result<()> {
    for material in scene.materials.values_mut() {
        material.bindings.retain(|b| b.object != plan.object);
    }
    for w in &plan.wanted {
        scene.materials[w.material].bindings.push(EdgeBinding {
            object: plan.object,
            slot: w.slot,
            group: w.name.clone(),
            modifier: w.name.clone(),
        });
    }

    let camera = scene.camera;
    let object = scene
        .objects
        .get_mut(plan.object)
        .ok_or_else(|| Error::invalid_data("outline object was removed"))?;
    for name in &plan.stale {
        object.remove_vertex_group(name);
        object.remove_modifier(name);
        log::debug!("{}: removed stale outline binding {}", object.name, name);
    }

    let edge = object.ensure_vertex_group(EDGE_GROUP);
    edge.clear();
    for &(v, weight) in &plan.edge_weights {
        edge.add(v, weight);
    }
    let cam = object.ensure_vertex_group(CAMERA_GROUP);
    cam.clear();
    for v in 0..plan.vertex_count {
        cam.add(v, 1.0);
    }

    for w in &plan.wanted {
        let group = object.ensure_vertex_group(&w.name);
        group.clear();
        for &v in &w.vertices {
            group.add(v, 1.0);
        }
        match object.modifier_mut(&w.name).map(|m| &mut m.kind) {
            Some(ModifierKind::VertexWeightMix {
                group_a,
                group_b,
                mask_constant,
                ..
            }) => {
                *group_a = EDGE_GROUP.to_string();
                *group_b = w.name.clone();
                *mask_constant = w.mask_constant;
            }
            existing => {
                if existing.is_some() {
                    object.remove_modifier(&w.name);
                }
                object.modifiers.push(Modifier {
                    name: w.name.clone(),
                    kind: ModifierKind::VertexWeightMix {
                        group_a: EDGE_GROUP.to_string(),
                        group_b: w.name.clone(),
                        mix_mode: MixMode::Multiply,
                        mix_set: MixSet::And,
                        mask_constant: w.mask_constant,
                    },
                });
            }
        }
    }

    let shared = [
        Modifier {
            name: CAMERA_PROXIMITY.to_string(),
            kind: ModifierKind::VertexWeightProximity {
                group: CAMERA_GROUP.to_string(),
                target: camera,
                min_dist: settings.camera_min_distance,
                max_dist: settings.camera_max_distance,
            },
        },
        Modifier {
            name: CAMERA_MIX.to_string(),
            kind: ModifierKind::VertexWeightMix {
                group_a: EDGE_GROUP.to_string(),
                group_b: CAMERA_GROUP.to_string(),
                mix_mode: MixMode::Multiply,
                mix_set: MixSet::And,
                mask_constant: 1.0,
            },
        },
        Modifier {
            name: EDGE_SOLIDIFY.to_string(),
            kind: ModifierKind::Solidify {
                thickness: settings.thickness,
                offset: 1.0,
                use_flip_normals: true,
                use_rim: false,
                material_offset: 1,
                vertex_group: EDGE_GROUP.to_string(),
            },
        },
    ];
    for modifier in shared {
        if object.modifier(&modifier.name).is_none() {
            object.modifiers.push(modifier);
        }
    }

    let (mut edge, mut rest): (Vec<_>, Vec<_>) = std::mem::take(&mut object.modifiers)
        .into_iter()
        .partition(|m| is_edge_modifier(&m.name, &plan));
    let rank = |m: &Modifier| match m.name.as_str() {
        CAMERA_PROXIMITY => plan.wanted.len(),
        CAMERA_MIX => plan.wanted.len() + 1,
        EDGE_SOLIDIFY => plan.wanted.len() + 2,
        name => plan
            .wanted
            .iter()
            .position(|w| w.name == name)
            .unwrap_or(plan.wanted.len()),
    };
    edge.sort_by_key(rank);
    rest.append(&mut edge);
    object.modifiers = rest;
    Ok(())
}

/// Brings the outline bindings of `object` in line with its material slots.
/// Running it again without changes to the slots changes nothing.
pub fn reconcile(scene: &mut Scene, object: ObjectKey, settings: &EdgeSettings) -> Result<()> {
    let plan = plan(scene, object)?;
    apply(scene, plan, settings)
}

/// Puts `material` into `slot` and its edge material into the slot after it.
pub fn assign_material(
    scene: &mut Scene,
    object: ObjectKey,
    slot: usize,
    material: MaterialKey,
    settings: &EdgeSettings,
) -> Result<()> {
    let mesh = scene
        .mesh_of(object)
        .ok_or_else(|| Error::invalid_data("materials can only be assigned to meshes"))?;
    let edge = edge_material(scene, material)?;
    let materials = &mut scene.meshes[mesh].materials;
    if materials.len() < slot + 2 {
        materials.resize(slot + 2, None);
    }
    materials[slot] = Some(material);
    materials[slot + 1] = Some(edge);
    reconcile(scene, object, settings)
}

/// Outline weights the modifier stack of `object` produces, per vertex.
/// Distances to `camera` are measured in the object's space.
pub fn outline_weights(scene: &Scene, object: ObjectKey, camera: Option<Vec3>) -> Result<Vec<f32>> {
    let mesh_key = scene
        .mesh_of(object)
        .ok_or_else(|| Error::invalid_data("outlines need a mesh object"))?;
    let mesh = &scene.meshes[mesh_key];
    let object = &scene.objects[object];
    let count = mesh.positions.len();
    let mut groups: FxHashMap<&str, Vec<Option<f32>>> = object
        .vertex_groups
        .iter()
        .map(|g| (g.name.as_str(), (0..count).map(|v| g.weight(v)).collect()))
        .collect();

    for modifier in &object.modifiers {
        match &modifier.kind {
            ModifierKind::VertexWeightProximity {
                group,
                min_dist,
                max_dist,
                ..
            } => {
                let (Some(camera), Some(weights)) = (camera, groups.get_mut(group.as_str())) else {
                    continue;
                };
                let range = (max_dist - min_dist).max(f32::EPSILON);
                for (v, w) in weights.iter_mut().enumerate() {
                    if w.is_some() {
                        let d = mesh.positions[v].distance(camera);
                        *w = Some(((d - min_dist) / range).clamp(0.0, 1.0));
                    }
                }
            }
            ModifierKind::VertexWeightMix {
                group_a,
                group_b,
                mix_mode,
                mix_set,
                mask_constant,
            } => {
                let Some(b) = groups.get(group_b.as_str()).cloned() else {
                    continue;
                };
                let Some(a) = groups.get_mut(group_a.as_str()) else {
                    continue;
                };
                for v in 0..count {
                    let touched = match mix_set {
                        MixSet::All => true,
                        MixSet::A => a[v].is_some(),
                        MixSet::B => b[v].is_some(),
                        MixSet::Or => a[v].is_some() || b[v].is_some(),
                        MixSet::And => a[v].is_some() && b[v].is_some(),
                    };
                    if !touched {
                        continue;
                    }
                    let wa = a[v].unwrap_or(0.0);
                    let wb = b[v].unwrap_or(0.0) * mask_constant;
                    a[v] = Some(match mix_mode {
                        MixMode::Set => wb,
                        MixMode::Add => wa + wb,
                        MixMode::Subtract => wa - wb,
                        MixMode::Multiply => wa * wb,
                    });
                }
            }
            ModifierKind::Solidify { vertex_group, .. } => {
                return Ok(groups
                    .get(vertex_group.as_str())
                    .map(|w| w.iter().map(|w| w.unwrap_or(0.0)).collect())
                    .unwrap_or_else(|| vec![0.0; count]));
            }
            ModifierKind::Armature { .. } => {}
        }
    }
    Ok(vec![0.0; count])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Mesh, Object, ObjectData};
    use approx::assert_relative_eq;

    struct Fixture {
        scene: Scene,
        object: ObjectKey,
        a: MaterialKey,
        b: MaterialKey,
    }

    fn material(scene: &mut Scene, name: &str, weight: f32) -> MaterialKey {
        let mut m = Material::new(name, Role::Mmd);
        m.mmd.enabled_toon_edge = true;
        m.mmd.edge_weight = weight;
        scene.add_material(m)
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(Mesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE],
            faces: vec![[0, 1, 2], [2, 3, 4]],
            face_materials: vec![0, 2],
            edge_scale: vec![1.0, 1.0, 0.5, 1.0, 1.0],
            ..Mesh::new("m")
        });
        let mut object = Object::new("m", ObjectData::Mesh(mesh));
        object.modifiers.push(Modifier {
            name: "Armature".into(),
            kind: ModifierKind::Armature {
                object: ObjectKey::default(),
                use_vertex_groups: true,
            },
        });
        let object = scene.add_object(object);
        let a = material(&mut scene, "a", 100.0);
        let b = material(&mut scene, "b", 50.0);
        let settings = EdgeSettings::default();
        assign_material(&mut scene, object, 0, a, &settings).unwrap();
        assign_material(&mut scene, object, 2, b, &settings).unwrap();
        Fixture { scene, object, a, b }
    }

    fn modifier_names(scene: &Scene, object: ObjectKey) -> Vec<String> {
        scene.objects[object]
            .modifiers
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }

    #[test]
    fn slots_pair_edge_materials() {
        let f = fixture();
        let mesh = &f.scene.meshes[f.scene.mesh_of(f.object).unwrap()];
        assert!(mesh.materials.len() == 4);
        assert!(mesh.materials[0] == Some(f.a));
        assert!(mesh.materials[1] == f.scene.materials[f.a].mmd.edge_material);
        assert!(f.scene.materials[mesh.materials[3].unwrap()].name == "b.edge");
        assert!(f.scene.materials[mesh.materials[3].unwrap()].role == Role::Edge);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut f = fixture();
        let settings = EdgeSettings::default();
        let groups = f.scene.objects[f.object].vertex_groups.len();
        let modifiers = modifier_names(&f.scene, f.object);
        reconcile(&mut f.scene, f.object, &settings).unwrap();
        reconcile(&mut f.scene, f.object, &settings).unwrap();
        assert!(f.scene.objects[f.object].vertex_groups.len() == groups);
        assert!(modifier_names(&f.scene, f.object) == modifiers);
        assert!(f.scene.materials[f.a].bindings.len() == 1);
        assert!(f.scene.materials[f.b].bindings.len() == 1);
        assert!(
            modifiers
                == ["Armature", "a.vtx", "b.vtx", CAMERA_PROXIMITY, CAMERA_MIX, EDGE_SOLIDIFY]
        );
    }

    #[test]
    fn memberships_follow_faces() {
        let f = fixture();
        let object = &f.scene.objects[f.object];
        assert!(object.vertex_group("a.vtx").unwrap().vertices() == vec![0, 1, 2]);
        assert!(object.vertex_group("b.vtx").unwrap().vertices() == vec![2, 3, 4]);
        assert!(object.vertex_group(EDGE_GROUP).unwrap().weight(2) == Some(0.5));
        assert!(object.vertex_group(CAMERA_GROUP).unwrap().len() == 5);
    }

    #[test]
    fn replaced_material_is_pruned() {
        let mut f = fixture();
        let settings = EdgeSettings::default();
        let c = material(&mut f.scene, "c", 100.0);
        assign_material(&mut f.scene, f.object, 2, c, &settings).unwrap();
        let object = &f.scene.objects[f.object];
        assert!(object.vertex_group("b.vtx").is_none());
        assert!(object.modifier("b.vtx").is_none());
        assert!(object.vertex_group("c.vtx").unwrap().vertices() == vec![2, 3, 4]);
        assert!(f.scene.materials[f.b].bindings.is_empty());
    }

    #[test]
    fn removed_material_leaves_no_binding() {
        let mut f = fixture();
        f.scene.remove_material(f.b);
        reconcile(&mut f.scene, f.object, &EdgeSettings::default()).unwrap();
        let object = &f.scene.objects[f.object];
        assert!(object.vertex_group("b.vtx").is_none());
        assert!(object.modifier("b.vtx").is_none());
        assert!(
            modifier_names(&f.scene, f.object)
                == ["Armature", "a.vtx", CAMERA_PROXIMITY, CAMERA_MIX, EDGE_SOLIDIFY]
        );
        let w = outline_weights(&f.scene, f.object, None).unwrap();
        assert_relative_eq!(w[0], 1.0);
        assert_relative_eq!(w[4], 0.0);
    }

    #[test]
    fn repeated_material_gets_one_binding_per_use() {
        let mut f = fixture();
        let settings = EdgeSettings::default();
        assign_material(&mut f.scene, f.object, 2, f.a, &settings).unwrap();
        assert!(f.scene.materials[f.a].bindings.len() == 2);
        let object = &f.scene.objects[f.object];
        assert!(object.modifier("a.vtx").is_some());
        assert!(object.vertex_group("a.vtx.1").unwrap().vertices() == vec![2, 3, 4]);
    }

    #[test]
    fn material_without_faces_is_bound() {
        let mut f = fixture();
        let settings = EdgeSettings::default();
        let c = material(&mut f.scene, "c", 100.0);
        assign_material(&mut f.scene, f.object, 4, c, &settings).unwrap();
        assert!(f.scene.materials[c].bindings.len() == 1);
        assert!(f.scene.objects[f.object].vertex_group("c.vtx").unwrap().is_empty());
    }

    #[test]
    fn missing_pieces_are_recreated() {
        let mut f = fixture();
        let settings = EdgeSettings::default();
        let before = modifier_names(&f.scene, f.object);
        let object = &mut f.scene.objects[f.object];
        object.remove_vertex_group("a.vtx");
        object.remove_modifier("a.vtx");
        reconcile(&mut f.scene, f.object, &settings).unwrap();
        assert!(f.scene.objects[f.object].vertex_group("a.vtx").is_some());
        assert!(modifier_names(&f.scene, f.object) == before);
    }

    #[test]
    fn shared_modifiers_keep_their_settings() {
        let mut f = fixture();
        if let Some(ModifierKind::Solidify { thickness, .. }) = f.scene.objects[f.object]
            .modifier_mut(EDGE_SOLIDIFY)
            .map(|m| &mut m.kind)
        {
            *thickness = 3.0;
        }
        reconcile(&mut f.scene, f.object, &EdgeSettings::default()).unwrap();
        let Some(ModifierKind::Solidify { thickness, .. }) =
            f.scene.objects[f.object].modifier(EDGE_SOLIDIFY).map(|m| &m.kind)
        else {
            panic!("solidify modifier missing");
        };
        assert!(*thickness == 3.0);
    }

    #[test]
    fn weights_combine_edge_scale_and_edge_weight() {
        let f = fixture();
        let w = outline_weights(&f.scene, f.object, None).unwrap();
        assert_relative_eq!(w[0], 1.0);
        // in both groups: 0.5 * 1.0 * 0.5
        assert_relative_eq!(w[2], 0.25);
        assert_relative_eq!(w[4], 0.5);

        let w = outline_weights(&f.scene, f.object, Some(Vec3::new(0.0, 0.0, -5.0))).unwrap();
        assert_relative_eq!(w[0], 0.1, epsilon = 1e-5);
    }
}
