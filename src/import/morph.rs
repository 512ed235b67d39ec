use glam::{Quat, Vec4};
use rustc_hash::FxHashSet;

use crate::convert::{self, unique_name};
use crate::pmx::{self, morph::Kind};
use crate::scene::{
    Armature, BoneMorph, BoneMorphData, GroupMorph, GroupMorphData, MaterialKey, MaterialMorph,
    MaterialMorphData, MeshKey, MorphType, ShapeKey, UvMorph, VertexMorph,
};

pub fn morph_type(kind: &Kind) -> Option<MorphType> {
    match kind {
        Kind::Group(_) => Some(MorphType::Group),
        Kind::Vertex(_) => Some(MorphType::Vertex),
        Kind::Bone(_) => Some(MorphType::Bone),
        Kind::Uv(..) => Some(MorphType::Uv),
        Kind::Material(_) => Some(MorphType::Material),
        Kind::Flip(_) | Kind::Impulse(_) => None,
    }
}

/// Morph names made unique within each morph table, in PMX order.
pub fn morph_names(morphs: &[pmx::Morph]) -> Vec<String> {
    let mut seen: Vec<FxHashSet<String>> = vec![FxHashSet::default(); 5];
    morphs
        .iter()
        .map(|m| {
            let Some(t) = morph_type(&m.kind) else {
                return m.name.clone();
            };
            let table = &mut seen[t as usize];
            let name = unique_name(&m.name, |n| table.contains(n));
            if name != m.name {
                log::debug!("morph {} renamed to {}", m.name, name);
            }
            table.insert(name.clone());
            name
        })
        .collect()
}

pub fn vertex_morphs(
    morphs: &[pmx::Morph],
    names: &[String],
    vertex_count: usize,
    scale: f32,
) -> (Vec<VertexMorph>, Vec<ShapeKey>) {
    let mut out = vec![];
    let mut keys = vec![];
    for (m, name) in morphs.iter().zip(names) {
        let Kind::Vertex(data) = &m.kind else {
            continue;
        };
        let offsets = data
            .iter()
            .filter(|d| d.vertex < vertex_count)
            .map(|d| (d.vertex, convert::position(d.offset, scale)))
            .collect::<Vec<_>>();
        if offsets.len() < data.len() {
            log::warn!("{}: {} offsets refer to missing vertices", name, data.len() - offsets.len());
        }
        keys.push(ShapeKey {
            name: name.clone(),
            offsets,
        });
        out.push(VertexMorph {
            name: name.clone(),
            name_e: m.name_en.clone(),
            category: m.category,
        });
    }
    (out, keys)
}

pub fn uv_morphs(morphs: &[pmx::Morph], names: &[String], vertex_count: usize) -> Vec<UvMorph> {
    morphs
        .iter()
        .zip(names)
        .filter_map(|(m, name)| {
            let Kind::Uv(channel, data) = &m.kind else {
                return None;
            };
            Some(UvMorph {
                name: name.clone(),
                name_e: m.name_en.clone(),
                category: m.category,
                uv_index: *channel,
                data: data
                    .iter()
                    .filter(|d| d.vertex < vertex_count)
                    .map(|d| {
                        let [x, y, z, w] = d.offset;
                        (d.vertex, Vec4::new(x, -y, z, w))
                    })
                    .collect(),
            })
        })
        .collect()
}

/// Bone morph offsets are stored in each bone's rest frame.
pub fn bone_morphs(
    morphs: &[pmx::Morph],
    names: &[String],
    armature: &Armature,
    scale: f32,
) -> Vec<BoneMorph> {
    let mut out = vec![];
    for (m, name) in morphs.iter().zip(names) {
        let Kind::Bone(data) = &m.kind else {
            continue;
        };
        let data = data
            .iter()
            .filter_map(|d| {
                let bone = armature.bones.get(d.bone?)?;
                let rest = bone.rest_rotation();
                let [x, y, z, w] = d.rotation;
                let rotation = Quat::from_xyzw(-x, -z, -y, w);
                Some(BoneMorphData {
                    bone: bone.name.clone(),
                    location: rest.inverse() * convert::position(d.location, scale),
                    rotation: (rest.inverse() * rotation * rest).normalize(),
                })
            })
            .collect();
        out.push(BoneMorph {
            name: name.clone(),
            name_e: m.name_en.clone(),
            category: m.category,
            data,
        });
    }
    out
}

/// `materials` holds the imported materials in PMX order.
pub fn material_morphs(
    morphs: &[pmx::Morph],
    names: &[String],
    materials: &[MaterialKey],
    mesh: Option<MeshKey>,
) -> Vec<MaterialMorph> {
    let mut out = vec![];
    for (m, name) in morphs.iter().zip(names) {
        let Kind::Material(data) = &m.kind else {
            continue;
        };
        let data = data
            .iter()
            .filter_map(|d| {
                let material = match d.material {
                    Some(i) => match materials.get(i) {
                        Some(key) => Some(*key),
                        None => {
                            log::warn!("{}: material {} not found", name, i);
                            return None;
                        }
                    },
                    None => None,
                };
                Some(MaterialMorphData {
                    related_mesh: mesh,
                    material,
                    offset_type: d.op,
                    diffuse_color: d.diffuse,
                    specular_color: d.specular,
                    shininess: d.shininess,
                    ambient_color: d.ambient,
                    edge_color: d.edge_color,
                    edge_weight: d.edge_size,
                    texture_factor: d.texture,
                    sphere_texture_factor: d.sphere,
                    toon_texture_factor: d.toon,
                })
            })
            .collect();
        out.push(MaterialMorph {
            name: name.clone(),
            name_e: m.name_en.clone(),
            category: m.category,
            data,
        });
    }
    out
}

/// Group morphs keep one level of (morph, factor) references.
pub fn group_morphs(morphs: &[pmx::Morph], names: &[String]) -> Vec<GroupMorph> {
    let mut out = vec![];
    for (m, name) in morphs.iter().zip(names) {
        let Kind::Group(data) = &m.kind else {
            continue;
        };
        let data = data
            .iter()
            .filter_map(|d| {
                let i = d.morph?;
                let target = morphs.get(i)?;
                let Some(morph_type) = morph_type(&target.kind) else {
                    log::debug!("{}: skipping {} morph {}", name, target.kind.type_index(), target.name);
                    return None;
                };
                Some(GroupMorphData {
                    name: names[i].clone(),
                    morph_type,
                    factor: d.factor,
                })
            })
            .collect();
        out.push(GroupMorph {
            name: name.clone(),
            name_e: m.name_en.clone(),
            category: m.category,
            data,
        });
    }
    out
}
