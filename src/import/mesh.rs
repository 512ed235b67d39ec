use glam::Vec2;

use crate::convert;
use crate::pmx::{self, Weight};
use crate::scene::{Mesh, UvLayer, VertexGroup};
use crate::{Error, Result};

pub const UV_LAYER: &str = "UVMap";
pub const ADDITIONAL_UV_LAYER: &str = "UVMap.001";

fn bind(groups: &mut [VertexGroup], bone: Option<usize>, vertex: usize, weight: f32) {
    if let Some(group) = bone.and_then(|b| groups.get_mut(b)) {
        group.add(vertex, weight);
    }
}

/// One vertex group per bone, named after it, holding the skin weights.
/// Bone references that are out of range leave the vertex unbound.
pub fn skin_groups(vertices: &[pmx::Vertex], bone_names: &[String]) -> Result<Vec<VertexGroup>> {
    let mut groups = bone_names
        .iter()
        .map(|n| VertexGroup::new(n))
        .collect::<Vec<_>>();
    for (i, v) in vertices.iter().enumerate() {
        match &v.weight {
            Weight::Bdef1(w) => bind(&mut groups, w.bone, i, 1.0),
            Weight::Bdef2(w) => {
                bind(&mut groups, w.bones[0], i, w.weight);
                bind(&mut groups, w.bones[1], i, 1.0 - w.weight);
            }
            Weight::Sdef(w) => {
                bind(&mut groups, w.bones[0], i, w.weight);
                bind(&mut groups, w.bones[1], i, 1.0 - w.weight);
            }
            // Reversed with replace semantics: the first of two entries
            // naming the same bone wins.
            Weight::Bdef4(w) => {
                for (bone, weight) in w.bones.iter().zip(w.weights).rev() {
                    bind(&mut groups, *bone, i, weight);
                }
            }
            other => {
                return Err(Error::UnsupportedWeight {
                    vertex: i,
                    kind: other.kind_name(),
                })
            }
        }
    }
    Ok(groups)
}

/// Material index of every face, from the materials' contiguous face ranges.
pub fn face_materials(materials: &[pmx::Material], face_count: usize) -> Result<Vec<usize>> {
    let mut out = Vec::with_capacity(face_count);
    for (m, material) in materials.iter().enumerate() {
        out.extend(std::iter::repeat(m).take(material.face_count()));
    }
    if out.len() < face_count {
        return Err(Error::FaceMaterial(out.len()));
    }
    if out.len() > face_count {
        return Err(Error::invalid_data(format!(
            "materials cover {} faces, the model has {}",
            out.len(),
            face_count
        )));
    }
    Ok(out)
}

/// Geometry of the model: positions, normals, both UV layers, faces and the
/// per-vertex edge scale. Face material indices refer to PMX materials.
pub fn build(name: &str, model: &pmx::Model, scale: f32) -> Result<Mesh> {
    let vertices = &model.vertices;
    for face in &model.faces {
        if let Some(&v) = face.iter().find(|&&v| v >= vertices.len()) {
            return Err(Error::invalid_index("vertex", v));
        }
    }
    let additional = vertices
        .iter()
        .map(|v| {
            v.additional_uvs
                .first()
                .map_or(Vec2::ZERO, |uv| convert::uv([uv[0], uv[1]]))
        })
        .collect();
    Ok(Mesh {
        positions: vertices
            .iter()
            .map(|v| convert::position(v.position, scale))
            .collect(),
        normals: vertices
            .iter()
            .map(|v| convert::direction(v.normal).normalize_or_zero())
            .collect(),
        faces: model.faces.clone(),
        face_materials: face_materials(&model.materials, model.faces.len())?,
        uv_layers: vec![
            UvLayer {
                name: UV_LAYER.to_string(),
                uvs: vertices.iter().map(|v| convert::uv(v.uv)).collect(),
            },
            UvLayer {
                name: ADDITIONAL_UV_LAYER.to_string(),
                uvs: additional,
            },
        ],
        edge_scale: vertices.iter().map(|v| v.edge_scale).collect(),
        ..Mesh::new(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::fixture;
    use crate::pmx::{Bdef1, Bdef2, Bdef4, Qdef, Sdef};

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("b{}", i)).collect()
    }

    #[test]
    fn bdef4_duplicate_keeps_first_weight() {
        let vertices = [fixture::vertex(
            [0.0; 3],
            Weight::Bdef4(Bdef4 {
                bones: [Some(1), Some(2), Some(1), None],
                weights: [0.6, 0.3, 0.1, 0.0],
            }),
        )];
        let groups = skin_groups(&vertices, &names(3)).unwrap();
        assert!(groups[1].weight(0) == Some(0.6));
        assert!(groups[2].weight(0) == Some(0.3));
        assert!(groups[0].weight(0).is_none());
    }

    #[test]
    fn two_bone_weights_sum_to_one() {
        let vertices = [
            fixture::vertex(
                [0.0; 3],
                Weight::Bdef2(Bdef2 {
                    bones: [Some(0), Some(1)],
                    weight: 0.25,
                }),
            ),
            fixture::vertex(
                [0.0; 3],
                Weight::Sdef(Sdef {
                    bones: [Some(0), Some(1)],
                    weight: 0.7,
                    c: [0.0; 3],
                    r0: [0.0; 3],
                    r1: [0.0; 3],
                }),
            ),
        ];
        let groups = skin_groups(&vertices, &names(2)).unwrap();
        for v in 0..2 {
            let sum = groups[0].weight(v).unwrap() + groups[1].weight(v).unwrap();
            assert!(sum == 1.0);
        }
        assert!(groups[1].weight(1) == Some(1.0 - 0.7));
    }

    #[test]
    fn unbound_and_out_of_range_bones() {
        let vertices = [
            fixture::vertex([0.0; 3], Weight::Bdef1(Bdef1 { bone: None })),
            fixture::vertex([0.0; 3], Weight::Bdef1(Bdef1 { bone: Some(9) })),
        ];
        let groups = skin_groups(&vertices, &names(1)).unwrap();
        assert!(groups[0].is_empty());
    }

    #[test]
    fn qdef_is_rejected() {
        let vertices = [
            fixture::vertex([0.0; 3], Weight::Bdef1(Bdef1 { bone: Some(0) })),
            fixture::vertex(
                [0.0; 3],
                Weight::Qdef(Qdef {
                    bones: [Some(0), None, None, None],
                    weights: [1.0, 0.0, 0.0, 0.0],
                }),
            ),
        ];
        assert!(matches!(
            skin_groups(&vertices, &names(1)),
            Err(Error::UnsupportedWeight { vertex: 1, kind: "QDEF" })
        ));
    }

    #[test]
    fn face_ranges_partition_faces() {
        let materials = [
            fixture::material("a", 6),
            fixture::material("b", 0),
            fixture::material("c", 3),
        ];
        assert!(face_materials(&materials, 3).unwrap() == vec![0, 0, 2]);
        assert!(matches!(face_materials(&materials, 4), Err(Error::FaceMaterial(3))));
        assert!(matches!(face_materials(&materials, 2), Err(Error::InvalidData(_))));
    }

    #[test]
    fn geometry() {
        let model = fixture::minimal_model();
        let mesh = build("m", &model, 2.0).unwrap();
        assert!(mesh.positions[1] == glam::Vec3::new(2.0, 0.0, 0.0));
        assert!(mesh.uv_layers[0].uvs[2] == Vec2::new(0.0, 0.0));
        assert!(mesh.uv_layer(ADDITIONAL_UV_LAYER).unwrap().uvs.len() == 3);
        assert!((mesh.normals[0].length() - 1.0).abs() < 1e-6);
        assert!(mesh.face_materials == vec![0]);
    }

    #[test]
    fn face_vertex_out_of_range() {
        let mut model = fixture::minimal_model();
        model.faces[0][2] = 3;
        assert!(matches!(
            build("m", &model, 1.0),
            Err(Error::InvalidIndex { kind: "vertex", index: 3 })
        ));
    }
}
