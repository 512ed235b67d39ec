use glam::Vec3;

use crate::convert::{self, unique_name};
use crate::pmx::{self, DisplayConnection};
use crate::scene::{Armature, Bone, Constraint, IkLimits, MmdBone};
use crate::{Error, Result};

const MIN_LENGTH: f32 = 0.001;

/// Bone names made unique in index order.
pub fn bone_names(bones: &[pmx::Bone]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(bones.len());
    for b in bones {
        let name = unique_name(&b.name, |n| names.iter().any(|m| m == n));
        names.push(name);
    }
    names
}

fn check(index: usize, len: usize) -> Result<usize> {
    if index < len {
        Ok(index)
    } else {
        Err(Error::invalid_index("bone", index))
    }
}

/// The bone holding an IK constraint followed by its ancestors, as many as
/// the constraint's chain covers.
fn ik_chain(armature: &Armature, owner: usize, count: usize) -> Vec<usize> {
    let mut chain = vec![];
    let mut current = Some(owner);
    while let Some(b) = current {
        if chain.len() == count.max(1) || chain.contains(&b) {
            break;
        }
        chain.push(b);
        current = armature.bones[b].parent;
    }
    chain
}

fn assign_parents(armature: &mut Armature, bones: &[pmx::Bone]) -> Result<()> {
    let len = bones.len();
    for (i, b) in bones.iter().enumerate() {
        armature.bones[i].parent = b.parent.map(|p| check(p, len)).transpose()?;
    }
    for (i, b) in bones.iter().enumerate() {
        let Some(target) = b.ik.as_ref().and_then(|ik| ik.target) else {
            continue;
        };
        let target = check(target, len)?;
        if b.parent.is_some() && bones[target].parent == b.parent {
            let grandparent = b.parent.and_then(|p| armature.bones[p].parent);
            log::debug!(
                "{}: shares a parent with its IK target, attached to the grandparent",
                armature.bones[i].name
            );
            armature.bones[i].parent = grandparent;
        }
    }
    if let Some(b) = armature.find_parent_cycle() {
        return Err(Error::dependency_cycle(format!(
            "bone {} is its own ancestor",
            armature.bones[b].name
        )));
    }
    for (i, b) in bones.iter().enumerate() {
        let Some(ik) = &b.ik else {
            continue;
        };
        let Some(owner) = ik.target.and_then(|t| armature.bones[t].parent) else {
            continue;
        };
        for c in ik_chain(armature, owner, ik.links.len()) {
            if armature.is_ancestor(c, i) {
                return Err(Error::dependency_cycle(format!(
                    "IK bone {} moves with its own chain",
                    armature.bones[i].name
                )));
            }
        }
    }
    Ok(())
}

fn assign_tails(armature: &mut Armature, bones: &[pmx::Bone], scale: f32) -> Result<Vec<bool>> {
    let len = bones.len();
    let mut tips = bones
        .iter()
        .map(|b| b.display_connection.is_tip())
        .collect::<Vec<_>>();
    for (i, b) in bones.iter().enumerate() {
        let head = armature.bones[i].head;
        armature.bones[i].tail = match &b.display_connection {
            DisplayConnection::Offset(v) => head + convert::position(*v, scale),
            DisplayConnection::Bone(Some(j)) => armature.bones[check(*j, len)?].head,
            DisplayConnection::Bone(None) => head,
        };
    }
    for (i, b) in bones.iter().enumerate() {
        let bone = &mut armature.bones[i];
        if bone.length() < MIN_LENGTH {
            bone.tail = bone.head + Vec3::Z * scale;
            if !tips[i] {
                log::debug!("{}: too short, connection cleared", bone.name);
                tips[i] = true;
            }
            continue;
        }
        if let DisplayConnection::Bone(Some(j)) = b.display_connection {
            if armature.bones[j].parent == Some(i) && !b.movable {
                armature.bones[j].use_connect = true;
            }
        }
    }
    Ok(tips)
}

fn ik_limits(limit: &pmx::Limit) -> IkLimits {
    let (lo, hi) = (limit.lower, limit.upper);
    IkLimits {
        min: Vec3::new(-hi[0], lo[1], lo[2]),
        max: Vec3::new(-lo[0], hi[1], hi[2]),
    }
}

fn assign_ik(armature: &mut Armature, bones: &[pmx::Bone]) -> Result<()> {
    let len = bones.len();
    for (i, b) in bones.iter().enumerate() {
        let Some(ik) = &b.ik else {
            continue;
        };
        let Some(target) = ik.target else {
            log::debug!("{}: IK without a target", armature.bones[i].name);
            continue;
        };
        let target = check(target, len)?;
        let Some(owner) = armature.bones[target].parent else {
            log::warn!(
                "{}: IK target {} has no parent, constraint skipped",
                armature.bones[i].name,
                armature.bones[target].name
            );
            continue;
        };
        armature.bones[owner].constraints.push(Constraint::Ik {
            goal: i,
            chain_count: ik.links.len(),
            iterations: ik.loop_count,
        });
        for link in &ik.links {
            let Some(bone) = link.bone else {
                continue;
            };
            let bone = check(bone, len)?;
            if let Some(limit) = &link.limit {
                armature.bones[bone].ik_limits = Some(ik_limits(limit));
            }
        }
    }
    Ok(())
}

/// Converts PMX bones into an armature. Bone `i` of the result is bone `i`
/// of the input.
pub fn build(bones: &[pmx::Bone], scale: f32) -> Result<Armature> {
    let len = bones.len();
    let mut armature = Armature::new("");
    for (b, name) in bones.iter().zip(bone_names(bones)) {
        armature.bones.push(Bone {
            name,
            head: convert::position(b.position, scale),
            ..Default::default()
        });
    }
    assign_parents(&mut armature, bones)?;
    let tips = assign_tails(&mut armature, bones, scale)?;

    let mut order = (0..len).collect::<Vec<_>>();
    order.sort_by_key(|&i| (bones[i].transform_order, i));
    for i in order {
        let b = &bones[i];
        let additional = match &b.additional {
            Some(a) => Some((a, a.bone.map(|s| check(s, len)).transpose()?)),
            None => None,
        };
        let mmd = MmdBone {
            name_j: b.name.clone(),
            name_e: b.name_en.clone(),
            transform_order: b.transform_order,
            is_visible: b.visible,
            is_controllable: b.controllable,
            transform_after_dynamics: b.transform_after_physics,
            is_tip: tips[i],
            use_tail_location: (!tips[i]
                && matches!(b.display_connection, DisplayConnection::Offset(_)))
                || (b.movable && b.visible),
            has_additional_rotation: additional.as_ref().is_some_and(|(a, _)| a.rotation),
            has_additional_location: additional.as_ref().is_some_and(|(a, _)| a.location),
            additional_transform_bone: additional.as_ref().and_then(|(_, s)| *s),
            additional_transform_influence: additional.as_ref().map_or(0.0, |(a, _)| a.influence),
            enabled_fixed_axis: b.fixed_axis.is_some(),
            fixed_axis: b.fixed_axis.map_or(Vec3::ZERO, convert::direction),
            enabled_local_axes: b.local_axes.is_some(),
            local_axis_x: b.local_axes.as_ref().map_or(Vec3::X, |a| convert::direction(a.x)),
            local_axis_z: b.local_axes.as_ref().map_or(Vec3::Z, |a| convert::direction(a.z)),
        };
        let bone = &mut armature.bones[i];
        bone.hide = tips[i] || !b.visible;
        bone.lock_rotation = [!b.rotatable; 3];
        bone.lock_location = [!b.movable; 3];
        if let Some((a, Some(source))) = additional {
            if a.rotation {
                bone.constraints.push(Constraint::AdditionalRotation {
                    source,
                    influence: a.influence,
                });
            }
            if a.location {
                bone.constraints.push(Constraint::AdditionalLocation {
                    source,
                    influence: a.influence,
                });
            }
        }
        bone.mmd = mmd;
    }
    // twist bones show their parent's tail
    for b in bones.iter().filter(|b| b.fixed_axis.is_some()) {
        if let Some(p) = b.parent {
            armature.bones[p].mmd.use_tail_location = true;
        }
    }

    assign_ik(&mut armature, bones)?;
    Ok(armature)
}

/// Renames `左X`/`右X` bones to `X.L`/`X.R`, returning `(old, new)` pairs.
pub fn rename_lr(armature: &mut Armature) -> Vec<(String, String)> {
    let mut renamed = vec![];
    for i in 0..armature.bones.len() {
        let old = armature.bones[i].name.clone();
        let lr = convert::name_to_lr(&old);
        if lr == old {
            continue;
        }
        let new = unique_name(&lr, |n| armature.bones.iter().any(|b| b.name == n));
        armature.bones[i].name = new.clone();
        renamed.push((old, new));
    }
    renamed
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pmx::{Ik, IkLink, Limit};

    pub(crate) fn bone(name: &str, position: [f32; 3], parent: Option<usize>) -> pmx::Bone {
        pmx::Bone {
            name: name.to_string(),
            name_en: String::new(),
            position,
            parent,
            transform_order: 0,
            display_connection: DisplayConnection::Bone(None),
            rotatable: true,
            movable: false,
            visible: true,
            controllable: true,
            ik: None,
            additional: None,
            transform_after_physics: false,
            fixed_axis: None,
            local_axes: None,
            external_parent: None,
        }
    }

    fn ik(target: usize, links: &[usize]) -> Option<Ik> {
        Some(Ik {
            target: Some(target),
            loop_count: 40,
            limit_angle: 2.0,
            links: links
                .iter()
                .map(|&b| IkLink {
                    bone: Some(b),
                    limit: None,
                })
                .collect(),
        })
    }

    #[test]
    fn single_root_bone_is_a_tip() {
        let armature = build(&[bone("センター", [0.0, 1.0, 0.0], None)], 1.0).unwrap();
        let b = &armature.bones[0];
        assert!(b.mmd.is_tip);
        assert!(b.hide);
        assert!(b.head == Vec3::new(0.0, 0.0, 1.0));
        assert!(b.tail == b.head + Vec3::Z);
    }

    #[test]
    fn connected_child() {
        let mut root = bone("a", [0.0, 0.0, 0.0], None);
        root.display_connection = DisplayConnection::Bone(Some(1));
        let child = bone("b", [0.0, 2.0, 0.0], Some(0));
        let armature = build(&[root, child], 0.5).unwrap();
        assert!(armature.bones[0].tail == Vec3::new(0.0, 0.0, 1.0));
        assert!(armature.bones[1].use_connect);
        assert!(!armature.bones[0].mmd.is_tip);
        assert!(armature.bones[1].parent == Some(0));
    }

    #[test]
    fn short_bone_loses_its_connection() {
        let mut a = bone("a", [0.0, 0.0, 0.0], None);
        a.display_connection = DisplayConnection::Offset([0.0, 0.0001, 0.0]);
        let armature = build(&[a], 2.0).unwrap();
        assert!(armature.bones[0].mmd.is_tip);
        assert!(armature.bones[0].tail == Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn ik_target_sharing_parent_moves_to_grandparent() {
        let root = bone("root", [0.0, 0.0, 0.0], None);
        let knee = bone("knee", [0.0, 5.0, 0.0], Some(0));
        let ankle = bone("ankle", [0.0, 1.0, 0.0], Some(1));
        let mut leg_ik = bone("leg IK", [0.0, 1.0, 0.0], Some(1));
        leg_ik.ik = ik(2, &[1]);
        let armature = build(&[root, knee, ankle, leg_ik], 1.0).unwrap();
        assert!(armature.bones[3].parent == Some(0));
        assert!(
            armature.bones[1].constraints
                == vec![Constraint::Ik {
                    goal: 3,
                    chain_count: 1,
                    iterations: 40,
                }]
        );
    }

    #[test]
    fn ik_inside_its_chain_is_a_cycle() {
        let root = bone("root", [0.0, 0.0, 0.0], None);
        let thigh = bone("thigh", [0.0, 9.0, 0.0], Some(0));
        let knee = bone("knee", [0.0, 5.0, 0.0], Some(1));
        let ankle = bone("ankle", [0.0, 1.0, 0.0], Some(2));
        let mut leg_ik = bone("leg IK", [0.0, 1.0, 0.0], Some(1));
        leg_ik.ik = ik(3, &[2, 1]);
        let err = build(&[root, thigh, knee, ankle, leg_ik], 1.0);
        assert!(matches!(err, Err(Error::DependencyCycle(_))));
    }

    #[test]
    fn parent_cycle() {
        let a = bone("a", [0.0; 3], Some(1));
        let b = bone("b", [0.0; 3], Some(0));
        assert!(matches!(build(&[a, b], 1.0), Err(Error::DependencyCycle(_))));
    }

    #[test]
    fn ik_target_out_of_range() {
        let mut a = bone("a", [0.0; 3], None);
        a.ik = ik(7, &[]);
        assert!(matches!(
            build(&[a], 1.0),
            Err(Error::InvalidIndex { kind: "bone", index: 7 })
        ));
    }

    #[test]
    fn ik_limits_follow_axis_rules() {
        let limits = ik_limits(&Limit {
            lower: [-1.0, -2.0, -3.0],
            upper: [0.5, 0.25, 0.125],
        });
        assert!(limits.min == Vec3::new(-0.5, -2.0, -3.0));
        assert!(limits.max == Vec3::new(1.0, 0.25, 0.125));
    }

    #[test]
    fn additional_rotation_constraint() {
        let a = bone("a", [0.0; 3], None);
        let mut b = bone("b", [0.0, 1.0, 0.0], Some(0));
        b.additional = Some(pmx::AdditionalTransform {
            rotation: true,
            location: false,
            local: false,
            bone: Some(0),
            influence: 0.5,
        });
        let armature = build(&[a, b], 1.0).unwrap();
        let bone = &armature.bones[1];
        assert!(bone.mmd.has_additional_rotation && !bone.mmd.has_additional_location);
        assert!(bone.mmd.additional_transform_bone == Some(0));
        assert!(
            bone.constraints
                == vec![Constraint::AdditionalRotation {
                    source: 0,
                    influence: 0.5
                }]
        );
    }

    #[test]
    fn twist_bone_marks_parent() {
        let mut arm = bone("arm", [0.0; 3], None);
        arm.movable = false;
        arm.display_connection = DisplayConnection::Bone(Some(1));
        let mut twist = bone("twist", [1.0, 0.0, 0.0], Some(0));
        twist.fixed_axis = Some([1.0, 0.0, 0.0]);
        twist.transform_order = 1;
        let armature = build(&[arm, twist], 1.0).unwrap();
        assert!(armature.bones[0].mmd.use_tail_location);
        assert!(armature.bones[1].mmd.enabled_fixed_axis);
    }

    #[test]
    fn twist_bone_before_its_parent_still_marks_it() {
        let mut arm = bone("arm", [0.0; 3], None);
        arm.transform_order = 1;
        arm.display_connection = DisplayConnection::Bone(Some(1));
        let mut twist = bone("twist", [1.0, 0.0, 0.0], Some(0));
        twist.fixed_axis = Some([1.0, 0.0, 0.0]);
        let armature = build(&[arm, twist], 1.0).unwrap();
        assert!(armature.bones[0].mmd.use_tail_location);
    }

    #[test]
    fn twist_marks_the_file_parent_not_the_ik_parent() {
        let root = bone("root", [0.0, 0.0, 0.0], None);
        let knee = bone("knee", [0.0, 5.0, 0.0], Some(0));
        let ankle = bone("ankle", [0.0, 1.0, 0.0], Some(1));
        let mut leg_ik = bone("leg IK", [0.0, 1.0, 0.0], Some(1));
        leg_ik.ik = ik(2, &[1]);
        leg_ik.fixed_axis = Some([0.0, 1.0, 0.0]);
        let armature = build(&[root, knee, ankle, leg_ik], 1.0).unwrap();
        assert!(armature.bones[3].parent == Some(0));
        assert!(armature.bones[1].mmd.use_tail_location);
        assert!(!armature.bones[0].mmd.use_tail_location);
    }

    #[test]
    fn tip_offsets_do_not_use_a_vector_tail() {
        let mut zero = bone("zero", [0.0; 3], None);
        zero.display_connection = DisplayConnection::Offset([0.0; 3]);
        let mut short = bone("short", [0.0; 3], None);
        short.display_connection = DisplayConnection::Offset([0.0, 0.0001, 0.0]);
        let mut long = bone("long", [0.0; 3], None);
        long.display_connection = DisplayConnection::Offset([0.0, 1.0, 0.0]);
        let armature = build(&[zero, short, long], 1.0).unwrap();
        assert!(!armature.bones[0].mmd.use_tail_location);
        assert!(!armature.bones[1].mmd.use_tail_location);
        assert!(armature.bones[2].mmd.use_tail_location);
    }

    #[test]
    fn duplicate_names_and_lr() {
        let bones = [
            bone("左腕", [0.0; 3], None),
            bone("左腕", [0.0; 3], None),
            bone("頭", [0.0; 3], None),
        ];
        let mut armature = build(&bones, 1.0).unwrap();
        assert!(armature.bones[1].name == "左腕.001");
        let renamed = rename_lr(&mut armature);
        assert!(armature.bones[0].name == "腕.L");
        assert!(armature.bones[1].name == "腕.001.L");
        assert!(renamed.len() == 2);
        assert!(armature.bones[2].name == "頭");
    }
}
