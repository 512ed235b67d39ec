use glam::Vec3;

use crate::convert;
use crate::pmx::{self, rigid};
use crate::scene::{JointProxy, MmdType, Object, ObjectData, ObjectKey, RigidBodyProxy};
use crate::{Error, Result};

/// `true` at `i` when the body ignores collision group `i`.
pub fn collision_mask(non_collision_mask: u16) -> [bool; 16] {
    std::array::from_fn(|i| non_collision_mask & (1 << i) == 0)
}

pub fn rigid_body(record: &pmx::RigidBody, bone_count: usize, scale: f32) -> Result<Object> {
    let bone = match record.bone {
        Some(b) if b >= bone_count => return Err(Error::invalid_index("bone", b)),
        b => b,
    };
    let size = match record.shape {
        rigid::Shape::Box => convert::direction(record.size),
        _ => Vec3::from(record.size),
    } * scale;
    let mut object = Object::new(
        &record.name,
        ObjectData::RigidBody(Box::new(RigidBodyProxy {
            name_j: record.name.clone(),
            name_e: record.name_en.clone(),
            shape: record.shape,
            mode: record.mode,
            size,
            mass: record.mass,
            friction: record.friction,
            bounce: record.restitution,
            linear_damping: record.linear_damping,
            angular_damping: record.angular_damping,
            collision_group: record.group,
            collision_mask: collision_mask(record.non_collision_mask),
            bone,
        })),
    );
    object.mmd_type = MmdType::RigidBody;
    object.location = convert::position(record.position, scale);
    object.rotation = convert::rotation(record.rotation);
    Ok(object)
}

/// `rigid_bodies` holds the imported body objects in PMX order.
pub fn joint(record: &pmx::Joint, rigid_bodies: &[ObjectKey], scale: f32) -> Result<Object> {
    let [a, b] = record.rigid_bodies.map(|r| match r {
        Some(i) => rigid_bodies
            .get(i)
            .copied()
            .map(Some)
            .ok_or_else(|| Error::invalid_index("rigid body", i)),
        None => Ok(None),
    });
    let rotation = &record.limit_rotation;
    let mut object = Object::new(
        &record.name,
        ObjectData::Joint(Box::new(JointProxy {
            name_j: record.name.clone(),
            name_e: record.name_en.clone(),
            kind: record.kind,
            size: 0.5 * scale,
            rigid_a: a?,
            rigid_b: b?,
            minimum_location: convert::position(record.limit_location.lower, scale),
            maximum_location: convert::position(record.limit_location.upper, scale),
            minimum_rotation: convert::rotation(rotation.upper),
            maximum_rotation: convert::rotation(rotation.lower),
            spring_linear: convert::direction(record.spring_location),
            spring_angular: convert::direction(record.spring_rotation),
        })),
    );
    object.mmd_type = MmdType::Joint;
    object.location = convert::position(record.position, scale);
    object.rotation = convert::rotation(record.rotation);
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmx::Limit;

    fn body(shape: rigid::Shape) -> pmx::RigidBody {
        pmx::RigidBody {
            name: "head".to_string(),
            name_en: String::new(),
            bone: Some(0),
            group: 2,
            non_collision_mask: 0xfffe,
            shape,
            size: [1.0, 2.0, 3.0],
            position: [0.0, 10.0, 1.0],
            rotation: [0.1, 0.2, 0.3],
            mass: 1.0,
            linear_damping: 0.5,
            angular_damping: 0.5,
            restitution: 0.0,
            friction: 0.5,
            mode: rigid::Mode::Dynamic,
        }
    }

    fn proxy(object: &Object) -> &RigidBodyProxy {
        match &object.data {
            ObjectData::RigidBody(p) => p,
            _ => panic!("not a rigid body"),
        }
    }

    #[test]
    fn mask_bits() {
        let mask = collision_mask(0xfffe);
        assert!(mask[0]);
        assert!(mask[1..].iter().all(|m| !m));
    }

    #[test]
    fn box_size_is_swizzled() {
        let object = rigid_body(&body(rigid::Shape::Box), 1, 2.0).unwrap();
        assert!(proxy(&object).size == Vec3::new(2.0, 6.0, 4.0));
        assert!(object.location == Vec3::new(0.0, 2.0, 20.0));
        let object = rigid_body(&body(rigid::Shape::Capsule), 1, 2.0).unwrap();
        assert!(proxy(&object).size == Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn bone_out_of_range() {
        assert!(matches!(
            rigid_body(&body(rigid::Shape::Sphere), 0, 1.0),
            Err(Error::InvalidIndex { kind: "bone", index: 0 })
        ));
    }

    #[test]
    fn joint_limits() {
        let record = pmx::Joint {
            name: "j".to_string(),
            name_en: String::new(),
            kind: 0,
            rigid_bodies: [Some(0), Some(1)],
            position: [0.0; 3],
            rotation: [0.0; 3],
            limit_location: Limit {
                lower: [-1.0, -2.0, -3.0],
                upper: [1.0, 2.0, 3.0],
            },
            limit_rotation: Limit {
                lower: [-0.1, -0.2, -0.3],
                upper: [0.4, 0.5, 0.6],
            },
            spring_location: [0.0; 3],
            spring_rotation: [0.0; 3],
        };
        let keys = [ObjectKey::default(), ObjectKey::default()];
        let object = joint(&record, &keys, 1.0).unwrap();
        let ObjectData::Joint(proxy) = &object.data else {
            panic!("not a joint");
        };
        assert!(proxy.minimum_location == Vec3::new(-1.0, -3.0, -2.0));
        assert!(proxy.maximum_rotation == Vec3::new(0.1, 0.3, 0.2));
        assert!(proxy.minimum_rotation == Vec3::new(-0.4, -0.6, -0.5));
        assert!(matches!(
            joint(&record, &keys[..1], 1.0),
            Err(Error::InvalidIndex { kind: "rigid body", index: 1 })
        ));
    }
}
