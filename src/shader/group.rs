use super::toon::{ToonRamp, THRESHOLDS};
use super::{Blend, Graph, MathOp, NodeKind, NodeSpec, Socket, Value};
use crate::scene::{NodeGroupKey, Scene};
use crate::Result;

pub const SHADER_GROUP: &str = "mmd_tools_shader";

pub fn interface_inputs() -> Vec<Socket> {
    vec![
        Socket::new("Diffuse Color", Value::Color([0.8, 0.8, 0.8, 1.0])),
        Socket::new("Specular Color", Value::Color([0.0, 0.0, 0.0, 1.0])),
        Socket::new("Specular Weight", Value::Color([0.0, 0.0, 0.0, 1.0])),
        Socket::new("Ambient Color", Value::Color([0.0, 0.0, 0.0, 1.0])),
        Socket::new("Texture Color", Value::Color([1.0; 4])),
        Socket::new("Shade", Value::Float(1.0)),
        Socket::new("Toon Index", Value::Float(-1.0)),
        Socket::new("Toon Texture Color", Value::Color([1.0; 4])),
        Socket::new("Use Toon Texture", Value::Float(0.0)),
    ]
}

fn specs(ramp: ToonRamp) -> Vec<NodeSpec> {
    let mut specs = vec![
        NodeSpec::new("Group Input", NodeKind::GroupInput),
        NodeSpec::new("Group Output", NodeKind::GroupOutput).link("Color", "Texture Mul", "Color"),
        NodeSpec::new("Toon Base", NodeKind::MixRgb(Blend::Mix))
            .link("Fac", "Group Input", "Use Toon Texture")
            .link("Color1", "Group Input", "Shade")
            .link("Color2", "Group Input", "Toon Texture Color"),
    ];
    for (k, points) in ramp.curves().into_iter().enumerate() {
        let n = k + 1;
        let previous = if k == 0 {
            "Toon Base".to_string()
        } else {
            format!("Toon Mix {}", k)
        };
        specs.push(
            NodeSpec::new(format!("Toon Curve {}", n), NodeKind::Curve(points))
                .float("Fac", 1.0)
                .link("Color", "Group Input", "Shade"),
        );
        specs.push(
            NodeSpec::new(format!("Is Toon {}", n), NodeKind::Math(MathOp::GreaterThan))
                .link("A", "Group Input", "Toon Index")
                .float("B", THRESHOLDS[k]),
        );
        specs.push(
            NodeSpec::new(format!("Toon Mix {}", n), NodeKind::MixRgb(Blend::Mix))
                .link("Fac", format!("Is Toon {}", n), "Value")
                .link("Color1", previous, "Color")
                .link("Color2", format!("Toon Curve {}", n), "Color"),
        );
    }
    specs.extend([
        NodeSpec::new("Is Toon Off", NodeKind::Math(MathOp::GreaterThan))
            .link("A", "Group Input", "Toon Index")
            .float("B", THRESHOLDS[6]),
        NodeSpec::new("Toon Select", NodeKind::MixRgb(Blend::Mix))
            .link("Fac", "Is Toon Off", "Value")
            .link("Color1", "Toon Mix 6", "Color")
            .link("Color2", "Toon Base", "Color"),
        NodeSpec::new("Diffuse Mul", NodeKind::MixRgb(Blend::Multiply))
            .float("Fac", 1.0)
            .link("Color1", "Group Input", "Diffuse Color")
            .link("Color2", "Toon Select", "Color"),
        NodeSpec::new("Specular Mul", NodeKind::MixRgb(Blend::Multiply))
            .float("Fac", 1.0)
            .link("Color1", "Group Input", "Specular Color")
            .link("Color2", "Group Input", "Specular Weight"),
        NodeSpec::new("Diffuse Specular", NodeKind::MixRgb(Blend::Add))
            .float("Fac", 1.0)
            .link("Color1", "Diffuse Mul", "Color")
            .link("Color2", "Specular Mul", "Color"),
        NodeSpec::new("Ambient Add", NodeKind::MixRgb(Blend::Add))
            .float("Fac", 1.0)
            .link("Color1", "Diffuse Specular", "Color")
            .link("Color2", "Group Input", "Ambient Color"),
        NodeSpec::new("Texture Mul", NodeKind::MixRgb(Blend::Multiply))
            .float("Fac", 1.0)
            .link("Color1", "Ambient Add", "Color")
            .link("Color2", "Group Input", "Texture Color"),
    ]);
    specs
}

/// Returns the shared shading group, building it on first use.
pub fn ensure(scene: &mut Scene, ramp: ToonRamp) -> Result<NodeGroupKey> {
    if let Some(key) = scene.find_node_group(SHADER_GROUP) {
        return Ok(key);
    }
    let graph = Graph::with_interface(SHADER_GROUP, interface_inputs(), vec!["Color"])
        .build(specs(ramp), &|_| None)?;
    log::debug!("created node group {} ({:?})", SHADER_GROUP, ramp);
    Ok(scene.add_node_group(graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::eval::{evaluate_group, EvalContext};
    use crate::shader::toon;
    use approx::assert_relative_eq;

    fn toon_output(scene: &Scene, key: NodeGroupKey, index: f32, shade: f32) -> f32 {
        let out = evaluate_group(
            scene,
            key,
            &[
                ("Diffuse Color", Value::Color([1.0; 4])),
                ("Specular Color", Value::Color([0.0, 0.0, 0.0, 1.0])),
                ("Ambient Color", Value::Color([0.0, 0.0, 0.0, 1.0])),
                ("Texture Color", Value::Color([1.0; 4])),
                ("Shade", Value::Float(shade)),
                ("Toon Index", Value::Float(index)),
            ],
            &EvalContext::default(),
        )
        .unwrap();
        out[0].as_color()[0]
    }

    #[test]
    fn built_once() {
        let mut scene = Scene::new();
        let a = ensure(&mut scene, ToonRamp::Stepped).unwrap();
        let b = ensure(&mut scene, ToonRamp::Smooth).unwrap();
        assert!(a == b);
        assert!(scene.node_groups.len() == 1);
    }

    #[test]
    fn toon_cascade_selects_expected_curve() {
        let mut scene = Scene::new();
        let key = ensure(&mut scene, ToonRamp::Stepped).unwrap();
        let curves = ToonRamp::Stepped.curves();
        let shade = 0.3;
        for index in [-0.5, 0.0, 0.9, 1.0, 2.0, 3.0, 4.0, 5.0, 5.9, 6.0, 7.0] {
            let expected = match toon::select(index) {
                Some(k) => toon::sample(&curves[k], shade),
                None => shade,
            };
            assert_relative_eq!(toon_output(&scene, key, index, shade), expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn boundary_stays_on_lower_curve() {
        let mut scene = Scene::new();
        let key = ensure(&mut scene, ToonRamp::Stepped).unwrap();
        let curves = ToonRamp::Stepped.curves();
        let at = toon_output(&scene, key, 0.9, 0.3);
        assert_relative_eq!(at, toon::sample(&curves[0], 0.3), epsilon = 1e-5);
        assert!((at - toon::sample(&curves[1], 0.3)).abs() > 1e-3);
    }

    #[test]
    fn lighting_composition() {
        let mut scene = Scene::new();
        let key = ensure(&mut scene, ToonRamp::Stepped).unwrap();
        let out = evaluate_group(
            &scene,
            key,
            &[
                ("Diffuse Color", Value::Color([0.5, 0.5, 0.5, 1.0])),
                ("Specular Color", Value::Color([0.2, 0.2, 0.2, 1.0])),
                ("Specular Weight", Value::Color([0.5, 0.5, 0.5, 1.0])),
                ("Ambient Color", Value::Color([0.1, 0.1, 0.1, 1.0])),
                ("Texture Color", Value::Color([0.5, 1.0, 1.0, 1.0])),
                ("Shade", Value::Float(0.8)),
                ("Toon Index", Value::Float(-1.0)),
            ],
            &EvalContext::default(),
        )
        .unwrap();
        let c = out[0].as_color();
        // ((0.5 * 0.8 + 0.2 * 0.5) + 0.1) * texture
        assert_relative_eq!(c[0], 0.3, epsilon = 1e-5);
        assert_relative_eq!(c[1], 0.6, epsilon = 1e-5);
    }
}
