use super::group::SHADER_GROUP;
use super::{Blend, Graph, MathOp, NodeKind, NodeSpec, Value};
use crate::pmx::SphereMode;
use crate::scene::{MaterialKey, MmdMaterial, NodeGroupKey, Scene, TextureKey};
use crate::Result;

pub const NODE_BASE: &str = "mmd_tools Node Base";
pub const NODE_BASE_NO_SHADOW: &str = "mmd_tools Node Base NoShadow";

const WHITE: [f32; 4] = [1.0; 4];
const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Helper materials a material graph reads lighting values from.
#[derive(Clone, Copy, Debug)]
pub struct Proxies {
    pub base: MaterialKey,
    pub base_no_shadow: MaterialKey,
    pub specular_weight: MaterialKey,
    pub alpha: MaterialKey,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Textures {
    pub base: Option<TextureKey>,
    pub sphere: Option<TextureKey>,
    pub toon: Option<TextureKey>,
}

fn rgb1(c: glam::Vec3) -> [f32; 4] {
    [c.x, c.y, c.z, 1.0]
}

fn specs(group: NodeGroupKey, mmd: &MmdMaterial, proxies: &Proxies) -> Vec<NodeSpec> {
    let pure = if mmd.enabled_self_shadow {
        proxies.base
    } else {
        proxies.base_no_shadow
    };
    vec![
        NodeSpec::new("Output", NodeKind::Output)
            .link("Color", SHADER_GROUP, "Color")
            .link("Alpha", "Final Alpha", "Value"),
        NodeSpec::new(SHADER_GROUP, NodeKind::Group(group))
            .color("Diffuse Color", rgb1(mmd.diffuse_color))
            .color("Specular Color", rgb1(mmd.specular_color))
            .color("Ambient Color", rgb1(mmd.ambient_color))
            .link("Specular Weight", "Spec Weight", "Color")
            .link("Texture Color", "Mix Tex", "Color")
            .link("Shade", "Pure Mat", "Diffuse")
            .link("Toon Texture Color", "Toon Tex", "Color"),
        NodeSpec::new("Spec Weight", NodeKind::ExtendedMaterial(Some(proxies.specular_weight))),
        NodeSpec::new("Pure Mat", NodeKind::ExtendedMaterial(Some(pure)))
            .color("Color", WHITE)
            .color("Spec", BLACK)
            .float("Refl", 1.0),
        NodeSpec::new("Toon Vec Pre", NodeKind::MixRgb(Blend::Multiply))
            .float("Fac", 1.0)
            .link("Color1", "Pure Mat", "Color")
            .color("Color2", [0.0, 1.0, 0.0, 0.0]),
        NodeSpec::new("Toon Vec", NodeKind::MixRgb(Blend::Subtract))
            .float("Fac", 1.0)
            .link("Color1", "Toon Vec Pre", "Color")
            .color("Color2", [0.0, 0.5, 0.0, 0.0]),
        NodeSpec::new("Toon Tex", NodeKind::Texture(None)).link("Vector", "Toon Vec", "Color"),
        NodeSpec::new("Geo", NodeKind::Geometry { uv_layer: None }),
        NodeSpec::new(
            "Geo2",
            NodeKind::Geometry {
                uv_layer: Some("UVMap.001".to_string()),
            },
        ),
        NodeSpec::new("Tex", NodeKind::Texture(None)).link("Vector", "Geo", "UV"),
        NodeSpec::new("Use Tex", NodeKind::MixRgb(Blend::Mix))
            .float("Fac", 0.0)
            .color("Color1", WHITE)
            .link("Color2", "Tex", "Color"),
        NodeSpec::new("Sphere Tex", NodeKind::Texture(None)),
        NodeSpec::new("Use Sphere Tex", NodeKind::MixRgb(Blend::Mix))
            .float("Fac", 0.0)
            .color("Color1", WHITE)
            .link("Color2", "Sphere Tex", "Color"),
        NodeSpec::new("Mix Tex", NodeKind::MixRgb(Blend::Multiply))
            .float("Fac", 1.0)
            .link("Color1", "Use Tex", "Color")
            .link("Color2", "Use Sphere Tex", "Color"),
        NodeSpec::new("Alpha Mul", NodeKind::ExtendedMaterial(Some(proxies.alpha))),
        NodeSpec::new("Is Single", NodeKind::Math(MathOp::Maximum))
            .link("A", "Geo", "Front/Back")
            .float("B", mmd.is_double_sided as u8 as f32),
        NodeSpec::new("Final Alpha", NodeKind::Math(MathOp::Multiply))
            .link("A", "Alpha Mul", "Alpha")
            .link("B", "Is Single", "Value"),
    ]
}

/// Builds the graph of one material, wired to the shared shading group.
pub fn material_graph(
    scene: &Scene,
    group: NodeGroupKey,
    name: &str,
    mmd: &MmdMaterial,
    proxies: &Proxies,
    textures: &Textures,
) -> Result<Graph> {
    let mut graph = Graph::new(name).build(specs(group, mmd, proxies), &|k| {
        scene.node_groups.get(k).map(|g| g.interface())
    })?;
    set_texture(&mut graph, textures.base)?;
    graph.set_kind("Sphere Tex", NodeKind::Texture(textures.sphere))?;
    apply_sphere(&mut graph, mmd.sphere_texture_type, textures.sphere.is_some())?;
    apply_toon(&mut graph, mmd, textures.toon)?;
    Ok(graph)
}

pub fn set_texture(graph: &mut Graph, texture: Option<TextureKey>) -> Result<()> {
    graph.set_kind("Tex", NodeKind::Texture(texture))?;
    let fac = texture.is_some() as u8 as f32;
    graph.set_input("Use Tex", "Fac", Value::Float(fac))
}

/// Rewires the sphere term for `mode`. Without a sphere texture the term
/// stays at its neutral base colour.
pub fn apply_sphere(graph: &mut Graph, mode: SphereMode, has_texture: bool) -> Result<()> {
    let (blend, base) = match mode {
        SphereMode::Add => (Blend::Add, BLACK),
        _ => (Blend::Multiply, WHITE),
    };
    graph.set_kind("Mix Tex", NodeKind::MixRgb(blend))?;
    graph.set_input("Use Sphere Tex", "Color1", Value::Color(base))?;
    let active = has_texture && mode != SphereMode::Off;
    graph.set_input("Use Sphere Tex", "Fac", Value::Float(active as u8 as f32))?;
    match mode {
        SphereMode::SubTexture => graph.link("Geo2", "UV", "Sphere Tex", "Vector"),
        _ => graph.link("Geo", "Normal", "Sphere Tex", "Vector"),
    }
}

pub fn apply_toon(graph: &mut Graph, mmd: &MmdMaterial, toon: Option<TextureKey>) -> Result<()> {
    graph.set_kind("Toon Tex", NodeKind::Texture(toon))?;
    let (index, use_texture) = if mmd.is_shared_toon_texture {
        (mmd.shared_toon_texture as f32, 0.0)
    } else {
        (-1.0, toon.is_some() as u8 as f32)
    };
    graph.set_input(SHADER_GROUP, "Toon Index", Value::Float(index))?;
    graph.set_input(SHADER_GROUP, "Use Toon Texture", Value::Float(use_texture))
}

pub fn edge_graph(name: &str, edge_color: [f32; 4], toon_edge: bool) -> Result<Graph> {
    Graph::new(name).build(
        vec![
            NodeSpec::new("Output", NodeKind::Output)
                .link("Color", "Edge Base", "Color")
                .link("Alpha", "Edge Alpha", "Value"),
            NodeSpec::new("Edge Base", NodeKind::Rgb)
                .color("Color", [edge_color[0], edge_color[1], edge_color[2], 1.0]),
            NodeSpec::new("Edge Alpha", NodeKind::Value)
                .float("Value", toon_edge as u8 as f32 * edge_color[3]),
        ],
        &|_| None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, Role};
    use crate::shader::eval::{evaluate, evaluate_socket, EvalContext};
    use crate::shader::{group, ToonRamp};
    use approx::assert_relative_eq;

    fn setup(mmd: &MmdMaterial, textures: Textures) -> (Scene, Graph) {
        let mut scene = Scene::new();
        let group = group::ensure(&mut scene, ToonRamp::Stepped).unwrap();
        let mut base = Material::new(NODE_BASE, Role::Proxy);
        base.surface.specular_intensity = 0.0;
        let mut no_shadow = Material::new(NODE_BASE_NO_SHADOW, Role::Proxy);
        no_shadow.surface.use_shadows = false;
        let mut spw = Material::new("m.spw", Role::Proxy);
        spw.surface.diffuse_intensity = 0.0;
        let mut alpha = Material::new("m.alp", Role::Proxy);
        alpha.surface.alpha = mmd.alpha;
        let proxies = Proxies {
            base: scene.add_material(base),
            base_no_shadow: scene.add_material(no_shadow),
            specular_weight: scene.add_material(spw),
            alpha: scene.add_material(alpha),
        };
        let graph = material_graph(&scene, group, "m", mmd, &proxies, &textures).unwrap();
        (scene, graph)
    }

    #[test]
    fn additive_sphere_without_texture_is_neutral() {
        let mmd = MmdMaterial {
            sphere_texture_type: SphereMode::Add,
            ..Default::default()
        };
        let (scene, graph) = setup(&mmd, Textures::default());
        let ctx = EvalContext::default();
        let sphere = evaluate_socket(&scene, &graph, "Use Sphere Tex", "Color", &ctx).unwrap();
        assert!(sphere == Value::Color(BLACK));
        let tex = evaluate_socket(&scene, &graph, "Mix Tex", "Color", &ctx).unwrap();
        assert!(tex.as_color()[..3] == [1.0, 1.0, 1.0]);
        assert!(graph.node("Mix Tex").unwrap().kind == NodeKind::MixRgb(Blend::Add));
    }

    #[test]
    fn sub_texture_uses_second_uv() {
        let mmd = MmdMaterial {
            sphere_texture_type: SphereMode::SubTexture,
            ..Default::default()
        };
        let (_, graph) = setup(&mmd, Textures::default());
        assert!(graph.source("Sphere Tex", "Vector") == Some(("Geo2", "UV")));
    }

    #[test]
    fn single_sided_alpha_follows_facing() {
        let mmd = MmdMaterial {
            alpha: 0.5,
            ..Default::default()
        };
        let (scene, graph) = setup(&mmd, Textures::default());
        let mut ctx = EvalContext::default();
        assert_relative_eq!(evaluate(&scene, &graph, &ctx).unwrap().alpha, 0.5);
        ctx.front_facing = false;
        assert_relative_eq!(evaluate(&scene, &graph, &ctx).unwrap().alpha, 0.0);

        let mmd = MmdMaterial {
            is_double_sided: true,
            ..mmd
        };
        let (scene, graph) = setup(&mmd, Textures::default());
        assert_relative_eq!(evaluate(&scene, &graph, &ctx).unwrap().alpha, 0.5);
    }

    #[test]
    fn self_shadow_selects_proxy() {
        let mmd = MmdMaterial {
            enabled_self_shadow: false,
            ..Default::default()
        };
        let (scene, graph) = setup(&mmd, Textures::default());
        let NodeKind::ExtendedMaterial(Some(key)) = graph.node("Pure Mat").unwrap().kind else {
            panic!("Pure Mat is not a material node");
        };
        assert!(scene.materials[key].name == NODE_BASE_NO_SHADOW);
    }

    #[test]
    fn shared_toon_index() {
        let mmd = MmdMaterial {
            is_shared_toon_texture: true,
            shared_toon_texture: 3,
            ..Default::default()
        };
        let (_, graph) = setup(&mmd, Textures::default());
        assert!(graph.input_value(SHADER_GROUP, "Toon Index").unwrap() == Value::Float(3.0));
        assert!(graph.input_value(SHADER_GROUP, "Use Toon Texture").unwrap() == Value::Float(0.0));
    }

    #[test]
    fn edge_alpha() {
        let graph = edge_graph("m.edge", [0.1, 0.2, 0.3, 0.5], true).unwrap();
        assert!(graph.input_value("Edge Alpha", "Value").unwrap() == Value::Float(0.5));
        assert!(graph.input_value("Edge Base", "Color").unwrap() == Value::Color([0.1, 0.2, 0.3, 1.0]));
        let graph = edge_graph("m.edge", [0.1, 0.2, 0.3, 0.5], false).unwrap();
        assert!(graph.input_value("Edge Alpha", "Value").unwrap() == Value::Float(0.0));
    }
}
