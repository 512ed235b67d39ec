//! Point evaluation of shader graphs under a fixed lighting context.

use rustc_hash::{FxHashMap, FxHashSet};

use super::toon::sample;
use super::{Blend, Graph, MathOp, NodeKind, Value};
use crate::scene::{NodeGroupKey, Scene, TextureKey, BASE_TEX_SLOT};
use crate::{Error, Result};

const MAX_GROUP_DEPTH: usize = 16;

#[derive(Clone, Debug)]
pub struct EvalContext {
    /// Lambert term of the light, 0..=1.
    pub shade: f32,
    /// How much of the light is blocked, 0..=1.
    pub shadow: f32,
    pub specular: f32,
    pub front_facing: bool,
    pub uv: [f32; 2],
    pub uv2: [f32; 2],
    pub normal: [f32; 3],
    /// Colour returned by each texture, sampled anywhere.
    pub textures: FxHashMap<TextureKey, [f32; 4]>,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self {
            shade: 1.0,
            shadow: 0.0,
            specular: 0.0,
            front_facing: true,
            uv: [0.0; 2],
            uv2: [0.0; 2],
            normal: [0.0, 0.0, 1.0],
            textures: FxHashMap::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shaded {
    pub color: [f32; 4],
    pub alpha: f32,
}

struct Evaluator<'a> {
    scene: &'a Scene,
    graph: &'a Graph,
    ctx: &'a EvalContext,
    group_inputs: Vec<Value>,
    depth: usize,
    cache: FxHashMap<(usize, usize), Value>,
    visiting: FxHashSet<usize>,
}

impl<'a> Evaluator<'a> {
    fn new(scene: &'a Scene, graph: &'a Graph, ctx: &'a EvalContext, depth: usize) -> Self {
        Self {
            scene,
            graph,
            ctx,
            group_inputs: vec![],
            depth,
            cache: FxHashMap::default(),
            visiting: FxHashSet::default(),
        }
    }

    fn input(&mut self, node: usize, socket: usize) -> Result<Value> {
        match self.graph.link_to(node, socket).copied() {
            Some(link) => self.output(link.from_node, link.from_socket),
            None => Ok(self.graph.nodes[node].inputs[socket].default),
        }
    }

    fn output(&mut self, node: usize, socket: usize) -> Result<Value> {
        if let Some(v) = self.cache.get(&(node, socket)) {
            return Ok(*v);
        }
        if !self.visiting.insert(node) {
            return Err(Error::graph(format!(
                "cycle through node {}",
                self.graph.nodes[node].name
            )));
        }
        let v = self.compute(node, socket)?;
        self.visiting.remove(&node);
        self.cache.insert((node, socket), v);
        Ok(v)
    }

    fn compute(&mut self, node: usize, socket: usize) -> Result<Value> {
        let graph = self.graph;
        let n = &graph.nodes[node];
        let output = n.outputs.get(socket).map(String::as_str).unwrap_or("");
        match &n.kind {
            NodeKind::GroupInput => Ok(self
                .group_inputs
                .get(socket)
                .copied()
                .unwrap_or(Value::Float(0.0))),
            NodeKind::GroupOutput | NodeKind::Output => {
                Err(Error::graph(format!("{} has no outputs", n.name)))
            }
            NodeKind::Group(key) => {
                let inputs = (0..n.inputs.len())
                    .map(|i| self.input(node, i))
                    .collect::<Result<Vec<_>>>()?;
                let outputs = run_group(self.scene, *key, inputs, self.ctx, self.depth + 1)?;
                outputs
                    .get(socket)
                    .copied()
                    .ok_or_else(|| Error::graph(format!("{} has no output {}", n.name, socket)))
            }
            NodeKind::Math(op) => {
                let a = self.input(node, 0)?.as_float();
                let b = self.input(node, 1)?.as_float();
                Ok(Value::Float(match op {
                    MathOp::Add => a + b,
                    MathOp::Multiply => a * b,
                    MathOp::Maximum => a.max(b),
                    MathOp::GreaterThan => (a > b) as u8 as f32,
                }))
            }
            NodeKind::MixRgb(blend) => {
                let fac = self.input(node, 0)?.as_float().clamp(0.0, 1.0);
                let c1 = self.input(node, 1)?.as_color();
                let c2 = self.input(node, 2)?.as_color();
                let mut out = c1;
                for i in 0..3 {
                    let blended = match blend {
                        Blend::Mix => c2[i],
                        Blend::Multiply => c1[i] * c2[i],
                        Blend::Add => c1[i] + c2[i],
                        Blend::Subtract => c1[i] - c2[i],
                    };
                    out[i] = c1[i] * (1.0 - fac) + blended * fac;
                }
                Ok(Value::Color(out))
            }
            NodeKind::Curve(points) => {
                let fac = self.input(node, 0)?.as_float().clamp(0.0, 1.0);
                let c = self.input(node, 1)?.as_color();
                let mut out = c;
                for i in 0..3 {
                    out[i] = c[i] * (1.0 - fac) + sample(points, c[i]) * fac;
                }
                Ok(Value::Color(out))
            }
            NodeKind::ExtendedMaterial(key) => {
                let Some(material) = key.and_then(|k| self.scene.materials.get(k)) else {
                    return Ok(match output {
                        "Color" => Value::Color([0.0, 0.0, 0.0, 1.0]),
                        "Normal" => Value::Vector(self.ctx.normal),
                        _ => Value::Float(if output == "Alpha" { 1.0 } else { 0.0 }),
                    });
                };
                let s = &material.surface;
                let lit = if s.use_shadows {
                    self.ctx.shade * (1.0 - self.ctx.shadow)
                } else {
                    self.ctx.shade
                };
                let spec = s.specular_intensity * self.ctx.specular;
                Ok(match output {
                    "Color" => {
                        let c = s.diffuse_color * s.diffuse_intensity * lit + s.specular_color * spec;
                        Value::Color([c.x, c.y, c.z, s.alpha])
                    }
                    "Alpha" => {
                        let texture_alpha = material
                            .texture(BASE_TEX_SLOT)
                            .and_then(|t| self.ctx.textures.get(&t))
                            .map_or(1.0, |c| c[3]);
                        Value::Float(s.alpha * texture_alpha)
                    }
                    "Diffuse" => Value::Float(lit),
                    "Spec" => Value::Float(spec),
                    _ => Value::Vector(self.ctx.normal),
                })
            }
            NodeKind::Geometry { uv_layer } => Ok(match output {
                "UV" => {
                    let uv = if uv_layer.is_some() {
                        self.ctx.uv2
                    } else {
                        self.ctx.uv
                    };
                    Value::Vector([uv[0], uv[1], 0.0])
                }
                "Front/Back" => Value::Float(self.ctx.front_facing as u8 as f32),
                _ => Value::Vector(self.ctx.normal),
            }),
            NodeKind::Texture(key) => {
                let c = key
                    .and_then(|k| self.ctx.textures.get(&k))
                    .copied()
                    .unwrap_or([0.0, 0.0, 0.0, 0.0]);
                Ok(match output {
                    "Color" => Value::Color([c[0], c[1], c[2], 1.0]),
                    "Alpha" => Value::Float(c[3]),
                    _ => Value::Float((c[0] + c[1] + c[2]) / 3.0),
                })
            }
            NodeKind::Rgb => Ok(Value::Color(self.input(node, 0)?.as_color())),
            NodeKind::Value => Ok(Value::Float(self.input(node, 0)?.as_float())),
        }
    }

    fn inputs_of(&mut self, node: usize) -> Result<Vec<Value>> {
        (0..self.graph.nodes[node].inputs.len())
            .map(|i| self.input(node, i))
            .collect()
    }
}

fn run_group(
    scene: &Scene,
    key: NodeGroupKey,
    inputs: Vec<Value>,
    ctx: &EvalContext,
    depth: usize,
) -> Result<Vec<Value>> {
    if depth > MAX_GROUP_DEPTH {
        return Err(Error::graph("node groups nested too deeply"));
    }
    let graph = scene
        .node_groups
        .get(key)
        .ok_or_else(|| Error::graph("missing node group"))?;
    let output = graph
        .nodes
        .iter()
        .position(|n| n.kind == NodeKind::GroupOutput)
        .ok_or_else(|| Error::graph(format!("{} has no group output", graph.name)))?;
    let mut evaluator = Evaluator::new(scene, graph, ctx, depth);
    evaluator.group_inputs = inputs;
    evaluator.inputs_of(output)
}

/// Evaluates a node group with the named inputs set and the rest left at
/// their interface defaults.
pub fn evaluate_group(
    scene: &Scene,
    key: NodeGroupKey,
    inputs: &[(&str, Value)],
    ctx: &EvalContext,
) -> Result<Vec<Value>> {
    let graph = scene
        .node_groups
        .get(key)
        .ok_or_else(|| Error::graph("missing node group"))?;
    let mut values = graph.inputs.iter().map(|s| s.default).collect::<Vec<_>>();
    for (name, value) in inputs {
        let i = graph
            .inputs
            .iter()
            .position(|s| s.name == *name)
            .ok_or_else(|| Error::graph(format!("{} has no input {}", graph.name, name)))?;
        values[i] = *value;
    }
    run_group(scene, key, values, ctx, 0)
}

/// Evaluates the colour and alpha reaching a material graph's output node.
pub fn evaluate(scene: &Scene, graph: &Graph, ctx: &EvalContext) -> Result<Shaded> {
    let output = graph
        .nodes
        .iter()
        .position(|n| n.kind == NodeKind::Output)
        .ok_or_else(|| Error::graph(format!("{} has no output node", graph.name)))?;
    let mut evaluator = Evaluator::new(scene, graph, ctx, 0);
    let values = evaluator.inputs_of(output)?;
    Ok(Shaded {
        color: values[0].as_color(),
        alpha: values[1].as_float(),
    })
}

/// Evaluates a single output socket.
pub fn evaluate_socket(
    scene: &Scene,
    graph: &Graph,
    node: &str,
    output: &str,
    ctx: &EvalContext,
) -> Result<Value> {
    let n = graph
        .find(node)
        .ok_or_else(|| Error::graph(format!("node {} not found", node)))?;
    let s = graph.nodes[n]
        .output(output)
        .ok_or_else(|| Error::graph(format!("{} has no output {}", node, output)))?;
    Evaluator::new(scene, graph, ctx, 0).output(n, s)
}
