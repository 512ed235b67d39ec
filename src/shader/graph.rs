use crate::scene::{MaterialKey, NodeGroupKey, TextureKey};
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Float(f32),
    Color([f32; 4]),
    Vector([f32; 3]),
}

impl Value {
    pub fn as_float(&self) -> f32 {
        match self {
            Value::Float(v) => *v,
            Value::Color(c) => (c[0] + c[1] + c[2]) / 3.0,
            Value::Vector(v) => (v[0] + v[1] + v[2]) / 3.0,
        }
    }

    pub fn as_color(&self) -> [f32; 4] {
        match self {
            Value::Float(v) => [*v, *v, *v, 1.0],
            Value::Color(c) => *c,
            Value::Vector(v) => [v[0], v[1], v[2], 1.0],
        }
    }

    pub fn as_vector(&self) -> [f32; 3] {
        match self {
            Value::Float(v) => [*v; 3],
            Value::Color(c) => [c[0], c[1], c[2]],
            Value::Vector(v) => *v,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Multiply,
    Maximum,
    GreaterThan,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blend {
    Mix,
    Multiply,
    Add,
    Subtract,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    GroupInput,
    GroupOutput,
    Group(NodeGroupKey),
    Math(MathOp),
    MixRgb(Blend),
    /// Piecewise linear curve over `[0, 1]`, applied per colour channel.
    Curve(Vec<[f32; 2]>),
    ExtendedMaterial(Option<MaterialKey>),
    Geometry { uv_layer: Option<String> },
    Texture(Option<TextureKey>),
    Rgb,
    Value,
    Output,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Socket {
    pub name: String,
    pub default: Value,
}

impl Socket {
    pub fn new(name: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            default,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub inputs: Vec<Socket>,
    pub outputs: Vec<String>,
}

impl Node {
    pub fn input(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.name == name)
    }

    pub fn output(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub from_node: usize,
    pub from_socket: usize,
    pub to_node: usize,
    pub to_socket: usize,
}

const WHITE: Value = Value::Color([1.0; 4]);
const BLACK: Value = Value::Color([0.0, 0.0, 0.0, 1.0]);

fn sockets(
    kind: &NodeKind,
    graph: &Graph,
    groups: &dyn Fn(NodeGroupKey) -> Option<Interface>,
) -> Result<(Vec<Socket>, Vec<String>)> {
    let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    Ok(match kind {
        NodeKind::GroupInput => (vec![], graph.inputs.iter().map(|s| s.name.clone()).collect()),
        NodeKind::GroupOutput => (
            graph.outputs.iter().map(|n| Socket::new(n, BLACK)).collect(),
            vec![],
        ),
        NodeKind::Group(key) => {
            let interface = groups(*key).ok_or_else(|| Error::graph("missing node group"))?;
            (interface.inputs, interface.outputs)
        }
        NodeKind::Math(_) => (
            vec![Socket::new("A", Value::Float(0.5)), Socket::new("B", Value::Float(0.5))],
            names(&["Value"]),
        ),
        NodeKind::MixRgb(_) => (
            vec![
                Socket::new("Fac", Value::Float(0.5)),
                Socket::new("Color1", Value::Color([0.5, 0.5, 0.5, 1.0])),
                Socket::new("Color2", Value::Color([0.5, 0.5, 0.5, 1.0])),
            ],
            names(&["Color"]),
        ),
        NodeKind::Curve(_) => (
            vec![Socket::new("Fac", Value::Float(1.0)), Socket::new("Color", WHITE)],
            names(&["Color"]),
        ),
        NodeKind::ExtendedMaterial(_) => (
            vec![
                Socket::new("Color", WHITE),
                Socket::new("Spec", WHITE),
                Socket::new("Refl", Value::Float(1.0)),
                Socket::new("Normal", Value::Vector([0.0; 3])),
            ],
            names(&["Color", "Alpha", "Normal", "Diffuse", "Spec"]),
        ),
        NodeKind::Geometry { .. } => (vec![], names(&["UV", "Normal", "Front/Back"])),
        NodeKind::Texture(_) => (
            vec![Socket::new("Vector", Value::Vector([0.0; 3]))],
            names(&["Value", "Color", "Alpha"]),
        ),
        NodeKind::Rgb => (vec![Socket::new("Color", WHITE)], names(&["Color"])),
        NodeKind::Value => (vec![Socket::new("Value", Value::Float(0.0))], names(&["Value"])),
        NodeKind::Output => (
            vec![Socket::new("Color", BLACK), Socket::new("Alpha", Value::Float(1.0))],
            vec![],
        ),
    })
}

/// Input and output sockets a group node exposes.
#[derive(Clone, Debug)]
pub struct Interface {
    pub inputs: Vec<Socket>,
    pub outputs: Vec<String>,
}

/// One node of a graph description: kind, constant inputs, and incoming
/// links written as `(input, source node, source output)`.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    pub values: Vec<(&'static str, Value)>,
    pub links: Vec<(&'static str, String, &'static str)>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            values: vec![],
            links: vec![],
        }
    }

    pub fn value(mut self, input: &'static str, value: Value) -> Self {
        self.values.push((input, value));
        self
    }

    pub fn float(self, input: &'static str, value: f32) -> Self {
        self.value(input, Value::Float(value))
    }

    pub fn color(self, input: &'static str, value: [f32; 4]) -> Self {
        self.value(input, Value::Color(value))
    }

    pub fn link(mut self, input: &'static str, node: impl Into<String>, output: &'static str) -> Self {
        self.links.push((input, node.into(), output));
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    pub name: String,
    pub inputs: Vec<Socket>,
    pub outputs: Vec<String>,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl Graph {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_interface(name: &str, inputs: Vec<Socket>, outputs: Vec<&str>) -> Self {
        Self {
            name: name.to_string(),
            inputs,
            outputs: outputs.into_iter().map(String::from).collect(),
            ..Default::default()
        }
    }

    pub fn interface(&self) -> Interface {
        Interface {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }

    /// Creates every node first, then applies constants and wires links by
    /// name, so specs may refer to nodes declared after them.
    pub fn build(
        mut self,
        specs: Vec<NodeSpec>,
        groups: &dyn Fn(NodeGroupKey) -> Option<Interface>,
    ) -> Result<Self> {
        for spec in &specs {
            if self.find(&spec.name).is_some() {
                return Err(Error::graph(format!("duplicate node {}", spec.name)));
            }
            let (inputs, outputs) = sockets(&spec.kind, &self, groups)?;
            self.nodes.push(Node {
                name: spec.name.clone(),
                kind: spec.kind.clone(),
                inputs,
                outputs,
            });
        }
        for spec in &specs {
            for (input, value) in &spec.values {
                self.set_input(&spec.name, input, *value)?;
            }
            for (input, from, output) in &spec.links {
                self.link(from, output, &spec.name, input)?;
            }
        }
        Ok(self)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn node(&self, name: &str) -> Result<&Node> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| Error::graph(format!("node {} not found", name)))
    }

    pub fn node_mut(&mut self, name: &str) -> Result<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.name == name)
            .ok_or_else(|| Error::graph(format!("node {} not found", name)))
    }

    fn socket(&self, node: &str, input: &str) -> Result<(usize, usize)> {
        let n = self
            .find(node)
            .ok_or_else(|| Error::graph(format!("node {} not found", node)))?;
        let s = self.nodes[n]
            .input(input)
            .ok_or_else(|| Error::graph(format!("{} has no input {}", node, input)))?;
        Ok((n, s))
    }

    pub fn input_value(&self, node: &str, input: &str) -> Result<Value> {
        let (n, s) = self.socket(node, input)?;
        Ok(self.nodes[n].inputs[s].default)
    }

    pub fn set_input(&mut self, node: &str, input: &str, value: Value) -> Result<()> {
        let (n, s) = self.socket(node, input)?;
        self.nodes[n].inputs[s].default = value;
        Ok(())
    }

    pub fn set_kind(&mut self, node: &str, kind: NodeKind) -> Result<()> {
        let node = self.node_mut(node)?;
        if std::mem::discriminant(&node.kind) != std::mem::discriminant(&kind) {
            return Err(Error::graph(format!("cannot change the kind of {}", node.name)));
        }
        node.kind = kind;
        Ok(())
    }

    /// Connects an output to an input, replacing the input's previous link.
    pub fn link(&mut self, from: &str, output: &str, to: &str, input: &str) -> Result<()> {
        let from_node = self
            .find(from)
            .ok_or_else(|| Error::graph(format!("node {} not found", from)))?;
        let from_socket = self.nodes[from_node]
            .output(output)
            .ok_or_else(|| Error::graph(format!("{} has no output {}", from, output)))?;
        let (to_node, to_socket) = self.socket(to, input)?;
        self.links
            .retain(|l| !(l.to_node == to_node && l.to_socket == to_socket));
        self.links.push(Link {
            from_node,
            from_socket,
            to_node,
            to_socket,
        });
        Ok(())
    }

    pub fn unlink(&mut self, node: &str, input: &str) -> Result<()> {
        let (n, s) = self.socket(node, input)?;
        self.links.retain(|l| !(l.to_node == n && l.to_socket == s));
        Ok(())
    }

    pub fn link_to(&self, node: usize, input: usize) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.to_node == node && l.to_socket == input)
    }

    /// Name of the node and output feeding `input`, if linked.
    pub fn source(&self, node: &str, input: &str) -> Option<(&str, &str)> {
        let (n, s) = self.socket(node, input).ok()?;
        let link = self.link_to(n, s)?;
        let from = &self.nodes[link.from_node];
        Some((&from.name, &from.outputs[link.from_socket]))
    }
}
