//! PMX to scene import.
//!
//! [`Importer::execute`] runs the category importers in a fixed order: root,
//! armature, materials, mesh, physics, display frames and morphs. Every
//! category can be switched off through [`ImportTypes`].

mod display;
pub mod material;
pub mod mesh;
pub mod morph;
pub mod physics;
pub mod skeleton;
pub mod texture;

#[cfg(test)]
pub(crate) mod fixture;

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::edge::{self, EdgeSettings};
use crate::pmx;
use crate::scene::{
    Armature, MaterialKey, MmdRoot, MmdType, Modifier, ModifierKind, Object, ObjectData,
    ObjectKey, Scene,
};
use crate::shader::{group, ToonRamp};
use crate::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportTypes {
    pub mesh: bool,
    pub armature: bool,
    pub physics: bool,
    pub display: bool,
    pub morphs: bool,
}

impl Default for ImportTypes {
    fn default() -> Self {
        Self {
            mesh: true,
            armature: true,
            physics: true,
            display: true,
            morphs: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub types: ImportTypes,
    pub scale: f32,
    pub use_mipmap: bool,
    /// Diffuse factor of multiplicative sphere maps.
    pub sph_blend_factor: f32,
    /// Diffuse factor of additive sphere maps.
    pub spa_blend_factor: f32,
    pub rename_lr_bones: bool,
    pub toon_ramp: ToonRamp,
    pub edge: EdgeSettings,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            types: ImportTypes::default(),
            scale: 1.0,
            use_mipmap: true,
            sph_blend_factor: 1.0,
            spa_blend_factor: 1.0,
            rename_lr_bones: false,
            toon_ramp: ToonRamp::default(),
            edge: EdgeSettings::default(),
        }
    }
}

impl ImportOptions {
    /// Parses options from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Keys of everything one import created.
#[derive(Clone, Debug)]
pub struct ImportedModel {
    pub root: ObjectKey,
    pub armature: ObjectKey,
    pub mesh: Option<ObjectKey>,
    pub rigid_bodies: Vec<ObjectKey>,
    pub joints: Vec<ObjectKey>,
    /// Imported materials in PMX order, without their edge materials.
    pub materials: Vec<MaterialKey>,
}

#[derive(Clone, Debug, Default)]
pub struct Importer {
    options: ImportOptions,
}

impl Importer {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Imports `model` into `scene`. Texture paths are resolved against
    /// `base_dir`. A failure leaves whatever was created so far in the scene.
    pub fn execute(
        &self,
        scene: &mut Scene,
        model: &pmx::Model,
        base_dir: &Path,
    ) -> Result<ImportedModel> {
        let start = Instant::now();
        let opts = &self.options;
        let types = &opts.types;
        log::info!("importing {} ({} vertices, {} bones)", model.name, model.vertices.len(), model.bones.len());

        let mut mmd_root = MmdRoot::new(&model.name, &model.name_en, opts.scale);
        mmd_root.comment_text = Some(scene.add_text(&format!("{}_comment", model.name), &model.comment));
        mmd_root.comment_e_text =
            Some(scene.add_text(&format!("{}_comment_e", model.name), &model.comment_en));
        let mut root = Object::new(&model.name, ObjectData::Root(Box::new(mmd_root)));
        root.mmd_type = MmdType::Root;
        let root_key = scene.add_object(root);

        let mut armature = if types.armature {
            skeleton::build(&model.bones, opts.scale)?
        } else {
            Armature::new("")
        };
        armature.name = format!("{}_arm", model.name);
        if opts.rename_lr_bones {
            for (old, new) in skeleton::rename_lr(&mut armature) {
                log::debug!("bone {} renamed to {}", old, new);
            }
        }
        let bone_names = if types.armature {
            armature.bones.iter().map(|b| b.name.clone()).collect()
        } else {
            skeleton::bone_names(&model.bones)
        };
        let armature_data = scene.add_armature(armature);
        let mut armature_object = Object::new(
            &format!("{}_arm", model.name),
            ObjectData::Armature(armature_data),
        );
        armature_object.parent = Some(root_key);
        armature_object.hidden = true;
        let armature_key = scene.add_object(armature_object);
        log::debug!("armature: {} bones", bone_names.len());

        let mut materials = vec![];
        let mut mesh_key = None;
        let mut mesh_data = None;
        if types.mesh {
            let shader = group::ensure(scene, opts.toon_ramp)?;
            materials = material::import(scene, model, base_dir, opts, shader)?;
            let mut mesh = mesh::build(&format!("{}_mesh", model.name), model, opts.scale)?;
            for m in mesh.face_materials.iter_mut() {
                *m *= 2;
            }
            mesh.materials = materials
                .iter()
                .flat_map(|&m| [Some(m), scene.materials[m].mmd.edge_material])
                .collect();
            let data = scene.add_mesh(mesh);
            let mut object = Object::new(&format!("{}_mesh", model.name), ObjectData::Mesh(data));
            object.parent = Some(armature_key);
            object.vertex_groups = mesh::skin_groups(&model.vertices, &bone_names)?;
            object.modifiers.push(Modifier {
                name: "mmd_bone_order_override".to_string(),
                kind: ModifierKind::Armature {
                    object: armature_key,
                    use_vertex_groups: true,
                },
            });
            mesh_key = Some(scene.add_object(object));
            mesh_data = Some(data);
            log::debug!("mesh: {} faces, {} materials", model.faces.len(), materials.len());
        }

        let mut rigid_bodies = vec![];
        let mut joints = vec![];
        if types.physics {
            let mut rigid_group = Object::new("rigidbodies", ObjectData::Empty);
            rigid_group.mmd_type = MmdType::RigidGroup;
            rigid_group.parent = Some(root_key);
            let rigid_group = scene.add_object(rigid_group);
            for record in &model.rigid_bodies {
                let mut object = physics::rigid_body(record, model.bones.len(), opts.scale)?;
                object.parent = Some(rigid_group);
                rigid_bodies.push(scene.add_object(object));
            }
            let mut joint_group = Object::new("joints", ObjectData::Empty);
            joint_group.mmd_type = MmdType::JointGroup;
            joint_group.parent = Some(root_key);
            let joint_group = scene.add_object(joint_group);
            if !model.joints.is_empty() {
                log::info!("joint rotation limits: minimum and maximum are taken from each other's field");
            }
            for record in &model.joints {
                let mut object = physics::joint(record, &rigid_bodies, opts.scale)?;
                object.parent = Some(joint_group);
                joints.push(scene.add_object(object));
            }
            log::debug!("physics: {} rigid bodies, {} joints", rigid_bodies.len(), joints.len());
        }

        let morph_names = morph::morph_names(&model.morphs);
        let display_frames = if types.display {
            display::frames(model, &bone_names, &morph_names)?
        } else {
            vec![]
        };

        let mut tables = MmdRoot::new(&model.name, &model.name_en, opts.scale);
        tables.display_item_frames = display_frames;
        if types.morphs {
            tables.group_morphs = morph::group_morphs(&model.morphs, &morph_names);
            let (vertex_morphs, shape_keys) =
                morph::vertex_morphs(&model.morphs, &morph_names, model.vertices.len(), opts.scale);
            tables.vertex_morphs = vertex_morphs;
            if let Some(data) = mesh_data {
                scene.meshes[data].shape_keys = shape_keys;
            }
            tables.bone_morphs = morph::bone_morphs(
                &model.morphs,
                &morph_names,
                &scene.armatures[armature_data],
                opts.scale,
            );
            tables.material_morphs =
                morph::material_morphs(&model.morphs, &morph_names, &materials, mesh_data);
            tables.uv_morphs = morph::uv_morphs(&model.morphs, &morph_names, model.vertices.len());
        }
        if let Some(root) = scene.root_of_mut(root_key) {
            root.armature = Some(armature_key);
            root.show_meshes = types.mesh;
            root.show_armature = !types.mesh;
            root.display_item_frames = tables.display_item_frames;
            root.initial_display_frames();
            root.group_morphs = tables.group_morphs;
            root.vertex_morphs = tables.vertex_morphs;
            root.bone_morphs = tables.bone_morphs;
            root.material_morphs = tables.material_morphs;
            root.uv_morphs = tables.uv_morphs;
        }

        if let Some(object) = mesh_key {
            let settings = EdgeSettings {
                thickness: opts.edge.thickness * opts.scale,
                ..opts.edge.clone()
            };
            edge::reconcile(scene, object, &settings)?;
        }

        scene.active = Some(root_key);
        scene.selection = vec![root_key];
        log::info!("imported {} in {:.3}s", model.name, start.elapsed().as_secs_f64());
        Ok(ImportedModel {
            root: root_key,
            armature: armature_key,
            mesh: mesh_key,
            rigid_bodies,
            joints,
            materials,
        })
    }
}

/// Reads the PMX file at `path` and imports it, resolving textures next to
/// the file.
pub fn import_file(
    scene: &mut Scene,
    path: impl AsRef<Path>,
    options: ImportOptions,
) -> Result<ImportedModel> {
    let path = path.as_ref();
    let model = pmx::load(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Importer::new(options).execute(scene, &model, base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{EDGE_GROUP, EDGE_SOLIDIFY};
    use crate::scene::MorphType;

    fn import(model: &pmx::Model, options: ImportOptions) -> (Scene, ImportedModel) {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        let imported = Importer::new(options)
            .execute(&mut scene, model, dir.path())
            .unwrap();
        (scene, imported)
    }

    #[test]
    fn minimal_model() {
        let (scene, imported) = import(&fixture::minimal_model(), ImportOptions::default());
        let meshes = scene
            .objects
            .values()
            .filter(|o| matches!(o.data, ObjectData::Mesh(_)))
            .count();
        assert!(meshes == 1);

        let object = imported.mesh.unwrap();
        let mesh = &scene.meshes[scene.mesh_of(object).unwrap()];
        let names = mesh
            .materials
            .iter()
            .map(|m| scene.materials[m.unwrap()].name.as_str())
            .collect::<Vec<_>>();
        assert!(names == ["body", "body.edge"]);
        assert!(mesh.face_materials == vec![0]);

        let armature = &scene.armatures[scene.armature_of(imported.armature).unwrap()];
        assert!(armature.bones.len() == 1 && armature.bones[0].mmd.is_tip);
        assert!(scene.objects[imported.armature].hidden);

        let mesh_object = &scene.objects[object];
        assert!(mesh_object.vertex_group("センター").unwrap().weight(0) == Some(1.0));
        assert!(mesh_object.vertex_group(EDGE_GROUP).is_some());
        assert!(mesh_object.modifiers.last().unwrap().name == EDGE_SOLIDIFY);

        let root = scene.root_of(imported.root).unwrap();
        let comment = &scene.texts[root.comment_text.unwrap()];
        assert!(comment.name == "model_comment" && comment.body == "line 1\nline 2");
        assert!(root.display_item_frames.len() == 2);
        assert!(scene.active == Some(imported.root));
    }

    #[test]
    fn categories_can_be_skipped() {
        let options = ImportOptions {
            types: ImportTypes {
                mesh: false,
                physics: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let (scene, imported) = import(&fixture::minimal_model(), options);
        assert!(imported.mesh.is_none() && imported.materials.is_empty());
        assert!(scene.find_object("rigidbodies").is_none());
        assert!(scene.materials.is_empty());
        let root = scene.root_of(imported.root).unwrap();
        assert!(!root.show_meshes && root.show_armature);
    }

    #[test]
    fn edge_thickness_follows_scale() {
        let options = ImportOptions {
            scale: 0.08,
            ..Default::default()
        };
        let (scene, imported) = import(&fixture::minimal_model(), options);
        let object = &scene.objects[imported.mesh.unwrap()];
        let Some(ModifierKind::Solidify { thickness, .. }) =
            object.modifier(EDGE_SOLIDIFY).map(|m| &m.kind)
        else {
            panic!("no solidify modifier");
        };
        assert!((*thickness - 0.08).abs() < 1e-6);
    }

    #[test]
    fn options_from_json() {
        let options =
            ImportOptions::from_json(r#"{"scale": 0.08, "types": {"physics": false}, "toon_ramp": "smooth"}"#)
                .unwrap();
        assert!(options.scale == 0.08);
        assert!(!options.types.physics && options.types.mesh);
        assert!(options.toon_ramp == ToonRamp::Smooth);
        assert!(options.use_mipmap);
        assert!(ImportOptions::from_json("{\"scale\": \"big\"}").is_err());
    }

    #[test]
    fn import_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pmx");
        std::fs::write(&path, pmx::reader::tests::sample(2.0, true)).unwrap();
        let mut scene = Scene::new();
        let imported = import_file(&mut scene, &path, ImportOptions::default()).unwrap();
        assert!(imported.materials.len() == 1);
        assert!(imported.rigid_bodies.len() == 1 && imported.joints.len() == 1);
        let root = scene.root_of(imported.root).unwrap();
        assert!(root.name == "テスト");
        assert!(root.has_morph(MorphType::Vertex, "あ"));
        assert!(root.has_morph(MorphType::Group, "grp"));
        assert!(root.display_item_frames.iter().any(|f| f.name == "Root"));
        let mesh = &scene.meshes[scene.mesh_of(imported.mesh.unwrap()).unwrap()];
        assert!(mesh.shape_key("あ").is_some());
    }
}
