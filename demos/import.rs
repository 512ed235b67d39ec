use std::path::PathBuf;

use pmx_import::scene::{ObjectData, Scene};
use pmx_import::{import_file, ImportOptions};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(args.next().unwrap_or_else(|| "model.pmx".to_string()));
    let options = match args.next() {
        Some(json) => ImportOptions::from_json(&std::fs::read_to_string(json)?)?,
        None => ImportOptions::default(),
    };

    let mut scene = Scene::new();
    let imported = import_file(&mut scene, &path, options)?;
    let root = scene
        .root_of(imported.root)
        .ok_or_else(|| anyhow::anyhow!("no root object"))?;
    println!("[name] {}", root.name);
    println!("[name EN] {}", root.name_e);
    if let Some(text) = root.comment_text {
        println!("[comment]\n{}", scene.texts[text].body);
    }
    if let Some(key) = scene.armature_of(imported.armature) {
        println!("[bones : {}]", scene.armatures[key].bones.len());
    }
    println!("[materials : {}]", imported.materials.len());
    for key in &imported.materials {
        let material = &scene.materials[*key];
        println!("{} ({} outline bindings)", material.name, material.bindings.len());
    }
    println!("[textures : {}]", scene.textures.len());
    for image in scene.images.values() {
        let state = if image.placeholder { " (missing)" } else { "" };
        println!("{}{}", image.path.display(), state);
    }
    println!(
        "[morphs] vertex {}, uv {}, bone {}, material {}, group {}",
        root.vertex_morphs.len(),
        root.uv_morphs.len(),
        root.bone_morphs.len(),
        root.material_morphs.len(),
        root.group_morphs.len()
    );
    let physics = scene
        .objects
        .values()
        .filter(|o| matches!(o.data, ObjectData::RigidBody(_) | ObjectData::Joint(_)))
        .count();
    println!("[physics objects : {}]", physics);
    if let Some(mesh) = imported.mesh {
        println!("[modifiers]");
        for modifier in &scene.objects[mesh].modifiers {
            println!("{}", modifier.name);
        }
    }
    Ok(())
}
