use std::fs;

use fixed_ngin::{
    Color, FrameController, RecordingDevice, RendererConfig, error::ModelLoadError,
    resources::load_model_obj,
};

use tempfile::TempDir;

use crate::common::test_utils::{CountingDecoder, StaticPipeline, init_logger, touch};

mod common;

const OBJ: &str = "mtllib scene.mtl
o wall
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl brick
f 1/1/1 2/2/1 3/3/1 4/4/1
o bare
v 0 0 1
v 1 0 1
v 0 1 1
f 5 6 7
";

const MTL: &str = "newmtl brick
Ka 0.1 0.1 0.1
Kd 0.8 0.2 0.2
Ks 0.5 0.5 0.5
Ns 250
map_Kd brick.png
";

fn scene(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("scene.obj");
    fs::write(&path, OBJ).unwrap();
    fs::write(dir.path().join("scene.mtl"), MTL).unwrap();
    path
}

#[test]
fn obj_objects_become_child_models() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let model = load_model_obj(scene(&dir)).unwrap();

    assert_eq!(model.name, "scene");
    assert!(model.meshes.is_empty());
    let names = model
        .sub_models
        .iter()
        .map(|m| m.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["wall", "bare"]);
    assert_eq!(model.depth(), 1);

    let wall = &model.sub_models[0].meshes[0];
    assert_eq!(wall.vertex_count(), 4);
    assert_eq!(wall.indices().len(), 6);
    assert!(wall.tex_coords().is_some());

    let material = wall.material().unwrap();
    assert_eq!(material.diffuse, Color::new(0.8, 0.2, 0.2, 1.0));
    assert_eq!(material.shininess, 0.25);
    let texture = dir.path().join("brick.png");
    assert_eq!(material.texture_key(), texture.to_str());

    let bare = &model.sub_models[1].meshes[0];
    assert!(bare.tex_coords().is_none());
    assert_eq!(bare.normals(), &[[0.0, 0.0, 1.0]; 3]);
}

#[test]
fn missing_obj_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_model_obj(dir.path().join("nothing.obj")).unwrap_err();
    assert!(matches!(err, ModelLoadError::Obj { .. }));
}

#[test]
fn loaded_model_draws_textured() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "brick.png");
    let model = load_model_obj(scene(&dir)).unwrap();
    let mut frame = FrameController::with_decoder(
        RecordingDevice::new(),
        RendererConfig::default(),
        Box::new(CountingDecoder::new(8, 8)),
    );
    frame.initialize().unwrap();

    let report = frame.load_model_textures(&model);
    assert!(report.all_loaded());

    frame.pre_update();
    frame.draw_model(&model, Some(&StaticPipeline::perspective()));

    let calls = frame.device().draw_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].texturing);
    assert_eq!(calls[0].label, "wall");
    assert!(!calls[1].texturing);
}
