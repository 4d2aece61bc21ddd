use fixed_ngin::{
    Color, Material, Model, RecordingDevice,
    data_structures::scene_graph,
    render::{DrawState, draw_mesh},
    resources::texture::TextureCache,
};

use tempfile::TempDir;

use crate::common::test_utils::{CountingDecoder, textured, touch, triangle};

mod common;

fn brick_cache(dir: &TempDir, device: &mut RecordingDevice) -> (TextureCache, String) {
    let path = touch(dir.path(), "brick.png").to_str().unwrap().to_string();
    let mut cache = TextureCache::with_decoder(
        dir.path().join("media/textures"),
        Box::new(CountingDecoder::new(4, 4)),
    );
    cache.load(device, &path).unwrap();
    (cache, path)
}

#[test]
fn mesh_without_material_is_opaque_white_untextured() {
    let cache = TextureCache::new("unused");
    let mut device = RecordingDevice::new();

    let state = draw_mesh(&mut device, &cache, &triangle("plain", vec![]));

    assert_eq!(state, DrawState::unlit_white());
    let call = device.draw_calls()[0].clone();
    assert!(!call.texturing);
    assert_eq!(call.bound_texture, None);
    assert_eq!(
        (call.ambient, call.diffuse, call.specular),
        (Color::WHITE, Color::WHITE, Color::WHITE)
    );
}

#[test]
fn shininess_is_scaled_to_the_native_range() {
    let cache = TextureCache::new("unused");
    let mut device = RecordingDevice::new();
    let material = Material {
        shininess: 0.25,
        specular: Color::new(0.5, 0.5, 0.5, 1.0),
        ..Material::opaque_white()
    };

    draw_mesh(&mut device, &cache, &triangle("shiny", vec![material]));

    let call = device.draw_calls()[0].clone();
    assert_eq!(call.shininess, 32.0);
    assert_eq!(call.specular, Color::new(0.5, 0.5, 0.5, 1.0));
}

#[test]
fn only_the_first_material_is_used() {
    let cache = TextureCache::new("unused");
    let mut device = RecordingDevice::new();
    let red = Material {
        diffuse: Color::new(1.0, 0.0, 0.0, 1.0),
        ..Material::opaque_white()
    };
    let blue = Material {
        diffuse: Color::new(0.0, 0.0, 1.0, 1.0),
        ..Material::opaque_white()
    };

    draw_mesh(&mut device, &cache, &triangle("two", vec![red, blue]));

    assert_eq!(device.draw_calls()[0].diffuse, Color::new(1.0, 0.0, 0.0, 1.0));
}

#[test]
fn cached_texture_is_bound_for_the_draw() {
    let dir = tempfile::tempdir().unwrap();
    let mut device = RecordingDevice::new();
    let (cache, path) = brick_cache(&dir, &mut device);

    let state = draw_mesh(&mut device, &cache, &textured("wall", &path));

    let handle = cache.get(&path);
    assert!(handle.is_some());
    assert_eq!(state.texture, handle);
    let call = device.draw_calls()[0].clone();
    assert!(call.texturing);
    assert_eq!(call.bound_texture, handle);
}

#[test]
fn texture_missing_from_cache_draws_untextured() {
    let cache = TextureCache::new("unused");
    let mut device = RecordingDevice::new();

    draw_mesh(&mut device, &cache, &textured("wall", "never/loaded.png"));

    let call = device.draw_calls()[0].clone();
    assert!(!call.texturing);
    assert_eq!(call.bound_texture, None);
}

#[test]
fn texturing_does_not_leak_into_the_next_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let mut device = RecordingDevice::new();
    let (cache, path) = brick_cache(&dir, &mut device);
    let model = Model::new("room")
        .with_mesh(textured("wall", &path))
        .with_mesh(triangle("floor", vec![Material::opaque_white()]))
        .with_child(Model::new("lamp").with_mesh(triangle("shade", vec![])));

    scene_graph::draw_model(&mut device, &cache, &model, None);

    let calls = device.draw_calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].texturing);
    assert!(!calls[1].texturing);
    assert!(!calls[2].texturing);
    assert_eq!(calls[1].bound_texture, None);
}

#[test]
fn mesh_without_material_keeps_previous_shininess() {
    let cache = TextureCache::new("unused");
    let mut device = RecordingDevice::new();
    let matte = Material {
        shininess: 0.5,
        ..Material::opaque_white()
    };
    draw_mesh(&mut device, &cache, &triangle("first", vec![matte]));
    draw_mesh(&mut device, &cache, &triangle("second", vec![]));

    let calls = device.draw_calls();
    assert_eq!(calls[0].shininess, 64.0);
    assert_eq!(calls[1].shininess, 64.0);
}
