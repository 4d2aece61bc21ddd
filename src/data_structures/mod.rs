//! Engine data structures: models, textures and the scene graph.
//!
//! - `model` contains colours, materials, meshes and the model tree
//! - `texture` contains texture handles, sampling policy and decoded pixels
//! - `scene_graph` draws a model tree through the device

pub mod model;
pub mod scene_graph;
pub mod texture;
