//! Scene graph traversal.
//!
//! [`draw_model`] walks a [`Model`] tree depth first in pre-order: the node's
//! own meshes, then each sub-model in turn. On entry to every node the
//! MODELVIEW stack is re-synchronised with the camera pipeline through a
//! [`MatrixScope`], whose `Drop` pops the matrix again. The stack depth after
//! a traversal therefore always equals the depth before it, whatever the
//! shape of the tree and however the traversal is left.

use std::ops::{Deref, DerefMut};

use crate::{
    context::GridConfig,
    data_structures::model::Model,
    device::{Capability, GraphicsDevice},
    pipeline::{MatrixMode, Pipeline, column_major},
    render::draw_mesh,
    resources::texture::TextureCache,
};

/// A MODELVIEW push that is popped when the scope is dropped.
///
/// Derefs to the device, so drawing inside the scope goes through the guard.
pub struct MatrixScope<'d, D: GraphicsDevice + ?Sized> {
    device: &'d mut D,
    pushed: bool,
}

impl<'d, D: GraphicsDevice + ?Sized> MatrixScope<'d, D> {
    /// Push MODELVIEW, load identity and multiply by the pipeline's
    /// MODELVIEW matrix. Without a pipeline nothing is pushed.
    ///
    /// If the device refuses the push the current top is left untouched and
    /// the scope pops nothing on drop.
    pub fn synchronize(device: &'d mut D, pipeline: Option<&dyn Pipeline>) -> Self {
        let Some(pipeline) = pipeline else {
            return Self {
                device,
                pushed: false,
            };
        };
        let matrix = column_major(&pipeline.matrix(MatrixMode::ModelView));
        device.set_matrix_mode(MatrixMode::ModelView);
        let pushed = device.push_matrix();
        if pushed {
            device.load_identity();
            device.mult_matrix(&matrix);
        } else {
            log::warn!("modelview stack full, drawing with the enclosing matrix");
        }
        Self { device, pushed }
    }

    pub fn is_pushed(&self) -> bool {
        self.pushed
    }
}

impl<D: GraphicsDevice + ?Sized> Deref for MatrixScope<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: GraphicsDevice + ?Sized> DerefMut for MatrixScope<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: GraphicsDevice + ?Sized> Drop for MatrixScope<'_, D> {
    fn drop(&mut self) {
        if self.pushed {
            self.device.set_matrix_mode(MatrixMode::ModelView);
            self.device.pop_matrix();
        }
    }
}

/// Draw `model` and its whole subtree.
pub fn draw_model<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    cache: &TextureCache,
    model: &Model,
    pipeline: Option<&dyn Pipeline>,
) {
    let mut scope = MatrixScope::synchronize(device, pipeline);

    for mesh in &model.meshes {
        draw_mesh(&mut *scope, cache, mesh);
    }

    for child in &model.sub_models {
        draw_model(&mut *scope, cache, child, pipeline);
    }
}

/// Line-list vertices of a square grid on the y = 0 plane, centred on the
/// origin: for each of the `divisions + 1` steps one line along X and one
/// along Z.
pub fn grid_vertices(grid: &GridConfig) -> Vec<[f32; 3]> {
    let half = grid.extent / 2.0;
    let divisions = grid.divisions.max(1);
    let step = grid.extent / divisions as f32;
    let mut vertices = Vec::with_capacity((divisions as usize + 1) * 4);
    for i in 0..=divisions {
        let offset = -half + step * i as f32;
        vertices.push([-half, 0.0, offset]);
        vertices.push([half, 0.0, offset]);
        vertices.push([offset, 0.0, -half]);
        vertices.push([offset, 0.0, half]);
    }
    vertices
}

/// Draw the diagnostic ground grid, unlit, in the same camera-synchronised
/// way as models. The lighting state is restored afterwards.
pub fn draw_grid<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    pipeline: Option<&dyn Pipeline>,
    grid: &GridConfig,
) {
    let mut scope = MatrixScope::synchronize(device, pipeline);

    let lighting = scope.is_enabled(Capability::Lighting);
    scope.disable(Capability::Lighting);
    scope.set_color(grid.color);
    scope.draw_lines(&grid_vertices(grid));
    if lighting {
        scope.enable(Capability::Lighting);
    }
}
