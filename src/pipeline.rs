//! The camera/view pipeline consumed by the renderer.
//!
//! A [`Pipeline`] owns the camera transforms plus the viewport and frustum
//! parameters. The renderer never stores one; every draw entry point takes
//! the active pipeline explicitly (`Option<&dyn Pipeline>`), so at most one
//! pipeline is in effect per draw call.
//!
//! [`CameraPipeline`] is a small cgmath-backed implementation: a look-at view
//! matrix and a perspective or orthographic frustum.

use cgmath::{Deg, InnerSpace, Matrix4, Point3, SquareMatrix, Vector3};

/// Which transform stack an operation targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    ModelView,
    Projection,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

/// Viewport rectangle in window pixels, origin bottom-left.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Clip volume, in the `glFrustum`/`glOrtho` parameterisation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frustum {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl Frustum {
    /// Symmetric perspective frustum for a vertical field of view.
    pub fn perspective(fovy: Deg<f32>, aspect: f32, near: f32, far: f32) -> Self {
        let top = near * (cgmath::Rad::from(fovy).0 / 2.0).tan();
        let right = top * aspect;
        Self {
            left: -right,
            right,
            bottom: -top,
            top,
            near,
            far,
        }
    }

    pub fn to_matrix(&self, projection: ProjectionType) -> Matrix4<f32> {
        match projection {
            ProjectionType::Perspective => cgmath::frustum(
                self.left,
                self.right,
                self.bottom,
                self.top,
                self.near,
                self.far,
            ),
            ProjectionType::Orthographic => cgmath::ortho(
                self.left,
                self.right,
                self.bottom,
                self.top,
                self.near,
                self.far,
            ),
        }
    }
}

/// Source of camera transforms and view parameters.
pub trait Pipeline {
    fn viewport_info(&self) -> Viewport;

    fn frustum_info(&self) -> Frustum;

    fn projection_type(&self) -> ProjectionType;

    /// Current matrix of the given stack.
    fn matrix(&self, mode: MatrixMode) -> Matrix4<f32>;
}

/// Flatten a matrix into the column-major layout the device consumes.
pub fn column_major(matrix: &Matrix4<f32>) -> [f32; 16] {
    let columns: [[f32; 4]; 4] = (*matrix).into();
    let mut out = [0.0; 16];
    for (chunk, column) in out.chunks_exact_mut(4).zip(columns) {
        chunk.copy_from_slice(&column);
    }
    out
}

/// A free camera: eye position plus yaw/pitch, looking down -Z at rest.
#[derive(Clone, Debug)]
pub struct CameraPipeline {
    pub position: Point3<f32>,
    pub yaw: Deg<f32>,
    pub pitch: Deg<f32>,
    pub fovy: Deg<f32>,
    pub near: f32,
    pub far: f32,
    pub projection: ProjectionType,
    /// Half height of the view volume when orthographic.
    pub ortho_half_height: f32,
    /// Extra transform applied after the view, e.g. to place a model.
    pub model: Matrix4<f32>,
    viewport: Viewport,
}

impl CameraPipeline {
    pub fn new(position: impl Into<Point3<f32>>, yaw: Deg<f32>, pitch: Deg<f32>) -> Self {
        Self {
            position: position.into(),
            yaw,
            pitch,
            fovy: Deg(45.0),
            near: 0.1,
            far: 10_000.0,
            projection: ProjectionType::Perspective,
            ortho_half_height: 10.0,
            model: Matrix4::identity(),
            viewport: Viewport {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.width = width.max(1) as f32;
        self.viewport.height = height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.width / self.viewport.height
    }

    /// Unit vector the camera looks along.
    pub fn forward(&self) -> Vector3<f32> {
        let (sin_pitch, cos_pitch) = cgmath::Rad::from(self.pitch).0.sin_cos();
        let (sin_yaw, cos_yaw) = cgmath::Rad::from(self.yaw).0.sin_cos();
        Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw).normalize()
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y())
    }
}

impl Pipeline for CameraPipeline {
    fn viewport_info(&self) -> Viewport {
        self.viewport
    }

    fn frustum_info(&self) -> Frustum {
        match self.projection {
            ProjectionType::Perspective => {
                Frustum::perspective(self.fovy, self.aspect(), self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let top = self.ortho_half_height;
                let right = top * self.aspect();
                Frustum {
                    left: -right,
                    right,
                    bottom: -top,
                    top,
                    near: self.near,
                    far: self.far,
                }
            }
        }
    }

    fn projection_type(&self) -> ProjectionType {
        self.projection
    }

    fn matrix(&self, mode: MatrixMode) -> Matrix4<f32> {
        match mode {
            MatrixMode::ModelView => self.view_matrix() * self.model,
            MatrixMode::Projection => self.frustum_info().to_matrix(self.projection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_major_keeps_translation_last() {
        let m = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let flat = column_major(&m);
        assert_eq!(&flat[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(flat[15], 1.0);
    }

    #[test]
    fn symmetric_perspective_frustum() {
        let f = Frustum::perspective(Deg(90.0), 2.0, 1.0, 100.0);
        assert!((f.top - 1.0).abs() < 1e-5);
        assert!((f.right - 2.0).abs() < 1e-5);
        assert_eq!(f.left, -f.right);
        assert_eq!(f.bottom, -f.top);
    }

    #[test]
    fn orthographic_frustum_follows_aspect() {
        let mut camera = CameraPipeline::new((0.0, 0.0, 5.0), Deg(-90.0), Deg(0.0));
        camera.projection = ProjectionType::Orthographic;
        camera.ortho_half_height = 2.0;
        camera.resize(400, 200);
        let f = camera.frustum_info();
        assert_eq!(f.top, 2.0);
        assert_eq!(f.right, 4.0);
        assert_eq!(camera.viewport_info().width, 400.0);
    }

    #[test]
    fn camera_at_rest_looks_down_negative_z() {
        let camera = CameraPipeline::new((0.0, 0.0, 5.0), Deg(-90.0), Deg(0.0));
        let forward = camera.forward();
        assert!(forward.x.abs() < 1e-5);
        assert!((forward.z + 1.0).abs() < 1e-5);
    }
}
