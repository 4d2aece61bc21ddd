//! Opens a window and draws an OBJ model above the ground grid.
//!
//! Usage: `viewer [model.obj]`. Escape or closing the window quits.

use std::{path::PathBuf, sync::Arc};

use fixed_ngin::{
    CameraPipeline, FrameController, FrameTimer, Model, RendererConfig, WgpuDevice,
    cgmath::{Deg, Matrix4},
    flow::WindowTitleSink,
    resources::load_model_obj,
    winit::{
        application::ApplicationHandler,
        event::{ElementState, KeyEvent, WindowEvent},
        event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
        keyboard::{KeyCode, PhysicalKey},
        window::{Window, WindowId},
    },
};

struct Session {
    window: Arc<Window>,
    frame: FrameController<WgpuDevice>,
    camera: CameraPipeline,
    model: Model,
    timer: FrameTimer,
    title: WindowTitleSink,
    spin: f32,
}

impl Session {
    fn render(&mut self) {
        let stats = self.timer.tick();
        self.spin = (self.spin + 20.0 * stats.frame_time.as_secs_f32()) % 360.0;
        self.camera.model = Matrix4::from_angle_y(Deg(self.spin));

        self.frame.update_viewport(&self.camera);
        self.frame.update_projection(&self.camera);
        self.frame.pre_update();
        self.frame.draw_grid(Some(&self.camera));
        self.frame.draw_model(&self.model, Some(&self.camera));
        self.frame.post_update(&stats, &mut self.title);
    }
}

struct Viewer {
    runtime: tokio::runtime::Runtime,
    config: RendererConfig,
    model_path: Option<PathBuf>,
    session: Option<Session>,
}

impl Viewer {
    fn start(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<Session> {
        let attributes = Window::default_attributes().with_title(self.config.title.clone());
        let window = Arc::new(event_loop.create_window(attributes)?);

        let mut device = self.runtime.block_on(WgpuDevice::new(window.clone()))?;
        device.set_headlight(self.config.headlight);
        let mut frame = FrameController::new(device, self.config.clone());
        frame.initialize()?;

        let model = match &self.model_path {
            Some(path) => load_model_obj(path)?,
            None => Model::new("empty"),
        };
        let report = frame.load_model_textures(&model);
        log::info!(
            "{} textures loaded, {} failed",
            report.loaded.len(),
            report.failed.len()
        );

        let size = window.inner_size();
        let mut camera = CameraPipeline::new((0.0, 8.0, 25.0), Deg(-90.0), Deg(-15.0));
        camera.resize(size.width, size.height);
        let title = WindowTitleSink::new(window.clone(), self.config.title.clone());

        Ok(Session {
            window,
            frame,
            camera,
            model,
            timer: FrameTimer::new(),
            title,
            spin: 0.0,
        })
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(session) => {
                session.window.request_redraw();
                self.session = Some(session);
            }
            Err(e) => {
                log::error!("cannot start viewer: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(session) = &mut self.session else {
            return;
        };
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                session.frame.cleanup();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                session.frame.resize(size.width, size.height);
                session.camera.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                session.render();
                session.window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut viewer = Viewer {
        runtime: tokio::runtime::Runtime::new()?,
        config: RendererConfig {
            title: "viewer".to_string(),
            headlight: true,
            ..Default::default()
        },
        model_path: std::env::args_os().nth(1).map(PathBuf::from),
        session: None,
    };
    event_loop.run_app(&mut viewer)?;
    Ok(())
}
