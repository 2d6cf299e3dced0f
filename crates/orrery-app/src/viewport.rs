//! The mounted solar system: one RAII object per window lifetime.
//!
//! Mounting starts the texture decode, composes the scene graph and shows a
//! loading title. Once the barrier resolves, textures are uploaded (failed
//! ones as placeholders), the GPU renderers are built and the animation
//! starts. Dropping the viewport unmounts it: the frame scheduler and loader
//! are cancelled, the animation is disposed and every GPU resource and the
//! surface are released.

use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use orrery_config::{Config, RenderConfig};
use orrery_input::{MouseState, OrbitControls, OrbitSettings};
use orrery_render::{
    BloomConfig, BloomPipeline, Camera, FrameEncoder, RenderContext, RenderContextError,
    SurfaceError, SurfaceSize, TextureError, TextureManager,
};
use orrery_scene::{
    AnimationDriver, BodyRegistry, ComposedScene, Lifecycle, RegistryError, compose,
    resolve_seed,
};
use orrery_space::{SpaceError, SpaceRenderer};
use tracing::{debug, info, warn};

use crate::frame_loop::{FrameClock, FrameScheduler, RedrawTarget};
use crate::texture_loader::{LoadStatus, TextureLoadBarrier, TextureSet, texture_requests};

/// Frames between frame-rate log lines when `debug.show_fps` is set.
const FPS_LOG_INTERVAL: u64 = 300;

/// The window the viewport draws into.
pub trait HostWindow: RedrawTarget {
    fn set_title(&self, title: &str);
}

impl HostWindow for winit::window::Window {
    fn set_title(&self, title: &str) {
        winit::window::Window::set_title(self, title);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ViewportError {
    #[error("body table: {0}")]
    Registry(#[from] RegistryError),
    #[error("GPU initialization failed: {0}")]
    RenderContext(#[from] RenderContextError),
    #[error("scene renderer: {0}")]
    Scene(#[from] SpaceError),
    #[error("texture upload: {0}")]
    Texture(#[from] TextureError),
    #[error("surface: {0}")]
    Surface(#[from] SurfaceError),
}

pub fn loading_title(base: &str, loaded: usize, total: usize) -> String {
    format!("Welcome to the {base} (loading {loaded}/{total})")
}

/// Window title once running, naming placeholder textures if any.
pub fn running_title(base: &str, degraded: usize) -> String {
    match degraded {
        0 => base.to_string(),
        1 => format!("{base} (1 texture missing)"),
        n => format!("{base} ({n} textures missing)"),
    }
}

fn bloom_config(render: &RenderConfig) -> BloomConfig {
    let bloom = &render.bloom;
    BloomConfig {
        enabled: bloom.enabled,
        threshold: bloom.threshold,
        soft_knee: bloom.soft_knee,
        strength: bloom.strength,
        radius: bloom.radius,
        iterations: bloom.iterations,
        exposure: render.exposure,
    }
}

fn initial_camera(config: &Config, size: &SurfaceSize) -> (Camera, OrbitControls) {
    let cam = &config.camera;
    let mut camera = Camera::new(
        Vec3::from_array(cam.position),
        Vec3::from_array(cam.target),
        cam.fov_y_degrees,
        cam.near,
        cam.far,
    );
    camera.set_aspect_ratio(size.width() as f32, size.height() as f32);
    let controls = OrbitControls::new(
        &camera,
        OrbitSettings {
            damping: cam.damping,
            min_distance: cam.min_distance,
            max_distance: cam.max_distance,
            rotate_speed: cam.rotate_speed,
            zoom_speed: cam.zoom_speed,
        },
    );
    (camera, controls)
}

/// A mounted solar system scene bound to one host window.
pub struct Viewport {
    host: Arc<dyn HostWindow>,
    config: Config,
    /// Present when drawing to a window surface.
    context: Option<RenderContext>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_size: SurfaceSize,
    camera: Camera,
    controls: OrbitControls,
    mouse: MouseState,
    scheduler: FrameScheduler,
    clock: FrameClock,
    loader: TextureLoadBarrier,
    last_loaded: Option<usize>,
    textures: TextureManager,
    scene: ComposedScene,
    driver: AnimationDriver,
    renderer: Option<SpaceRenderer>,
    bloom: Option<BloomPipeline>,
    degraded: usize,
    mounted: bool,
    fps_window: (Instant, u64),
}

impl Viewport {
    /// Mount onto a window surface.
    pub fn mount(
        host: Arc<dyn HostWindow>,
        context: RenderContext,
        scale_factor: f64,
        config: Config,
    ) -> Result<Self, ViewportError> {
        let (width, height) = context.size();
        let device = context.device.clone();
        let queue = context.queue.clone();
        let format = context.surface_format;
        Self::mount_with(
            host,
            Some(context),
            device,
            queue,
            format,
            SurfaceSize::new(width, height, scale_factor),
            config,
        )
    }

    /// Mount without a window surface. Frames render into the HDR target
    /// only; bloom and presentation are skipped.
    pub fn mount_headless(
        host: Arc<dyn HostWindow>,
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: Config,
    ) -> Result<Self, ViewportError> {
        Self::mount_with(
            host,
            None,
            device,
            queue,
            format,
            SurfaceSize::new(width, height, 1.0),
            config,
        )
    }

    fn mount_with(
        host: Arc<dyn HostWindow>,
        context: Option<RenderContext>,
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        surface_size: SurfaceSize,
        config: Config,
    ) -> Result<Self, ViewportError> {
        let registry = BodyRegistry::from_config(&config.scene)?;

        let loader = TextureLoadBarrier::spawn(texture_requests(&config.textures));

        let seed = resolve_seed(config.scene.seed);
        let scene = compose(&registry, &config.scene, seed);
        let mut driver = AnimationDriver::new(config.scene.time_scale);
        driver.mark_scene_built(&scene);
        info!(
            "Scene composed: {} bodies, seed {seed}",
            scene.registry.len()
        );

        let (camera, controls) = initial_camera(&config, &surface_size);
        let bloom = BloomPipeline::new(
            &device,
            format,
            surface_size.width(),
            surface_size.height(),
            bloom_config(&config.render),
        );

        host.set_title(&loading_title(&config.window.title, 0, loader.total()));

        Ok(Self {
            host,
            textures: TextureManager::new(&device),
            context,
            device,
            queue,
            surface_size,
            camera,
            controls,
            mouse: MouseState::new(),
            scheduler: FrameScheduler::new(),
            clock: FrameClock::new(),
            loader,
            last_loaded: None,
            scene,
            driver,
            renderer: None,
            bloom: Some(bloom),
            degraded: 0,
            mounted: true,
            fps_window: (Instant::now(), 0),
            config,
        })
    }

    /// Drive loading forward. Returns `true` while textures are still
    /// outstanding, so the caller keeps polling.
    pub fn poll_loading(&mut self) -> Result<bool, ViewportError> {
        if !self.mounted || self.driver.state() != Lifecycle::Loading {
            return Ok(false);
        }
        match self.loader.poll() {
            LoadStatus::Pending { loaded, total } => {
                if self.last_loaded != Some(loaded) {
                    self.last_loaded = Some(loaded);
                    self.host
                        .set_title(&loading_title(&self.config.window.title, loaded, total));
                }
                Ok(true)
            }
            LoadStatus::Ready(set) => {
                self.finish_loading(&set)?;
                Ok(false)
            }
            LoadStatus::Finished => Ok(false),
        }
    }

    fn finish_loading(&mut self, set: &TextureSet) -> Result<(), ViewportError> {
        self.degraded = set.upload_into(
            &mut self.textures,
            &self.device,
            &self.queue,
            self.config.textures.mipmaps,
        )?;
        if self.degraded > 0 {
            warn!("{} textures replaced by placeholders", self.degraded);
        }

        let renderer = SpaceRenderer::new(
            &self.device,
            &self.scene,
            &self.textures,
            &self.config.render,
            self.surface_size.width(),
            self.surface_size.height(),
        )?;
        self.renderer = Some(renderer);

        self.driver.mark_textures_ready();
        self.clock = FrameClock::new();
        self.fps_window = (Instant::now(), 0);
        self.host
            .set_title(&running_title(&self.config.window.title, self.degraded));
        self.scheduler.request_frame(&*self.host);
        Ok(())
    }

    /// Run one frame in response to a redraw event.
    pub fn on_redraw(&mut self) -> Result<(), ViewportError> {
        if !self.mounted || !self.scheduler.begin_frame() || !self.driver.is_running() {
            return Ok(());
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let tick = self.clock.tick();
        for _ in 0..tick.steps {
            self.driver.step(&mut self.scene);
        }
        self.driver.update(&mut self.scene, tick.elapsed);

        self.controls.handle_mouse(&self.mouse, &self.camera);
        self.mouse.clear_transients();
        self.controls.update(&mut self.camera);

        renderer.prepare(&self.queue, &self.scene, &self.camera);
        let Some(bloom) = self.bloom.as_ref() else {
            return Ok(());
        };

        match &self.context {
            Some(context) => match context.get_current_texture() {
                Ok(surface_texture) => {
                    let mut frame = FrameEncoder::new(&self.device, &self.queue, surface_texture);
                    if let Some((encoder, surface_view)) = frame.encoder_and_view() {
                        renderer.render(encoder, bloom.hdr_view());
                        bloom.execute(encoder, surface_view);
                    }
                    frame.submit();
                }
                Err(SurfaceError::Timeout) => debug!("Surface timeout, skipping frame"),
                Err(SurfaceError::Lost) => warn!("Surface lost, skipping frame"),
                Err(err @ SurfaceError::OutOfMemory) => return Err(err.into()),
            },
            None => {
                let mut encoder =
                    self.device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("headless-frame"),
                        });
                renderer.render(&mut encoder, bloom.hdr_view());
                self.queue.submit([encoder.finish()]);
            }
        }

        if self.config.debug.show_fps {
            self.log_fps();
        }
        self.scheduler.request_frame(&*self.host);
        Ok(())
    }

    fn log_fps(&mut self) {
        let (since, frames) = &mut self.fps_window;
        *frames += 1;
        if *frames >= FPS_LOG_INTERVAL {
            let seconds = since.elapsed().as_secs_f64();
            if seconds > 0.0 {
                info!("{:.1} fps", *frames as f64 / seconds);
            }
            self.fps_window = (Instant::now(), 0);
        }
    }

    /// Handle a window resize. Ignored once unmounted.
    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.mounted {
            return;
        }
        if let Some(event) = self.surface_size.handle_resize(width, height) {
            self.apply_size(event.physical.width, event.physical.height);
        }
    }

    /// Handle a DPI change together with the new inner size.
    pub fn rescale(&mut self, scale_factor: f64, width: u32, height: u32) {
        if !self.mounted {
            return;
        }
        if let Some(event) =
            self.surface_size
                .handle_scale_factor_changed(scale_factor, width, height)
        {
            self.apply_size(event.physical.width, event.physical.height);
        }
    }

    fn apply_size(&mut self, width: u32, height: u32) {
        self.camera.set_aspect_ratio(width as f32, height as f32);
        if let Some(context) = &mut self.context {
            context.resize(width, height);
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(&self.device, width, height);
        }
        if let Some(bloom) = &mut self.bloom {
            bloom.resize(&self.device, width, height);
        }
        debug!(width, height, "Viewport resized");
        if self.driver.is_running() {
            self.scheduler.request_frame(&*self.host);
        }
    }

    /// Tear down. Safe to call more than once.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.scheduler.cancel();
        self.loader.cancel();
        self.driver.dispose();
        self.renderer = None;
        self.bloom = None;
        self.textures.clear();
        self.context = None;
        info!(
            "Viewport unmounted after {} frames",
            self.clock.frame_count()
        );
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.driver.state()
    }

    pub fn mouse_mut(&mut self) -> &mut MouseState {
        &mut self.mouse
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> &ComposedScene {
        &self.scene
    }

    pub fn surface_size(&self) -> (u32, u32) {
        match &self.context {
            Some(context) => context.size(),
            None => (self.surface_size.width(), self.surface_size.height()),
        }
    }

    pub fn depth_size(&self) -> Option<(u32, u32)> {
        self.renderer.as_ref().map(SpaceRenderer::depth_size)
    }

    pub fn bloom_size(&self) -> Option<(u32, u32)> {
        self.bloom.as_ref().map(BloomPipeline::size)
    }

    /// Textures drawn with the placeholder.
    pub fn degraded(&self) -> usize {
        self.degraded
    }
}

impl Drop for Viewport {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use std::time::Duration;

    use orrery_render::HDR_FORMAT;
    use orrery_scene::TextureKey;

    #[derive(Default)]
    struct FakeHost {
        title: RefCell<String>,
        redraws: Cell<u32>,
    }

    impl RedrawTarget for FakeHost {
        fn request_redraw(&self) {
            self.redraws.set(self.redraws.get() + 1);
        }
    }

    impl HostWindow for FakeHost {
        fn set_title(&self, title: &str) {
            *self.title.borrow_mut() = title.to_string();
        }
    }

    fn small_config(asset_dir: &Path) -> Config {
        let mut config = Config::default();
        config.textures.asset_dir = asset_dir.to_path_buf();
        config.textures.mipmaps = false;
        config.scene.seed = Some(7);
        config.scene.asteroid_belt.count = 16;
        config.scene.planet_ring.count = 16;
        config.scene.starfield.count = 16;
        config.render.shadows.resolution = 64;
        config
    }

    fn mount(host: &Arc<FakeHost>, config: Config, width: u32, height: u32) -> Option<Viewport> {
        let (device, queue) = orrery_render::request_headless_device()?;
        let host: Arc<dyn HostWindow> = host.clone();
        Some(
            Viewport::mount_headless(host, device, queue, HDR_FORMAT, width, height, config)
                .unwrap(),
        )
    }

    fn finish_loading(viewport: &mut Viewport) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while viewport.poll_loading().unwrap() {
            assert!(Instant::now() < deadline, "textures never resolved");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_titles() {
        assert_eq!(
            loading_title("Solar System", 3, 12),
            "Welcome to the Solar System (loading 3/12)"
        );
        assert_eq!(running_title("Solar System", 0), "Solar System");
        assert_eq!(running_title("Solar System", 1), "Solar System (1 texture missing)");
        assert_eq!(running_title("Solar System", 4), "Solar System (4 textures missing)");
    }

    #[test]
    fn test_bloom_config_carries_exposure() {
        let mut render = RenderConfig::default();
        render.exposure = 2.0;
        render.bloom.iterations = 3;
        let bloom = bloom_config(&render);
        assert_eq!(bloom.exposure, 2.0);
        assert_eq!(bloom.iterations, 3);
    }

    #[test]
    fn test_unmount_before_textures_resolve() {
        let tmp = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::default());
        let Some(mut viewport) = mount(&host, small_config(tmp.path()), 64, 48) else {
            return;
        };
        assert!(host.title.borrow().starts_with("Welcome to the Solar System (loading 0/"));
        assert_eq!(viewport.lifecycle(), Lifecycle::Loading);

        viewport.unmount();
        assert!(!viewport.is_mounted());
        assert_eq!(viewport.lifecycle(), Lifecycle::Disposed);

        // Whatever the loader finished in the meantime is discarded.
        std::thread::sleep(Duration::from_millis(20));
        assert!(!viewport.poll_loading().unwrap());
        viewport.on_redraw().unwrap();
        assert_eq!(host.redraws.get(), 0);
        assert!(viewport.depth_size().is_none());

        viewport.unmount();
        drop(viewport);
        assert_eq!(host.redraws.get(), 0);
    }

    #[test]
    fn test_missing_assets_degrade_to_placeholders() {
        let tmp = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::default());
        let Some(mut viewport) = mount(&host, small_config(tmp.path()), 64, 48) else {
            return;
        };
        finish_loading(&mut viewport);

        assert_eq!(viewport.lifecycle(), Lifecycle::Running);
        assert_eq!(viewport.degraded(), TextureKey::ALL.len());
        assert_eq!(
            *host.title.borrow(),
            format!("Solar System ({} textures missing)", TextureKey::ALL.len())
        );
        assert_eq!(host.redraws.get(), 1);

        viewport.on_redraw().unwrap();
        assert_eq!(host.redraws.get(), 2);
    }

    #[test]
    fn test_resize_updates_every_target() {
        let tmp = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::default());
        let Some(mut viewport) = mount(&host, small_config(tmp.path()), 800, 600) else {
            return;
        };
        finish_loading(&mut viewport);
        assert_eq!(viewport.depth_size(), Some((800, 600)));

        viewport.resize(1920, 1080);
        assert!((viewport.camera().aspect_ratio - 1920.0 / 1080.0).abs() < 1e-6);
        assert_eq!(viewport.surface_size(), (1920, 1080));
        assert_eq!(viewport.depth_size(), Some((1920, 1080)));
        assert_eq!(viewport.bloom_size(), Some((1920, 1080)));
    }

    #[test]
    fn test_resize_ignored_after_unmount() {
        let tmp = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::default());
        let Some(mut viewport) = mount(&host, small_config(tmp.path()), 800, 600) else {
            return;
        };
        viewport.unmount();
        let aspect = viewport.camera().aspect_ratio;
        viewport.resize(1920, 1080);
        assert_eq!(viewport.camera().aspect_ratio, aspect);
        assert_eq!(viewport.surface_size(), (800, 600));
    }

    #[test]
    fn test_bad_body_table_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = small_config(tmp.path());
        config.scene.bodies_file = Some(tmp.path().join("missing.ron"));
        let Some((device, queue)) = orrery_render::request_headless_device() else {
            return;
        };
        let host: Arc<dyn HostWindow> = Arc::new(FakeHost::default());
        let result = Viewport::mount_headless(host, device, queue, HDR_FORMAT, 8, 8, config);
        assert!(matches!(result, Err(ViewportError::Registry(_))));
    }
}
