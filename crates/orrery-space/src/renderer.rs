//! Frame orchestration for the composed scene.
//!
//! Each frame: shadow casters into the sun's cube faces, then one HDR pass
//! drawing sky, opaque bodies and fields, translucent annuli and finally the
//! stars. Bloom and tone mapping run afterwards on the HDR target.

use glam::Vec3;
use orrery_config::RenderConfig;
use orrery_lighting::{AmbientLight, LightUniform, PointLight, PointShadowMaps, ShadowSettings};
use orrery_render::{Camera, DepthBuffer, RenderPassBuilder, TextureManager};
use orrery_scene::{ComposedScene, NodeKind};

use crate::SpaceError;
use crate::annulus::AnnulusRenderer;
use crate::body::BodyRenderer;
use crate::field::FieldRenderer;
use crate::globals::SceneGlobals;
use crate::shadow::ShadowCasterPass;
use crate::skybox::SkyboxRenderer;
use crate::stars::StarRenderer;

/// Ambient and sun lights of a composed scene, with the sun placed at the
/// world position of its light node.
pub fn scene_lights(scene: &ComposedScene) -> (AmbientLight, PointLight) {
    let config = &scene.lights;
    let ambient = AmbientLight {
        color: Vec3::from_array(config.ambient_color),
        intensity: config.ambient_intensity,
    };

    let mut position = Vec3::ZERO;
    scene.root.visit_world(&mut |node, world| {
        if matches!(node.kind, NodeKind::PointLight) {
            position = world.transform_point3(Vec3::ZERO);
        }
    });
    let sun = PointLight {
        position,
        color: Vec3::from_array(config.sun_color),
        intensity: config.sun_intensity,
        distance: config.sun_distance,
        decay: config.sun_decay,
    };
    (ambient, sun)
}

fn shadow_settings(render: &RenderConfig) -> ShadowSettings {
    ShadowSettings {
        resolution: render.shadows.resolution.max(1),
        bias: render.shadows.bias,
        normal_bias: render.shadows.normal_bias,
        ..ShadowSettings::default()
    }
}

/// Owns every scene renderer and the depth target of the HDR pass.
pub struct SpaceRenderer {
    globals: SceneGlobals,
    shadow_maps: PointShadowMaps,
    shadow_pass: ShadowCasterPass,
    shadows_enabled: bool,
    skybox: SkyboxRenderer,
    bodies: BodyRenderer,
    fields: FieldRenderer,
    annuli: AnnulusRenderer,
    stars: StarRenderer,
    depth: DepthBuffer,
    clear_color: wgpu::Color,
}

impl SpaceRenderer {
    /// Build GPU resources for `scene`. Every texture the scene references
    /// must already be uploaded to `textures`.
    pub fn new(
        device: &wgpu::Device,
        scene: &ComposedScene,
        textures: &TextureManager,
        render: &RenderConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, SpaceError> {
        let shadow_maps = PointShadowMaps::new(device, shadow_settings(render));
        let globals = SceneGlobals::new(device, &shadow_maps);

        let bodies = BodyRenderer::new(device, &globals, textures, scene, render.sphere_segments)?;
        let shadow_pass = ShadowCasterPass::new(device, &bodies);

        let (radius, tint) = scene
            .root
            .children
            .iter()
            .find_map(|node| match node.kind {
                NodeKind::Skybox { radius, tint } => Some((radius, tint)),
                _ => None,
            })
            .unwrap_or((500.0, scene.skybox_tint));
        let skybox = SkyboxRenderer::new(device, &globals.camera_layout, textures, radius, tint)?;

        let fields = FieldRenderer::new(device, &globals, scene);
        let annuli = AnnulusRenderer::new(device, &globals.camera_layout, textures, scene)?;
        let stars = StarRenderer::new(device, &globals.camera_layout, &scene.starfield);

        let [r, g, b] = render.clear_color;
        log::info!(
            "Scene renderer ready: {} bodies, {} field instances, {} stars, shadows {}",
            bodies.draw_count(),
            fields.instance_count(),
            stars.count(),
            if render.shadows.enabled { "on" } else { "off" }
        );

        Ok(Self {
            globals,
            shadow_maps,
            shadow_pass,
            shadows_enabled: render.shadows.enabled,
            skybox,
            bodies,
            fields,
            annuli,
            stars,
            depth: DepthBuffer::new(device, width, height),
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
        })
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth.resize(device, width, height);
    }

    /// Size of the scene depth target.
    pub fn depth_size(&self) -> (u32, u32) {
        (self.depth.width(), self.depth.height())
    }

    pub fn shadows_enabled(&self) -> bool {
        self.shadows_enabled
    }

    /// Upload camera, lights and every node transform for this frame.
    pub fn prepare(&mut self, queue: &wgpu::Queue, scene: &ComposedScene, camera: &Camera) {
        let (ambient, sun) = scene_lights(scene);
        self.shadow_maps.update(sun.position);
        let lights = LightUniform::new(&ambient, &sun, self.shadows_enabled);
        self.globals
            .update(queue, camera, &lights, &self.shadow_maps.to_uniform());

        if self.shadows_enabled {
            self.shadow_pass.prepare(queue, &self.shadow_maps);
        }
        self.bodies.prepare(queue, scene);
        self.fields.prepare(queue, scene);
        self.annuli.prepare(queue, scene);
        self.stars.prepare(
            queue,
            &scene.starfield,
            self.depth.width(),
            self.depth.height(),
        );
    }

    /// Record the shadow and scene passes into `hdr_view`.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, hdr_view: &wgpu::TextureView) {
        if self.shadows_enabled {
            self.shadow_pass
                .render(encoder, &self.shadow_maps, &self.bodies);
        }

        let builder = RenderPassBuilder::new()
            .clear_color(self.clear_color)
            .depth(self.depth.view.clone(), DepthBuffer::CLEAR_VALUE)
            .label("scene-pass");
        let mut pass = builder.begin(encoder, hdr_view);

        let camera = self.globals.camera_bind_group();
        self.skybox.render(&mut pass, camera);
        self.bodies.render(&mut pass, &self.globals);
        self.fields.render(&mut pass, &self.globals);
        self.annuli.render(&mut pass, camera);
        self.stars.render(&mut pass, camera);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_config::SceneConfig;
    use orrery_render::{HDR_FORMAT, RgbaPixels};
    use orrery_scene::{BodyRegistry, TextureKey, compose};

    fn scene() -> ComposedScene {
        let mut config = SceneConfig::default();
        config.asteroid_belt.count = 10;
        config.planet_ring.count = 10;
        config.starfield.count = 10;
        compose(&BodyRegistry::extended(), &config, 3)
    }

    #[test]
    fn test_sun_sits_at_origin() {
        let (ambient, sun) = scene_lights(&scene());
        assert_eq!(sun.position, Vec3::ZERO);
        assert_eq!(sun.intensity, 10.0);
        assert_eq!(sun.decay, 0.6);
        assert_eq!(ambient.intensity, 0.05);
    }

    #[test]
    fn test_shadow_settings_follow_config() {
        let mut render = RenderConfig::default();
        render.shadows.resolution = 0;
        render.shadows.bias = -0.5;
        let settings = shadow_settings(&render);
        assert_eq!(settings.resolution, 1);
        assert_eq!(settings.bias, -0.5);
    }

    #[test]
    fn test_renders_one_frame_with_placeholders() {
        let Some((device, queue)) = orrery_render::request_headless_device() else {
            return;
        };
        let scene = scene();
        let mut textures = TextureManager::new(&device);
        let pixels = RgbaPixels::placeholder(16, 4);
        for key in TextureKey::ALL {
            textures
                .upload(&device, &queue, key.name(), &pixels, false)
                .unwrap();
        }

        let mut renderer =
            SpaceRenderer::new(&device, &scene, &textures, &RenderConfig::default(), 64, 48)
                .unwrap();
        let hdr = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test-hdr"),
            size: wgpu::Extent3d {
                width: 64,
                height: 48,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = hdr.create_view(&wgpu::TextureViewDescriptor::default());

        renderer.prepare(&queue, &scene, &Camera::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("test-frame"),
        });
        renderer.render(&mut encoder, &view);
        queue.submit([encoder.finish()]);
    }

    #[test]
    fn test_missing_body_texture_fails() {
        let Some((device, _queue)) = orrery_render::request_headless_device() else {
            return;
        };
        let textures = TextureManager::new(&device);
        let result =
            SpaceRenderer::new(&device, &scene(), &textures, &RenderConfig::default(), 8, 8);
        assert!(matches!(result, Err(SpaceError::MissingTexture(_))));
    }
}
