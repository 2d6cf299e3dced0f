//! Inside-out textured sky sphere that follows the camera.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use orrery_render::{
    BufferAllocator, DepthBuffer, ManagedTexture, MeshBuffer, TextureManager,
    VertexPositionNormalUv,
};
use orrery_scene::TextureKey;

use crate::SpaceError;
use crate::globals::{CAMERA_WGSL, ScenePipelineDesc, UniformBinding, uniform_layout};
use crate::mesh;

const SKY_WIDTH_SEGMENTS: u32 = 60;
const SKY_HEIGHT_SEGMENTS: u32 = 40;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SkyParams {
    /// rgb = color multiplier.
    pub tint: [f32; 4],
}

impl SkyParams {
    pub fn new(tint: f32) -> Self {
        Self {
            tint: [tint, tint, tint, 1.0],
        }
    }
}

const SKYBOX_WGSL: &str = r#"
struct SkyParams {
    tint: vec4<f32>,
};

@group(1) @binding(0)
var sky_texture: texture_2d<f32>;
@group(1) @binding(1)
var sky_sampler: sampler;
@group(2) @binding(0)
var<uniform> sky: SkyParams;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.sky_view_proj * vec4<f32>(in.position, 1.0);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(sky_texture, sky_sampler, in.uv).rgb;
    return vec4<f32>(color * sky.tint.rgb, 1.0);
}
"#;

pub(crate) fn skybox_shader_source() -> String {
    format!("{CAMERA_WGSL}{SKYBOX_WGSL}")
}

/// Background sphere drawn before everything else without touching depth.
pub struct SkyboxRenderer {
    pipeline: wgpu::RenderPipeline,
    mesh: MeshBuffer,
    texture: Arc<ManagedTexture>,
    params: UniformBinding,
}

impl SkyboxRenderer {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        textures: &TextureManager,
        radius: f32,
        tint: f32,
    ) -> Result<Self, SpaceError> {
        let texture = textures
            .get(TextureKey::Stars.name())
            .ok_or(SpaceError::MissingTexture(TextureKey::Stars))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("skybox-shader"),
            source: wgpu::ShaderSource::Wgsl(skybox_shader_source().into()),
        });
        let params_layout = uniform_layout(
            device,
            "skybox-params-bgl",
            wgpu::ShaderStages::FRAGMENT,
            std::mem::size_of::<SkyParams>() as u64,
        );

        let pipeline = ScenePipelineDesc {
            label: "skybox-pipeline",
            shader: &shader,
            bind_group_layouts: &[camera_layout, textures.bind_group_layout(), &params_layout],
            vertex_buffers: &[VertexPositionNormalUv::layout()],
            // Seen from inside, the outward faces are the ones to drop.
            cull_mode: Some(wgpu::Face::Front),
            depth: wgpu::DepthStencilState {
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                ..DepthBuffer::opaque_state()
            },
            blend: None,
        }
        .build(device);

        let mesh = mesh::uv_sphere(radius, SKY_WIDTH_SEGMENTS, SKY_HEIGHT_SEGMENTS)
            .upload(&BufferAllocator::new(device), "skybox");

        Ok(Self {
            pipeline,
            mesh,
            texture,
            params: UniformBinding::new(device, &params_layout, "skybox-params", &SkyParams::new(tint)),
        })
    }

    pub fn set_tint(&self, queue: &wgpu::Queue, tint: f32) {
        self.params.write(queue, &SkyParams::new(tint));
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, camera: &wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, &self.texture.bind_group, &[]);
        pass.set_bind_group(2, &self.params.bind_group, &[]);
        self.mesh.bind(pass);
        self.mesh.draw(pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tint_is_grey() {
        assert_eq!(SkyParams::new(0.3).tint, [0.3, 0.3, 0.3, 1.0]);
    }

    #[test]
    fn test_missing_stars_texture_is_reported() {
        let Some((device, _queue)) = orrery_render::request_headless_device() else {
            return;
        };
        let textures = TextureManager::new(&device);
        let globals_layout = uniform_layout(
            &device,
            "test-camera-bgl",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
            std::mem::size_of::<orrery_render::CameraUniform>() as u64,
        );
        let result = SkyboxRenderer::new(&device, &globals_layout, &textures, 500.0, 0.3);
        assert!(matches!(result, Err(SpaceError::MissingTexture(TextureKey::Stars))));
    }

    #[test]
    fn test_shader_parses() {
        let Some((device, _queue)) = orrery_render::request_headless_device() else {
            return;
        };
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("skybox-shader-test"),
            source: wgpu::ShaderSource::Wgsl(skybox_shader_source().into()),
        });
    }
}
