//! Flat annuli: translucent orbit guides and textured planet rings.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use orrery_render::{BufferAllocator, ManagedTexture, MeshBuffer, TextureManager, VertexPositionNormalUv};
use orrery_scene::{ComposedScene, NodeKind, NodePath, TextureKey};

use crate::SpaceError;
use crate::globals::{
    CAMERA_WGSL, ScenePipelineDesc, UniformBinding, transparent_depth, uniform_layout,
};
use crate::mesh;

const ANNULUS_SEGMENTS: u32 = 100;
const RING_SEGMENTS: u32 = 128;

/// Model matrix plus a flat color with opacity. 80 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AnnulusUniform {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl AnnulusUniform {
    pub fn new(model: Mat4, color: Vec3, opacity: f32) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.extend(opacity).to_array(),
        }
    }
}

const GUIDE_WGSL: &str = r#"
struct Object {
    model: mat4x4<f32>,
    color: vec4<f32>,
};

@group(1) @binding(0)
var<uniform> object: Object;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.view_proj * object.model * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return object.color;
}
"#;

const RING_WGSL: &str = r#"
struct Object {
    model: mat4x4<f32>,
    color: vec4<f32>,
};

@group(1) @binding(0)
var ring_texture: texture_2d<f32>;
@group(1) @binding(1)
var ring_sampler: sampler;
@group(2) @binding(0)
var<uniform> object: Object;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(2) uv: vec2<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.view_proj * object.model * vec4<f32>(position, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(ring_texture, ring_sampler, in.uv);
    return vec4<f32>(texel.rgb * object.color.rgb, texel.a * object.color.a);
}
"#;

pub(crate) fn guide_shader_source() -> String {
    format!("{CAMERA_WGSL}{GUIDE_WGSL}")
}

pub(crate) fn ring_shader_source() -> String {
    format!("{CAMERA_WGSL}{RING_WGSL}")
}

struct AnnulusDraw {
    path: NodePath,
    mesh: MeshBuffer,
    object: UniformBinding,
    color: Vec3,
    opacity: f32,
}

/// Renders every `OrbitGuide` and `RingAnnulus` node.
pub struct AnnulusRenderer {
    guide_pipeline: wgpu::RenderPipeline,
    ring_pipeline: wgpu::RenderPipeline,
    guides: Vec<AnnulusDraw>,
    rings: Vec<AnnulusDraw>,
    ring_texture: Option<Arc<ManagedTexture>>,
}

impl AnnulusRenderer {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        textures: &TextureManager,
        scene: &ComposedScene,
    ) -> Result<Self, SpaceError> {
        let object_layout = uniform_layout(
            device,
            "annulus-object-bgl",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
            std::mem::size_of::<AnnulusUniform>() as u64,
        );
        let blend = Some(wgpu::BlendState::ALPHA_BLENDING);

        let guide_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("orbit-guide-shader"),
            source: wgpu::ShaderSource::Wgsl(guide_shader_source().into()),
        });
        let guide_pipeline = ScenePipelineDesc {
            label: "orbit-guide-pipeline",
            shader: &guide_shader,
            bind_group_layouts: &[camera_layout, &object_layout],
            vertex_buffers: &[VertexPositionNormalUv::layout()],
            cull_mode: None,
            depth: transparent_depth(),
            blend,
        }
        .build(device);

        let ring_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ring-shader"),
            source: wgpu::ShaderSource::Wgsl(ring_shader_source().into()),
        });
        let ring_pipeline = ScenePipelineDesc {
            label: "ring-pipeline",
            shader: &ring_shader,
            bind_group_layouts: &[camera_layout, textures.bind_group_layout(), &object_layout],
            vertex_buffers: &[VertexPositionNormalUv::layout()],
            cull_mode: None,
            depth: transparent_depth(),
            blend,
        }
        .build(device);

        let allocator = BufferAllocator::new(device);
        let mut guides = Vec::new();
        let mut rings = Vec::new();
        scene.root.visit_paths(&mut |path, node| {
            let (inner, outer, color, opacity, segments, target) = match node.kind {
                NodeKind::OrbitGuide {
                    inner_radius,
                    outer_radius,
                    color,
                    opacity,
                } => (inner_radius, outer_radius, color, opacity, ANNULUS_SEGMENTS, &mut guides),
                NodeKind::RingAnnulus {
                    inner_radius,
                    outer_radius,
                } => (inner_radius, outer_radius, Vec3::ONE, 1.0, RING_SEGMENTS, &mut rings),
                _ => return,
            };
            let model = scene.root.world_matrix(path).unwrap_or(Mat4::IDENTITY);
            target.push(AnnulusDraw {
                path: path.to_vec(),
                mesh: mesh::annulus(inner, outer, segments).upload(&allocator, &node.name),
                object: UniformBinding::new(
                    device,
                    &object_layout,
                    &node.name,
                    &AnnulusUniform::new(model, color, opacity),
                ),
                color,
                opacity,
            });
        });

        let ring_texture = if rings.is_empty() {
            None
        } else {
            Some(
                textures
                    .get(TextureKey::SaturnRing.name())
                    .ok_or(SpaceError::MissingTexture(TextureKey::SaturnRing))?,
            )
        };

        log::debug!(
            "Annulus renderer: {} orbit guides, {} rings",
            guides.len(),
            rings.len()
        );
        Ok(Self {
            guide_pipeline,
            ring_pipeline,
            guides,
            rings,
            ring_texture,
        })
    }

    pub fn guide_count(&self) -> usize {
        self.guides.len()
    }

    pub fn ring_count(&self) -> usize {
        self.rings.len()
    }

    /// Rings ride along with their planet's group.
    pub fn prepare(&self, queue: &wgpu::Queue, scene: &ComposedScene) {
        for draw in self.guides.iter().chain(&self.rings) {
            let model = scene.root.world_matrix(&draw.path).unwrap_or(Mat4::IDENTITY);
            draw.object
                .write(queue, &AnnulusUniform::new(model, draw.color, draw.opacity));
        }
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, camera: &wgpu::BindGroup) {
        if !self.guides.is_empty() {
            pass.set_pipeline(&self.guide_pipeline);
            pass.set_bind_group(0, camera, &[]);
            for draw in &self.guides {
                pass.set_bind_group(1, &draw.object.bind_group, &[]);
                draw.mesh.bind(pass);
                draw.mesh.draw(pass);
            }
        }

        if let Some(texture) = &self.ring_texture {
            pass.set_pipeline(&self.ring_pipeline);
            pass.set_bind_group(0, camera, &[]);
            pass.set_bind_group(1, &texture.bind_group, &[]);
            for draw in &self.rings {
                pass.set_bind_group(2, &draw.object.bind_group, &[]);
                draw.mesh.bind(pass);
                draw.mesh.draw(pass);
            }
        }
    }
}
