//! Depth-only pass rendering shadow-casting bodies into the sun's six cube
//! faces.

use glam::Mat4;
use orrery_lighting::{CUBE_FACE_COUNT, PointShadowMaps};
use orrery_render::{DepthBuffer, VertexPositionNormalUv};

use crate::body::BodyRenderer;
use crate::globals::{UniformBinding, uniform_layout};

const SHADOW_CASTER_WGSL: &str = r#"
struct Face {
    view_proj: mat4x4<f32>,
};

struct Object {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    emissive: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> face: Face;
@group(1) @binding(0)
var<uniform> object: Object;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_shadow(in: VertexInput) -> @builtin(position) vec4<f32> {
    return face.view_proj * object.model * vec4<f32>(in.position, 1.0);
}
"#;

/// Renders casters into each face of a [`PointShadowMaps`].
pub struct ShadowCasterPass {
    pipeline: wgpu::RenderPipeline,
    faces: Vec<UniformBinding>,
}

impl ShadowCasterPass {
    pub fn new(device: &wgpu::Device, bodies: &BodyRenderer) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow-caster-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADOW_CASTER_WGSL.into()),
        });

        let face_layout = uniform_layout(
            device,
            "shadow-face-bgl",
            wgpu::ShaderStages::VERTEX,
            std::mem::size_of::<[[f32; 4]; 4]>() as u64,
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow-caster-pipeline-layout"),
            bind_group_layouts: &[&face_layout, &bodies.object_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow-caster-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_shadow"),
                buffers: &[VertexPositionNormalUv::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Front),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(PointShadowMaps::caster_depth_state()),
            multisample: wgpu::MultisampleState::default(),
            fragment: None,
            multiview_mask: None,
            cache: None,
        });

        let faces = (0..CUBE_FACE_COUNT)
            .map(|i| {
                UniformBinding::new(
                    device,
                    &face_layout,
                    &format!("shadow-face-{i}"),
                    &Mat4::IDENTITY.to_cols_array_2d(),
                )
            })
            .collect();

        Self { pipeline, faces }
    }

    /// Upload the current face matrices.
    pub fn prepare(&self, queue: &wgpu::Queue, maps: &PointShadowMaps) {
        for (i, face) in self.faces.iter().enumerate() {
            face.write(queue, &maps.face_matrix(i).to_cols_array_2d());
        }
    }

    /// One depth pass per cube face.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        maps: &PointShadowMaps,
        bodies: &BodyRenderer,
    ) {
        for (face, view) in self.faces.iter().zip(&maps.face_views) {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow-caster-pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(DepthBuffer::CLEAR_VALUE),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &face.bind_group, &[]);
            for draw in bodies.draws.iter().filter(|draw| draw.casts_shadow) {
                pass.set_bind_group(1, &draw.object.bind_group, &[]);
                draw.mesh.bind(&mut pass);
                draw.mesh.draw(&mut pass);
            }
        }
    }
}
