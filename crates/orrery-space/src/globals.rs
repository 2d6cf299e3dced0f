//! Bind groups shared by every scene pipeline: the camera at group 0 and the
//! lights plus shadow map at group 1 of lit pipelines.

use std::num::NonZeroU64;

use bytemuck::Pod;
use orrery_lighting::{LIGHTING_WGSL, LightUniform, PointShadowMaps, ShadowUniform};
use orrery_render::{BufferAllocator, Camera, CameraUniform, DepthBuffer, HDR_FORMAT};

/// Camera declarations for `@group(0)`.
pub const CAMERA_WGSL: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
    sky_view_proj: mat4x4<f32>,
    position: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> camera: Camera;
"#;

/// Light and shadow declarations for `@group(1)` of lit pipelines.
const SHADOW_WGSL: &str = r#"
struct Shadow {
    face_view_proj: array<mat4x4<f32>, 6>,
    light_position: vec4<f32>,
    params: vec4<f32>,
};

@group(1) @binding(0)
var<uniform> lights: Lights;
@group(1) @binding(1)
var<uniform> shadow: Shadow;
@group(1) @binding(2)
var shadow_map: texture_depth_2d_array;
@group(1) @binding(3)
var shadow_sampler: sampler_comparison;

fn shadow_face(dir: vec3<f32>) -> i32 {
    let a = abs(dir);
    if (a.x >= a.y && a.x >= a.z) {
        return select(1, 0, dir.x >= 0.0);
    }
    if (a.y >= a.z) {
        return select(3, 2, dir.y >= 0.0);
    }
    return select(5, 4, dir.z >= 0.0);
}

// 1 when lit, 0 when occluded.
fn shadow_visibility(world_pos: vec3<f32>, normal: vec3<f32>) -> f32 {
    let biased = world_pos + normal * shadow.params.y;
    let face = shadow_face(biased - shadow.light_position.xyz);
    let clip = shadow.face_view_proj[face] * vec4<f32>(biased, 1.0);
    let ndc = clip.xyz / clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    return textureSampleCompareLevel(shadow_map, shadow_sampler, uv, face, ndc.z - shadow.params.x);
}

fn sun_radiance(world_pos: vec3<f32>) -> vec3<f32> {
    let d = distance(world_pos, lights.sun_position_distance.xyz);
    let falloff = point_attenuation(d, lights.sun_position_distance.w, lights.sun_color_decay.w);
    return lights.sun_color_decay.rgb * falloff;
}
"#;

/// WGSL prelude for lit pipelines: camera, lights and shadow sampling.
pub fn lit_prelude() -> String {
    format!("{CAMERA_WGSL}{LIGHTING_WGSL}{SHADOW_WGSL}")
}

/// Layout of a single uniform buffer at binding 0.
pub(crate) fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
    size: u64,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(size),
            },
            count: None,
        }],
    })
}

/// A uniform buffer together with its bind group.
pub(crate) struct UniformBinding {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl UniformBinding {
    pub fn new<T: Pod>(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &str,
        value: &T,
    ) -> Self {
        let buffer = BufferAllocator::new(device).create_uniform_buffer(label, value);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }

    pub fn write<T: Pod>(&self, queue: &wgpu::Queue, value: &T) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(value));
    }
}

/// Fixed-function state of a scene pipeline drawing into the HDR target.
pub(crate) struct ScenePipelineDesc<'a> {
    pub label: &'a str,
    pub shader: &'a wgpu::ShaderModule,
    pub bind_group_layouts: &'a [&'a wgpu::BindGroupLayout],
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub cull_mode: Option<wgpu::Face>,
    pub depth: wgpu::DepthStencilState,
    pub blend: Option<wgpu::BlendState>,
}

impl ScenePipelineDesc<'_> {
    /// Build with entry points `vs_main` and `fs_main`.
    pub fn build(&self, device: &wgpu::Device) -> wgpu::RenderPipeline {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}-layout", self.label)),
            bind_group_layouts: self.bind_group_layouts,
            immediate_size: 0,
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: self.shader,
                entry_point: Some("vs_main"),
                buffers: self.vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: self.cull_mode,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(self.depth.clone()),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: self.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview_mask: None,
            cache: None,
        })
    }
}

/// Depth state for transparent geometry: tested, not written.
pub(crate) fn transparent_depth() -> wgpu::DepthStencilState {
    DepthBuffer::read_only_state()
}

/// Camera, light and shadow bindings shared by all scene renderers.
pub struct SceneGlobals {
    pub camera_layout: wgpu::BindGroupLayout,
    pub lighting_layout: wgpu::BindGroupLayout,
    camera: UniformBinding,
    light_buffer: wgpu::Buffer,
    shadow_buffer: wgpu::Buffer,
    lighting_bind_group: wgpu::BindGroup,
}

impl SceneGlobals {
    pub fn new(device: &wgpu::Device, shadow_maps: &PointShadowMaps) -> Self {
        let camera_layout = uniform_layout(
            device,
            "scene-camera-bgl",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
            std::mem::size_of::<CameraUniform>() as u64,
        );
        let camera = UniformBinding::new(
            device,
            &camera_layout,
            "scene-camera",
            &Camera::default().to_uniform(),
        );

        let lighting_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene-lighting-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<LightUniform>() as u64
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<ShadowUniform>() as u64
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let allocator = BufferAllocator::new(device);
        let light_buffer = allocator.create_uniform_buffer(
            "scene-lights",
            &LightUniform::new(&Default::default(), &Default::default(), false),
        );
        let shadow_buffer =
            allocator.create_uniform_buffer("scene-shadow", &shadow_maps.to_uniform());

        let lighting_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene-lighting"),
            layout: &lighting_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: shadow_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&shadow_maps.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&shadow_maps.sampler),
                },
            ],
        });

        Self {
            camera_layout,
            lighting_layout,
            camera,
            light_buffer,
            shadow_buffer,
            lighting_bind_group,
        }
    }

    pub fn update(
        &self,
        queue: &wgpu::Queue,
        camera: &Camera,
        lights: &LightUniform,
        shadow: &ShadowUniform,
    ) {
        self.camera.write(queue, &camera.to_uniform());
        queue.write_buffer(&self.light_buffer, 0, bytemuck::bytes_of(lights));
        queue.write_buffer(&self.shadow_buffer, 0, bytemuck::bytes_of(shadow));
    }

    pub fn camera_bind_group(&self) -> &wgpu::BindGroup {
        &self.camera.bind_group
    }

    pub fn lighting_bind_group(&self) -> &wgpu::BindGroup {
        &self.lighting_bind_group
    }
}
