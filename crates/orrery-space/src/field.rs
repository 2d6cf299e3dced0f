//! Instanced icosahedra for the asteroid belt and planet ring fields.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use orrery_render::{BufferAllocator, DepthBuffer, MeshBuffer, VertexPositionNormalUv};
use orrery_scene::ComposedScene;

use crate::globals::{ScenePipelineDesc, SceneGlobals, UniformBinding, lit_prelude, uniform_layout};
use crate::mesh;

/// Rock albedo, linear.
const ROCK_COLOR: Vec3 = Vec3::ONE;

/// Field frame and rock color at group 2. 80 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FieldUniform {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl FieldUniform {
    pub fn new(model: Mat4, color: Vec3) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.extend(1.0).to_array(),
        }
    }
}

/// One instance model matrix, bound at locations 3 through 6.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FieldInstanceRaw {
    pub model: [[f32; 4]; 4],
}

impl FieldInstanceRaw {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

const FIELD_WGSL: &str = r#"
struct Field {
    model: mat4x4<f32>,
    color: vec4<f32>,
};

@group(2) @binding(0)
var<uniform> field: Field;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let instance = mat4x4<f32>(in.model_0, in.model_1, in.model_2, in.model_3);
    let model = field.model * instance;
    let world = model * vec4<f32>(in.position, 1.0);

    var out: VertexOutput;
    out.clip_position = camera.view_proj * world;
    out.world_position = world.xyz;
    // Instances are uniformly scaled.
    out.normal = (model * vec4<f32>(in.normal, 0.0)).xyz;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.normal);
    let l = normalize(lights.sun_position_distance.xyz - in.world_position);
    let radiance = sun_radiance(in.world_position);
    let color = field.color.rgb * (lights.ambient.rgb + radiance * max(dot(n, l), 0.0));
    return vec4<f32>(color, 1.0);
}
"#;

pub(crate) fn field_shader_source() -> String {
    format!("{}{FIELD_WGSL}", lit_prelude())
}

struct FieldDraw {
    field: usize,
    mesh: MeshBuffer,
    instances: wgpu::Buffer,
    instance_count: u32,
    object: UniformBinding,
}

/// Renders every particle field of a composed scene with one instanced draw
/// per field.
pub struct FieldRenderer {
    pipeline: wgpu::RenderPipeline,
    draws: Vec<FieldDraw>,
}

impl FieldRenderer {
    pub fn new(device: &wgpu::Device, globals: &SceneGlobals, scene: &ComposedScene) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("field-shader"),
            source: wgpu::ShaderSource::Wgsl(field_shader_source().into()),
        });
        let object_layout = uniform_layout(
            device,
            "field-object-bgl",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
            std::mem::size_of::<FieldUniform>() as u64,
        );

        let pipeline = ScenePipelineDesc {
            label: "field-pipeline",
            shader: &shader,
            bind_group_layouts: &[&globals.camera_layout, &globals.lighting_layout, &object_layout],
            vertex_buffers: &[VertexPositionNormalUv::layout(), FieldInstanceRaw::layout()],
            cull_mode: Some(wgpu::Face::Back),
            depth: DepthBuffer::opaque_state(),
            blend: None,
        }
        .build(device);

        let allocator = BufferAllocator::new(device);
        let draws = scene
            .fields
            .iter()
            .enumerate()
            .filter(|(_, binding)| !binding.field.is_empty())
            .map(|(index, binding)| {
                let label = format!("field-{index}");
                let raw: Vec<FieldInstanceRaw> = binding
                    .field
                    .instance_transforms()
                    .into_iter()
                    .map(|m| FieldInstanceRaw {
                        model: m.to_cols_array_2d(),
                    })
                    .collect();
                let model = scene.root.world_matrix(&binding.node).unwrap_or(Mat4::IDENTITY);
                FieldDraw {
                    field: index,
                    mesh: mesh::icosahedron(binding.instance_radius).upload(&allocator, &label),
                    instances: allocator.create_instance_buffer(&label, &raw),
                    instance_count: raw.len() as u32,
                    object: UniformBinding::new(
                        device,
                        &object_layout,
                        &label,
                        &FieldUniform::new(model, ROCK_COLOR),
                    ),
                }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "Field renderer: {} fields, {} instances",
            draws.len(),
            draws.iter().map(|d| d.instance_count).sum::<u32>()
        );
        Self { pipeline, draws }
    }

    pub fn instance_count(&self) -> u32 {
        self.draws.iter().map(|draw| draw.instance_count).sum()
    }

    /// Upload each field's current world frame.
    pub fn prepare(&self, queue: &wgpu::Queue, scene: &ComposedScene) {
        for draw in &self.draws {
            let Some(binding) = scene.fields.get(draw.field) else {
                continue;
            };
            let model = scene.root.world_matrix(&binding.node).unwrap_or(Mat4::IDENTITY);
            draw.object.write(queue, &FieldUniform::new(model, ROCK_COLOR));
        }
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, globals: &SceneGlobals) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, globals.camera_bind_group(), &[]);
        pass.set_bind_group(1, globals.lighting_bind_group(), &[]);
        for draw in &self.draws {
            pass.set_bind_group(2, &draw.object.bind_group, &[]);
            draw.mesh.bind(pass);
            pass.set_vertex_buffer(1, draw.instances.slice(..));
            draw.mesh.draw_instanced(pass, draw.instance_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts() {
        assert_eq!(std::mem::size_of::<FieldUniform>(), 80);
        assert_eq!(std::mem::size_of::<FieldInstanceRaw>(), 64);
        let layout = FieldInstanceRaw::layout();
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(layout.attributes.first().map(|a| a.shader_location), Some(3));
    }

    #[test]
    fn test_uniform_keeps_frame() {
        let model = Mat4::from_rotation_x(0.5);
        let u = FieldUniform::new(model, Vec3::new(0.5, 0.25, 1.0));
        assert_eq!(Mat4::from_cols_array_2d(&u.model), model);
        assert_eq!(u.color, [0.5, 0.25, 1.0, 1.0]);
    }

    #[test]
    fn test_shader_parses() {
        let Some((device, _queue)) = orrery_render::request_headless_device() else {
            return;
        };
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("field-shader-test"),
            source: wgpu::ShaderSource::Wgsl(field_shader_source().into()),
        });
    }
}
