//! Camera-facing point sprites for the blinking starfield.
//!
//! Sprite size is attenuated by view depth: a star of size `s` at depth `d`
//! covers `s * (height / 2) / d` pixels, never less than one.

use bytemuck::{Pod, Zeroable};
use orrery_scene::Starfield;
use orrery_render::BufferAllocator;

use crate::globals::{
    CAMERA_WGSL, ScenePipelineDesc, UniformBinding, transparent_depth, uniform_layout,
};

/// One star sprite. 32 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StarInstance {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 3],
    pub opacity: f32,
}

impl StarInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32,
        2 => Float32x3,
        3 => Float32,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Snapshot the starfield's current sizes into sprite instances.
pub fn star_instances(stars: &Starfield) -> Vec<StarInstance> {
    stars
        .positions
        .iter()
        .zip(&stars.colors)
        .zip(&stars.sizes)
        .map(|((position, color), size)| StarInstance {
            position: position.to_array(),
            size: *size,
            color: color.to_array(),
            opacity: stars.opacity,
        })
        .collect()
}

/// Viewport size in pixels at group 1.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct StarParams {
    /// x = width, y = height, z = minimum sprite size in pixels.
    pub viewport: [f32; 4],
}

impl StarParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: [width.max(1) as f32, height.max(1) as f32, 1.0, 0.0],
        }
    }
}

const STARS_WGSL: &str = r#"
struct StarParams {
    viewport: vec4<f32>,
};

@group(1) @binding(0)
var<uniform> params: StarParams;

struct StarInput {
    @location(0) position: vec3<f32>,
    @location(1) size: f32,
    @location(2) color: vec3<f32>,
    @location(3) opacity: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32, star: StarInput) -> VertexOutput {
    var clip = camera.view_proj * vec4<f32>(star.position, 1.0);
    let depth = max(clip.w, 1e-4);
    let pixels = max(star.size * params.viewport.y * 0.5 / depth, params.viewport.z);
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[vertex_index];
    clip = vec4<f32>(clip.xy + corner * pixels / params.viewport.xy * clip.w, clip.zw);

    var out: VertexOutput;
    out.clip_position = clip;
    out.color = vec4<f32>(star.color, star.opacity);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

pub(crate) fn star_shader_source() -> String {
    format!("{CAMERA_WGSL}{STARS_WGSL}")
}

/// Draws the starfield as one instanced quad per star.
pub struct StarRenderer {
    pipeline: wgpu::RenderPipeline,
    instances: wgpu::Buffer,
    count: u32,
    params: UniformBinding,
}

impl StarRenderer {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        stars: &Starfield,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("star-shader"),
            source: wgpu::ShaderSource::Wgsl(star_shader_source().into()),
        });
        let params_layout = uniform_layout(
            device,
            "star-params-bgl",
            wgpu::ShaderStages::VERTEX,
            std::mem::size_of::<StarParams>() as u64,
        );

        let pipeline = ScenePipelineDesc {
            label: "star-pipeline",
            shader: &shader,
            bind_group_layouts: &[camera_layout, &params_layout],
            vertex_buffers: &[StarInstance::layout()],
            cull_mode: None,
            depth: transparent_depth(),
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
        }
        .build(device);

        let instances = star_instances(stars);
        let allocator = BufferAllocator::new(device);
        // A zero-sized vertex buffer cannot be created, so keep one dummy slot.
        let buffer = if instances.is_empty() {
            allocator.create_instance_buffer("star-instances", &[StarInstance::default()])
        } else {
            allocator.create_instance_buffer("star-instances", &instances)
        };

        Self {
            pipeline,
            instances: buffer,
            count: instances.len() as u32,
            params: UniformBinding::new(
                device,
                &params_layout,
                "star-params",
                &StarParams::new(1, 1),
            ),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Upload the current blink sizes and the viewport.
    pub fn prepare(&self, queue: &wgpu::Queue, stars: &Starfield, width: u32, height: u32) {
        if self.count > 0 {
            queue.write_buffer(
                &self.instances,
                0,
                bytemuck::cast_slice(&star_instances(stars)),
            );
        }
        self.params.write(queue, &StarParams::new(width, height));
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, camera: &wgpu::BindGroup) {
        if self.count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, &self.params.bind_group, &[]);
        pass.set_vertex_buffer(0, self.instances.slice(..));
        pass.draw(0..6, 0..self.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_config::StarfieldConfig;

    #[test]
    fn test_instance_layout() {
        assert_eq!(std::mem::size_of::<StarInstance>(), 32);
        assert_eq!(std::mem::size_of::<StarParams>(), 16);
    }

    #[test]
    fn test_instances_follow_blink_sizes() {
        let mut stars = Starfield::generate(&StarfieldConfig::default(), 4);
        stars.sizes[3] = 0.0;
        let instances = star_instances(&stars);
        assert_eq!(instances.len(), stars.len());
        assert_eq!(instances[3].size, 0.0);
        assert_eq!(instances[0].opacity, 0.8);
        assert_eq!(instances[5].position, stars.positions[5].to_array());
    }

    #[test]
    fn test_params_never_zero() {
        let params = StarParams::new(0, 0);
        assert_eq!(params.viewport[0], 1.0);
        assert_eq!(params.viewport[1], 1.0);
    }

    #[test]
    fn test_shader_parses() {
        let Some((device, _queue)) = orrery_render::request_headless_device() else {
            return;
        };
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("star-shader-test"),
            source: wgpu::ShaderSource::Wgsl(star_shader_source().into()),
        });
    }
}
