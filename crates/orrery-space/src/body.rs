//! Lit, textured spheres for planets, the sun and moons.
//!
//! Blinn-Phong shading against the sun's point light with the diffuse
//! texture doubling as bump, displacement and emissive map.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use orrery_render::{
    BufferAllocator, DepthBuffer, ManagedTexture, MeshBuffer, TextureManager,
    VertexPositionNormalUv,
};
use orrery_scene::{BodyMaterial, ComposedScene, NodeKind, NodePath};

use crate::SpaceError;
use crate::globals::{
    ScenePipelineDesc, SceneGlobals, UniformBinding, lit_prelude, uniform_layout,
};
use crate::mesh;

/// Per-body data at group 3 of the body pipeline. 160 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BodyUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// rgb = emissive color, w = emissive intensity.
    pub emissive: [f32; 4],
    /// x = shininess, y = bump scale, z = displacement scale, w = 1 if shadowed.
    pub params: [f32; 4],
}

impl BodyUniform {
    pub fn new(model: Mat4, material: &BodyMaterial) -> Self {
        let e = material.emissive;
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            emissive: [e.x, e.y, e.z, material.emissive_intensity],
            params: [
                material.shininess,
                material.bump_scale,
                material.displacement_scale,
                if material.receives_shadow { 1.0 } else { 0.0 },
            ],
        }
    }
}

const BODY_WGSL: &str = r#"
struct Object {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    emissive: vec4<f32>,
    params: vec4<f32>,
};

@group(2) @binding(0)
var surface_texture: texture_2d<f32>;
@group(2) @binding(1)
var surface_sampler: sampler;

@group(3) @binding(0)
var<uniform> object: Object;

// Specular color of a default Phong surface (0x111111, linear).
const SPECULAR: f32 = 0.0056;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let height = textureSampleLevel(surface_texture, surface_sampler, in.uv, 0.0).r;
    let displaced = in.position + in.normal * height * object.params.z;
    let world = object.model * vec4<f32>(displaced, 1.0);

    var out: VertexOutput;
    out.clip_position = camera.view_proj * world;
    out.world_position = world.xyz;
    out.normal = normalize((object.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz);
    out.uv = in.uv;
    return out;
}

// Screen-space derivative bump mapping.
fn bumped_normal(position: vec3<f32>, normal: vec3<f32>, dhdx: f32, dhdy: f32) -> vec3<f32> {
    let sigma_x = dpdx(position);
    let sigma_y = dpdy(position);
    let r1 = cross(sigma_y, normal);
    let r2 = cross(normal, sigma_x);
    let det = dot(sigma_x, r1);
    let grad = sign(det) * (dhdx * r1 + dhdy * r2);
    return normalize(abs(det) * normal - grad);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = textureSample(surface_texture, surface_sampler, in.uv).rgb;
    let duv_dx = dpdx(in.uv);
    let duv_dy = dpdy(in.uv);
    let h = textureSample(surface_texture, surface_sampler, in.uv).r;
    let hx = textureSample(surface_texture, surface_sampler, in.uv + duv_dx).r;
    let hy = textureSample(surface_texture, surface_sampler, in.uv + duv_dy).r;

    let geometric = normalize(in.normal);
    let bump = object.params.y;
    let n = bumped_normal(in.world_position, geometric, (hx - h) * bump, (hy - h) * bump);

    var visibility = 1.0;
    if (object.params.w > 0.5 && lights.flags.x > 0.5) {
        visibility = shadow_visibility(in.world_position, geometric);
    }

    let l = normalize(lights.sun_position_distance.xyz - in.world_position);
    let v = normalize(camera.position.xyz - in.world_position);
    let half_vector = normalize(l + v);
    let n_dot_l = max(dot(n, l), 0.0);
    let radiance = sun_radiance(in.world_position) * visibility;

    let diffuse = albedo * (lights.ambient.rgb + radiance * n_dot_l);
    let shininess = max(object.params.x, 1.0);
    let specular = radiance * n_dot_l * SPECULAR * pow(max(dot(n, half_vector), 0.0), shininess);
    let emissive = object.emissive.rgb * object.emissive.w * albedo;

    return vec4<f32>(diffuse + specular + emissive, 1.0);
}
"#;

pub(crate) fn body_shader_source() -> String {
    format!("{}{BODY_WGSL}", lit_prelude())
}

/// One sphere bound to a scene node.
pub(crate) struct BodyDraw {
    pub path: NodePath,
    pub mesh: MeshBuffer,
    pub texture: Arc<ManagedTexture>,
    pub object: UniformBinding,
    pub casts_shadow: bool,
}

/// Renders every `Body` and `Moon` node of a composed scene.
pub struct BodyRenderer {
    pipeline: wgpu::RenderPipeline,
    pub(crate) object_layout: wgpu::BindGroupLayout,
    pub(crate) draws: Vec<BodyDraw>,
}

impl BodyRenderer {
    pub fn new(
        device: &wgpu::Device,
        globals: &SceneGlobals,
        textures: &TextureManager,
        scene: &ComposedScene,
        sphere_segments: u32,
    ) -> Result<Self, SpaceError> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("body-shader"),
            source: wgpu::ShaderSource::Wgsl(body_shader_source().into()),
        });

        let object_layout = uniform_layout(
            device,
            "body-object-bgl",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
            std::mem::size_of::<BodyUniform>() as u64,
        );

        let pipeline = ScenePipelineDesc {
            label: "body-pipeline",
            shader: &shader,
            bind_group_layouts: &[
                &globals.camera_layout,
                &globals.lighting_layout,
                textures.bind_group_layout(),
                &object_layout,
            ],
            vertex_buffers: &[VertexPositionNormalUv::layout()],
            cull_mode: Some(wgpu::Face::Back),
            depth: DepthBuffer::opaque_state(),
            blend: None,
        }
        .build(device);

        let allocator = BufferAllocator::new(device);
        let mut draws = Vec::new();
        let mut missing = None;
        scene.root.visit_paths(&mut |path, node| {
            let (radius, material, segments) = match &node.kind {
                NodeKind::Body { radius, material, .. } => (*radius, material, sphere_segments),
                NodeKind::Moon { radius, material, .. } => {
                    (*radius, material, (sphere_segments / 2).max(8))
                }
                _ => return,
            };
            let Some(texture) = textures.get(material.texture.name()) else {
                missing.get_or_insert(material.texture);
                return;
            };
            let mesh = mesh::uv_sphere(radius, segments, segments).upload(&allocator, &node.name);
            let model = scene.root.world_matrix(path).unwrap_or(Mat4::IDENTITY);
            let object = UniformBinding::new(
                device,
                &object_layout,
                &format!("{}-object", node.name),
                &BodyUniform::new(model, material),
            );
            draws.push(BodyDraw {
                path: path.to_vec(),
                mesh,
                texture,
                object,
                casts_shadow: material.casts_shadow,
            });
        });
        if let Some(key) = missing {
            return Err(SpaceError::MissingTexture(key));
        }

        log::debug!("Body renderer: {} spheres", draws.len());
        Ok(Self {
            pipeline,
            object_layout,
            draws,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    /// Copy node transforms and materials into the per-body uniforms.
    pub fn prepare(&self, queue: &wgpu::Queue, scene: &ComposedScene) {
        for draw in &self.draws {
            let Some(node) = scene.root.node(&draw.path) else {
                continue;
            };
            let material = match &node.kind {
                NodeKind::Body { material, .. } | NodeKind::Moon { material, .. } => material,
                _ => continue,
            };
            let model = scene.root.world_matrix(&draw.path).unwrap_or(Mat4::IDENTITY);
            draw.object.write(queue, &BodyUniform::new(model, material));
        }
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, globals: &SceneGlobals) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, globals.camera_bind_group(), &[]);
        pass.set_bind_group(1, globals.lighting_bind_group(), &[]);
        for draw in &self.draws {
            pass.set_bind_group(2, &draw.texture.bind_group, &[]);
            pass.set_bind_group(3, &draw.object.bind_group, &[]);
            draw.mesh.bind(pass);
            draw.mesh.draw(pass);
        }
    }
}
