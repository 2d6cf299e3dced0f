//! Omnidirectional shadows for the sun.
//!
//! Six 90° reverse-Z perspectives, one per cube face, render into layers of
//! a depth texture array. Lit shaders pick the layer from the major axis of
//! the light-to-fragment vector and sample with a comparison sampler.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

pub const CUBE_FACE_COUNT: usize = 6;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Shadow tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowSettings {
    pub resolution: u32,
    /// Depth offset applied before comparison; negative moves toward the light.
    pub bias: f32,
    /// World-space offset along the surface normal.
    pub normal_bias: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            resolution: 1024,
            bias: -0.0001,
            normal_bias: 0.0001,
            near: 0.5,
            far: 500.0,
        }
    }
}

/// 6 face matrices + params; 416 bytes, matching the WGSL `Shadow` struct.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowUniform {
    pub face_view_proj: [[[f32; 4]; 4]; CUBE_FACE_COUNT],
    /// xyz = light position, w unused.
    pub light_position: [f32; 4],
    /// x = bias, y = normal bias, z = texel size.
    pub params: [f32; 4],
}

/// Cube face for a light-to-fragment direction: +X, -X, +Y, -Y, +Z, -Z.
pub fn select_face(dir: Vec3) -> usize {
    let abs = dir.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        if dir.x >= 0.0 { 0 } else { 1 }
    } else if abs.y >= abs.z {
        if dir.y >= 0.0 { 2 } else { 3 }
    } else if dir.z >= 0.0 {
        4
    } else {
        5
    }
}

/// View-projection per cube face, in [`select_face`] order.
pub fn face_matrices(light_pos: Vec3, near: f32, far: f32) -> [Mat4; CUBE_FACE_COUNT] {
    const FACES: [(Vec3, Vec3); CUBE_FACE_COUNT] = [
        (Vec3::X, Vec3::NEG_Y),
        (Vec3::NEG_X, Vec3::NEG_Y),
        (Vec3::Y, Vec3::Z),
        (Vec3::NEG_Y, Vec3::NEG_Z),
        (Vec3::Z, Vec3::NEG_Y),
        (Vec3::NEG_Z, Vec3::NEG_Y),
    ];
    let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, far, near);
    FACES.map(|(dir, up)| proj * Mat4::look_at_rh(light_pos, light_pos + dir, up))
}

/// GPU resources for the sun's shadow map.
pub struct PointShadowMaps {
    pub texture: wgpu::Texture,
    /// D2Array view for sampling.
    pub view: wgpu::TextureView,
    /// One render view per face.
    pub face_views: Vec<wgpu::TextureView>,
    pub sampler: wgpu::Sampler,
    pub settings: ShadowSettings,
    matrices: [Mat4; CUBE_FACE_COUNT],
    light_position: Vec3,
}

impl PointShadowMaps {
    pub const FORMAT: wgpu::TextureFormat = DEPTH_FORMAT;

    pub fn new(device: &wgpu::Device, settings: ShadowSettings) -> Self {
        let resolution = settings.resolution.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sun-shadow-array"),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: CUBE_FACE_COUNT as u32,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("sun-shadow-array-view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        let face_views = (0..CUBE_FACE_COUNT as u32)
            .map(|i| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("sun-shadow-face-{i}")),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: i,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sun-shadow-comparison-sampler"),
            compare: Some(wgpu::CompareFunction::GreaterEqual),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        log::debug!("Shadow map: {CUBE_FACE_COUNT} faces at {resolution}x{resolution}");

        Self {
            texture,
            view,
            face_views,
            sampler,
            matrices: face_matrices(Vec3::ZERO, settings.near, settings.far),
            light_position: Vec3::ZERO,
            settings,
        }
    }

    /// Recompute face matrices if the light moved.
    pub fn update(&mut self, light_position: Vec3) {
        if light_position == self.light_position {
            return;
        }
        self.light_position = light_position;
        self.matrices = face_matrices(light_position, self.settings.near, self.settings.far);
    }

    pub fn face_matrix(&self, face: usize) -> Mat4 {
        self.matrices[face]
    }

    pub fn to_uniform(&self) -> ShadowUniform {
        let p = self.light_position;
        ShadowUniform {
            face_view_proj: self.matrices.map(|m| m.to_cols_array_2d()),
            light_position: [p.x, p.y, p.z, 1.0],
            params: [
                self.settings.bias,
                self.settings.normal_bias,
                1.0 / self.settings.resolution.max(1) as f32,
                0.0,
            ],
        }
    }

    /// Depth state for caster pipelines rendering into the face views.
    pub fn caster_depth_state() -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::GreaterEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn project(m: Mat4, p: Vec3) -> Vec3 {
        let c = m * Vec4::new(p.x, p.y, p.z, 1.0);
        c.truncate() / c.w
    }

    #[test]
    fn test_uniform_size() {
        // WGSL uniform layout: mat4x4<f32> is 64 bytes, vec4<f32> is 16.
        let wgsl_size = CUBE_FACE_COUNT * 64 + 16 + 16;
        assert_eq!(std::mem::size_of::<ShadowUniform>(), wgsl_size);
        assert_eq!(std::mem::size_of::<ShadowUniform>(), 416);
        assert_eq!(std::mem::size_of::<ShadowUniform>() % 16, 0);
    }

    #[test]
    fn test_select_face_major_axis() {
        assert_eq!(select_face(Vec3::new(5.0, 1.0, -2.0)), 0);
        assert_eq!(select_face(Vec3::new(-5.0, 1.0, -2.0)), 1);
        assert_eq!(select_face(Vec3::new(0.1, 3.0, 2.0)), 2);
        assert_eq!(select_face(Vec3::new(0.1, -3.0, 2.0)), 3);
        assert_eq!(select_face(Vec3::new(0.1, 1.0, 60.0)), 4);
        assert_eq!(select_face(Vec3::new(0.1, 1.0, -60.0)), 5);
    }

    #[test]
    fn test_each_face_sees_its_axis_at_center() {
        let matrices = face_matrices(Vec3::ZERO, 0.5, 500.0);
        let dirs = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        for (face, dir) in dirs.iter().enumerate() {
            assert_eq!(select_face(*dir), face);
            let ndc = project(matrices[face], *dir * 60.0);
            assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "face {face}: {ndc}");
            assert!(ndc.z > 0.0 && ndc.z < 1.0);
        }
    }

    #[test]
    fn test_faces_are_reverse_z() {
        let m = face_matrices(Vec3::ZERO, 0.5, 500.0)[0];
        let near = project(m, Vec3::new(0.5, 0.0, 0.0));
        let far = project(m, Vec3::new(500.0, 0.0, 0.0));
        assert!((near.z - 1.0).abs() < 1e-4);
        assert!(far.z.abs() < 1e-4);
        // Closer occluders get larger depth.
        let earth = project(m, Vec3::new(60.0, 0.0, 0.0));
        let mars = project(m, Vec3::new(90.0, 0.0, 0.0));
        assert!(earth.z > mars.z);
    }

    #[test]
    fn test_fragment_inside_face_frustum() {
        let matrices = face_matrices(Vec3::ZERO, 0.5, 500.0);
        let p = Vec3::new(140.0, 5.0, -30.0);
        let face = select_face(p);
        let ndc = project(matrices[face], p);
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
    }

    #[test]
    fn test_gpu_resources() {
        let Some((device, _queue)) = orrery_render::request_headless_device() else {
            return;
        };
        let mut maps = PointShadowMaps::new(
            &device,
            ShadowSettings {
                resolution: 64,
                ..Default::default()
            },
        );
        assert_eq!(maps.face_views.len(), CUBE_FACE_COUNT);
        assert_eq!(maps.texture.depth_or_array_layers(), 6);
        maps.update(Vec3::new(1.0, 0.0, 0.0));
        let u = maps.to_uniform();
        assert_eq!(u.light_position[0], 1.0);
        assert!((u.params[2] - 1.0 / 64.0).abs() < 1e-9);
    }
}
