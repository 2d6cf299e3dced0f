//! CPU mesh generation: UV spheres, icosahedra and flat annuli.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use orrery_render::{BufferAllocator, IndexData, MeshBuffer, VertexPositionNormalUv};

/// Indexed triangle list ready for upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<VertexPositionNormalUv>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn upload(&self, allocator: &BufferAllocator<'_>, label: &str) -> MeshBuffer {
        let indices = IndexData::narrowest(&self.indices, self.vertices.len());
        allocator.create_mesh(label, bytemuck::cast_slice(&self.vertices), indices.as_data())
    }
}

fn vertex(position: Vec3, normal: Vec3, uv: [f32; 2]) -> VertexPositionNormalUv {
    VertexPositionNormalUv {
        position: position.to_array(),
        normal: normal.to_array(),
        uv,
    }
}

/// Latitude/longitude sphere with outward CCW winding.
///
/// `v = 0` is the north pole so equirectangular images map upright, and the
/// seam column is duplicated so `u` runs 0..=1.
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let row = width_segments + 1;

    let mut vertices = Vec::with_capacity((row * (height_segments + 1)) as usize);
    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let normal = Vec3::new(
                -(u * TAU).cos() * (v * PI).sin(),
                (v * PI).cos(),
                (u * TAU).sin() * (v * PI).sin(),
            );
            vertices.push(vertex(normal * radius, normal, [u, v]));
        }
    }

    let mut indices = Vec::with_capacity((width_segments * height_segments * 6) as usize);
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    MeshData { vertices, indices }
}

/// Flat-shaded regular icosahedron; 20 faces with unshared vertices.
pub fn icosahedron(radius: f32) -> MeshData {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let corners = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ]
    .map(|c| c.normalize() * radius);

    const FACES: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    let mut vertices = Vec::with_capacity(FACES.len() * 3);
    for face in FACES {
        let [a, b, c] = face.map(|i| corners[i]);
        let normal = (b - a).cross(c - a).normalize();
        vertices.extend([a, b, c].map(|p| vertex(p, normal, [0.0, 0.0])));
    }
    let indices = (0..vertices.len() as u32).collect();
    MeshData { vertices, indices }
}

/// Flat ring in the XZ plane facing +Y.
///
/// `u` runs from the inner edge (0) to the outer edge (1) so a radial strip
/// texture wraps around the ring; `v` follows the angle.
pub fn annulus(inner_radius: f32, outer_radius: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let mut vertices = Vec::with_capacity(((segments + 1) * 2) as usize);
    for i in 0..=segments {
        let v = i as f32 / segments as f32;
        let (sin, cos) = (v * TAU).sin_cos();
        let direction = Vec3::new(cos, 0.0, sin);
        vertices.push(vertex(direction * inner_radius, Vec3::Y, [0.0, v]));
        vertices.push(vertex(direction * outer_radius, Vec3::Y, [1.0, v]));
    }

    let mut indices = Vec::with_capacity((segments * 6) as usize);
    for i in 0..segments {
        let inner = i * 2;
        let outer = inner + 1;
        let next_inner = inner + 2;
        let next_outer = inner + 3;
        indices.extend_from_slice(&[inner, next_inner, outer, outer, next_inner, next_outer]);
    }

    MeshData { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_vertices_on_radius() {
        let mesh = uv_sphere(3.0, 64, 64);
        assert_eq!(mesh.vertices.len(), 65 * 65);
        // Pole rows contribute one triangle per segment instead of two.
        assert_eq!(mesh.triangle_count(), 64 * 62 * 2 + 64 * 2);
        for v in &mesh.vertices {
            let p = Vec3::from_array(v.position);
            assert!((p.length() - 3.0).abs() < 1e-4);
            assert!(Vec3::from_array(v.normal).abs_diff_eq(p / 3.0, 1e-5));
        }
    }

    #[test]
    fn test_sphere_winds_outward() {
        let mesh = uv_sphere(1.0, 16, 8);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from_array(mesh.vertices[i as usize].position));
            let n = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(n.dot(center) > 0.0);
        }
    }

    #[test]
    fn test_sphere_north_pole_at_v0() {
        let mesh = uv_sphere(2.0, 8, 4);
        let first = mesh.vertices[0];
        assert_eq!(first.uv[1], 0.0);
        assert!((first.position[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_icosahedron_is_flat_shaded() {
        let mesh = icosahedron(0.3);
        assert_eq!(mesh.triangle_count(), 20);
        for tri in mesh.vertices.chunks(3) {
            assert_eq!(tri[0].normal, tri[1].normal);
            assert_eq!(tri[1].normal, tri[2].normal);
            let center = tri
                .iter()
                .map(|v| Vec3::from_array(v.position))
                .sum::<Vec3>();
            assert!(Vec3::from_array(tri[0].normal).dot(center) > 0.0);
            for v in tri {
                assert!((Vec3::from_array(v.position).length() - 0.3).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_annulus_bounds() {
        let mesh = annulus(59.9, 60.1, 100);
        assert_eq!(mesh.triangle_count(), 200);
        for v in &mesh.vertices {
            let r = Vec3::from_array(v.position).length();
            assert!(r > 59.89 && r < 60.11);
            assert_eq!(v.position[1], 0.0);
        }
    }
}
