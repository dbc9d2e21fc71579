// sphere.rs — 全景球网格
// 相机在球心向外看，等距柱状图贴在球内壁：
// 半径 500，64×32 分段，X 轴镜像实现内翻。

use bytemuck::{Pod, Zeroable};

pub const DEFAULT_RADIUS: f32 = 500.0;
pub const DEFAULT_LON_SEGMENTS: usize = 64;
pub const DEFAULT_LAT_SEGMENTS: usize = 32;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl SphereVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub vertices: Vec<SphereVertex>,
    pub indices: Vec<u32>,
}

/// 生成内翻球：X 轴取镜像（等价 scale -1），UV 翻转使贴图方向正确。
pub fn build_inverted_sphere(radius: f32, lat: usize, lon: usize) -> SphereMesh {
    let mut vertices = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut indices = Vec::with_capacity(lat * lon * 6);

    for i in 0..=lat {
        let theta = std::f32::consts::PI * (i as f32) / (lat as f32);
        let y = radius * theta.cos();
        let sin_t = theta.sin();

        for j in 0..=lon {
            let phi = 2.0 * std::f32::consts::PI * (j as f32) / (lon as f32);

            // 镜像 X：从内侧看时左右方向与照片一致
            let x = -radius * phi.cos() * sin_t;
            let z = radius * phi.sin() * sin_t;

            let u = 1.0 - (j as f32) / (lon as f32);
            let v = 1.0 - (i as f32) / (lat as f32);

            vertices.push(SphereVertex {
                position: [x, y, z],
                uv: [u, v],
            });
        }
    }

    for i in 0..lat {
        for j in 0..lon {
            let a = (i * (lon + 1) + j) as u32;
            let b = a + (lon + 1) as u32;

            indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
        }
    }

    SphereMesh { vertices, indices }
}

impl SphereMesh {
    pub fn panorama_default() -> Self {
        build_inverted_sphere(DEFAULT_RADIUS, DEFAULT_LAT_SEGMENTS, DEFAULT_LON_SEGMENTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_match_segment_grid() {
        let mesh = build_inverted_sphere(500.0, 4, 8);
        assert_eq!(mesh.vertices.len(), 5 * 9);
        assert_eq!(mesh.indices.len(), 4 * 8 * 6);
    }

    #[test]
    fn all_vertices_lie_on_the_sphere() {
        let mesh = build_inverted_sphere(500.0, 8, 16);
        for v in &mesh.vertices {
            let len = (v.position[0].powi(2) + v.position[1].powi(2) + v.position[2].powi(2)).sqrt();
            assert!((len - 500.0).abs() < 1e-2, "|v| = {len}");
        }
    }

    #[test]
    fn uvs_cover_unit_square() {
        let mesh = build_inverted_sphere(500.0, 8, 16);
        for v in &mesh.vertices {
            assert!((0.0..=1.0).contains(&v.uv[0]));
            assert!((0.0..=1.0).contains(&v.uv[1]));
        }
        assert!(mesh.vertices.iter().any(|v| v.uv[0] == 0.0));
        assert!(mesh.vertices.iter().any(|v| v.uv[0] == 1.0));
    }

    #[test]
    fn indices_stay_in_range() {
        let mesh = SphereMesh::panorama_default();
        let max = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < max));
    }
}
