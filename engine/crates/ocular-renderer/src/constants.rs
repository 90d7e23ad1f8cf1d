//! shader 使用的 push constants
//!
//! 与 `engine/shader/glsl/scene.vert` / `scene.frag` 中的 push constant block 一一对应：
//!
//! ```glsl
//! layout(push_constant) uniform PushConstants {
//!     mat4 mvp;                               // offset 0
//!     mat3 normal_mat;                        // offset 64，每列按 vec4 对齐
//!     layout(offset = 112) vec4 light_color;
//!     vec3 inv_light_dir;
//! };
//! ```

use glam::{Mat3, Mat4};
use ocular_gfx::rhi::types::{PushConstantRange, ShaderStage};

/// vertex stage 的常量，每个物体每只眼睛更新一次
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexConstants {
    /// 列主序
    pub mvp: [[f32; 4]; 4],
    /// 模型矩阵的逆转置，每列补齐到 16 字节
    pub normal_mat: [[f32; 4]; 3],
}
impl VertexConstants {
    pub fn new(mvp: &Mat4, normal_mat: &Mat3) -> Self {
        let pad = |c: glam::Vec3| [c.x, c.y, c.z, 0.0];
        Self {
            mvp: mvp.to_cols_array_2d(),
            normal_mat: [pad(normal_mat.x_axis), pad(normal_mat.y_axis), pad(normal_mat.z_axis)],
        }
    }
}

/// pixel stage 的常量，每只眼睛设置一次
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PixelConstants {
    pub light_color: [f32; 4],
    /// 指向光源的方向（世界空间）
    pub inv_light_dir: [f32; 3],
}
impl Default for PixelConstants {
    fn default() -> Self {
        Self {
            light_color: [0.83137, 0.62745, 0.09020, 1.0],
            inv_light_dir: [0.57735, 0.57735, 0.57735],
        }
    }
}

pub const VERTEX_CONSTANTS_OFFSET: u32 = 0;
pub const PIXEL_CONSTANTS_OFFSET: u32 = size_of::<VertexConstants>() as u32;
pub const PUSH_CONSTANTS_SIZE: u32 = PIXEL_CONSTANTS_OFFSET + size_of::<PixelConstants>() as u32;

pub fn push_constant_ranges() -> [PushConstantRange; 2] {
    [
        PushConstantRange {
            stage: ShaderStage::Vertex,
            offset: VERTEX_CONSTANTS_OFFSET,
            size: size_of::<VertexConstants>() as u32,
        },
        PushConstantRange {
            stage: ShaderStage::Pixel,
            offset: PIXEL_CONSTANTS_OFFSET,
            size: size_of::<PixelConstants>() as u32,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_layout_matches_shader_block() {
        assert_eq!(size_of::<VertexConstants>(), 112);
        assert_eq!(size_of::<PixelConstants>(), 28);
        assert_eq!(PIXEL_CONSTANTS_OFFSET, 112);
        assert_eq!(PUSH_CONSTANTS_SIZE, 140);
    }

    #[test]
    fn test_ranges_do_not_overlap() {
        let [vs, ps] = push_constant_ranges();
        assert_eq!(vs.offset + vs.size, ps.offset);
        assert_eq!(ps.offset + ps.size, PUSH_CONSTANTS_SIZE);
    }

    #[test]
    fn test_normal_matrix_columns_are_padded() {
        let normal = Mat3::from_cols(Vec3::X, Vec3::new(0.0, 2.0, 0.0), Vec3::Z * 3.0);
        let constants = VertexConstants::new(&Mat4::IDENTITY, &normal);
        assert_eq!(constants.normal_mat[1], [0.0, 2.0, 0.0, 0.0]);
        assert_eq!(constants.normal_mat[2], [0.0, 0.0, 3.0, 0.0]);

        let bytes: &[u8] = bytemuck::bytes_of(&constants);
        // mvp 的第一列
        assert_eq!(&bytes[0..4], &1.0_f32.to_ne_bytes());
        // normal_mat 的第二列从 64 + 16 开始
        assert_eq!(&bytes[84..88], &2.0_f32.to_ne_bytes());
    }
}
