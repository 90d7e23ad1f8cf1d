//! 场景：地面 + 一个旋转的立方体
//!
//! 几何体在 bootstrap 时一次性上传，之后只有模型矩阵每帧变化

use glam::{Mat4, Quat, Vec3};
use ocular_gfx::rhi::types::{IndexBufferView, VertexAttribute, VertexAttributeFormat, VertexBufferView};

use crate::math;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}
impl Vertex {
    pub const STRIDE: u32 = size_of::<Self>() as u32;

    #[inline]
    const fn new(pos: [f32; 3], normal: [f32; 3], color: [f32; 4]) -> Self {
        Self { pos, normal, color }
    }

    /// 与 scene.vert 的 location 对应
    pub fn attributes() -> [VertexAttribute; 3] {
        [
            VertexAttribute {
                location: 0,
                format: VertexAttributeFormat::Float32x3,
                offset: std::mem::offset_of!(Vertex, pos) as u32,
            },
            VertexAttribute {
                location: 1,
                format: VertexAttributeFormat::Float32x3,
                offset: std::mem::offset_of!(Vertex, normal) as u32,
            },
            VertexAttribute {
                location: 2,
                format: VertexAttributeFormat::Float32x4,
                offset: std::mem::offset_of!(Vertex, color) as u32,
            },
        ]
    }
}

pub struct Mesh {
    pub name: &'static str,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}
impl Mesh {
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

const GROUND_COLOR: [f32; 4] = [0.5882, 0.2941, 0.0, 1.0];
const CUBE_COLOR: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

/// y = -1 处边长 2000 的地面，正反两面各两个三角形
pub fn plane_mesh() -> Mesh {
    let corners = [
        [1000.0, -1.0, 1000.0],
        [-1000.0, -1.0, 1000.0],
        [1000.0, -1.0, -1000.0],
        [-1000.0, -1.0, -1000.0],
    ];
    let up = corners.iter().map(|&p| Vertex::new(p, [0.0, 1.0, 0.0], GROUND_COLOR));
    let down = corners.iter().map(|&p| Vertex::new(p, [0.0, -1.0, 0.0], GROUND_COLOR));

    Mesh {
        name: "plane",
        vertices: up.chain(down).collect(),
        indices: vec![0, 1, 2, 2, 1, 3, 4, 6, 5, 6, 7, 5],
    }
}

/// 中心在原点、边长 1 的立方体，每个面 6 个顶点
pub fn cube_mesh() -> Mesh {
    #[rustfmt::skip]
    let faces: [([f32; 3], [[f32; 3]; 6]); 6] = [
        // back
        ([0.0, 0.0, -1.0], [
            [-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5],
            [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5], [-0.5, -0.5, -0.5],
        ]),
        // front
        ([0.0, 0.0, 1.0], [
            [-0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5],
        ]),
        // left
        ([-1.0, 0.0, 0.0], [
            [-0.5, 0.5, 0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5],
            [-0.5, -0.5, -0.5], [-0.5, 0.5, 0.5], [-0.5, -0.5, 0.5],
        ]),
        // right
        ([1.0, 0.0, 0.0], [
            [0.5, 0.5, 0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5],
            [0.5, -0.5, -0.5], [0.5, 0.5, 0.5], [0.5, -0.5, 0.5],
        ]),
        // bottom
        ([0.0, -1.0, 0.0], [
            [-0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [0.5, -0.5, -0.5],
            [0.5, -0.5, 0.5], [-0.5, -0.5, -0.5], [-0.5, -0.5, 0.5],
        ]),
        // top
        ([0.0, 1.0, 0.0], [
            [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5],
            [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5],
        ]),
    ];

    let vertices = faces
        .iter()
        .flat_map(|(normal, positions)| positions.iter().map(|&p| Vertex::new(p, *normal, CUBE_COLOR)))
        .collect();

    // 右侧面的两个三角形需要交换绕序
    let mut indices: Vec<u32> = (0..36).collect();
    indices[18..24].copy_from_slice(&[18, 20, 19, 21, 23, 22]);

    Mesh {
        name: "cube",
        vertices,
        indices,
    }
}

/// 每帧绘制的一个物体
#[derive(Clone, Debug)]
pub struct Drawable {
    pub name: String,
    pub vertex_view: VertexBufferView,
    pub index_view: IndexBufferView,
    pub index_count: u32,
    pub model: Mat4,
}

/// 绕固定轴匀速旋转的物体
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpinningCube {
    pub angle_deg: f32,
    /// 度每秒
    pub spin_rate: f32,
    pub axis: Vec3,
    pub translation: Vec3,
}
impl SpinningCube {
    pub fn new(spin_rate: f32, distance: f32) -> Self {
        Self {
            angle_deg: 0.0,
            spin_rate,
            axis: Vec3::splat(0.57735),
            translation: Vec3::new(0.0, 0.0, -distance),
        }
    }

    /// dt 为 0 时角度保持不变
    #[inline]
    pub fn advance(&mut self, dt: f32) {
        self.angle_deg += self.spin_rate * dt;
    }

    /// T · R
    pub fn model(&self) -> Mat4 {
        Mat4::from_translation(self.translation) * math::rotation_axis_angle_deg(self.axis, self.angle_deg)
    }
}

/// 叠加在头部姿态上的相机偏移，默认为单位变换
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraRig {
    pub rot_hor_deg: f32,
    pub rot_vert_deg: f32,
    pub starting_pos: Vec3,
}
impl CameraRig {
    /// qVert · qHor，竖直旋转的轴跟随水平旋转
    pub fn rotation(&self) -> Quat {
        let q_hor = math::quat_from_axis_angle_deg(Vec3::Y, self.rot_hor_deg);
        let hor_rad = self.rot_hor_deg * math::DEG_TO_RAD;
        let vert_axis = Vec3::new(hor_rad.cos(), 0.0, -hor_rad.sin());
        let q_vert = math::quat_from_axis_angle_deg(vert_axis, self.rot_vert_deg);
        q_vert * q_hor
    }

    /// 由头显给出的眼睛位姿计算相机的世界空间位姿
    pub fn eye_camera(&self, eye_orientation: Quat, eye_position: Vec3) -> (Quat, Vec3) {
        let q_rot = self.rotation();
        let rotation = eye_orientation * q_rot;
        let position = math::rotate_by_quat(eye_position, q_rot) + self.starting_pos;
        (rotation, position)
    }
}

/// 按照绘制顺序排列的物体
pub struct Scene {
    pub drawables: Vec<Drawable>,
    pub spinner: SpinningCube,
    /// spinner 控制的 drawable 的下标
    pub spinner_target: Option<usize>,
    pub camera: CameraRig,
}
impl Scene {
    pub fn new(drawables: Vec<Drawable>, spinner: SpinningCube, spinner_target: Option<usize>) -> Self {
        let mut scene = Self {
            drawables,
            spinner,
            spinner_target,
            camera: CameraRig::default(),
        };
        scene.update(0.0);
        scene
    }

    /// 推进场景时间，dt 已经考虑了暂停
    pub fn update(&mut self, dt: f32) {
        self.spinner.advance(dt);
        if let Some(drawable) = self.spinner_target.and_then(|i| self.drawables.get_mut(i)) {
            drawable.model = self.spinner.model();
        }
    }
}
