use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use ocular_gfx::rhi::types::{AdapterLuid, ColorFormat, Extent2D};

/// 每只眼睛的视野，用视锥四个方向半角的正切值表示（都是正数）
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FovPort {
    pub up_tan: f32,
    pub down_tan: f32,
    pub left_tan: f32,
    pub right_tan: f32,
}
impl FovPort {
    #[inline]
    pub const fn new(up_tan: f32, down_tan: f32, left_tan: f32, right_tan: f32) -> Self {
        Self {
            up_tan,
            down_tan,
            left_tan,
            right_tan,
        }
    }

    /// 左右镜像，用于从左眼的 FOV 推导右眼
    #[inline]
    pub fn mirrored(&self) -> Self {
        Self {
            left_tan: self.right_tan,
            right_tan: self.left_tan,
            ..*self
        }
    }
}

/// 刚体变换：先旋转再平移，单位为米
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub orientation: Quat,
    pub position: Vec3,
}
impl Pose {
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    #[inline]
    pub fn new(orientation: Quat, position: Vec3) -> Self {
        Self { orientation, position }
    }

    /// self * other，即在 self 的坐标系下放置 other
    #[inline]
    pub fn transform(&self, other: &Pose) -> Pose {
        Pose {
            orientation: self.orientation * other.orientation,
            position: self.position + self.orientation * other.position,
        }
    }
}
impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 像素坐标下的矩形
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Recti {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
impl Recti {
    #[inline]
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }

    #[inline]
    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

/// 头显的静态描述
#[derive(Clone, Debug)]
pub struct HmdDesc {
    pub product_name: String,
    pub manufacturer: String,
    pub firmware_major: u16,
    pub firmware_minor: u16,
    /// 整个屏幕（两只眼睛）的分辨率
    pub resolution: Extent2D,
    /// 每只眼睛的默认 FOV，长度即为眼睛数量
    pub default_eye_fov: Vec<FovPort>,
    pub max_eye_fov: Vec<FovPort>,
    pub display_refresh_rate: f32,
    /// 头显连接的显卡；为 None 表示运行时没有要求
    pub adapter_luid: Option<AdapterLuid>,
}
impl HmdDesc {
    #[inline]
    pub fn eye_count(&self) -> usize {
        self.default_eye_fov.len()
    }

    /// 逐项输出头显信息，获取到头显之后调用一次
    pub fn log_summary(&self) {
        log::info!("hmd product: {}", self.product_name);
        log::info!("hmd manufacturer: {}", self.manufacturer);
        log::info!("hmd firmware: {}.{}", self.firmware_major, self.firmware_minor);
        log::info!("hmd resolution: {}x{}", self.resolution.width, self.resolution.height);
        log::info!("hmd refresh rate: {}Hz", self.display_refresh_rate);
        for (eye, (default, max)) in self.default_eye_fov.iter().zip(&self.max_eye_fov).enumerate() {
            log::info!("hmd eye {eye} default fov: {default:?}");
            log::info!("hmd eye {eye} max fov: {max:?}");
        }
        if let Some(luid) = &self.adapter_luid {
            log::info!("hmd adapter luid: {luid:?}");
        }
    }
}

/// 每只眼睛的渲染参数，依赖于传入的 FOV
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeRenderDesc {
    pub eye: usize,
    pub fov: FovPort,
    pub distorted_viewport: Recti,
    pub pixels_per_tan_angle_at_center: Vec2,
    /// 眼睛相对于头显中心的位姿（已经包含了 IPD）
    pub hmd_to_eye_pose: Pose,
}

/// 每帧查询一次的会话状态，由运行时驱动
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    /// 应用的画面是否正在显示；为 false 时应该跳过渲染
    pub is_visible: bool,
    pub hmd_present: bool,
    pub hmd_mounted: bool,
    /// 显示被收回，需要销毁会话并重新创建
    pub display_lost: bool,
    pub should_quit: bool,
    pub should_recenter: bool,
    /// 为 false 时应用需要暂停（例如系统菜单打开）
    pub has_input_focus: bool,
}
impl Default for SessionStatus {
    fn default() -> Self {
        Self::RUNNING
    }
}
impl SessionStatus {
    /// 头显戴好、画面可见、有输入焦点
    pub const RUNNING: Self = Self {
        is_visible: true,
        hmd_present: true,
        hmd_mounted: true,
        display_lost: false,
        should_quit: false,
        should_recenter: false,
        has_input_focus: true,
    };
}

#[derive(Clone, Debug)]
pub struct SwapChainDesc {
    pub extent: Extent2D,
    pub format: ColorFormat,
    pub name: String,
}

/// 合成器内部 swap chain 的句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SwapChainHandle(pub u32);

/// `eye_poses` 的结果：每只眼睛的世界空间位姿，以及采样的时间戳
#[derive(Clone, Debug, PartialEq)]
pub struct EyePoses {
    pub poses: Vec<Pose>,
    pub sensor_sample_time: f64,
}

/// 提交给合成器的单只眼睛的图像信息
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerEye {
    pub swap_chain: SwapChainHandle,
    pub viewport: Recti,
    pub fov: FovPort,
    pub render_pose: Pose,
}

/// 提交给 `end_frame` 的图层
#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    /// 每只眼睛一张图像，按照各自的 FOV 和渲染时的姿态进行合成
    EyeFov { eyes: Vec<LayerEye>, sensor_sample_time: f64 },
}
