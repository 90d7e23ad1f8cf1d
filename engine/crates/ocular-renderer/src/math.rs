//! 渲染用到的几个特定公式
//!
//! 约定：右手坐标系，列向量（`M * v`），相机看向 -Z；
//! 投影之后 NDC 的 y 轴向上，depth 在 near 处为 0、far 处为 1

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};
use ocular_xr::types::FovPort;

use crate::error::MathError;

/// 角度统一使用度，通过这个常量转换为弧度
pub const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;

/// 绕单位轴 axis 旋转 angle 度的单位四元数
#[inline]
pub fn quat_from_axis_angle_deg(axis: Vec3, angle_deg: f32) -> Quat {
    let half = angle_deg * DEG_TO_RAD * 0.5;
    let s = half.sin();
    Quat::from_xyzw(axis.x * s, axis.y * s, axis.z * s, half.cos())
}

/// 用单位四元数旋转向量
///
/// `v' = (2w²−1)v + 2(q_v·v)q_v + 2w(q_v×v)`
#[inline]
pub fn rotate_by_quat(v: Vec3, q: Quat) -> Vec3 {
    let q_v = Vec3::new(q.x, q.y, q.z);
    let w = q.w;
    (2.0 * w * w - 1.0) * v + 2.0 * q_v.dot(v) * q_v + 2.0 * w * q_v.cross(v)
}

/// 绕单位轴 axis 旋转 angle 度的矩阵
#[inline]
pub fn rotation_axis_angle_deg(axis: Vec3, angle_deg: f32) -> Mat4 {
    Mat4::from_axis_angle(axis, angle_deg * DEG_TO_RAD)
}

/// 相机位于 position、朝向为 rotation 时的 view 矩阵：`R^T (v - p)`
pub fn view_from_pose(rotation: Quat, position: Vec3) -> Mat4 {
    let r_t = Mat3::from_quat(rotation).transpose();
    let t = -(r_t * position);
    Mat4::from_cols(
        r_t.x_axis.extend(0.0),
        r_t.y_axis.extend(0.0),
        r_t.z_axis.extend(0.0),
        t.extend(1.0),
    )
}

fn check_depth_range(near: f32, far: f32) -> Result<(), MathError> {
    if !(near > 0.0 && far > near && far.is_finite()) {
        return Err(MathError::InvalidProjection(format!("near = {near}, far = {far}")));
    }
    Ok(())
}

/// 由四个方向的 FOV 正切值构建的非对称（off-axis）透视投影
///
/// - `x_clip = xs·x − xo·z`，`xs = 2/(L+R)`，`xo = (L−R)/(L+R)`
/// - `y_clip = ys·y + yo·z`，`ys = 2/(U+D)`，`yo = (U−D)/(U+D)`
/// - `z_clip = f/(n−f)·z + n·f/(n−f)`，`w_clip = −z`
pub fn off_axis_projection_rh(fov: &FovPort, near: f32, far: f32) -> Result<Mat4, MathError> {
    check_depth_range(near, far)?;
    let horizontal = fov.left_tan + fov.right_tan;
    let vertical = fov.up_tan + fov.down_tan;
    if !(horizontal > 0.0 && vertical > 0.0) {
        return Err(MathError::InvalidProjection(format!("degenerate fov {fov:?}")));
    }

    let x_scale = 2.0 / horizontal;
    let x_offset = (fov.left_tan - fov.right_tan) * x_scale * 0.5;
    let y_scale = 2.0 / vertical;
    let y_offset = (fov.up_tan - fov.down_tan) * y_scale * 0.5;
    let n_min_f = far / (near - far);

    Ok(Mat4::from_cols(
        Vec4::new(x_scale, 0.0, 0.0, 0.0),
        Vec4::new(0.0, y_scale, 0.0, 0.0),
        Vec4::new(-x_offset, y_offset, n_min_f, -1.0),
        Vec4::new(0.0, 0.0, near * n_min_f, 0.0),
    ))
}

/// 对称的透视投影，FOV 单位为度
///
/// 和 off-axis 版本使用相同的 depth 约定；x 方向的缩放额外乘以 `height / width`
pub fn perspective_rh(
    width: u32,
    height: u32,
    h_fov_deg: f32,
    v_fov_deg: f32,
    near: f32,
    far: f32,
) -> Result<Mat4, MathError> {
    check_depth_range(near, far)?;
    if width == 0 || height == 0 {
        return Err(MathError::InvalidProjection(format!("viewport {width}x{height}")));
    }
    let tan_h = (h_fov_deg * DEG_TO_RAD * 0.5).tan();
    let tan_v = (v_fov_deg * DEG_TO_RAD * 0.5).tan();
    if !(tan_h > 0.0 && tan_v > 0.0 && tan_h.is_finite() && tan_v.is_finite()) {
        return Err(MathError::InvalidProjection(format!("fov {h_fov_deg}° x {v_fov_deg}°")));
    }

    let aspect = height as f32 / width as f32;
    let n_min_f = far / (near - far);
    Ok(Mat4::from_cols(
        Vec4::new(aspect / tan_h, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 1.0 / tan_v, 0.0, 0.0),
        Vec4::new(0.0, 0.0, n_min_f, -1.0),
        Vec4::new(0.0, 0.0, near * n_min_f, 0.0),
    ))
}

/// model 矩阵左上角 3x3 的逆转置，用于变换法线
///
/// 使用余子式展开：逆转置的三列为 `c1×c2, c2×c0, c0×c1` 除以行列式
pub fn inverse_transpose_3x3(model: &Mat4) -> Result<Mat3, MathError> {
    let c0 = model.x_axis.truncate();
    let c1 = model.y_axis.truncate();
    let c2 = model.z_axis.truncate();

    let cof0 = c1.cross(c2);
    let determinant = c0.dot(cof0);
    if determinant == 0.0 || !determinant.is_finite() {
        return Err(MathError::SingularMatrix { determinant });
    }

    let inv_det = 1.0 / determinant;
    Ok(Mat3::from_cols(cof0 * inv_det, c2.cross(c0) * inv_det, c0.cross(c1) * inv_det))
}
