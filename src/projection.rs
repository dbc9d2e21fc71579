// projection.rs — 热点的球面定位与屏幕投影数学

use glam::{Mat4, Vec2, Vec3, Vec4};

/// 热点标记所在半径：相对全景球（500）略微内缩，避免与纹理共面闪烁。
pub const MARKER_RADIUS: f32 = 490.0;
/// 标签锚点基准半径。
pub const LABEL_RADIUS: f32 = 480.0;
/// 每单位 scale 的半径内缩量。
pub const RADIUS_INSET: f32 = 20.0;
/// 标签相对标记的极角抬升（每单位 scale）。
pub const LABEL_PHI_LIFT: f32 = 0.06;

/// 球面角 (θ=方位角, φ=极角) → 直角坐标。
/// 有效半径为 `radius - scale * RADIUS_INSET`。
/// 纯函数；φ=0 / φ=π 的极点奇异性是球面坐标的固有边界，不做特殊处理。
pub fn spherical_to_cartesian(theta: f32, phi: f32, radius: f32, scale: f32) -> Vec3 {
    let offset_radius = radius - scale * RADIUS_INSET;
    Vec3::new(
        offset_radius * phi.sin() * theta.cos(),
        offset_radius * phi.cos(),
        offset_radius * phi.sin() * theta.sin(),
    )
}

/// 标记中心位置（基准半径 490，scale 固定取 1 保持同一内缩深度）。
pub fn marker_position(theta: f32, phi: f32) -> Vec3 {
    spherical_to_cartesian(theta, phi, MARKER_RADIUS, 1.0)
}

/// 标签锚点：半径更小、极角上移，使文字悬浮在标记上方而不遮挡。
pub fn label_anchor(theta: f32, phi: f32, scale: f32) -> Vec3 {
    let text_radius = LABEL_RADIUS - scale * RADIUS_INSET;
    let offset_phi = phi - LABEL_PHI_LIFT * scale;
    Vec3::new(
        text_radius * offset_phi.sin() * theta.cos(),
        text_radius * offset_phi.cos(),
        text_radius * offset_phi.sin() * theta.sin(),
    )
}

/// 世界坐标 → 屏幕像素坐标。位于相机背后时返回 None。
pub fn project_to_screen(world: Vec3, view_proj: &Mat4, viewport: Vec2) -> Option<Vec2> {
    let clip: Vec4 = *view_proj * world.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(Vec2::new(
        (ndc.x + 1.0) * 0.5 * viewport.x,
        (1.0 - ndc.y) * 0.5 * viewport.y,
    ))
}

/// 球面上一个小物体在屏幕上的近似像素半径。
/// 小角度近似：pixel = world_radius / (distance * tan(fov/2)) * (viewport_h / 2)
pub fn pixel_radius(world_radius: f32, distance: f32, fov_y_rad: f32, viewport_h: f32) -> f32 {
    let half_tan = (fov_y_rad * 0.5).tan();
    if half_tan <= 0.0 || distance <= 0.0 {
        return 0.0;
    }
    world_radius / (distance * half_tan) * (viewport_h * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    const EPS: f32 = 1e-3;

    #[test]
    fn cartesian_distance_equals_offset_radius() {
        let thetas = [0.0, 0.7, FRAC_PI_2, PI, -PI / 3.0, 2.0 * PI];
        let phis = [0.01, 0.5, FRAC_PI_2, 2.0, PI - 0.01];
        let scales = [0.5, 1.0, 2.0, 3.0];
        for &theta in &thetas {
            for &phi in &phis {
                for &scale in &scales {
                    let p = spherical_to_cartesian(theta, phi, MARKER_RADIUS, scale);
                    let expected = MARKER_RADIUS - scale * RADIUS_INSET;
                    assert!(
                        (p.length() - expected).abs() < EPS,
                        "theta={theta} phi={phi} scale={scale}: |p|={} expected={expected}",
                        p.length()
                    );
                }
            }
        }
    }

    #[test]
    fn poles_map_to_vertical_axis() {
        let top = spherical_to_cartesian(1.23, 0.0, MARKER_RADIUS, 1.0);
        assert!(top.x.abs() < EPS && top.z.abs() < EPS);
        assert!((top.y - (MARKER_RADIUS - RADIUS_INSET)).abs() < EPS);

        let bottom = spherical_to_cartesian(-0.4, PI, MARKER_RADIUS, 1.0);
        assert!((bottom.y + (MARKER_RADIUS - RADIUS_INSET)).abs() < EPS);
    }

    #[test]
    fn label_sits_above_marker() {
        let marker = marker_position(0.3, FRAC_PI_2);
        let label = label_anchor(0.3, FRAC_PI_2, 1.0);
        // 极角减小 → y 增大（更靠近上极点）
        assert!(label.y > marker.y);
    }

    #[test]
    fn projection_is_deterministic() {
        let a = spherical_to_cartesian(1.1, 1.9, MARKER_RADIUS, 2.0);
        let b = spherical_to_cartesian(1.1, 1.9, MARKER_RADIUS, 2.0);
        assert_eq!(a, b);
    }

    #[test]
    fn forward_point_projects_to_viewport_center() {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(75f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0);
        let vp = proj * view;
        let screen =
            project_to_screen(Vec3::new(0.0, 0.0, -470.0), &vp, Vec2::new(1600.0, 900.0)).unwrap();
        assert!((screen.x - 800.0).abs() < 0.5);
        assert!((screen.y - 450.0).abs() < 0.5);
    }

    #[test]
    fn behind_camera_is_culled() {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(75f32.to_radians(), 1.0, 0.1, 1000.0);
        let vp = proj * view;
        assert!(project_to_screen(Vec3::new(0.0, 0.0, 470.0), &vp, Vec2::splat(800.0)).is_none());
    }

    #[test]
    fn pixel_radius_shrinks_with_wider_fov() {
        let narrow = pixel_radius(8.0, 470.0, 40f32.to_radians(), 900.0);
        let wide = pixel_radius(8.0, 470.0, 75f32.to_radians(), 900.0);
        assert!(narrow > wide);
        assert!(wide > 0.0);
    }
}
