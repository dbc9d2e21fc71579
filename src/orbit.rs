// orbit.rs — 轨道视角控制
//
// 相机固定在球心，拖拽改变方位角 θ / 极角 φ。采用"抓取"手感：
// 画面跟随指针移动（相对默认轨道方向取反），拖拽灵敏度随 FOV 缩放，
// 保证不同变焦级别下指针与画面保持 1:1 贴合。

use glam::{Mat4, Vec2, Vec3};
use std::f32::consts::{FRAC_PI_2, PI};

const POLAR_EPS: f32 = 1e-4;

#[derive(Debug, Clone, Copy)]
pub struct OrbitConfig {
    pub enable_rotate: bool,
    pub enable_pan: bool,
    pub rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            enable_rotate: true,
            // 平移默认关闭：全景相机必须留在球心
            enable_pan: false,
            rotate_speed: 1.0,
            min_distance: 1.0,
            max_distance: 10.0,
        }
    }
}

#[derive(Debug)]
pub struct OrbitControls {
    config: OrbitConfig,
    /// 方位角（绕 Y 轴，弧度）。
    theta: f32,
    /// 极角（自 +Y 轴，弧度），夹在 (0, π) 内。
    phi: f32,
    /// 目标距离（本查看器相机不离开球心，仅做范围约束记录）。
    distance: f32,
    /// 视点位置。默认关闭平移时恒为球心。
    center: Vec3,
    /// FOV 变焦控制器在捏合期间会暂时关闭旋转。
    pub enabled: bool,
}

impl OrbitControls {
    pub fn new(config: OrbitConfig) -> Self {
        let distance = config.min_distance.max(1.0);
        Self {
            config,
            theta: 0.0,
            phi: FRAC_PI_2,
            distance,
            center: Vec3::ZERO,
            enabled: true,
        }
    }

    pub fn azimuthal_angle(&self) -> f32 {
        self.theta
    }

    pub fn polar_angle(&self) -> f32 {
        self.phi
    }

    pub fn set_azimuthal_angle(&mut self, theta: f32) {
        self.theta = theta;
    }

    pub fn set_polar_angle(&mut self, phi: f32) {
        self.phi = phi.clamp(POLAR_EPS, PI - POLAR_EPS);
    }

    pub fn set_angles(&mut self, angles: [f32; 2]) {
        self.set_azimuthal_angle(angles[0]);
        self.set_polar_angle(angles[1]);
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.clamp(self.config.min_distance, self.config.max_distance);
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// 指针拖拽增量 → 角度增量。
    /// 垂直 FOV 按视口高度均摊到每像素；水平方向用等效水平 FOV。
    pub fn on_drag(&mut self, delta: Vec2, fov_deg: f32, viewport: Vec2) {
        if !self.enabled || !self.config.enable_rotate {
            return;
        }
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return;
        }

        let v_fov = fov_deg.clamp(1.0, 179.0).to_radians();
        let aspect = viewport.x / viewport.y;
        let h_fov = 2.0 * ((v_fov * 0.5).tan() * aspect).atan();

        let yaw_per_px = h_fov / viewport.x;
        let pitch_per_px = v_fov / viewport.y;

        // 取反 = 抓取手感：向右拖，画面向右走
        self.theta -= delta.x * yaw_per_px * self.config.rotate_speed;
        self.set_polar_angle(self.phi + delta.y * pitch_per_px * self.config.rotate_speed);
    }

    /// 指针拖拽 → 视点平移（需要 enable_pan，默认关闭）。
    /// 像素按当前距离与 FOV 折算成世界位移，方向取视线的右/上基。
    pub fn on_pan(&mut self, delta: Vec2, fov_deg: f32, viewport: Vec2) {
        if !self.enabled || !self.config.enable_pan {
            return;
        }
        if viewport.y <= 0.0 {
            return;
        }

        let half_fov = fov_deg.clamp(1.0, 179.0).to_radians() * 0.5;
        let world_per_px = 2.0 * self.distance * half_fov.tan() / viewport.y;

        let forward = self.look_direction();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);

        self.center += (right * -delta.x + up * delta.y) * world_per_px;
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// 当前视线方向（单位向量）。
    pub fn look_direction(&self) -> Vec3 {
        Vec3::new(
            self.phi.sin() * self.theta.cos(),
            self.phi.cos(),
            self.phi.sin() * self.theta.sin(),
        )
    }

    /// 视点处的视图矩阵（平移关闭时即球心）。
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.center, self.center + self.look_direction(), Vec3::Y)
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(OrbitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Vec2 {
        Vec2::new(1280.0, 720.0)
    }

    #[test]
    fn set_angles_clamps_polar_to_open_interval() {
        let mut orbit = OrbitControls::default();
        orbit.set_angles([1.0, 0.0]);
        assert!(orbit.polar_angle() > 0.0);
        orbit.set_angles([1.0, PI]);
        assert!(orbit.polar_angle() < PI);
        assert_eq!(orbit.azimuthal_angle(), 1.0);
    }

    #[test]
    fn drag_right_decreases_azimuth() {
        let mut orbit = OrbitControls::default();
        let before = orbit.azimuthal_angle();
        orbit.on_drag(Vec2::new(50.0, 0.0), 75.0, viewport());
        assert!(orbit.azimuthal_angle() < before);
    }

    #[test]
    fn drag_down_increases_polar() {
        let mut orbit = OrbitControls::default();
        let before = orbit.polar_angle();
        orbit.on_drag(Vec2::new(0.0, 30.0), 75.0, viewport());
        assert!(orbit.polar_angle() > before);
    }

    #[test]
    fn narrower_fov_rotates_less_per_pixel() {
        let mut wide = OrbitControls::default();
        let mut narrow = OrbitControls::default();
        wide.on_drag(Vec2::new(100.0, 0.0), 75.0, viewport());
        narrow.on_drag(Vec2::new(100.0, 0.0), 40.0, viewport());
        let wide_delta = (wide.azimuthal_angle()).abs();
        let narrow_delta = (narrow.azimuthal_angle()).abs();
        assert!(narrow_delta < wide_delta);
    }

    #[test]
    fn disabled_controls_ignore_drag() {
        let mut orbit = OrbitControls::default();
        orbit.enabled = false;
        orbit.on_drag(Vec2::new(100.0, 100.0), 75.0, viewport());
        assert_eq!(orbit.azimuthal_angle(), 0.0);
        assert_eq!(orbit.polar_angle(), FRAC_PI_2);
    }

    #[test]
    fn distance_respects_configured_bounds() {
        let mut orbit = OrbitControls::new(OrbitConfig {
            min_distance: 2.0,
            max_distance: 8.0,
            ..OrbitConfig::default()
        });
        orbit.set_distance(100.0);
        assert_eq!(orbit.distance(), 8.0);
        orbit.set_distance(0.0);
        assert_eq!(orbit.distance(), 2.0);
    }

    #[test]
    fn look_direction_matches_spherical_basis() {
        let mut orbit = OrbitControls::default();
        orbit.set_angles([0.0, FRAC_PI_2]);
        let dir = orbit.look_direction();
        assert!((dir - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn pan_is_disabled_by_default() {
        let mut orbit = OrbitControls::default();
        orbit.on_pan(Vec2::new(100.0, 50.0), 75.0, viewport());
        assert_eq!(orbit.center(), Vec3::ZERO);
    }

    #[test]
    fn pan_moves_viewpoint_when_enabled() {
        let mut orbit = OrbitControls::new(OrbitConfig {
            enable_pan: true,
            ..OrbitConfig::default()
        });
        orbit.on_pan(Vec2::new(100.0, 0.0), 75.0, viewport());
        assert!(orbit.center().length() > 0.0);
    }
}
