// fov_zoom.rs — 视场角变焦控制
//
// 滚轮与双指捏合都折算成相机 FOV 的增减，夹在配置范围内。
// 多指手势期间必须关闭轨道旋转，否则捏合会同时转动相机；
// 全部触点抬起后延迟一小段再恢复，吸收收尾阶段的残余触摸事件。

use crate::camera::Camera;
use crate::input::{PointerEvent, PointerSample};
use crate::orbit::OrbitControls;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct FovZoomConfig {
    pub enabled: bool,
    pub min_fov: f32,
    pub max_fov: f32,
    /// 度 / 滚轮像素。
    pub wheel_sensitivity: f32,
    /// 度 / 捏合间距像素。
    pub pinch_sensitivity: f32,
    /// 捏合结束后恢复轨道旋转的宽限时间。
    pub reenable_grace: Duration,
}

impl Default for FovZoomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_fov: 40.0,
            max_fov: 75.0,
            wheel_sensitivity: 0.05,
            pinch_sensitivity: 0.3,
            reenable_grace: Duration::from_millis(100),
        }
    }
}

#[derive(Debug)]
pub struct FovZoomController {
    config: FovZoomConfig,
    /// 上一次采样的双指间距；Some 即捏合进行中（或刚结束还未清理）。
    last_touch_distance: Option<f32>,
    /// 倒计时结束后恢复 orbit.enabled。
    reenable_in: Option<Duration>,
    warned_non_perspective: bool,
}

impl FovZoomController {
    pub fn new(config: FovZoomConfig) -> Self {
        Self {
            config,
            last_touch_distance: None,
            reenable_in: None,
            warned_non_perspective: false,
        }
    }

    pub fn config(&self) -> &FovZoomConfig {
        &self.config
    }

    pub fn pinch_active(&self) -> bool {
        self.last_touch_distance.is_some()
    }

    /// 处理一条指针事件。返回 true 表示事件已被变焦系统占用，
    /// 不应再交给轨道拖拽。
    pub fn handle(
        &mut self,
        event: &PointerEvent,
        camera: &mut Camera,
        orbit: &mut OrbitControls,
    ) -> bool {
        if !self.config.enabled {
            return false;
        }

        match event {
            PointerEvent::Wheel { delta_y, .. } => {
                self.apply_delta(*delta_y * self.config.wheel_sensitivity, camera);
                true
            }
            PointerEvent::Down(sample) => self.on_touch_down(sample, camera, orbit),
            PointerEvent::Move(sample) => self.on_touch_move(sample, camera, orbit),
            PointerEvent::Up(sample) | PointerEvent::Cancel(sample) => self.on_touch_up(sample),
        }
    }

    fn on_touch_down(
        &mut self,
        sample: &PointerSample,
        camera: &mut Camera,
        orbit: &mut OrbitControls,
    ) -> bool {
        if sample.pointer_count >= 2 {
            if !self.camera_supports_fov(camera) {
                return false;
            }
            orbit.enabled = false;
            self.reenable_in = None;
            self.last_touch_distance = sample.span;
            true
        } else {
            // 捏合收尾阶段的单指落下：吞掉，避免被当成轨道拖拽
            sample.pointer_count == 1 && self.pinch_active()
        }
    }

    fn on_touch_move(
        &mut self,
        sample: &PointerSample,
        camera: &mut Camera,
        orbit: &mut OrbitControls,
    ) -> bool {
        if sample.pointer_count >= 2 {
            if !self.camera_supports_fov(camera) {
                return false;
            }
            orbit.enabled = false;
            self.reenable_in = None;

            if let (Some(current), Some(previous)) = (sample.span, self.last_touch_distance) {
                let delta = (previous - current) * self.config.pinch_sensitivity;
                self.apply_delta(delta, camera);
            }
            if sample.span.is_some() {
                self.last_touch_distance = sample.span;
            }
            true
        } else {
            sample.pointer_count == 1 && self.pinch_active()
        }
    }

    fn on_touch_up(&mut self, sample: &PointerSample) -> bool {
        if sample.pointer_count == 0 {
            // 无论正常结束还是被系统打断，这里都必须走到：
            // 清理捏合状态并安排恢复，否则轨道会永久失效
            let was_pinching = self.pinch_active();
            self.last_touch_distance = None;
            if was_pinching {
                self.reenable_in = Some(self.config.reenable_grace);
            }
            was_pinching
        } else {
            // 仍有手指在屏上：保持占用
            self.pinch_active()
        }
    }

    /// 每帧推进宽限倒计时；到期恢复轨道旋转。
    pub fn tick(&mut self, dt: Duration, orbit: &mut OrbitControls) {
        if let Some(remaining) = self.reenable_in {
            if remaining <= dt {
                self.reenable_in = None;
                orbit.enabled = true;
            } else {
                self.reenable_in = Some(remaining - dt);
            }
        }
    }

    fn apply_delta(&mut self, delta: f32, camera: &mut Camera) {
        if !self.camera_supports_fov(camera) {
            return;
        }
        // camera_supports_fov 已校验过投影类型
        if let Some(fov) = camera.fov_deg() {
            let new_fov = (fov + delta).clamp(self.config.min_fov, self.config.max_fov);
            camera.set_fov_deg(new_fov);
        }
    }

    fn camera_supports_fov(&mut self, camera: &Camera) -> bool {
        if camera.fov_deg().is_some() {
            return true;
        }
        if !self.warned_non_perspective {
            log::warn!("fov zoom requires a perspective camera; ignoring zoom input");
            self.warned_non_perspective = true;
        }
        false
    }
}

impl Default for FovZoomController {
    fn default() -> Self {
        Self::new(FovZoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Projection;
    use glam::Vec2;

    fn sample(count: u32, span: Option<f32>) -> PointerSample {
        PointerSample {
            pos: Vec2::ZERO,
            pointer_count: count,
            span,
        }
    }

    fn setup() -> (FovZoomController, Camera, OrbitControls) {
        (
            FovZoomController::default(),
            Camera::perspective(75.0),
            OrbitControls::default(),
        )
    }

    #[test]
    fn wheel_zoom_is_clamped() {
        let (mut zoom, mut camera, mut orbit) = setup();
        // 向上滚（负增量）放大：fov 减小
        zoom.handle(
            &PointerEvent::Wheel {
                pos: Vec2::ZERO,
                delta_y: -200.0,
            },
            &mut camera,
            &mut orbit,
        );
        assert_eq!(camera.fov_deg(), Some(65.0));

        // 远超上界的缩小被夹取
        zoom.handle(
            &PointerEvent::Wheel {
                pos: Vec2::ZERO,
                delta_y: 100_000.0,
            },
            &mut camera,
            &mut orbit,
        );
        assert_eq!(camera.fov_deg(), Some(75.0));
    }

    #[test]
    fn pinch_applies_exact_sensitivity_delta() {
        // 间距 100 → 150，delta = (100 - 150) * 0.3 = -15
        let (mut zoom, mut camera, mut orbit) = setup();
        zoom.handle(
            &PointerEvent::Down(sample(2, Some(100.0))),
            &mut camera,
            &mut orbit,
        );
        zoom.handle(
            &PointerEvent::Move(sample(2, Some(150.0))),
            &mut camera,
            &mut orbit,
        );
        assert_eq!(camera.fov_deg(), Some(60.0));
    }

    #[test]
    fn pinch_result_is_clamped_to_bounds() {
        let (mut zoom, mut camera, mut orbit) = setup();
        zoom.handle(
            &PointerEvent::Down(sample(2, Some(500.0))),
            &mut camera,
            &mut orbit,
        );
        // 捏紧 400px：delta = +120，远超 max_fov
        zoom.handle(
            &PointerEvent::Move(sample(2, Some(100.0))),
            &mut camera,
            &mut orbit,
        );
        assert_eq!(camera.fov_deg(), Some(75.0));
    }

    #[test]
    fn pinch_disables_orbit_until_grace_elapses() {
        let (mut zoom, mut camera, mut orbit) = setup();
        zoom.handle(
            &PointerEvent::Down(sample(2, Some(80.0))),
            &mut camera,
            &mut orbit,
        );
        assert!(!orbit.enabled);

        zoom.handle(&PointerEvent::Up(sample(0, None)), &mut camera, &mut orbit);
        assert!(!orbit.enabled, "grace delay not elapsed yet");

        zoom.tick(Duration::from_millis(50), &mut orbit);
        assert!(!orbit.enabled);
        zoom.tick(Duration::from_millis(60), &mut orbit);
        assert!(orbit.enabled);
    }

    #[test]
    fn single_finger_during_pinch_is_suppressed() {
        let (mut zoom, mut camera, mut orbit) = setup();
        zoom.handle(
            &PointerEvent::Down(sample(2, Some(80.0))),
            &mut camera,
            &mut orbit,
        );
        // 一根手指抬起，另一根还在动：事件仍被占用
        zoom.handle(&PointerEvent::Up(sample(1, None)), &mut camera, &mut orbit);
        let consumed = zoom.handle(&PointerEvent::Move(sample(1, None)), &mut camera, &mut orbit);
        assert!(consumed);
    }

    #[test]
    fn cancel_also_releases_the_claim() {
        let (mut zoom, mut camera, mut orbit) = setup();
        zoom.handle(
            &PointerEvent::Down(sample(2, Some(80.0))),
            &mut camera,
            &mut orbit,
        );
        zoom.handle(
            &PointerEvent::Cancel(sample(0, None)),
            &mut camera,
            &mut orbit,
        );
        zoom.tick(Duration::from_millis(100), &mut orbit);
        assert!(orbit.enabled);
        assert!(!zoom.pinch_active());
    }

    #[test]
    fn non_perspective_camera_noops() {
        let mut zoom = FovZoomController::default();
        let mut camera = Camera {
            projection: Projection::Orthographic { height: 2.0 },
            near: 0.1,
            far: 10.0,
        };
        let mut orbit = OrbitControls::default();
        let consumed = zoom.handle(
            &PointerEvent::Wheel {
                pos: Vec2::ZERO,
                delta_y: -100.0,
            },
            &mut camera,
            &mut orbit,
        );
        assert!(consumed, "wheel is still a zoom gesture, just ineffective");
        assert_eq!(camera.fov_deg(), None);
        assert!(orbit.enabled);
    }

    #[test]
    fn disabled_controller_passes_events_through() {
        let mut zoom = FovZoomController::new(FovZoomConfig {
            enabled: false,
            ..FovZoomConfig::default()
        });
        let mut camera = Camera::perspective(75.0);
        let mut orbit = OrbitControls::default();
        let consumed = zoom.handle(
            &PointerEvent::Down(sample(2, Some(100.0))),
            &mut camera,
            &mut orbit,
        );
        assert!(!consumed);
        assert!(orbit.enabled);
        assert_eq!(camera.fov_deg(), Some(75.0));
    }
}
