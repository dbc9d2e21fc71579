// viewer.rs — 导览视图协调器
//
// 持有当前全景、切换状态机、轨道控制与 FOV 变焦，
// 在它们之间仲裁指针输入，并把共享光标样式收敛到一处。

use crate::camera::{Camera, DEFAULT_FOV_DEG};
use crate::fov_zoom::{FovZoomConfig, FovZoomController};
use crate::hotspot::{HotspotLayer, NavigationIntent};
use crate::input::PointerEvent;
use crate::orbit::{OrbitConfig, OrbitControls};
use crate::project::Panorama;
use crate::transition::{Transition, TransitionEvent};
use glam::{Mat4, Vec2};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ViewerConfig {
    /// 视区高度（逻辑像素）；None 表示填满窗口。
    pub height: Option<f32>,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub enable_rotate: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_fov: f32,
    pub max_fov: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            height: None,
            enable_zoom: true,
            enable_pan: false,
            enable_rotate: true,
            min_distance: 1.0,
            max_distance: 10.0,
            min_fov: 40.0,
            max_fov: 75.0,
        }
    }
}

/// 画布光标样式。所有手势来源只写这一份状态，外壳只读。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStyle {
    Grab,
    Grabbing,
    Pointer,
}

pub struct OrbitViewer {
    panoramas: Vec<Panorama>,
    current: usize,
    camera: Camera,
    orbit: OrbitControls,
    fov_zoom: FovZoomController,
    transition: Transition,
    hotspots: HotspotLayer,
    /// 配置里的固定视区高度；None 用外壳给的实际高度。
    fixed_height: Option<f32>,
    viewport: Vec2,
    /// 切换中要跳去的全景下标与可选相机角度。
    pending: Option<(usize, Option<[f32; 2]>)>,
    /// 待外壳取走的纹理预载请求（image_url）。
    preload_queue: Vec<String>,
    dragging: bool,
    last_cursor: Vec2,
}

impl OrbitViewer {
    /// panoramas 不能为空；首张为初始全景。
    pub fn new(panoramas: Vec<Panorama>, config: ViewerConfig) -> Self {
        assert!(!panoramas.is_empty(), "viewer needs at least one panorama");

        let mut orbit = OrbitControls::new(OrbitConfig {
            enable_rotate: config.enable_rotate,
            enable_pan: config.enable_pan,
            rotate_speed: 1.0,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
        });
        if let Some(angles) = panoramas[0].default_camera_position {
            orbit.set_angles(angles);
        }

        let fov_zoom = FovZoomController::new(FovZoomConfig {
            enabled: config.enable_zoom,
            min_fov: config.min_fov,
            max_fov: config.max_fov,
            ..FovZoomConfig::default()
        });

        let hotspots = HotspotLayer::for_panorama(&panoramas[0]);
        let first_url = panoramas[0].image_url.clone();

        Self {
            panoramas,
            current: 0,
            camera: Camera::perspective(DEFAULT_FOV_DEG),
            orbit,
            fov_zoom,
            transition: Transition::default(),
            hotspots,
            fixed_height: config.height,
            viewport: Vec2::new(1.0, 1.0),
            pending: None,
            preload_queue: vec![first_url],
            dragging: false,
            last_cursor: Vec2::ZERO,
        }
    }

    pub fn current_panorama(&self) -> &Panorama {
        &self.panoramas[self.current]
    }

    pub fn panoramas(&self) -> &[Panorama] {
        &self.panoramas
    }

    pub fn hotspots(&self) -> &HotspotLayer {
        &self.hotspots
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_active()
    }

    pub fn overlay_opacity(&self) -> f32 {
        self.transition.overlay_opacity()
    }

    pub fn canvas_opacity(&self) -> f32 {
        self.transition.canvas_opacity()
    }

    pub fn fov_deg(&self) -> f32 {
        self.camera.fov_deg().unwrap_or(DEFAULT_FOV_DEG)
    }

    pub fn azimuthal_angle(&self) -> f32 {
        self.orbit.azimuthal_angle()
    }

    pub fn polar_angle(&self) -> f32 {
        self.orbit.polar_angle()
    }

    pub fn view_proj(&self) -> Mat4 {
        let aspect = if self.viewport.y > 0.0 {
            self.viewport.x / self.viewport.y
        } else {
            1.0
        };
        self.camera.projection_matrix(aspect) * self.orbit.view_matrix()
    }

    /// 取走累计的纹理预载请求。
    pub fn drain_preloads(&mut self) -> Vec<String> {
        std::mem::take(&mut self.preload_queue)
    }

    pub fn cursor_style(&self) -> CursorStyle {
        if self.hotspots.any_hovered() {
            CursorStyle::Pointer
        } else if self.dragging {
            CursorStyle::Grabbing
        } else {
            CursorStyle::Grab
        }
    }

    /// 每帧推进：切换状态机、变焦宽限、标记动画与重投影。
    pub fn update_frame(&mut self, viewport: Vec2, dt: Duration) {
        self.viewport = Vec2::new(viewport.x, self.fixed_height.unwrap_or(viewport.y));
        let viewport = self.viewport;

        for event in self.transition.tick(dt) {
            match event {
                TransitionEvent::Reposition => {
                    if let Some((_, Some(angles))) = self.pending {
                        self.orbit.set_angles(angles);
                        // 穿过热点后视野回到默认值
                        self.camera.set_fov_deg(DEFAULT_FOV_DEG);
                    }
                }
                TransitionEvent::Swap => {
                    if let Some((index, _)) = self.pending {
                        self.current = index;
                        self.hotspots = HotspotLayer::for_panorama(&self.panoramas[index]);
                    }
                }
                TransitionEvent::Finished => {
                    self.pending = None;
                }
            }
        }

        self.fov_zoom.tick(dt, &mut self.orbit);
        self.hotspots.tick(dt);

        let vp = self.view_proj();
        self.hotspots.project(&vp, viewport, self.fov_deg());
    }

    /// 指针输入入口。变焦系统优先；其余在标记层与轨道拖拽间仲裁。
    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        if self.fov_zoom.handle(event, &mut self.camera, &mut self.orbit) {
            // 多指手势期间不允许遗留单指拖拽
            self.dragging = false;
            return;
        }

        match *event {
            PointerEvent::Move(sample) => {
                self.hotspots.on_pointer_move(sample.pos);
                if self.dragging && sample.pointer_count >= 1 {
                    let delta = sample.pos - self.last_cursor;
                    self.orbit.on_drag(delta, self.fov_deg(), self.viewport);
                }
                self.last_cursor = sample.pos;
            }
            PointerEvent::Down(sample) => {
                self.last_cursor = sample.pos;
                self.hotspots.on_pointer_move(sample.pos);
                if self.hotspots.on_pointer_down() {
                    return;
                }
                self.dragging = true;
            }
            PointerEvent::Up(_) | PointerEvent::Cancel(_) => {
                self.dragging = false;
                if let Some(intent) = self.hotspots.on_pointer_up() {
                    self.navigate(&intent);
                }
            }
            PointerEvent::Wheel { .. } => {}
        }
    }

    /// 回到当前全景的默认视角。
    pub fn reset_view(&mut self) {
        let angles = self
            .current_panorama()
            .default_camera_position
            .unwrap_or([0.0, std::f32::consts::FRAC_PI_2]);
        self.orbit.set_angles(angles);
        self.camera.set_fov_deg(DEFAULT_FOV_DEG);
    }

    /// 解析并启动一次导航。目标不存在 / 目标即当前 / 切换中 → 静默拒绝。
    pub fn navigate(&mut self, intent: &NavigationIntent) -> bool {
        if self.transition.is_active() {
            return false;
        }
        let Some(index) = self
            .panoramas
            .iter()
            .position(|p| p.id == intent.target_photo_id)
        else {
            return false;
        };
        if index == self.current {
            return false;
        }

        if !self.transition.begin() {
            return false;
        }
        self.pending = Some((index, intent.camera_position));
        // 即刻预载目标纹理，让遮罩盖住加载跳变
        self.preload_queue.push(self.panoramas[index].image_url.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Hotspot, Spherical};
    use std::f32::consts::FRAC_PI_2;

    fn panorama(id: &str, nodes: Vec<Hotspot>) -> Panorama {
        Panorama {
            id: id.into(),
            name: format!("pano {id}"),
            image_url: format!("/photos/{id}.webp"),
            default_camera_position: None,
            nodes,
        }
    }

    fn door_to(target: &str) -> Hotspot {
        Hotspot {
            id: "door".into(),
            label: "Porta".into(),
            spherical: Spherical {
                theta: 0.0,
                phi: FRAC_PI_2,
            },
            scale: 1.0,
            target_photo_id: target.into(),
            camera_position: Some([-FRAC_PI_2, FRAC_PI_2]),
        }
    }

    fn viewer_two_panoramas() -> OrbitViewer {
        let panoramas = vec![panorama("1", vec![door_to("2")]), panorama("2", vec![])];
        OrbitViewer::new(panoramas, ViewerConfig::default())
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn scenario_a_hotspot_navigation_repositions_then_swaps() {
        let mut viewer = viewer_two_panoramas();
        viewer.update_frame(Vec2::new(1280.0, 720.0), ms(0));

        let accepted = viewer.navigate(&NavigationIntent {
            target_photo_id: "2".into(),
            camera_position: Some([-FRAC_PI_2, FRAC_PI_2]),
        });
        assert!(accepted);
        assert!(viewer.is_transitioning());

        // 淡出阶段结束：相机按热点角度就位，FOV 归位，纹理还没换
        viewer.update_frame(Vec2::new(1280.0, 720.0), ms(310));
        assert!((viewer.azimuthal_angle() + FRAC_PI_2).abs() < 1e-5);
        assert!((viewer.polar_angle() - FRAC_PI_2).abs() < 1e-5);
        assert_eq!(viewer.fov_deg(), DEFAULT_FOV_DEG);
        assert_eq!(viewer.current_panorama().id, "1");

        // 跨过纹理切换点
        viewer.update_frame(Vec2::new(1280.0, 720.0), ms(100));
        assert_eq!(viewer.current_panorama().id, "2");
        assert!(viewer.is_transitioning());

        // 淡入完毕
        viewer.update_frame(Vec2::new(1280.0, 720.0), ms(200));
        assert!(!viewer.is_transitioning());
    }

    #[test]
    fn unresolvable_target_is_silently_ignored() {
        let mut viewer = viewer_two_panoramas();
        let accepted = viewer.navigate(&NavigationIntent {
            target_photo_id: "ghost".into(),
            camera_position: None,
        });
        assert!(!accepted);
        assert_eq!(viewer.current_panorama().id, "1");
        assert!(!viewer.is_transitioning());
    }

    #[test]
    fn navigating_to_current_panorama_noops() {
        let mut viewer = viewer_two_panoramas();
        assert!(!viewer.navigate(&NavigationIntent {
            target_photo_id: "1".into(),
            camera_position: None,
        }));
        assert!(!viewer.is_transitioning());
    }

    #[test]
    fn navigation_requests_are_ignored_while_transitioning() {
        let mut viewer = viewer_two_panoramas();
        assert!(viewer.navigate(&NavigationIntent {
            target_photo_id: "2".into(),
            camera_position: None,
        }));
        // 同目标与异目标一视同仁：切换期间全部拒绝
        assert!(!viewer.navigate(&NavigationIntent {
            target_photo_id: "2".into(),
            camera_position: None,
        }));
        assert!(!viewer.navigate(&NavigationIntent {
            target_photo_id: "1".into(),
            camera_position: None,
        }));
    }

    #[test]
    fn navigation_preloads_target_texture() {
        let mut viewer = viewer_two_panoramas();
        viewer.drain_preloads(); // 初始全景的请求
        viewer.navigate(&NavigationIntent {
            target_photo_id: "2".into(),
            camera_position: None,
        });
        let preloads = viewer.drain_preloads();
        assert_eq!(preloads, vec!["/photos/2.webp".to_string()]);
    }

    #[test]
    fn pointer_flow_drives_navigation_end_to_end() {
        use crate::input::{PointerEvent, PointerSample};

        let mut viewer = viewer_two_panoramas();
        let viewport = Vec2::new(1280.0, 720.0);
        viewer.update_frame(viewport, ms(0));

        // 标记在 θ=0 方向，与初始视线一致 → 屏幕中心
        let center = viewport * 0.5;
        let sample = |count| PointerSample {
            pos: center,
            pointer_count: count,
            span: None,
        };
        viewer.handle_pointer(&PointerEvent::Move(sample(0)));
        assert_eq!(viewer.cursor_style(), CursorStyle::Pointer);

        viewer.handle_pointer(&PointerEvent::Down(sample(1)));
        viewer.handle_pointer(&PointerEvent::Up(sample(0)));
        assert!(viewer.is_transitioning());

        viewer.update_frame(viewport, ms(600));
        assert_eq!(viewer.current_panorama().id, "2");
    }

    #[test]
    fn dragging_reports_grabbing_cursor() {
        use crate::input::{PointerEvent, PointerSample};

        let mut viewer = viewer_two_panoramas();
        let viewport = Vec2::new(1280.0, 720.0);
        viewer.update_frame(viewport, ms(0));

        // 远离标记的位置按下 → 进入轨道拖拽
        let off = Vec2::new(100.0, 100.0);
        viewer.handle_pointer(&PointerEvent::Move(PointerSample {
            pos: off,
            pointer_count: 0,
            span: None,
        }));
        viewer.handle_pointer(&PointerEvent::Down(PointerSample {
            pos: off,
            pointer_count: 1,
            span: None,
        }));
        assert_eq!(viewer.cursor_style(), CursorStyle::Grabbing);

        let before = viewer.azimuthal_angle();
        viewer.handle_pointer(&PointerEvent::Move(PointerSample {
            pos: off + Vec2::new(40.0, 0.0),
            pointer_count: 1,
            span: None,
        }));
        assert!(viewer.azimuthal_angle() != before);

        viewer.handle_pointer(&PointerEvent::Up(PointerSample {
            pos: off + Vec2::new(40.0, 0.0),
            pointer_count: 0,
            span: None,
        }));
        assert_eq!(viewer.cursor_style(), CursorStyle::Grab);
    }

    #[test]
    fn default_camera_position_is_applied_at_startup() {
        let mut first = panorama("1", vec![]);
        first.default_camera_position = Some([1.0, 2.0]);
        let viewer = OrbitViewer::new(vec![first], ViewerConfig::default());
        assert!((viewer.azimuthal_angle() - 1.0).abs() < 1e-6);
        assert!((viewer.polar_angle() - 2.0).abs() < 1e-6);
    }
}
