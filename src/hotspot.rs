// hotspot.rs — 球面导航标记：单个元素的交互状态机 + 当前全景的标记层

use crate::project::{Hotspot, Panorama};
use crate::projection;
use glam::{Mat4, Vec2, Vec3};
use std::time::Duration;

/// 标记圆盘的世界单位半径（乘以热点 scale）。
pub const MARKER_WORLD_RADIUS: f32 = 8.0;
/// 悬停光环的内/外半径（世界单位，乘 scale）。
pub const RING_INNER: f32 = 10.0;
pub const RING_OUTER: f32 = 12.0;
/// 常驻描边环。
pub const EDGE_RING_INNER: f32 = 7.5;
pub const EDGE_RING_OUTER: f32 = 8.5;

/// 交互状态：空闲 → 悬停 → 按下。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotState {
    Idle,
    Hovered,
    Pressed,
}

/// 松开按下的标记后向上抛出的导航意图。
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationIntent {
    pub target_photo_id: String,
    pub camera_position: Option<[f32; 2]>,
}

/// 插值后的视觉参数，供外层绘制。
#[derive(Debug, Clone, Copy)]
pub struct HotspotVisual {
    /// 标记整体缩放（悬停放大 / 按下缩小）。
    pub scale: f32,
    pub opacity: f32,
    /// 悬停光环缩放，0 表示不可见。
    pub ring_scale: f32,
}

// 悬停 1.3 放大全亮并出现光环，按下 0.9 收缩
fn visual_targets(state: HotspotState) -> HotspotVisual {
    match state {
        HotspotState::Idle => HotspotVisual {
            scale: 1.0,
            opacity: 0.8,
            ring_scale: 0.0,
        },
        HotspotState::Hovered => HotspotVisual {
            scale: 1.3,
            opacity: 1.0,
            ring_scale: 1.6,
        },
        HotspotState::Pressed => HotspotVisual {
            scale: 0.9,
            opacity: 1.0,
            ring_scale: 1.6,
        },
    }
}

/// 每帧向目标值阻尼逼近的保留系数基数。
const DAMPING: f32 = 0.15;

fn damp(current: f32, target: f32, dt: Duration) -> f32 {
    let retention = (1.0 - DAMPING).powf(dt.as_secs_f32() * 60.0);
    target + (current - target) * retention
}

#[derive(Debug)]
pub struct HotspotElement {
    pub data: Hotspot,
    state: HotspotState,
    visual: HotspotVisual,
    world_pos: Vec3,
    label_world: Vec3,
    /// 本帧投影结果；相机背面时为 None。
    screen_pos: Option<Vec2>,
    label_screen: Option<Vec2>,
    /// 本帧的命中半径（像素）。
    hit_radius_px: f32,
    /// 一个世界单位对应的像素数（绘制光环/文字用）。
    px_per_world: f32,
}

impl HotspotElement {
    fn new(data: Hotspot) -> Self {
        let world_pos = projection::marker_position(data.spherical.theta, data.spherical.phi);
        let label_world =
            projection::label_anchor(data.spherical.theta, data.spherical.phi, data.scale);
        Self {
            data,
            state: HotspotState::Idle,
            visual: visual_targets(HotspotState::Idle),
            world_pos,
            label_world,
            screen_pos: None,
            label_screen: None,
            hit_radius_px: 0.0,
            px_per_world: 0.0,
        }
    }

    pub fn state(&self) -> HotspotState {
        self.state
    }

    pub fn visual(&self) -> HotspotVisual {
        self.visual
    }

    pub fn screen_pos(&self) -> Option<Vec2> {
        self.screen_pos
    }

    pub fn label_screen(&self) -> Option<Vec2> {
        self.label_screen
    }

    pub fn px_per_world(&self) -> f32 {
        self.px_per_world
    }

    pub fn label_visible(&self) -> bool {
        matches!(self.state, HotspotState::Hovered | HotspotState::Pressed)
    }

    fn project(&mut self, view_proj: &Mat4, viewport: Vec2, fov_deg: f32) {
        self.screen_pos = projection::project_to_screen(self.world_pos, view_proj, viewport);
        self.label_screen = projection::project_to_screen(self.label_world, view_proj, viewport);
        self.px_per_world = projection::pixel_radius(
            1.0,
            self.world_pos.length(),
            fov_deg.to_radians(),
            viewport.y,
        );
        self.hit_radius_px =
            MARKER_WORLD_RADIUS * self.data.scale * self.visual.scale * self.px_per_world;
    }

    fn contains(&self, cursor: Vec2) -> bool {
        match self.screen_pos {
            Some(center) => center.distance(cursor) <= self.hit_radius_px,
            None => false,
        }
    }

    /// 悬停判定变化驱动状态迁移；按下状态在指针离开时一并取消。
    fn set_hover(&mut self, hovering: bool) {
        self.state = match (self.state, hovering) {
            (HotspotState::Idle, true) => HotspotState::Hovered,
            (HotspotState::Hovered, false) | (HotspotState::Pressed, false) => HotspotState::Idle,
            (state, _) => state,
        };
    }

    fn press(&mut self) -> bool {
        if self.state == HotspotState::Hovered {
            self.state = HotspotState::Pressed;
            true
        } else {
            false
        }
    }

    fn release(&mut self) -> Option<NavigationIntent> {
        if self.state != HotspotState::Pressed {
            return None;
        }
        // 松开后回到悬停：指针仍压在标记上
        self.state = HotspotState::Hovered;
        Some(NavigationIntent {
            target_photo_id: self.data.target_photo_id.clone(),
            camera_position: self.data.camera_position,
        })
    }

    fn tick(&mut self, dt: Duration) {
        let target = visual_targets(self.state);
        self.visual.scale = damp(self.visual.scale, target.scale, dt);
        self.visual.opacity = damp(self.visual.opacity, target.opacity, dt);
        self.visual.ring_scale = damp(self.visual.ring_scale, target.ring_scale, dt);
    }
}

/// 当前全景的标记集合。全景切换时整层重建，不跨全景保留任何状态。
#[derive(Debug, Default)]
pub struct HotspotLayer {
    elements: Vec<HotspotElement>,
    cursor: Vec2,
}

impl HotspotLayer {
    pub fn for_panorama(panorama: &Panorama) -> Self {
        Self {
            elements: panorama.nodes.iter().cloned().map(HotspotElement::new).collect(),
            cursor: Vec2::ZERO,
        }
    }

    pub fn elements(&self) -> &[HotspotElement] {
        &self.elements
    }

    pub fn any_hovered(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e.state, HotspotState::Hovered | HotspotState::Pressed))
    }

    /// 每帧：用当前相机重投影所有标记，并按最新指针位置刷新悬停。
    pub fn project(&mut self, view_proj: &Mat4, viewport: Vec2, fov_deg: f32) {
        for element in &mut self.elements {
            element.project(view_proj, viewport, fov_deg);
        }
        self.refresh_hover();
    }

    pub fn on_pointer_move(&mut self, cursor: Vec2) {
        self.cursor = cursor;
        self.refresh_hover();
    }

    /// 按下：命中某个悬停标记则占用该事件。
    pub fn on_pointer_down(&mut self) -> bool {
        self.elements.iter_mut().any(|e| e.press())
    }

    /// 松开：已按下的标记抛出导航意图。
    pub fn on_pointer_up(&mut self) -> Option<NavigationIntent> {
        self.elements.iter_mut().find_map(|e| e.release())
    }

    pub fn tick(&mut self, dt: Duration) {
        for element in &mut self.elements {
            element.tick(dt);
        }
    }

    fn refresh_hover(&mut self) {
        for element in &mut self.elements {
            let hovering = element.contains(self.cursor);
            element.set_hover(hovering);
        }
    }
}
