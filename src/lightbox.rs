// lightbox.rs — 平面图灯箱的平移/缩放手势状态机
//
// 与 3D 查看器完全独立的二维手势系统：单击缩放、拖拽平移（带边界）、
// 双指捏合（锚定捏合中点）、滚轮缩放（锚定光标）。所有位置都用
// 灯箱容器的本地坐标（左上角为原点）。

use crate::input::PointerEvent;
use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Desktop,
    Touch,
}

#[derive(Debug, Clone, Copy)]
pub struct LightboxConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// 位移不超过该阈值的按下-抬起视为单击。
    pub click_threshold_px: f32,
    /// 单击放大的初始倍率。桌面更大：触屏用户可以继续捏合。
    pub desktop_click_zoom: f32,
    pub touch_click_zoom: f32,
    /// 每个滚轮刻度的缩放步长。
    pub wheel_step: f32,
    /// 桌面边界允许越过图像真实边缘的比例（手感回弹余量）。
    pub desktop_overscroll: f32,
    /// 触屏布局下图像满屏高度，宽图会横向铺得很远，边界放宽。
    pub touch_h_factor: f32,
    pub touch_v_factor: f32,
}

impl Default for LightboxConfig {
    fn default() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 4.0,
            click_threshold_px: 5.0,
            desktop_click_zoom: 2.0,
            touch_click_zoom: 1.5,
            wheel_step: 0.1,
            desktop_overscroll: 0.1,
            touch_h_factor: 1.5,
            touch_v_factor: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    origin: Vec2,
    last: Vec2,
    start_pan: Vec2,
    /// 累计移动距离，区分单击与拖拽。
    moved: f32,
}

#[derive(Debug)]
pub struct Lightbox {
    config: LightboxConfig,
    device: DeviceClass,
    images: Vec<String>,
    index: usize,
    container: Vec2,
    /// 缩放 1 时图像的显示尺寸（像素）。
    image: Vec2,
    zoom: f32,
    pan: Vec2,
    drag: Option<DragState>,
    pinch_last_span: Option<f32>,
    /// 自上次全部抬起以来出现过捏合：抑制单指拖拽与单击判定。
    pinch_since_down: bool,
}

impl Lightbox {
    pub fn open(
        images: Vec<String>,
        start_index: usize,
        device: DeviceClass,
        container: Vec2,
        image: Vec2,
    ) -> Self {
        let index = if images.is_empty() {
            0
        } else {
            start_index.min(images.len() - 1)
        };
        Self {
            config: LightboxConfig::default(),
            device,
            images,
            index,
            container,
            image,
            zoom: 1.0,
            pan: Vec2::ZERO,
            drag: None,
            pinch_last_span: None,
            pinch_since_down: false,
        }
    }

    pub fn with_config(mut self, config: LightboxConfig) -> Self {
        self.config = config;
        self
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_image(&self) -> Option<&str> {
        self.images.get(self.index).map(String::as_str)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// 布局变化（窗口缩放、换图后的新尺寸）。
    pub fn set_layout(&mut self, container: Vec2, image: Vec2) {
        self.container = container;
        self.image = image;
        self.pan = self.clamp_pan(self.pan, self.zoom);
    }

    /// 重置到初始状态。
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan = Vec2::ZERO;
        self.drag = None;
        self.pinch_last_span = None;
        self.pinch_since_down = false;
    }

    /// 下一张（到末尾回卷到第一张）。切图清空缩放。
    pub fn next(&mut self) {
        if self.images.is_empty() {
            return;
        }
        self.index = (self.index + 1) % self.images.len();
        self.reset();
    }

    /// 上一张（到开头回卷到最后一张）。
    pub fn prev(&mut self) {
        if self.images.is_empty() {
            return;
        }
        self.index = (self.index + self.images.len() - 1) % self.images.len();
        self.reset();
    }

    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        match *event {
            PointerEvent::Down(sample) => {
                if sample.pointer_count >= 2 {
                    self.pinch_last_span = sample.span;
                    self.pinch_since_down = true;
                    self.drag = None;
                } else if !self.pinch_since_down {
                    self.drag = Some(DragState {
                        origin: sample.pos,
                        last: sample.pos,
                        start_pan: self.pan,
                        moved: 0.0,
                    });
                }
            }
            PointerEvent::Move(sample) => {
                if sample.pointer_count >= 2 {
                    self.pinch_since_down = true;
                    self.drag = None;
                    if let (Some(current), Some(previous)) = (sample.span, self.pinch_last_span) {
                        if previous > 0.0 {
                            let target = self.zoom * current / previous;
                            self.zoom_anchored(target, sample.pos);
                        }
                    }
                    if sample.span.is_some() {
                        self.pinch_last_span = sample.span;
                    }
                } else if sample.pointer_count == 1 && !self.pinch_since_down {
                    if let Some(drag) = &mut self.drag {
                        drag.moved += sample.pos.distance(drag.last);
                        drag.last = sample.pos;
                        if self.zoom > 1.0 {
                            let offset = sample.pos - drag.origin;
                            let proposed = drag.start_pan + offset;
                            self.pan = self.clamp_pan(proposed, self.zoom);
                        }
                    }
                }
            }
            PointerEvent::Up(sample) => {
                if sample.pointer_count == 0 {
                    let was_pinching = self.pinch_since_down;
                    self.pinch_last_span = None;
                    self.pinch_since_down = false;

                    if let Some(drag) = self.drag.take() {
                        if !was_pinching && drag.moved <= self.config.click_threshold_px {
                            self.click(drag.origin);
                        }
                    }
                } else {
                    // 一指先抬：捏合基准作废，剩余单指不再解释为拖拽
                    self.pinch_last_span = None;
                }
            }
            PointerEvent::Cancel(_) => {
                self.drag = None;
                self.pinch_last_span = None;
                self.pinch_since_down = false;
            }
            PointerEvent::Wheel { pos, delta_y } => {
                let step = if delta_y < 0.0 {
                    self.config.wheel_step
                } else {
                    -self.config.wheel_step
                };
                self.zoom_anchored(self.zoom + step, pos);
            }
        }
    }

    /// 单击：未放大时放大到初始倍率（锚定点击处），已放大时复位。
    fn click(&mut self, pos: Vec2) {
        if self.zoom <= 1.0 {
            let target = match self.device {
                DeviceClass::Desktop => self.config.desktop_click_zoom,
                DeviceClass::Touch => self.config.touch_click_zoom,
            };
            self.zoom_anchored(target, pos);
        } else {
            self.zoom = 1.0;
            self.pan = Vec2::ZERO;
        }
    }

    /// 锚点保持缩放：缩放前后锚点下方的图像点保持在同一屏幕位置。
    /// 几何信息异常时退化为不修正平移的普通缩放。
    fn zoom_anchored(&mut self, target: f32, anchor: Vec2) {
        let new_zoom = target.clamp(self.config.min_zoom, self.config.max_zoom);
        if new_zoom <= 1.0 {
            // 缩回原始倍率必须同时归零平移，否则图像会停在画面外
            self.zoom = 1.0;
            self.pan = Vec2::ZERO;
            return;
        }

        let old_zoom = self.zoom;
        self.zoom = new_zoom;

        if !self.anchor_math_valid(anchor) || old_zoom <= 0.0 {
            self.pan = self.clamp_pan(self.pan, new_zoom);
            return;
        }

        // 容器中心为原点：屏幕点 s 对应图像点 p = (s - pan) / z
        let rel = anchor - self.container * 0.5;
        let image_point = (rel - self.pan) / old_zoom;
        let proposed = rel - image_point * new_zoom;
        self.pan = self.clamp_pan(proposed, new_zoom);
    }

    fn anchor_math_valid(&self, anchor: Vec2) -> bool {
        anchor.is_finite()
            && self.container.is_finite()
            && self.container.x > 0.0
            && self.container.y > 0.0
    }

    fn clamp_pan(&self, pan: Vec2, zoom: f32) -> Vec2 {
        if zoom <= 1.0 {
            return Vec2::ZERO;
        }
        let bound = self.pan_bounds(zoom);
        Vec2::new(pan.x.clamp(-bound.x, bound.x), pan.y.clamp(-bound.y, bound.y))
    }

    /// 各设备档的平移边界（相对中心的对称范围）。
    fn pan_bounds(&self, zoom: f32) -> Vec2 {
        match self.device {
            DeviceClass::Desktop => Vec2::new(
                ((self.image.x * zoom - self.container.x) * 0.5
                    + self.container.x * self.config.desktop_overscroll)
                    .max(0.0),
                ((self.image.y * zoom - self.container.y) * 0.5
                    + self.container.y * self.config.desktop_overscroll)
                    .max(0.0),
            ),
            DeviceClass::Touch => Vec2::new(
                self.container.x * zoom * self.config.touch_h_factor,
                self.container.y * zoom * self.config.touch_v_factor,
            ),
        }
    }
}
