// input.rs — 统一的指针事件抽象
//
// 鼠标与触摸在这里归一成同一种事件：手势数学（锚点缩放、拖拽边界、
// 捏合距离）只写一份，不再按输入设备各写一套。

use glam::Vec2;
use winit::event::TouchPhase;

/// 一次指针采样：位置 + 当前按下的指针数 + 双指间距。
/// `pointer_count == 0` 表示悬停移动（未按下的鼠标）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    /// 多指时为各触点的质心。
    pub pos: Vec2,
    pub pointer_count: u32,
    /// 至少两指时，前两个触点的欧氏距离。
    pub span: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(PointerSample),
    Move(PointerSample),
    Up(PointerSample),
    /// 触摸被系统手势打断等异常结束。
    Cancel(PointerSample),
    /// 滚轮。delta_y 为像素尺度（向下滚动为正），与 Web wheel 约定一致。
    Wheel { pos: Vec2, delta_y: f32 },
}

/// winit 事件 → PointerEvent 的翻译层。
/// 持有鼠标位置/按键与按触点 id 的活动触摸表。
#[derive(Debug, Default)]
pub struct PointerTracker {
    cursor: Vec2,
    mouse_down: bool,
    // 按到达顺序保存，前两个触点参与 span 计算
    touches: Vec<(u64, Vec2)>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    pub fn mouse_moved(&mut self, x: f32, y: f32) -> PointerEvent {
        self.cursor = Vec2::new(x, y);
        PointerEvent::Move(PointerSample {
            pos: self.cursor,
            pointer_count: if self.mouse_down { 1 } else { 0 },
            span: None,
        })
    }

    pub fn mouse_button(&mut self, pressed: bool) -> PointerEvent {
        self.mouse_down = pressed;
        let sample = PointerSample {
            pos: self.cursor,
            pointer_count: if pressed { 1 } else { 0 },
            span: None,
        };
        if pressed {
            PointerEvent::Down(sample)
        } else {
            PointerEvent::Up(sample)
        }
    }

    pub fn wheel(&mut self, delta_y: f32) -> PointerEvent {
        PointerEvent::Wheel {
            pos: self.cursor,
            delta_y,
        }
    }

    pub fn touch(&mut self, phase: TouchPhase, id: u64, pos: Vec2) -> PointerEvent {
        match phase {
            TouchPhase::Started => {
                self.touches.retain(|(tid, _)| *tid != id);
                self.touches.push((id, pos));
                PointerEvent::Down(self.touch_sample())
            }
            TouchPhase::Moved => {
                if let Some(entry) = self.touches.iter_mut().find(|(tid, _)| *tid == id) {
                    entry.1 = pos;
                }
                PointerEvent::Move(self.touch_sample())
            }
            TouchPhase::Ended => {
                self.touches.retain(|(tid, _)| *tid != id);
                PointerEvent::Up(self.touch_sample_at(pos))
            }
            TouchPhase::Cancelled => {
                self.touches.retain(|(tid, _)| *tid != id);
                PointerEvent::Cancel(self.touch_sample_at(pos))
            }
        }
    }

    pub fn active_touches(&self) -> u32 {
        self.touches.len() as u32
    }

    fn touch_sample(&self) -> PointerSample {
        let count = self.touches.len() as u32;
        let pos = if self.touches.is_empty() {
            self.cursor
        } else {
            self.touches.iter().map(|(_, p)| *p).sum::<Vec2>() / self.touches.len() as f32
        };
        PointerSample {
            pos,
            pointer_count: count,
            span: self.span(),
        }
    }

    // 结束/取消事件：离开的触点已被移除，位置取其最后坐标
    fn touch_sample_at(&self, lifted: Vec2) -> PointerSample {
        let mut sample = self.touch_sample();
        if self.touches.is_empty() {
            sample.pos = lifted;
        }
        sample
    }

    fn span(&self) -> Option<f32> {
        if self.touches.len() < 2 {
            return None;
        }
        Some(self.touches[0].1.distance(self.touches[1].1))
    }
}

/// winit 滚轮增量 → Web 风格像素增量（向下为正）。
/// 行增量按每行 100px 折算；触摸板给出的像素增量直接取反。
pub fn wheel_delta_pixels(delta: winit::event::MouseScrollDelta) -> f32 {
    match delta {
        winit::event::MouseScrollDelta::LineDelta(_, y) => -y * 100.0,
        winit::event::MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hover_move_has_zero_pointer_count() {
        let mut tracker = PointerTracker::new();
        match tracker.mouse_moved(10.0, 20.0) {
            PointerEvent::Move(s) => {
                assert_eq!(s.pointer_count, 0);
                assert_eq!(s.pos, Vec2::new(10.0, 20.0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn mouse_press_then_drag_reports_one_pointer() {
        let mut tracker = PointerTracker::new();
        tracker.mouse_moved(5.0, 5.0);
        assert!(matches!(
            tracker.mouse_button(true),
            PointerEvent::Down(PointerSample {
                pointer_count: 1,
                ..
            })
        ));
        match tracker.mouse_moved(9.0, 5.0) {
            PointerEvent::Move(s) => assert_eq!(s.pointer_count, 1),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            tracker.mouse_button(false),
            PointerEvent::Up(PointerSample {
                pointer_count: 0,
                ..
            })
        ));
    }

    #[test]
    fn two_touches_report_span_and_centroid() {
        let mut tracker = PointerTracker::new();
        tracker.touch(TouchPhase::Started, 1, Vec2::new(0.0, 0.0));
        let event = tracker.touch(TouchPhase::Started, 2, Vec2::new(100.0, 0.0));
        match event {
            PointerEvent::Down(s) => {
                assert_eq!(s.pointer_count, 2);
                assert_eq!(s.span, Some(100.0));
                assert_eq!(s.pos, Vec2::new(50.0, 0.0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn lifting_all_touches_reaches_zero() {
        let mut tracker = PointerTracker::new();
        tracker.touch(TouchPhase::Started, 1, Vec2::ZERO);
        tracker.touch(TouchPhase::Started, 2, Vec2::new(40.0, 30.0));
        tracker.touch(TouchPhase::Ended, 1, Vec2::ZERO);
        let event = tracker.touch(TouchPhase::Ended, 2, Vec2::new(40.0, 30.0));
        match event {
            PointerEvent::Up(s) => {
                assert_eq!(s.pointer_count, 0);
                assert_eq!(s.span, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(tracker.active_touches(), 0);
    }

    #[test]
    fn cancelled_touch_is_removed() {
        let mut tracker = PointerTracker::new();
        tracker.touch(TouchPhase::Started, 7, Vec2::ZERO);
        let event = tracker.touch(TouchPhase::Cancelled, 7, Vec2::ZERO);
        assert!(matches!(event, PointerEvent::Cancel(_)));
        assert_eq!(tracker.active_touches(), 0);
    }
}
