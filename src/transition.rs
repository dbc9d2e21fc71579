// transition.rs — 全景切换的分段状态机
//
// 按帧推进的显式状态机：顺序约束（遮罩淡入 → 相机就位 →
// 纹理切换 → 遮罩淡出）由状态迁移本身保证，不依赖定时器回调，
// 测试也不需要任何时钟桩。

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    /// 黑色遮罩淡入，画面变暗。
    FadingOut,
    /// 遮罩全黑，相机已按目标角度就位。
    Repositioning,
    /// 纹理切换瞬间（零时长，只为产生事件点）。
    Swapping,
    /// 新纹理已就位，遮罩淡出。
    FadingIn,
}

/// 状态迁移时对外发布的副作用点，每次切换各恰好出现一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    /// 该把相机转到热点指定的角度了。
    Reposition,
    /// 该把活动全景换成目标全景了。
    Swap,
    /// 切换完成，回到 Idle。
    Finished,
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionTimings {
    pub fade_out: Duration,
    pub reposition: Duration,
    pub fade_in: Duration,
}

impl Default for TransitionTimings {
    fn default() -> Self {
        // 遮罩 300ms 盖住纹理加载的跳变，相机停留 100ms，再用 100ms 露出新场景
        Self {
            fade_out: Duration::from_millis(300),
            reposition: Duration::from_millis(100),
            fade_in: Duration::from_millis(100),
        }
    }
}

/// 遮罩峰值不透明度（全黑会让用户以为页面卡死）。
const OVERLAY_PEAK: f32 = 0.9;
/// 切换期间画布压暗到的不透明度。
const CANVAS_DIM: f32 = 0.2;

#[derive(Debug)]
pub struct Transition {
    phase: TransitionPhase,
    elapsed: Duration,
    timings: TransitionTimings,
}

impl Transition {
    pub fn new(timings: TransitionTimings) -> Self {
        Self {
            phase: TransitionPhase::Idle,
            elapsed: Duration::ZERO,
            timings,
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != TransitionPhase::Idle
    }

    /// 启动一次切换。已在切换中则拒绝。
    pub fn begin(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        self.phase = TransitionPhase::FadingOut;
        self.elapsed = Duration::ZERO;
        true
    }

    /// 推进 dt，返回途中跨过的事件（按发生顺序）。
    /// 一次大步长可能跨过多个阶段，事件顺序仍然保证。
    pub fn tick(&mut self, mut dt: Duration) -> Vec<TransitionEvent> {
        let mut events = Vec::new();
        loop {
            let phase_len = match self.phase {
                TransitionPhase::Idle => return events,
                TransitionPhase::FadingOut => self.timings.fade_out,
                TransitionPhase::Repositioning => self.timings.reposition,
                TransitionPhase::Swapping => Duration::ZERO,
                TransitionPhase::FadingIn => self.timings.fade_in,
            };

            let remaining = phase_len.saturating_sub(self.elapsed);
            if dt < remaining {
                self.elapsed += dt;
                return events;
            }
            dt -= remaining;
            self.elapsed = Duration::ZERO;

            match self.phase {
                TransitionPhase::FadingOut => {
                    self.phase = TransitionPhase::Repositioning;
                    events.push(TransitionEvent::Reposition);
                }
                TransitionPhase::Repositioning => {
                    self.phase = TransitionPhase::Swapping;
                    events.push(TransitionEvent::Swap);
                }
                TransitionPhase::Swapping => {
                    self.phase = TransitionPhase::FadingIn;
                }
                TransitionPhase::FadingIn => {
                    self.phase = TransitionPhase::Idle;
                    events.push(TransitionEvent::Finished);
                    return events;
                }
                TransitionPhase::Idle => unreachable!(),
            }
        }
    }

    /// 黑色遮罩当前不透明度 [0, OVERLAY_PEAK]。
    pub fn overlay_opacity(&self) -> f32 {
        match self.phase {
            TransitionPhase::Idle => 0.0,
            TransitionPhase::FadingOut => OVERLAY_PEAK * self.progress(self.timings.fade_out),
            TransitionPhase::Repositioning | TransitionPhase::Swapping => OVERLAY_PEAK,
            TransitionPhase::FadingIn => OVERLAY_PEAK * (1.0 - self.progress(self.timings.fade_in)),
        }
    }

    /// 画布不透明度 [CANVAS_DIM, 1]。
    pub fn canvas_opacity(&self) -> f32 {
        match self.phase {
            TransitionPhase::Idle => 1.0,
            TransitionPhase::FadingOut => {
                1.0 + (CANVAS_DIM - 1.0) * self.progress(self.timings.fade_out)
            }
            TransitionPhase::Repositioning | TransitionPhase::Swapping => CANVAS_DIM,
            TransitionPhase::FadingIn => {
                CANVAS_DIM + (1.0 - CANVAS_DIM) * self.progress(self.timings.fade_in)
            }
        }
    }

    fn progress(&self, len: Duration) -> f32 {
        if len.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / len.as_secs_f32()).clamp(0.0, 1.0)
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self::new(TransitionTimings::default())
    }
}
