// lib.rs — 核心逻辑以库形式暴露：手势/导航状态机与外壳分离，便于测试

pub mod camera;
pub mod fov_zoom;
pub mod hotspot;
pub mod i18n;
pub mod input;
pub mod lightbox;
pub mod orbit;
pub mod project;
pub mod projection;
pub mod renderer;
pub mod sphere;
pub mod transition;
pub mod viewer;
