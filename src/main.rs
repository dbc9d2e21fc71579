// main.rs — 外壳：winit 事件循环、输入路由、egui 菜单/状态栏/灯箱绘制

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // Release 下隐藏控制台窗口

use tour_viewer::hotspot::{
    HotspotVisual, EDGE_RING_INNER, EDGE_RING_OUTER, MARKER_WORLD_RADIUS, RING_INNER, RING_OUTER,
};
use tour_viewer::i18n;
use tour_viewer::input::{wheel_delta_pixels, PointerEvent, PointerTracker};
use tour_viewer::lightbox::{DeviceClass, Lightbox};
use tour_viewer::project::Project;
use tour_viewer::renderer::{ImageKind, Renderer};
use tour_viewer::viewer::{CursorStyle, OrbitViewer, ViewerConfig};

use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{CursorIcon, Fullscreen, WindowBuilder},
};

use glam::{Mat4, Vec2, Vec3};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// 内置演示项目：没有命令行参数时加载。
static DEMO_PROJECT: &str = include_str!("../assets/projects/casa.json");

/// 从命令行取项目文件路径（跳过 --lang 及其值）。
fn project_path_from_args() -> Option<PathBuf> {
    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        if a == "--lang" {
            let _ = it.next();
            continue;
        }
        if a.ends_with(".json") {
            return Some(PathBuf::from(a));
        }
    }
    None
}

fn load_project(path: &Path) -> Option<Project> {
    match Project::load(path) {
        Ok(p) => Some(p),
        Err(e) => {
            log::error!(
                "{}",
                i18n::tr_with("error.project_load", &[("err", e.to_string())])
            );
            None
        }
    }
}

fn build_viewer(project: &Project) -> Option<OrbitViewer> {
    if !project.has_tour() {
        return None;
    }
    Some(OrbitViewer::new(
        project.images_360.clone(),
        ViewerConfig::default(),
    ))
}

/// 提前从查看器里摘出的标记绘制数据，避免 UI 闭包里借用冲突。
struct HotspotSprite {
    center: Vec2,
    label_pos: Option<Vec2>,
    px_per_world: f32,
    scale: f32,
    visual: HotspotVisual,
    label: String,
    label_visible: bool,
}

fn collect_sprites(viewer: &OrbitViewer) -> Vec<HotspotSprite> {
    viewer
        .hotspots()
        .elements()
        .iter()
        .filter_map(|e| {
            let center = e.screen_pos()?;
            Some(HotspotSprite {
                center,
                label_pos: e.label_screen(),
                px_per_world: e.px_per_world(),
                scale: e.data.scale,
                visual: e.visual(),
                label: e.data.label.clone(),
                label_visible: e.label_visible(),
            })
        })
        .collect()
}

fn main() {
    env_logger::init();

    let mut current_lang = i18n::resolve_lang_from_args();
    i18n::init(current_lang.clone());

    let mut project = project_path_from_args()
        .and_then(|p| load_project(&p))
        .unwrap_or_else(|| Project::from_json_str(DEMO_PROJECT).expect("embedded demo project"));

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&i18n::tr("app.title"))
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .unwrap(),
    );

    let mut renderer = pollster::block_on(Renderer::new(window.clone()));
    let mut viewer = build_viewer(&project);

    // 输入
    let mut tracker = PointerTracker::new();
    let mut device_class = DeviceClass::Desktop;

    // 灯箱（打开时独占指针与键盘输入）
    let mut lightbox: Option<Lightbox> = None;
    let mut lightbox_textures: HashMap<String, egui::TextureHandle> = HashMap::new();

    // FPS
    let mut last_frame_time = Instant::now();
    let mut fps_window_start = Instant::now();
    let mut frame_count = 0u32;
    let mut fps = 0.0f32;
    let mut show_fps = false;
    let mut is_fullscreen = false;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理（菜单/按钮点击不再进入手势系统）
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                let scale = window.scale_factor();

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                    }

                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state != ElementState::Pressed {
                            return;
                        }
                        if lightbox.is_some() {
                            // 灯箱打开期间键盘只归它
                            let mut close = false;
                            if let Some(lb) = lightbox.as_mut() {
                                match input.virtual_keycode {
                                    Some(VirtualKeyCode::Left) => lb.prev(),
                                    Some(VirtualKeyCode::Right) => lb.next(),
                                    Some(VirtualKeyCode::Escape) => close = true,
                                    _ => {}
                                }
                            }
                            if close {
                                lightbox = None;
                            }
                            return;
                        }
                        match input.virtual_keycode {
                            Some(VirtualKeyCode::O) => {
                                if let Some(path) = rfd::FileDialog::new()
                                    .add_filter(&i18n::tr("file.filter.project"), &["json"])
                                    .pick_file()
                                {
                                    if let Some(p) = load_project(&path) {
                                        viewer = build_viewer(&p);
                                        project = p;
                                    }
                                }
                            }
                            Some(VirtualKeyCode::F11) => {
                                is_fullscreen = !is_fullscreen;
                                if is_fullscreen {
                                    window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                                } else {
                                    window.set_fullscreen(None);
                                }
                            }
                            _ => {}
                        }
                    }

                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left {
                            let ev = tracker.mouse_button(state == ElementState::Pressed);
                            route_pointer(&ev, &mut lightbox, &mut viewer);
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        let pos = position.to_logical::<f32>(scale);
                        let ev = tracker.mouse_moved(pos.x, pos.y);
                        route_pointer(&ev, &mut lightbox, &mut viewer);
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let ev = tracker.wheel(wheel_delta_pixels(delta));
                        route_pointer(&ev, &mut lightbox, &mut viewer);
                    }

                    WindowEvent::Touch(touch) => {
                        device_class = DeviceClass::Touch;
                        let pos = touch.location.to_logical::<f32>(scale);
                        let ev = tracker.touch(touch.phase, touch.id, Vec2::new(pos.x, pos.y));
                        route_pointer(&ev, &mut lightbox, &mut viewer);
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                let now = Instant::now();
                let dt = now.duration_since(last_frame_time);
                last_frame_time = now;

                // FPS 统计
                frame_count += 1;
                if now.duration_since(fps_window_start).as_secs_f32() >= 1.0 {
                    fps = frame_count as f32 / now.duration_since(fps_window_start).as_secs_f32();
                    frame_count = 0;
                    fps_window_start = now;
                }

                let scale = window.scale_factor();
                let logical = window.inner_size().to_logical::<f32>(scale);
                let viewport = Vec2::new(logical.width.max(1.0), logical.height.max(1.0));

                // 解码完成的平面图 → egui 纹理
                for loaded in renderer.poll_images() {
                    let size = [loaded.image.width() as usize, loaded.image.height() as usize];
                    let color = egui::ColorImage::from_rgba_unmultiplied(size, &loaded.image);
                    let handle = renderer.egui_ctx.load_texture(
                        loaded.path.clone(),
                        color,
                        egui::TextureOptions::LINEAR,
                    );
                    lightbox_textures.insert(loaded.path, handle);
                }

                // 查看器推进 + 场景 uniform
                let mut active_panorama: Option<String> = None;
                if let Some(v) = &mut viewer {
                    v.update_frame(viewport, dt);
                    for url in v.drain_preloads() {
                        renderer.request_image(&url, ImageKind::Panorama);
                    }
                    renderer.update_scene(v.view_proj(), v.canvas_opacity());
                    active_panorama = Some(v.current_panorama().image_url.clone());
                } else {
                    let aspect = viewport.x / viewport.y;
                    let proj = Mat4::perspective_rh(75f32.to_radians(), aspect, 0.1, 1000.0);
                    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::X, Vec3::Y);
                    renderer.update_scene(proj * view, 1.0);
                }

                // 灯箱当前图按需装载 + 布局刷新
                if let Some(lb) = &mut lightbox {
                    if let Some(path) = lb.current_image().map(str::to_string) {
                        match lightbox_textures.get(&path) {
                            Some(handle) => {
                                let tex = handle.size_vec2();
                                let fit = (viewport.x / tex.x).min(viewport.y / tex.y).min(1.0);
                                lb.set_layout(viewport, Vec2::new(tex.x * fit, tex.y * fit));
                            }
                            None => renderer.request_image(&path, ImageKind::Flat),
                        }
                    }
                }

                // 光标样式：唯一的读点
                let cursor = match (&lightbox, &viewer) {
                    (Some(_), _) => CursorIcon::Default,
                    (None, Some(v)) => match v.cursor_style() {
                        CursorStyle::Grab => CursorIcon::Grab,
                        CursorStyle::Grabbing => CursorIcon::Grabbing,
                        CursorStyle::Pointer => CursorIcon::Hand,
                    },
                    (None, None) => CursorIcon::Default,
                };
                window.set_cursor_icon(cursor);

                let sprites = if lightbox.is_none() {
                    viewer.as_ref().map(collect_sprites).unwrap_or_default()
                } else {
                    Vec::new()
                };
                let overlay_opacity = viewer.as_ref().map_or(0.0, |v| v.overlay_opacity());
                let transitioning = viewer.as_ref().is_some_and(|v| v.is_transitioning());
                let scene_name = viewer
                    .as_ref()
                    .map(|v| v.current_panorama().name.clone())
                    .unwrap_or_default();
                let fov_now = viewer.as_ref().map(|v| v.fov_deg());
                let angles_now = viewer
                    .as_ref()
                    .map(|v| (v.azimuthal_angle(), v.polar_angle()));
                let is_loading = renderer.is_loading();

                // 菜单里选中的项目文件，渲染结束后再装载
                let mut next_project: Option<PathBuf> = None;

                let viewer_ref = &mut viewer;
                let lightbox_ref = &mut lightbox;
                let textures_ref = &lightbox_textures;
                let project_ref = &project;
                let window_ref = window.clone();
                let lang_ref = &mut current_lang;
                let show_fps_ref = &mut show_fps;
                let fullscreen_ref = &mut is_fullscreen;

                let render_result =
                    renderer.render_with_ui(&window, active_panorama.as_deref(), |ctx| {
                        draw_hotspots(ctx, &sprites);
                        draw_overlay(ctx, overlay_opacity);
                        draw_menu_bar(
                            ctx,
                            viewer_ref,
                            project_ref,
                            &mut next_project,
                            &window_ref,
                            lang_ref,
                            show_fps_ref,
                            fullscreen_ref,
                        );
                        draw_gallery(ctx, project_ref, lightbox_ref, device_class);
                        draw_lightbox(ctx, lightbox_ref, textures_ref, project_ref);
                        draw_status_bar(
                            ctx,
                            &scene_name,
                            fov_now,
                            angles_now,
                            transitioning,
                            is_loading,
                            *show_fps_ref,
                            fps,
                        );
                    });

                if let Some(path) = next_project {
                    if let Some(p) = load_project(&path) {
                        viewer = build_viewer(&p);
                        project = p;
                    }
                }

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.resize(renderer.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    Err(e) => log::error!("render error: {e:?}"),
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            _ => {}
        }
    });
}

/// 灯箱打开时独占指针；否则交给 3D 查看器。
fn route_pointer(
    event: &PointerEvent,
    lightbox: &mut Option<Lightbox>,
    viewer: &mut Option<OrbitViewer>,
) {
    if let Some(lb) = lightbox {
        lb.handle_pointer(event);
    } else if let Some(v) = viewer {
        v.handle_pointer(event);
    }
}

const MARKER_FILL: egui::Color32 = egui::Color32::from_rgb(234, 165, 160);
const MARKER_EDGE: egui::Color32 = egui::Color32::from_rgb(171, 198, 171);

fn draw_hotspots(ctx: &egui::Context, sprites: &[HotspotSprite]) {
    let painter = ctx.layer_painter(egui::LayerId::background());
    for s in sprites {
        let center = egui::pos2(s.center.x, s.center.y);
        let base = MARKER_WORLD_RADIUS * s.scale * s.px_per_world;
        let radius = base * s.visual.scale;
        let alpha = (s.visual.opacity * 255.0) as u8;

        // 悬停光环
        if s.visual.ring_scale > 0.05 {
            let unit = s.scale * s.px_per_world * s.visual.ring_scale;
            let ring_mid = (RING_INNER + RING_OUTER) * 0.5 * unit;
            let ring_width = (RING_OUTER - RING_INNER) * unit;
            painter.circle_stroke(
                center,
                ring_mid,
                egui::Stroke::new(
                    ring_width,
                    egui::Color32::from_rgba_unmultiplied(171, 198, 171, 153),
                ),
            );
        }

        // 圆盘 + 常驻描边
        painter.circle_filled(
            center,
            radius,
            egui::Color32::from_rgba_unmultiplied(
                MARKER_FILL.r(),
                MARKER_FILL.g(),
                MARKER_FILL.b(),
                alpha,
            ),
        );
        painter.circle_stroke(
            center,
            radius,
            egui::Stroke::new(
                (EDGE_RING_OUTER - EDGE_RING_INNER) * s.scale * s.px_per_world,
                egui::Color32::from_rgba_unmultiplied(171, 198, 171, 204),
            ),
        );

        if s.label_visible {
            if let Some(pos) = s.label_pos {
                let font = egui::FontId::proportional((base).max(14.0));
                let anchor = egui::pos2(pos.x, pos.y);
                // 浅色衬底一圈，近似文字描边
                painter.text(
                    anchor + egui::vec2(1.0, 1.0),
                    egui::Align2::CENTER_CENTER,
                    &s.label,
                    font.clone(),
                    MARKER_EDGE,
                );
                painter.text(
                    anchor,
                    egui::Align2::CENTER_CENTER,
                    &s.label,
                    font,
                    egui::Color32::from_rgba_unmultiplied(0, 0, 0, 153),
                );
            }
        }
    }
}

fn draw_overlay(ctx: &egui::Context, opacity: f32) {
    if opacity <= 0.0 {
        return;
    }
    let painter = ctx.layer_painter(egui::LayerId::background());
    painter.rect_filled(
        ctx.screen_rect(),
        0.0,
        egui::Color32::from_black_alpha((opacity * 255.0) as u8),
    );
}

#[allow(clippy::too_many_arguments)]
fn draw_menu_bar(
    ctx: &egui::Context,
    viewer: &mut Option<OrbitViewer>,
    project: &Project,
    next_project: &mut Option<PathBuf>,
    window: &winit::window::Window,
    current_lang: &mut String,
    show_fps: &mut bool,
    is_fullscreen: &mut bool,
) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button(i18n::tr("menu.file"), |ui| {
                ui.label(egui::RichText::new(&project.title).strong());
                ui.separator();
                if ui.button(i18n::tr("menu.open_project")).clicked() {
                    ui.close_menu();
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter(&i18n::tr("file.filter.project"), &["json"])
                        .pick_file()
                    {
                        *next_project = Some(path);
                    }
                }
                if ui.button(i18n::tr("menu.exit")).clicked() {
                    std::process::exit(0);
                }
            });

            ui.menu_button(i18n::tr("menu.view"), |ui| {
                if ui.button(i18n::tr("view.reset")).clicked() {
                    if let Some(v) = viewer {
                        v.reset_view();
                    }
                    ui.close_menu();
                }

                if ui
                    .button(if *is_fullscreen {
                        i18n::tr("view.fullscreen.exit")
                    } else {
                        i18n::tr("view.fullscreen.enter")
                    })
                    .clicked()
                {
                    *is_fullscreen = !*is_fullscreen;
                    if *is_fullscreen {
                        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                    } else {
                        window.set_fullscreen(None);
                    }
                    ui.close_menu();
                }

                ui.separator();
                if ui.checkbox(show_fps, i18n::tr("view.show_fps")).clicked() {
                    ui.close_menu();
                }
            });

            ui.menu_button(i18n::tr("menu.language"), |ui| {
                let langs: [(&str, &str); 2] = [("pt-BR", "Português (Brasil)"), ("en", "English")];
                for (code, name) in langs {
                    if ui.radio_value(current_lang, code.to_string(), name).clicked() {
                        i18n::init(current_lang.clone());
                        window.set_title(&i18n::tr("app.title"));
                        ui.close_menu();
                    }
                }
            });
        });
    });
}

fn draw_gallery(
    ctx: &egui::Context,
    project: &Project,
    lightbox: &mut Option<Lightbox>,
    device: DeviceClass,
) {
    if project.images.is_empty() || lightbox.is_some() {
        return;
    }
    egui::TopBottomPanel::bottom("gallery").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(i18n::tr("gallery.title")).strong());
            egui::ScrollArea::horizontal().show(ui, |ui| {
                for (i, _) in project.images.iter().enumerate() {
                    let label =
                        i18n::tr_with("gallery.image", &[("n", (i + 1).to_string())]);
                    if ui.button(label).clicked() {
                        let rect = ctx.screen_rect();
                        let container = Vec2::new(rect.width(), rect.height());
                        *lightbox = Some(Lightbox::open(
                            project.images.clone(),
                            i,
                            device,
                            container,
                            container,
                        ));
                    }
                }
            });
        });
    });
}

fn draw_lightbox(
    ctx: &egui::Context,
    lightbox: &mut Option<Lightbox>,
    textures: &HashMap<String, egui::TextureHandle>,
    project: &Project,
) {
    let Some(lb) = lightbox.as_mut() else {
        return;
    };

    let screen = ctx.screen_rect();
    let painter = ctx.layer_painter(egui::LayerId::background());
    painter.rect_filled(screen, 0.0, egui::Color32::from_black_alpha(242));

    let texture = lb.current_image().and_then(|p| textures.get(p));
    match texture {
        Some(handle) => {
            let tex = handle.size_vec2();
            let fit = (screen.width() / tex.x)
                .min(screen.height() / tex.y)
                .min(1.0);
            let size = egui::vec2(tex.x * fit, tex.y * fit) * lb.zoom();
            let center = screen.center() + egui::vec2(lb.pan().x, lb.pan().y);
            let rect = egui::Rect::from_center_size(center, size);
            painter.image(
                handle.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        None => {
            painter.text(
                screen.center(),
                egui::Align2::CENTER_CENTER,
                i18n::tr("lightbox.loading"),
                egui::FontId::proportional(18.0),
                egui::Color32::GRAY,
            );
        }
    }

    let mut close = false;
    egui::TopBottomPanel::top("lightbox_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(&project.title).strong());
            ui.label(i18n::tr_with(
                "lightbox.counter",
                &[
                    ("current", (lb.index() + 1).to_string()),
                    ("total", lb.image_count().to_string()),
                ],
            ));
            if ui.button("←").clicked() {
                lb.prev();
            }
            if ui.button("→").clicked() {
                lb.next();
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("✕").clicked() {
                    close = true;
                }
                ui.label(
                    egui::RichText::new(i18n::tr("lightbox.hint"))
                        .small()
                        .color(egui::Color32::GRAY),
                );
            });
        });
    });

    if close {
        *lightbox = None;
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_status_bar(
    ctx: &egui::Context,
    scene_name: &str,
    fov: Option<f32>,
    angles: Option<(f32, f32)>,
    transitioning: bool,
    is_loading: bool,
    show_fps: bool,
    fps: f32,
) {
    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if is_loading {
                ui.label(
                    egui::RichText::new(i18n::tr("status.loading"))
                        .color(egui::Color32::YELLOW),
                );
                ui.label("|");
            }
            if transitioning {
                ui.label(i18n::tr("status.transitioning"));
                ui.label("|");
            }

            if !scene_name.is_empty() {
                ui.label(i18n::tr_with(
                    "status.scene",
                    &[("name", scene_name.to_string())],
                ));
                ui.label("|");
            } else {
                ui.label(i18n::tr("tour.no_tour"));
                ui.label("|");
            }

            if let Some(fov) = fov {
                ui.label(i18n::tr_with(
                    "status.fov",
                    &[("fov", format!("{fov:.1}"))],
                ));
                ui.label("|");
            }
            if let Some((theta, phi)) = angles {
                ui.label(format!("θ: {:.1}°", theta.to_degrees()));
                ui.label("|");
                ui.label(format!("φ: {:.1}°", phi.to_degrees()));
            }

            if show_fps {
                ui.label("|");
                ui.label(
                    egui::RichText::new(format!("FPS: {fps:.1}")).color(egui::Color32::GREEN),
                );
            }
        });
    });
}
