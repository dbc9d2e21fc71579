// renderer.rs — wgpu 渲染宿主（全景球 Pass + egui Pass + 纹理装载）

use crate::sphere::{SphereMesh, SphereVertex};
use glam::Mat4;
use image::{GenericImage, Rgba, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{channel, Receiver, Sender};
use wgpu::util::DeviceExt;
use winit::window::Window;

/// UI 字体：优先使用 assets/fonts 下工作室自带的品牌字体，
/// 用 ab_glyph 先行校验，解析失败的文件直接跳过，egui 回退默认字体。
fn setup_ui_fonts(ctx: &egui::Context) {
    fn candidate_dirs() -> Vec<std::path::PathBuf> {
        let mut dirs = Vec::new();
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                dirs.push(dir.join("assets").join("fonts"));
            }
        }
        dirs.push(std::path::PathBuf::from("assets").join("fonts"));
        dirs
    }

    let mut chosen: Option<(std::path::PathBuf, Vec<u8>)> = None;
    'outer: for dir in candidate_dirs() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            if !matches!(ext.as_deref(), Some("ttf") | Some("otf")) {
                continue;
            }
            if let Ok(bytes) = std::fs::read(&path) {
                if ab_glyph::FontArc::try_from_vec(bytes.clone()).is_ok() {
                    chosen = Some((path, bytes));
                    break 'outer;
                }
            }
        }
    }

    let Some((path, bytes)) = chosen else {
        return;
    };
    log::info!("ui font: {}", path.display());

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("brand".to_owned(), egui::FontData::from_owned(bytes));
    if let Some(family) = fonts.families.get_mut(&egui::FontFamily::Proportional) {
        family.insert(0, "brand".to_owned());
    }
    ctx.set_fonts(fonts);
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    fade: f32,
    pad0: f32,
    pad1: f32,
    pad2: f32,
}

/// 解码结果的去向：全景纹理进显存，平面图交还给灯箱。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Panorama,
    Flat,
}

pub struct LoadedImage {
    pub path: String,
    pub image: RgbaImage,
}

pub struct Renderer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,

    // 球网格
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,

    // 纹理资源
    texture_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    placeholder_bind_group: wgpu::BindGroup,
    panorama_cache: HashMap<String, wgpu::BindGroup>,

    // 异步装载
    pending: HashSet<String>,
    tx: Sender<(String, ImageKind, RgbaImage)>,
    rx: Receiver<(String, ImageKind, RgbaImage)>,

    // Uniform
    scene_uniform: SceneUniform,
    scene_buffer: wgpu::Buffer,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: std::sync::Arc<Window>) -> Self {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }.unwrap();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .unwrap();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: if cfg!(target_arch = "wasm32") {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default().using_resolution(adapter.limits())
                    },
                    label: None,
                },
                None,
            )
            .await
            .unwrap();

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo, // VSync on
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        // --- 球网格缓冲 ---
        let mesh = SphereMesh::panorama_default();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let index_count = mesh.indices.len() as u32;

        // --- Uniform ---
        let scene_uniform = SceneUniform {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            fade: 1.0,
            pad0: 0.0,
            pad1: 0.0,
            pad2: 0.0,
        };
        let scene_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scene_uniform"),
            contents: bytemuck::cast_slice(&[scene_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        // 全景贴图不生成 mipmap，缩小用线性过滤
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::Repeat, // 水平方向循环
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
                label: Some("panorama_bind_group_layout"),
            });

        // 占位棋盘格：项目尚未装载时避免全黑
        let placeholder = {
            let mut img = RgbaImage::new(2, 2);
            img.put_pixel(0, 0, Rgba([60, 60, 60, 255]));
            img.put_pixel(1, 0, Rgba([90, 90, 90, 255]));
            img.put_pixel(0, 1, Rgba([90, 90, 90, 255]));
            img.put_pixel(1, 1, Rgba([60, 60, 60, 255]));
            img
        };
        let placeholder_bind_group = create_texture_bind_group(
            &device,
            &queue,
            &texture_bind_group_layout,
            &scene_buffer,
            &sampler,
            &placeholder,
            "placeholder",
        );

        // --- Pipeline ---
        let shader = device.create_shader_module(wgpu::include_wgsl!("shader_sphere.wgsl"));
        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("sphere_pipeline_layout"),
                bind_group_layouts: &[&texture_bind_group_layout],
                push_constant_ranges: &[],
            });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sphere_pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[SphereVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // 从球内侧观察，不剔除
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None, // 单个封闭球体，无需深度缓冲
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        // --- Egui ---
        let egui_ctx = egui::Context::default();
        setup_ui_fonts(&egui_ctx);

        let mut egui_state = egui_winit::State::new(window.as_ref());
        // 高分屏：显式设置 pixels_per_point
        egui_state.set_pixels_per_point(window.scale_factor() as f32);

        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        let (tx, rx) = channel();

        Self {
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            vertex_buffer,
            index_buffer,
            index_count,
            texture_bind_group_layout,
            sampler,
            placeholder_bind_group,
            panorama_cache: HashMap::new(),
            pending: HashSet::new(),
            tx,
            rx,
            scene_uniform,
            scene_buffer,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn update_scene(&mut self, view_proj: Mat4, fade: f32) {
        self.scene_uniform.view_proj = view_proj.to_cols_array_2d();
        self.scene_uniform.fade = fade.clamp(0.0, 1.0);
        self.queue.write_buffer(
            &self.scene_buffer,
            0,
            bytemuck::cast_slice(&[self.scene_uniform]),
        );
    }

    pub fn has_panorama(&self, path: &str) -> bool {
        self.panorama_cache.contains_key(path)
    }

    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
    }

    /// 发起后台解码（同图只发一次）。不等待完成。
    pub fn request_image(&mut self, path: &str, kind: ImageKind) {
        if self.pending.contains(path)
            || (kind == ImageKind::Panorama && self.panorama_cache.contains_key(path))
        {
            return;
        }
        self.pending.insert(path.to_string());
        spawn_decode(path.to_string(), kind, self.tx.clone());
    }

    /// 收取解码完成的图像：全景直接进显存缓存，平面图返回给调用方。
    pub fn poll_images(&mut self) -> Vec<LoadedImage> {
        let mut flat = Vec::new();
        while let Ok((path, kind, image)) = self.rx.try_recv() {
            self.pending.remove(&path);
            match kind {
                ImageKind::Panorama => self.install_panorama(&path, image),
                ImageKind::Flat => flat.push(LoadedImage { path, image }),
            }
        }
        flat
    }

    fn install_panorama(&mut self, path: &str, img: RgbaImage) {
        let img = fit_gpu_limits(img, self.device.limits().max_texture_dimension_2d);
        let img = pad_to_equirect(img);
        let bind_group = create_texture_bind_group(
            &self.device,
            &self.queue,
            &self.texture_bind_group_layout,
            &self.scene_buffer,
            &self.sampler,
            &img,
            path,
        );
        self.panorama_cache.insert(path.to_string(), bind_group);
    }

    pub fn render_with_ui(
        &mut self,
        window: &Window,
        active_panorama: Option<&str>,
        run_ui: impl FnOnce(&egui::Context),
    ) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        let bind_group = active_panorama
            .and_then(|p| self.panorama_cache.get(p))
            .unwrap_or(&self.placeholder_bind_group);

        // 1. 全景球
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sphere_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.05,
                            a: 1.0,
                        }),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.index_count, 0, 0..1);
        }

        // 2. UI
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);

        self.egui_state
            .handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn create_texture_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    scene_buffer: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
    img: &RgbaImage,
    label: &str,
) -> wgpu::BindGroup {
    let (width, height) = img.dimensions();
    let texture_size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        size: texture_size,
        mip_level_count: 1, // 不生成 mipmap
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        label: Some(label),
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        img,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        texture_size,
    );

    let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&texture_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some(label),
    })
}

/// 超过 GPU 纹理上限时按比例缩小。
fn fit_gpu_limits(img: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();
    if src_w <= max_dimension && src_h <= max_dimension {
        return img;
    }
    let scale = (max_dimension as f32 / src_w.max(src_h) as f32).min(1.0);
    let new_w = ((src_w as f32 * scale) as u32).max(1);
    let new_h = ((src_h as f32 * scale) as u32).max(1);
    log::warn!(
        "panorama {src_w}x{src_h} exceeds GPU limit {max_dimension}, scaling to {new_w}x{new_h}"
    );
    image::DynamicImage::ImageRgba8(img)
        .resize(new_w, new_h, image::imageops::FilterType::Lanczos3)
        .to_rgba8()
}

/// 非 2:1 的源图：以宽度为基准在顶部补黑，保证等距柱状采样不变形。
fn pad_to_equirect(img: RgbaImage) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();
    let target_h = src_w / 2;
    if target_h == 0 || src_h >= target_h {
        return img;
    }
    let mut canvas = RgbaImage::from_pixel(src_w, target_h, Rgba([0, 0, 0, 255]));
    let y_offset = target_h - src_h;
    // y_offset 已保证不越界
    let _ = canvas.copy_from(&img, 0, y_offset);
    canvas
}

/// 后台线程解码一张图片并送回主线程。失败只记日志，不打断查看器。
fn spawn_decode(path: String, kind: ImageKind, tx: Sender<(String, ImageKind, RgbaImage)>) {
    std::thread::spawn(move || {
        log::debug!("decoding {path}");

        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                log::error!("open {path}: {e}");
                return;
            }
        };
        let reader = std::io::BufReader::new(file);

        let result = image::io::Reader::new(reader)
            .with_guessed_format()
            .map_err(image::ImageError::IoError)
            .and_then(|mut r| {
                r.no_limits();
                r.decode()
            });

        match result {
            Ok(img) => {
                let rgba = img.to_rgba8();
                if tx.send((path, kind, rgba)).is_err() {
                    log::error!("main thread dropped image channel");
                }
            }
            Err(e) => log::error!("decode {path}: {e}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_image_is_padded_to_two_to_one() {
        let img = RgbaImage::from_pixel(400, 100, Rgba([10, 20, 30, 255]));
        let padded = pad_to_equirect(img);
        assert_eq!(padded.dimensions(), (400, 200));
        // 原图贴在底部，顶部为黑
        assert_eq!(padded.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(padded.get_pixel(0, 199).0, [10, 20, 30, 255]);
    }

    #[test]
    fn full_equirect_is_untouched() {
        let img = RgbaImage::from_pixel(400, 200, Rgba([1, 2, 3, 255]));
        let out = pad_to_equirect(img);
        assert_eq!(out.dimensions(), (400, 200));
    }

    #[test]
    fn oversized_image_is_downscaled() {
        let img = RgbaImage::from_pixel(256, 64, Rgba([5, 5, 5, 255]));
        let out = fit_gpu_limits(img, 128);
        assert!(out.width() <= 128 && out.height() <= 128);
    }

    #[test]
    fn small_image_is_not_rescaled() {
        let img = RgbaImage::from_pixel(64, 32, Rgba([5, 5, 5, 255]));
        let out = fit_gpu_limits(img, 128);
        assert_eq!(out.dimensions(), (64, 32));
    }
}
