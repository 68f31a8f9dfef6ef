use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Instant;

use anyhow::Context;

use crate::config::AppConfig;
use crate::history::EntryId;
use crate::loader::{self, LoadedImage};
use crate::session::{RenderOutput, Session};

const HISTORY_THUMB_EDGE: f32 = 140.0;

enum BgResult {
    Loaded(LoadedImage),
    Ignored(String),
    LoadFailed { name: String, error: String },
    Rendered(RenderOutput),
}

pub struct PhotoAdjustApp {
    session: Session,
    config: AppConfig,
    texture: Option<egui::TextureHandle>,
    surface_dirty: bool,
    thumbs: HashMap<EntryId, egui::TextureHandle>,
    stale_thumbs: HashSet<EntryId>,
    loading: usize,
    status: String,
    tx: mpsc::Sender<BgResult>,
    rx: mpsc::Receiver<BgResult>,
}

impl PhotoAdjustApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, paths: Vec<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel();
        let session = Session::new(config.debounce(), config.thumbnail_size());
        let mut app = Self {
            session,
            config,
            texture: None,
            surface_dirty: false,
            thumbs: HashMap::new(),
            stale_thumbs: HashSet::new(),
            loading: 0,
            status: String::new(),
            tx,
            rx,
        };
        for path in paths {
            app.spawn_load_path(path, &cc.egui_ctx);
        }
        app
    }

    fn spawn_load_path(&mut self, path: PathBuf, ctx: &egui::Context) {
        self.loading += 1;
        let tx = self.tx.clone();
        let ctx2 = ctx.clone();
        std::thread::spawn(move || {
            let name = display_name(&path);
            let msg = match loader::open(&path) {
                Ok(Some(img)) => BgResult::Loaded(img),
                Ok(None) => BgResult::Ignored(name),
                Err(err) => BgResult::LoadFailed {
                    name,
                    error: format!("{:#}", err),
                },
            };
            let _ = tx.send(msg);
            ctx2.request_repaint();
        });
    }

    fn spawn_load_bytes(&mut self, name: String, bytes: Arc<[u8]>, ctx: &egui::Context) {
        self.loading += 1;
        let tx = self.tx.clone();
        let ctx2 = ctx.clone();
        std::thread::spawn(move || {
            let msg = match loader::decode(&name, &bytes) {
                Ok(Some(img)) => BgResult::Loaded(img),
                Ok(None) => BgResult::Ignored(name),
                Err(err) => BgResult::LoadFailed {
                    name,
                    error: format!("{:#}", err),
                },
            };
            let _ = tx.send(msg);
            ctx2.request_repaint();
        });
    }

    fn drain(&mut self, now: Instant) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                BgResult::Loaded(img) => {
                    self.loading = self.loading.saturating_sub(1);
                    self.status = format!("Loaded {}", img.name);
                    let id = self.session.load(img, now);
                    self.surface_dirty = true;
                    self.stale_thumbs.insert(id);
                }
                BgResult::Ignored(name) => {
                    self.loading = self.loading.saturating_sub(1);
                    tracing::debug!(name = %name, "dropped file is not an image");
                }
                BgResult::LoadFailed { name, error } => {
                    self.loading = self.loading.saturating_sub(1);
                    tracing::warn!(name = %name, "load failed: {}", error);
                    self.status = format!("Could not open {}", name);
                }
                BgResult::Rendered(output) => {
                    if let Some(id) = self.session.complete(output, now) {
                        self.surface_dirty = true;
                        self.stale_thumbs.insert(id);
                    }
                }
            }
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<egui::DroppedFile> = ctx.input(|i| i.raw.dropped_files.clone());
        for file in dropped {
            if !file.mime.is_empty() && !file.mime.starts_with("image/") {
                continue;
            }
            if let Some(path) = file.path {
                self.spawn_load_path(path, ctx);
            } else if let Some(bytes) = file.bytes {
                self.spawn_load_bytes(file.name, bytes, ctx);
            }
        }
    }

    /// Starts a due render on a worker and keeps frames coming while one is
    /// pending.
    fn drive_render(&mut self, ctx: &egui::Context, now: Instant) {
        if let Some(job) = self.session.poll(now) {
            let tx = self.tx.clone();
            let ctx2 = ctx.clone();
            std::thread::spawn(move || {
                let _ = tx.send(BgResult::Rendered(job.run()));
                ctx2.request_repaint();
            });
        }
        if let Some(delay) = self.session.pending_delay(now) {
            ctx.request_repaint_after(delay);
        }
    }

    fn upload_surface(&mut self, ctx: &egui::Context) {
        self.surface_dirty = false;
        let pixels = self.session.surface().pixels();
        if pixels.width() == 0 || pixels.height() == 0 {
            self.texture = None;
            return;
        }
        let img = egui::ColorImage::from_rgba_unmultiplied(
            [pixels.width() as usize, pixels.height() as usize],
            pixels.as_raw(),
        );
        self.texture = Some(ctx.load_texture("surface_tex", img, egui::TextureOptions::LINEAR));
    }

    /// Re-uploads textures only for entries whose thumbnail changed.
    fn upload_thumbnails(&mut self, ctx: &egui::Context) {
        for id in std::mem::take(&mut self.stale_thumbs) {
            let Some(entry) = self.session.history().get(id) else {
                continue;
            };
            let Some(png) = self
                .session
                .store()
                .get(entry.key)
                .and_then(|s| s.thumbnail.as_deref())
            else {
                continue;
            };
            let Ok(decoded) = image::load_from_memory(png) else {
                continue;
            };
            let rgba = decoded.into_rgba8();
            let img = egui::ColorImage::from_rgba_unmultiplied(
                [rgba.width() as usize, rgba.height() as usize],
                rgba.as_raw(),
            );
            let tex = ctx.load_texture(
                format!("thumb_{}", entry.key),
                img,
                egui::TextureOptions::LINEAR,
            );
            self.thumbs.insert(entry.id, tex);
        }
    }

    fn export(&mut self) {
        let png = match self.session.export_png() {
            Ok(png) => png,
            Err(_) => {
                self.status = "No image to download".to_string();
                return;
            }
        };
        let path = self.config.export_path();
        match write_export(&path, &png) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "exported");
                self.status = format!("Saved {}", path.display());
            }
            Err(err) => {
                tracing::warn!("export failed: {:#}", err);
                self.status = format!("Export failed: {:#}", err);
            }
        }
    }

    fn show_history(&mut self, ctx: &egui::Context, now: Instant) {
        let mut clicked: Option<EntryId> = None;
        egui::SidePanel::left("history_panel")
            .resizable(false)
            .default_width(HISTORY_THUMB_EDGE + 20.0)
            .show(ctx, |ui| {
                ui.heading("History");
                ui.separator();
                let history = self.session.history();
                if history.is_empty() {
                    ui.weak("Drop images onto the window");
                    return;
                }
                egui::ScrollArea::vertical()
                    .id_salt("history_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for entry in history.entries() {
                            if let Some(tex) = self.thumbs.get(&entry.id) {
                                let size = tex.size_vec2();
                                let scale = (HISTORY_THUMB_EDGE / size.x)
                                    .min(HISTORY_THUMB_EDGE / size.y);
                                let (rect, resp) =
                                    ui.allocate_exact_size(size * scale, egui::Sense::click());
                                ui.painter().image(
                                    tex.id(),
                                    rect,
                                    egui::Rect::from_min_max(
                                        egui::pos2(0.0, 0.0),
                                        egui::pos2(1.0, 1.0),
                                    ),
                                    egui::Color32::WHITE,
                                );
                                if resp.clicked() {
                                    clicked = Some(entry.id);
                                }
                            }
                            let noised = self
                                .session
                                .store()
                                .get(entry.key)
                                .is_some_and(|s| s.noise_added);
                            let label = if noised {
                                format!("{} (noise)", entry.name)
                            } else {
                                entry.name.clone()
                            };
                            if ui
                                .selectable_label(history.is_selected(entry.id), label)
                                .clicked()
                            {
                                clicked = Some(entry.id);
                            }
                            ui.add_space(6.0);
                        }
                    });
            });
        if let Some(id) = clicked {
            if self.session.select(id, now) {
                self.surface_dirty = true;
            }
        }
    }

    fn show_controls(&mut self, ctx: &egui::Context, now: Instant) {
        egui::SidePanel::right("controls_panel")
            .resizable(false)
            .default_width(300.0)
            .show(ctx, |ui| {
                ui.heading("Adjust");
                ui.separator();

                let mut c = self.session.controls();
                let mut changed = false;
                changed |= slider(ui, "Brightness", &mut c.brightness, 0.0..=200.0, "%");
                changed |= slider(ui, "Contrast", &mut c.contrast, 0.0..=200.0, "%");
                changed |= slider(ui, "Saturation", &mut c.saturation, 0.0..=200.0, "%");
                changed |= slider(ui, "Temperature", &mut c.temperature, -180.0..=180.0, "°");
                changed |= slider(ui, "Rotation", &mut c.rotation, -180.0..=180.0, "°");
                changed |= slider(ui, "Blur", &mut c.blur, 0.0..=20.0, "px");
                changed |= slider(ui, "Grayscale", &mut c.grayscale, 0.0..=100.0, "%");
                changed |= slider(ui, "Focus", &mut c.focus, 0.0..=20.0, "px");
                changed |= ui.checkbox(&mut c.retro, "Retro").changed();
                if changed {
                    self.session.set_controls(c, now);
                }

                ui.add_space(8.0);
                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Add noise").clicked() {
                        if let Some(id) = self.session.add_noise(&mut rand::rng()) {
                            self.status = "Noise added".to_string();
                            self.surface_dirty = true;
                            self.stale_thumbs.insert(id);
                        } else if self.session.render_in_flight() {
                            self.status = "Still rendering, try again".to_string();
                        } else {
                            self.status = "Load an image first".to_string();
                        }
                    }
                    if ui.button("Reset").clicked() {
                        self.session.reset(now);
                    }
                    if ui.button("Download").clicked() {
                        self.export();
                    }
                });
                if self.session.render_in_flight() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.weak("Rendering…");
                    });
                }
            });
    }

    fn show_surface(&self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(ref tex) = self.texture else {
                ui.centered_and_justified(|ui| {
                    if self.loading > 0 {
                        ui.spinner();
                    } else {
                        ui.label("Drop an image here");
                    }
                });
                return;
            };
            let avail = ui.available_size();
            let tex_size = tex.size_vec2();
            let scale = (avail.x / tex_size.x).min(avail.y / tex_size.y).min(1.0);
            ui.centered_and_justified(|ui| {
                let (rect, _) = ui.allocate_exact_size(tex_size * scale, egui::Sense::hover());
                ui.painter().image(
                    tex.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            });
        });
    }
}

fn slider(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    range: RangeInclusive<f32>,
    suffix: &str,
) -> bool {
    ui.horizontal(|ui| {
        ui.label(label);
        ui.add(
            egui::Slider::new(value, range)
                .suffix(suffix)
                .fixed_decimals(0)
                .clamping(egui::SliderClamping::Always),
        )
        .changed()
    })
    .inner
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

fn write_export(path: &Path, png: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create_dir_all {}", parent.display()))?;
    }
    std::fs::write(path, png).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

impl eframe::App for PhotoAdjustApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        // Track window size for saving on exit
        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.config.window_width = Some(rect.width());
            self.config.window_height = Some(rect.height());
        }

        self.drain(now);
        self.handle_dropped_files(ctx);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.label(&self.status);
        });
        self.show_history(ctx, now);
        self.show_controls(ctx, now);

        self.drive_render(ctx, now);
        if self.surface_dirty {
            self.upload_surface(ctx);
        }
        if !self.stale_thumbs.is_empty() {
            self.upload_thumbnails(ctx);
        }
        self.show_surface(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.config.save();
    }
}
