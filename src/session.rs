use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use rand::Rng;

use crate::debounce::{DebouncePoll, Debouncer};
use crate::history::{EntryId, History};
use crate::loader::LoadedImage;
use crate::processing::{noise, pipeline};
use crate::state::{AdjustmentPatch, Adjustments, ImageKey, StateStore};
use crate::surface::Surface;

pub const DEFAULT_THUMB_SIZE: u32 = 160;

/// A committed render waiting to run, detached from the session so it can
/// be moved to a worker thread.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub key: ImageKey,
    pub source: Arc<RgbaImage>,
    pub adjustments: Adjustments,
}

impl RenderJob {
    pub fn run(self) -> RenderOutput {
        let pixels = pipeline::render_to_image(&self.source, &self.adjustments);
        RenderOutput {
            key: self.key,
            pixels,
        }
    }
}

#[derive(Debug)]
pub struct RenderOutput {
    pub key: ImageKey,
    pub pixels: RgbaImage,
}

/// Owns every loaded image, its adjustment state, the current selection,
/// the active control values and the output surface.
pub struct Session {
    store: StateStore,
    history: History,
    sources: HashMap<ImageKey, Arc<RgbaImage>>,
    controls: Adjustments,
    surface: Surface,
    debouncer: Debouncer,
    thumb_size: u32,
}

impl Session {
    pub fn new(debounce: Duration, thumb_size: u32) -> Self {
        Self {
            store: StateStore::new(),
            history: History::new(),
            sources: HashMap::new(),
            controls: Adjustments::default(),
            surface: Surface::default(),
            debouncer: Debouncer::new(debounce),
            thumb_size: thumb_size.max(1),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Current values of the control set.
    pub fn controls(&self) -> Adjustments {
        self.controls
    }

    pub fn selected_key(&self) -> Option<ImageKey> {
        self.history.selected().map(|e| e.key)
    }

    fn selected_source(&self) -> Option<Arc<RgbaImage>> {
        self.sources.get(&self.selected_key()?).cloned()
    }

    /// Adds a decoded image to the history and selects it. Content that is
    /// already loaded re-selects its existing entry.
    pub fn load(&mut self, image: LoadedImage, now: Instant) -> EntryId {
        if let Some(existing) = self.history.find_by_key(image.key) {
            let id = existing.id;
            tracing::debug!(key = %image.key, "image already loaded, reselecting");
            self.select(id, now);
            return id;
        }

        let LoadedImage { key, name, pixels } = image;
        tracing::info!(%key, name = %name, width = pixels.width(), height = pixels.height(), "image loaded");
        self.store.get_or_create(key);
        self.sources.insert(key, Arc::new(pixels));
        let id = self.history.add_entry(key, name);
        self.select(id, now);
        // the surface now shows the untouched source
        self.update_thumbnail(id);
        id
    }

    /// Selects `id`, shows its untouched source, restores its adjustments into
    /// the control set and schedules a render. Returns `false` for an unknown
    /// entry.
    pub fn select(&mut self, id: EntryId, now: Instant) -> bool {
        let Some(key) = self.history.select(id).map(|e| e.key) else {
            return false;
        };
        if let Some(source) = self.sources.get(&key) {
            self.surface.resize(source.width(), source.height());
            self.surface.draw(source, 0.0);
        }
        self.controls = self.store.get_or_create(key).adjustments;
        tracing::debug!(%key, "selection changed");
        self.debouncer.schedule(now);
        true
    }

    /// Takes new control values and schedules a render. Ignored until an
    /// image is selected.
    pub fn set_controls(&mut self, controls: Adjustments, now: Instant) {
        if self.selected_source().is_none() {
            return;
        }
        self.controls = controls;
        self.debouncer.schedule(now);
    }

    /// Restores default adjustments for the selection and schedules a render.
    pub fn reset(&mut self, now: Instant) {
        let Some(key) = self.selected_key() else {
            return;
        };
        self.store.reset(key);
        self.controls = Adjustments::default();
        tracing::debug!(%key, "adjustments reset");
        self.debouncer.schedule(now);
    }

    /// Time left before the pending render fires, if one is pending.
    pub fn pending_delay(&self, now: Instant) -> Option<Duration> {
        self.debouncer.remaining(now)
    }

    pub fn render_in_flight(&self) -> bool {
        self.debouncer.in_flight()
    }

    /// Drives the debouncer. When the quiet period has elapsed this commits
    /// the control set to the selected image's state and returns the render
    /// to run. Passing [`Session::complete`] the job's output finishes it.
    pub fn poll(&mut self, now: Instant) -> Option<RenderJob> {
        match self.debouncer.poll(now) {
            DebouncePoll::Idle | DebouncePoll::Waiting(_) => None,
            DebouncePoll::Dropped => {
                tracing::debug!("render still in flight, dropping scheduled render");
                None
            }
            DebouncePoll::Fire => {
                let (Some(key), Some(source)) = (self.selected_key(), self.selected_source())
                else {
                    self.debouncer.finish();
                    return None;
                };
                self.store.commit(key, &AdjustmentPatch::from(self.controls));
                tracing::debug!(%key, adjustments = ?self.controls, "render committed");
                Some(RenderJob {
                    key,
                    source,
                    adjustments: self.controls,
                })
            }
        }
    }

    /// Accepts a finished render and returns the entry whose surface it
    /// became. Output for an image that is no longer selected is discarded
    /// and a render of the current selection is scheduled.
    pub fn complete(&mut self, output: RenderOutput, now: Instant) -> Option<EntryId> {
        self.debouncer.finish();
        let selected = self.history.selected().map(|e| (e.id, e.key));
        let Some((id, key)) = selected else {
            return None;
        };
        if key != output.key {
            tracing::debug!(key = %output.key, "discarding render for deselected image");
            self.debouncer.schedule(now);
            return None;
        }
        self.surface.replace(output.pixels);
        self.update_thumbnail(id);
        Some(id)
    }

    /// Runs a due render on the calling thread. Returns `true` if one ran.
    pub fn render_now(&mut self, now: Instant) -> bool {
        let Some(job) = self.poll(now) else {
            return false;
        };
        let output = job.run();
        self.complete(output, now);
        true
    }

    /// Adds luminance grain to the output surface of the selection and marks
    /// it. Returns `None` when nothing is selected or a render is in flight.
    pub fn add_noise<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<EntryId> {
        let entry = self.history.selected()?;
        let (id, key) = (entry.id, entry.key);
        if self.render_in_flight() {
            tracing::debug!(%key, "render in flight, noise skipped");
            return None;
        }
        self.store.mark_noise(key);
        noise::add(self.surface.pixels_mut(), rng);
        tracing::info!(%key, "noise added");
        self.update_thumbnail(id);
        Some(id)
    }

    /// Stores a thumbnail of the current output surface for `id`.
    pub fn update_thumbnail(&mut self, id: EntryId) {
        let Some(key) = self.history.get(id).map(|e| e.key) else {
            return;
        };
        match self.surface.thumbnail_png(self.thumb_size) {
            Ok(png) => self.store.set_thumbnail(key, png),
            Err(err) => tracing::warn!(%key, "thumbnail update failed: {:#}", err),
        }
    }

    /// Encodes the output surface as PNG.
    pub fn export_png(&self) -> anyhow::Result<Vec<u8>> {
        if self.selected_source().is_none() {
            anyhow::bail!("no image to export");
        }
        self.surface.encode_png()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(crate::debounce::DEFAULT_DELAY, DEFAULT_THUMB_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use image::{ImageBuffer, Rgba, RgbaImage, imageops};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::Session;
    use crate::loader::LoadedImage;
    use crate::state::{Adjustments, ImageKey};

    const AFTER: Duration = Duration::from_millis(100);

    fn loaded(seed: u8, w: u32, h: u32) -> LoadedImage {
        let pixels: RgbaImage = ImageBuffer::from_fn(w, h, |x, y| {
            Rgba([seed.wrapping_add(x as u8 * 20), 60 + y as u8 * 10, 150, 255])
        });
        LoadedImage {
            key: ImageKey::from_bytes(&[seed]),
            name: format!("img{}.png", seed),
            pixels,
        }
    }

    fn settle(session: &mut Session, now: Instant) -> Instant {
        let later = now + AFTER;
        session.render_now(later);
        later
    }

    #[test]
    fn load_selects_and_renders_the_source_unchanged() {
        let mut s = Session::default();
        let img = loaded(1, 4, 3);
        let src = img.pixels.clone();
        let t = Instant::now();
        let id = s.load(img, t);

        assert!(s.history().is_selected(id));
        assert_eq!(s.controls(), Adjustments::default());
        assert!(s.render_now(t + AFTER));
        assert_eq!(s.surface().pixels(), &src);
        let state = s.store().get(ImageKey::from_bytes(&[1])).unwrap();
        assert!(state.thumbnail.is_some());
    }

    #[test]
    fn controls_commit_only_when_render_fires() {
        let mut s = Session::default();
        let t = s_load(&mut s, loaded(1, 4, 4));
        let key = ImageKey::from_bytes(&[1]);

        let mut c = s.controls();
        c.brightness = 150.0;
        s.set_controls(c, t);
        assert_eq!(s.store().get(key).unwrap().adjustments.brightness, 100.0);

        assert!(!s.render_now(t + Duration::from_millis(50)));
        assert!(s.render_now(t + AFTER));
        assert_eq!(s.store().get(key).unwrap().adjustments.brightness, 150.0);
    }

    fn s_load(s: &mut Session, img: LoadedImage) -> Instant {
        let t = Instant::now();
        s.load(img, t);
        settle(s, t)
    }

    #[test]
    fn burst_of_changes_renders_once_with_last_values() {
        let mut s = Session::default();
        let mut t = s_load(&mut s, loaded(1, 4, 4));
        let key = ImageKey::from_bytes(&[1]);

        let mut renders = 0;
        for v in [110.0, 120.0, 130.0, 140.0] {
            let mut c = s.controls();
            c.contrast = v;
            s.set_controls(c, t);
            t += Duration::from_millis(30);
            if s.render_now(t) {
                renders += 1;
            }
        }
        if s.render_now(t + AFTER) {
            renders += 1;
        }
        assert_eq!(renders, 1);
        assert_eq!(s.store().get(key).unwrap().adjustments.contrast, 140.0);
    }

    #[test]
    fn scheduled_render_is_dropped_while_one_is_in_flight() {
        let mut s = Session::default();
        let t = s_load(&mut s, loaded(1, 4, 4));

        let mut c = s.controls();
        c.grayscale = 50.0;
        s.set_controls(c, t);
        let job = s.poll(t + AFTER).expect("render due");
        assert!(s.render_in_flight());

        c.grayscale = 90.0;
        s.set_controls(c, t + AFTER);
        assert!(s.poll(t + AFTER * 2).is_none());

        s.complete(job.run(), t + AFTER * 2);
        assert!(!s.render_in_flight());
        assert_eq!(s.pending_delay(t + AFTER * 2), None);
        // the latest control value is still held for the next trigger
        assert_eq!(s.controls().grayscale, 90.0);
    }

    #[test]
    fn reselecting_restores_each_images_own_state() {
        let mut s = Session::default();
        let t0 = Instant::now();
        let a = s.load(loaded(1, 4, 4), t0);
        let t = settle(&mut s, t0);
        let b = s.load(loaded(2, 4, 4), t);
        let t = settle(&mut s, t);

        s.select(a, t);
        let t = settle(&mut s, t);
        let mut c = s.controls();
        c.brightness = 50.0;
        s.set_controls(c, t);
        let t = settle(&mut s, t);

        s.select(b, t);
        let t = settle(&mut s, t);
        let mut c = s.controls();
        c.grayscale = 100.0;
        s.set_controls(c, t);
        let t = settle(&mut s, t);

        s.select(a, t);
        assert_eq!(s.controls().brightness, 50.0);
        assert_eq!(s.controls().grayscale, 0.0);
        let t = settle(&mut s, t);

        s.select(b, t);
        assert_eq!(s.controls().brightness, 100.0);
        assert_eq!(s.controls().grayscale, 100.0);
    }

    #[test]
    fn reset_then_render_matches_fresh_load() {
        let mut s = Session::default();
        let img = loaded(3, 5, 5);
        let src = img.pixels.clone();
        let t = s_load(&mut s, img);

        let c = Adjustments {
            brightness: 170.0,
            contrast: 60.0,
            saturation: 10.0,
            temperature: 90.0,
            rotation: 30.0,
            blur: 2.0,
            grayscale: 40.0,
            focus: 3.0,
            retro: true,
        };
        s.set_controls(c, t);
        let t = settle(&mut s, t);
        assert_ne!(s.surface().pixels(), &src);

        s.reset(t);
        assert_eq!(s.controls(), Adjustments::default());
        settle(&mut s, t);
        assert_eq!(s.surface().pixels(), &src);
    }

    #[test]
    fn brightness_and_rotation_scenario_is_repeatable() {
        let mut s = Session::default();
        let img = loaded(4, 6, 6);
        let src = img.pixels.clone();
        let t = s_load(&mut s, img);

        let mut c = s.controls();
        c.brightness = 150.0;
        c.rotation = 90.0;
        s.set_controls(c, t);
        let t = settle(&mut s, t);
        let first = s.surface().pixels().clone();

        let expected = imageops::rotate90(&src);
        assert_eq!(first.get_pixel(0, 0)[2], 225);
        assert_eq!(first.get_pixel(0, 0)[1], ((expected.get_pixel(0, 0)[1] as f32) * 1.5).round() as u8);

        s.set_controls(c, t);
        settle(&mut s, t);
        assert_eq!(s.surface().pixels(), &first);
    }

    #[test]
    fn noise_marks_state_and_survives_reset() {
        let mut s = Session::default();
        let img = loaded(5, 4, 4);
        let src = img.pixels.clone();
        let t = s_load(&mut s, img);
        let key = ImageKey::from_bytes(&[5]);

        assert!(s.add_noise(&mut StdRng::seed_from_u64(9)).is_some());
        assert!(s.store().get(key).unwrap().noise_added);
        assert_ne!(s.surface().pixels(), &src);

        s.reset(t);
        settle(&mut s, t);
        assert!(s.store().get(key).unwrap().noise_added);
        // a render re-derives from the source and discards the grain
        assert_eq!(s.surface().pixels(), &src);
    }

    #[test]
    fn noise_without_selection_is_skipped() {
        let mut s = Session::default();
        assert!(s.add_noise(&mut StdRng::seed_from_u64(1)).is_none());
    }

    #[test]
    fn export_requires_an_image() {
        let mut s = Session::default();
        assert!(s.export_png().is_err());
        s_load(&mut s, loaded(6, 3, 3));
        let png = s.export_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().into_rgba8();
        assert_eq!(&decoded, s.surface().pixels());
    }

    #[test]
    fn controls_are_ignored_before_first_load() {
        let mut s = Session::default();
        let t = Instant::now();
        let mut c = s.controls();
        c.blur = 4.0;
        s.set_controls(c, t);
        assert_eq!(s.controls().blur, 0.0);
        assert!(!s.render_now(t + AFTER));
    }

    #[test]
    fn loading_same_content_twice_reuses_entry() {
        let mut s = Session::default();
        let t = Instant::now();
        let a = s.load(loaded(7, 2, 2), t);
        let mut c = s.controls();
        c.focus = 2.0;
        s.set_controls(c, t);
        let t = settle(&mut s, t);
        s.load(loaded(8, 2, 2), t);
        let again = s.load(loaded(7, 2, 2), t);
        assert_eq!(a, again);
        assert_eq!(s.history().entries().len(), 2);
        assert_eq!(s.controls().focus, 2.0);
    }

    #[test]
    fn stale_render_for_deselected_image_is_discarded() {
        let mut s = Session::default();
        let t0 = Instant::now();
        s.load(loaded(1, 3, 3), t0);
        let job = s.poll(t0 + AFTER).expect("render due");
        let b = loaded(2, 3, 3);
        let b_src = b.pixels.clone();
        s.load(b, t0 + AFTER);
        assert_eq!(s.complete(job.run(), t0 + AFTER), None);
        assert_eq!(s.surface().pixels(), &b_src);
    }

    #[test]
    fn reselect_during_foreign_render_still_renders_selection() {
        let mut s = Session::default();
        let t0 = Instant::now();
        let a = s.load(
            LoadedImage {
                key: ImageKey::from_bytes(b"a"),
                name: "a.png".into(),
                pixels: ImageBuffer::from_pixel(3, 3, Rgba([100, 100, 100, 255])),
            },
            t0,
        );
        let mut c = s.controls();
        c.brightness = 50.0;
        s.set_controls(c, t0);
        let t = settle(&mut s, t0);

        s.load(loaded(2, 3, 3), t);
        let mut c = s.controls();
        c.grayscale = 100.0;
        s.set_controls(c, t);
        let job = s.poll(t + AFTER).expect("render of b due");

        s.select(a, t + AFTER);
        // a's own timer fires while b is still rendering
        assert!(s.poll(t + AFTER * 2).is_none());
        assert_eq!(s.complete(job.run(), t + AFTER * 2), None);
        assert!(s.pending_delay(t + AFTER * 2).is_some());

        assert!(s.render_now(t + AFTER * 3));
        assert_eq!(s.controls().brightness, 50.0);
        assert_eq!(s.surface().pixels().get_pixel(1, 1).0, [50, 50, 50, 255]);
    }

    #[test]
    fn noise_is_refused_while_a_render_is_in_flight() {
        let mut s = Session::default();
        let img = loaded(9, 4, 4);
        let src = img.pixels.clone();
        let t = s_load(&mut s, img);
        let key = ImageKey::from_bytes(&[9]);

        s.set_controls(s.controls(), t);
        let job = s.poll(t + AFTER).expect("render due");
        assert!(s.add_noise(&mut StdRng::seed_from_u64(3)).is_none());
        assert!(!s.store().get(key).unwrap().noise_added);

        s.complete(job.run(), t + AFTER);
        assert_eq!(s.surface().pixels(), &src);
        let id = s.add_noise(&mut StdRng::seed_from_u64(3));
        assert_eq!(id, s.history().selected().map(|e| e.id));
        assert_ne!(s.surface().pixels(), &src);
    }

    #[test]
    fn finished_render_touches_only_the_selected_thumbnail() {
        let mut s = Session::default();
        let t0 = Instant::now();
        let a = s.load(loaded(1, 4, 4), t0);
        let t = settle(&mut s, t0);
        let b = s.load(loaded(2, 4, 4), t);
        let t = settle(&mut s, t);
        let a_thumb = s.store().get(ImageKey::from_bytes(&[1])).unwrap().thumbnail.clone();

        let mut c = s.controls();
        c.grayscale = 100.0;
        s.set_controls(c, t);
        let job = s.poll(t + AFTER).expect("render due");
        assert_eq!(s.complete(job.run(), t + AFTER), Some(b));
        assert_ne!(a, b);
        assert_eq!(
            s.store().get(ImageKey::from_bytes(&[1])).unwrap().thumbnail,
            a_thumb
        );
    }
}
