//! Audio-reactive animation engine.
//!
//! [`RenderEngine::render`] is a per-frame state transition: a host driver
//! calls it once per display refresh with the frame timestamp and keeps
//! calling it while it returns [`FrameAction::Continue`]. All mutable
//! animation state (gradient and sprite caches, beat history, projected
//! points, random source) lives in the engine instance and is only touched inside `render`.

mod blur;
mod gradients;
mod layers;
mod sprites;

use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tiny_skia::{Pixmap, Rect, Transform};

use crate::{
    analysis::TextAnalysis,
    audio::{AmplitudeSource, BeatTracker},
    config::{IdleConfig, RenderConfig, VisualizerConfig},
    error::LayerSkip,
    field::{PointField, ProjectedPoint},
    palette::FrequencyRamp,
    scene::{synthetic_intensity, FocalPoint, FrameState},
    timeline::{RevealPhase, RevealTimeline},
};

pub use blur::{box_radius_for_sigma, gaussian_blur};
pub use gradients::{GradientCache, GradientKey};
pub use layers::BACKGROUND;
pub use sprites::{SpriteCache, SpriteSet};

/// What the host driver should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// Schedule another frame.
    Continue,
    /// The engine has been torn down; schedule nothing further.
    Stop,
}

/// Visual layers in back-to-front order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Background,
    Halo,
    Chromatic,
    Points,
    Wipe,
    Bloom,
    Vignette,
}

/// Which layers made it onto the surface in the last frame, and why the
/// others were skipped. Layers whose visibility gate was closed appear in
/// neither list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub drawn: Vec<Layer>,
    pub skipped: Vec<(Layer, LayerSkip)>,
}

impl FrameReport {
    pub fn was_drawn(&self, layer: Layer) -> bool {
        self.drawn.contains(&layer)
    }

    pub fn skip_reason(&self, layer: Layer) -> Option<LayerSkip> {
        self.skipped
            .iter()
            .find(|(skipped, _)| *skipped == layer)
            .map(|(_, reason)| *reason)
    }

    fn clear(&mut self) {
        self.drawn.clear();
        self.skipped.clear();
    }

    fn record(&mut self, layer: Layer, result: Result<(), LayerSkip>) {
        match result {
            Ok(()) => self.drawn.push(layer),
            Err(reason) => {
                tracing::debug!(?layer, %reason, "layer skipped");
                self.skipped.push((layer, reason));
            }
        }
    }
}

/// Square viewport side length in logical pixels, shared between a resize
/// observer and the engine. Writes take effect at the start of the next frame.
#[derive(Debug, Clone, Default)]
pub struct ViewportHandle {
    side: Arc<AtomicU32>,
}

impl ViewportHandle {
    pub fn new(side_px: u32) -> Self {
        Self {
            side: Arc::new(AtomicU32::new(side_px)),
        }
    }

    pub fn resize(&self, side_px: u32) {
        self.side.store(side_px, Ordering::Release);
    }

    pub fn side(&self) -> u32 {
        self.side.load(Ordering::Acquire)
    }
}

/// One visualisation session over an immutable point field.
pub struct RenderEngine {
    render: RenderConfig,
    idle: IdleConfig,
    field: PointField,
    projected: Vec<ProjectedPoint>,
    viewport: ViewportHandle,
    applied_side: Option<u32>,
    surface: Option<Pixmap>,
    wipe_layer: Option<Pixmap>,
    gradients: GradientCache,
    sprites: SpriteCache,
    timeline: RevealTimeline,
    beat: BeatTracker,
    audio: Option<Box<dyn AmplitudeSource>>,
    spectrum: Vec<u8>,
    playing: bool,
    rng: StdRng,
    torn_down: bool,
    state: Option<FrameState>,
    report: FrameReport,
    frames: u64,
}

impl RenderEngine {
    pub fn new(config: &VisualizerConfig, field: PointField, viewport: ViewportHandle) -> Self {
        let mut render = config.render.clone();
        if !render.pixel_ratio.is_finite() || render.pixel_ratio <= 0.0 {
            tracing::warn!(ratio = render.pixel_ratio, "unusable pixel ratio, using 1.0");
            render.pixel_ratio = 1.0;
        }

        let rng = match render.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        tracing::info!(
            points = field.len(),
            words = field.sequence_len(),
            side = viewport.side(),
            "visualisation session created"
        );

        Self {
            timeline: RevealTimeline::new(render.reveal_duration_ms),
            beat: BeatTracker::new(config.beat.clone()),
            idle: config.idle.clone(),
            render,
            field,
            projected: Vec::new(),
            viewport,
            applied_side: None,
            surface: None,
            wipe_layer: None,
            gradients: GradientCache::new(),
            sprites: SpriteCache::new(),
            audio: None,
            spectrum: Vec::new(),
            playing: false,
            rng,
            torn_down: false,
            state: None,
            report: FrameReport::default(),
            frames: 0,
        }
    }

    /// Builds the point field for an analysis with the default ramp.
    pub fn from_analysis(
        config: &VisualizerConfig,
        analysis: &TextAnalysis,
        viewport: ViewportHandle,
    ) -> Self {
        let field = PointField::from_analysis(analysis, &FrequencyRamp::default());
        Self::new(config, field, viewport)
    }

    /// Draws one frame at `frame_time_ms` (host clock, milliseconds).
    pub fn render(&mut self, frame_time_ms: f64) -> FrameAction {
        if self.torn_down {
            return FrameAction::Stop;
        }
        if !frame_time_ms.is_finite() {
            tracing::debug!("ignoring frame with non-finite timestamp");
            return FrameAction::Continue;
        }

        self.sync_viewport();

        let load_progress = self.timeline.advance(frame_time_ms);
        let beat_intensity = self.sample_audio();
        let audio_active = self.playing && self.audio.is_some();
        let sample: f32 = self.rng.random();
        let intensity = beat_intensity.max(synthetic_intensity(
            &self.idle,
            load_progress,
            audio_active,
            sample,
        ));
        let inner = self.inner_size();

        let state = FrameState {
            time_ms: frame_time_ms,
            elapsed_ms: self.timeline.elapsed_ms(frame_time_ms),
            load_progress,
            beat_intensity,
            intensity,
            playing: self.playing,
            initial_glitch: load_progress < self.idle.initial_glitch_window,
            inner,
            focal: FocalPoint::orbit(inner, frame_time_ms, intensity),
        };
        tracing::trace!(
            progress = state.load_progress,
            beat = state.beat_intensity,
            intensity = state.intensity,
            "frame"
        );

        self.draw(&state);
        self.state = Some(state);
        self.frames += 1;
        FrameAction::Continue
    }

    /// Ends the session: the next `render` call returns [`FrameAction::Stop`]
    /// and draws nothing. Cached gradients and surfaces are released.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.gradients.clear();
        self.sprites.clear();
        self.audio = None;
        self.surface = None;
        self.wipe_layer = None;
        self.projected.clear();
        self.report.clear();
        tracing::info!(frames = self.frames, "visualisation session torn down");
    }

    /// Replaces the point field and restarts the reveal.
    pub fn set_field(&mut self, field: PointField) {
        tracing::info!(points = field.len(), "point field replaced");
        self.field = field;
        self.field.project_into(self.inner_size(), &mut self.projected);
        self.timeline.restart();
    }

    pub fn attach_audio(&mut self, source: Box<dyn AmplitudeSource>) {
        self.audio = Some(source);
    }

    pub fn detach_audio(&mut self) {
        self.audio = None;
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing != self.playing {
            tracing::debug!(playing, "playback state changed");
        }
        self.playing = playing;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn viewport(&self) -> ViewportHandle {
        self.viewport.clone()
    }

    pub fn field(&self) -> &PointField {
        &self.field
    }

    /// Points in surface coordinates for the current viewport.
    pub fn projected_points(&self) -> &[ProjectedPoint] {
        &self.projected
    }

    /// The raster the last frame was drawn into. `None` for a zero-sized
    /// viewport, before the first frame, or after teardown.
    pub fn surface(&self) -> Option<&Pixmap> {
        self.surface.as_ref()
    }

    pub fn frame_state(&self) -> Option<&FrameState> {
        self.state.as_ref()
    }

    pub fn last_report(&self) -> &FrameReport {
        &self.report
    }

    pub fn phase(&self) -> RevealPhase {
        self.timeline.phase()
    }

    pub fn load_progress(&self) -> f32 {
        self.timeline.progress()
    }

    pub fn beat_intensity(&self) -> f32 {
        self.beat.intensity()
    }

    pub fn gradient_cache(&self) -> &GradientCache {
        &self.gradients
    }

    pub fn sprite_cache(&self) -> &SpriteCache {
        &self.sprites
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    fn inner_size(&self) -> f32 {
        self.applied_side.unwrap_or(0) as f32 - 2.0 * self.render.padding_px
    }

    fn sync_viewport(&mut self) {
        let side = self.viewport.side();
        if self.applied_side == Some(side) {
            return;
        }

        self.applied_side = Some(side);
        self.gradients.clear();

        let device = (side as f32 * self.render.pixel_ratio).round() as u32;
        self.surface = Pixmap::new(device, device);
        self.wipe_layer = Pixmap::new(device, device);
        self.field.project_into(self.inner_size(), &mut self.projected);

        tracing::debug!(side, device, points = self.projected.len(), "viewport applied");
    }

    fn sample_audio(&mut self) -> f32 {
        if !self.playing {
            return 0.0;
        }
        let Some(source) = self.audio.as_mut() else {
            return 0.0;
        };

        if source.poll(&mut self.spectrum) {
            self.beat.observe(&self.spectrum)
        } else {
            self.beat.decay()
        }
    }

    fn draw(&mut self, state: &FrameState) {
        let Self {
            render,
            field,
            projected,
            applied_side,
            surface,
            wipe_layer,
            gradients,
            sprites,
            rng,
            report,
            ..
        } = self;

        report.clear();
        let Some(surface) = surface.as_mut() else {
            report.record(
                Layer::Background,
                Err(LayerSkip::Degenerate("zero-sized viewport")),
            );
            return;
        };

        layers::background(surface);
        report.record(Layer::Background, Ok(()));

        if projected.is_empty() || state.inner.is_nan() || state.inner <= 0.0 {
            return;
        }

        let side = applied_side.unwrap_or(0) as f32;
        let padding = render.padding_px;
        let Some(bounds) = Rect::from_xywh(-padding, -padding, side, side) else {
            return;
        };

        let ratio = render.pixel_ratio;
        let mut transform = Transform::from_scale(ratio, ratio).pre_translate(padding, padding);
        if state.glitching() {
            let dx = (rng.random::<f32>() - 0.5) * 6.0 * state.intensity;
            let dy = (rng.random::<f32>() - 0.5) * 6.0 * state.intensity;
            if dx.is_finite() && dy.is_finite() {
                transform = transform.pre_translate(dx, dy);
            }
        }

        let frame = layers::LayerFrame {
            state,
            transform,
            bounds,
            point_radius: render.point_radius_px,
            reveal_style: render.reveal_style,
            pixel_ratio: ratio,
        };

        sprites.prepare(
            field.colors(),
            &layers::CHROMATIC_TINTS,
            render.point_radius_px * ratio,
            layers::glow_ring(render.glow),
        );

        if state.halo_visible() {
            report.record(Layer::Halo, layers::halo(surface, gradients, &frame));
        }
        if state.chromatic_visible() {
            report.record(Layer::Chromatic, layers::chromatic(surface, projected, sprites, &frame));
        }
        report.record(
            Layer::Points,
            layers::points(surface, projected, field.colors(), sprites, &frame, rng, render.glow),
        );
        if state.wipe_visible() {
            let result = match wipe_layer.as_mut() {
                Some(layer) => layers::wipe(surface, layer, gradients, &frame),
                None => Err(LayerSkip::Degenerate("no wipe layer")),
            };
            report.record(Layer::Wipe, result);
        }
        if state.bloom_visible() {
            report.record(Layer::Bloom, layers::bloom(surface, &frame));
        }
        report.record(Layer::Vignette, layers::vignette(surface, gradients, &frame));
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("points", &self.field.len())
            .field("side", &self.applied_side)
            .field("phase", &self.timeline.phase())
            .field("playing", &self.playing)
            .field("audio", &self.audio.is_some())
            .field("gradients", &self.gradients.len())
            .field("sprite_builds", &self.sprites.builds())
            .field("frames", &self.frames)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
