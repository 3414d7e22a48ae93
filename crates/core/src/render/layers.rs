//! Drawing routines for each visual layer, back to front.
//!
//! Every routine works in "inner" coordinates (the padded square the points
//! are projected into) and receives the inner-to-device transform. A routine
//! either draws completely or returns the reason it skipped.

use rand::{rngs::StdRng, Rng};
use tiny_skia::{
    BlendMode, Color, FillRule, GradientStop, LinearGradient, Paint, PathBuilder, Pixmap,
    PixmapPaint, Point, RadialGradient, Rect, Shader, SpreadMode, Transform,
};

use crate::{
    config::RevealStyle,
    error::{finite, LayerSkip},
    field::ProjectedPoint,
    palette::Rgb8,
    render::{
        blur,
        gradients::{GradientCache, GradientKey},
        sprites::SpriteCache,
    },
    scene::FrameState,
};

pub const BACKGROUND: Rgb8 = Rgb8::from_hex(0x010204);

const INDIGO: Rgb8 = Rgb8::new(99, 102, 241);
const DEEP_INDIGO: Rgb8 = Rgb8::new(67, 56, 202);
const VIOLET: Rgb8 = Rgb8::new(139, 92, 246);
const WHITE: Rgb8 = Rgb8::new(255, 255, 255);
const RED_SHIFT: Rgb8 = Rgb8::new(255, 34, 34);
const BLUE_SHIFT: Rgb8 = Rgb8::new(34, 34, 255);
const VIGNETTE_EDGE: Rgb8 = Rgb8::new(180, 180, 255);

const BLADE_HEIGHT: f32 = 200.0;
const WIPE_BLUR_SIGMA: f32 = 45.0;
const WIPE_TRAIL: f32 = 0.28;
const WIPE_LEAD: f32 = 0.12;
/// Points this close to the reveal threshold may glitch sideways.
const WIPE_JITTER_BAND: f32 = 0.08;
const GLOW_RADIUS_SCALE: f32 = 2.4;
const GLOW_ALPHA: f32 = 0.22;
/// Reveal-index distance over which a point grows to full size.
const GROW_SPAN: f32 = 0.1;

/// Per-frame inputs shared by all layers.
pub struct LayerFrame<'a> {
    pub state: &'a FrameState,
    pub transform: Transform,
    /// The whole surface expressed in inner coordinates.
    pub bounds: Rect,
    pub point_radius: f32,
    pub reveal_style: RevealStyle,
    pub pixel_ratio: f32,
}

impl LayerFrame<'_> {
    /// Radius multiplier for a point, or `None` if the reveal has not reached it.
    fn reveal_scale(&self, reveal_index: f32) -> Option<f32> {
        let lead = self.state.reveal_threshold() - reveal_index;
        if lead < 0.0 {
            return None;
        }
        match self.reveal_style {
            RevealStyle::Cutoff => Some(1.0),
            RevealStyle::Grow => Some((lead / GROW_SPAN).min(1.0)),
        }
    }
}

fn color(rgb: Rgb8, alpha: f32, name: &'static str) -> Result<Color, LayerSkip> {
    rgb.with_alpha(alpha).ok_or(LayerSkip::NonFinite(name))
}

fn shader_paint(shader: Shader<'static>, blend_mode: BlendMode) -> Paint<'static> {
    Paint {
        shader,
        blend_mode,
        anti_alias: false,
        ..Paint::default()
    }
}

fn solid_paint(color: Color, blend_mode: BlendMode) -> Paint<'static> {
    let mut paint = Paint {
        blend_mode,
        anti_alias: true,
        ..Paint::default()
    };
    paint.set_color(color);
    paint
}

fn radial(
    x: f32,
    y: f32,
    radius: f32,
    stops: Vec<GradientStop>,
    name: &'static str,
) -> Result<Shader<'static>, LayerSkip> {
    if radius <= 0.0 {
        return Err(LayerSkip::Degenerate(name));
    }
    let centre = Point::from_xy(x, y);
    RadialGradient::new(centre, centre, radius, stops, SpreadMode::Pad, Transform::identity())
        .ok_or(LayerSkip::Unsupported(name))
}

pub fn background(pixmap: &mut Pixmap) {
    pixmap.fill(Color::from_rgba8(BACKGROUND.r, BACKGROUND.g, BACKGROUND.b, 255));
}

/// Screen-blended indigo glow around the focal point.
pub fn halo(pixmap: &mut Pixmap, cache: &mut GradientCache, frame: &LayerFrame<'_>) -> Result<(), LayerSkip> {
    let state = frame.state;
    let x = finite("halo.x", state.focal.x)?;
    let y = finite("halo.y", state.focal.y)?;
    let radius = finite("halo.radius", state.halo_radius())?;
    let alpha = finite("halo.alpha", state.halo_alpha())?;

    let paint = cache.get_or_try_insert(GradientKey::halo(x, y, radius), || {
        let stops = vec![
            GradientStop::new(0.0, color(INDIGO, alpha, "halo.alpha")?),
            GradientStop::new(0.5, color(DEEP_INDIGO, alpha * 0.5, "halo.alpha")?),
            GradientStop::new(1.0, Color::TRANSPARENT),
        ];
        let shader = radial(x, y, radius, stops, "halo gradient")?;
        Ok(shader_paint(shader, BlendMode::Screen))
    })?;

    pixmap.fill_rect(frame.bounds, paint, frame.transform, None);
    Ok(())
}

/// Tints of the chromatic ghosts, in the order their sprites are prepared.
pub const CHROMATIC_TINTS: [Rgb8; 2] = [RED_SHIFT, BLUE_SHIFT];

/// Soft ring drawn under every point when glow is enabled, as
/// `(radius scale, alpha)`.
pub fn glow_ring(glow: bool) -> Option<(f32, f32)> {
    glow.then_some((GLOW_RADIUS_SCALE, GLOW_ALPHA))
}

fn device(transform: Transform, x: f32, y: f32) -> (f32, f32) {
    (
        transform.sx * x + transform.kx * y + transform.tx,
        transform.ky * x + transform.sy * y + transform.ty,
    )
}

fn opacity_byte(alpha: f32) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Red- and blue-shifted ghosts of the visible points.
pub fn chromatic(
    pixmap: &mut Pixmap,
    points: &[ProjectedPoint],
    sprites: &SpriteCache,
    frame: &LayerFrame<'_>,
) -> Result<(), LayerSkip> {
    let state = frame.state;
    let offset = finite("chromatic.offset", state.chromatic_offset())?;
    let alpha = finite("chromatic.alpha", 0.6 * state.intensity)?;
    let radius = frame.point_radius;

    for (index, (shift, tint)) in [-offset, offset].into_iter().zip(CHROMATIC_TINTS).enumerate() {
        let sprite = sprites.tint(index);
        let mut partial = PathBuilder::new();
        for point in points {
            let Some(scale) = frame.reveal_scale(point.reveal_index) else {
                continue;
            };
            match sprite {
                Some(sprite) if scale >= 1.0 => {
                    let (x, y) = device(frame.transform, point.x + shift, point.y);
                    sprite.blit(pixmap, x, y, opacity_byte(alpha));
                }
                _ => partial.push_circle(point.x + shift, point.y, radius * scale),
            }
        }

        if let Some(path) = partial.finish() {
            let paint = solid_paint(color(tint, alpha, "chromatic.alpha")?, BlendMode::Screen);
            pixmap.fill_path(&path, &paint, FillRule::Winding, frame.transform, None);
        }
    }

    Ok(())
}

/// Main matrix, screen-blended. Fully revealed points are stamped from the
/// sprite cache; points still growing in are filled as one path per color.
pub fn points(
    pixmap: &mut Pixmap,
    points: &[ProjectedPoint],
    colors: &[Rgb8],
    sprites: &SpriteCache,
    frame: &LayerFrame<'_>,
    rng: &mut StdRng,
    glow: bool,
) -> Result<(), LayerSkip> {
    let state = frame.state;
    let intensity = finite("points.intensity", state.intensity)?;
    let threshold = state.reveal_threshold();
    let glitching = state.glitching();
    let radius = frame.point_radius;

    let mut cores: Vec<PathBuilder> = colors.iter().map(|_| PathBuilder::new()).collect();
    let mut glows: Vec<PathBuilder> = colors.iter().map(|_| PathBuilder::new()).collect();

    for point in points {
        let Some(scale) = frame.reveal_scale(point.reveal_index) else {
            continue;
        };
        if point.batch >= colors.len() {
            continue;
        }

        let mut x = point.x;
        let near_wipe = (point.reveal_index - threshold).abs() < WIPE_JITTER_BAND;
        if (near_wipe || glitching) && rng.random::<f32>() > 0.95 {
            x += (rng.random::<f32>() - 0.5) * 40.0 * intensity;
        }

        if scale >= 1.0 {
            if let Some(sprite) = sprites.point(point.batch) {
                let (dx, dy) = device(frame.transform, x, point.y);
                sprite.blit(pixmap, dx, dy, u8::MAX);
                continue;
            }
        }

        let r = radius * scale;
        cores[point.batch].push_circle(x, point.y, r);
        if glow {
            glows[point.batch].push_circle(x, point.y, r * GLOW_RADIUS_SCALE);
        }
    }

    for ((rgb, core), soft) in colors.iter().zip(cores).zip(glows) {
        if let Some(path) = soft.finish() {
            let paint = solid_paint(color(*rgb, GLOW_ALPHA, "points.glow")?, BlendMode::Screen);
            pixmap.fill_path(&path, &paint, FillRule::Winding, frame.transform, None);
        }
        if let Some(path) = core.finish() {
            let paint = solid_paint(color(*rgb, 1.0, "points.color")?, BlendMode::Screen);
            pixmap.fill_path(&path, &paint, FillRule::Winding, frame.transform, None);
        }
    }

    Ok(())
}

/// Loading scan-line: an additive blade masked to a diagonal band around the
/// reveal front, blurred, then added onto the surface.
pub fn wipe(
    pixmap: &mut Pixmap,
    layer: &mut Pixmap,
    cache: &mut GradientCache,
    frame: &LayerFrame<'_>,
) -> Result<(), LayerSkip> {
    let state = frame.state;
    let inner = finite("wipe.inner", state.inner)?;
    let blade_y = finite("wipe.y", state.load_progress * inner)?;
    let front = finite("wipe.front", state.reveal_threshold())?;
    let peak_alpha = 0.75 * (1.0 - state.load_progress);

    let trail = (front - WIPE_TRAIL).max(0.0);
    if trail >= 1.0 {
        // The band has left the far corner; nothing would survive the mask.
        return Ok(());
    }
    let lead = (front + WIPE_LEAD).min(1.0);
    let area = Rect::from_xywh(0.0, 0.0, inner, inner).ok_or(LayerSkip::Degenerate("wipe area"))?;

    layer.fill(Color::TRANSPARENT);

    let blade = cache.get_or_try_insert(GradientKey::blade(blade_y), || {
        let stops = vec![
            GradientStop::new(0.0, color(INDIGO, 0.0, "wipe.edge")?),
            GradientStop::new(0.5, color(WHITE, peak_alpha, "wipe.alpha")?),
            GradientStop::new(1.0, color(INDIGO, 0.0, "wipe.edge")?),
        ];
        let shader = LinearGradient::new(
            Point::from_xy(0.0, blade_y - BLADE_HEIGHT / 2.0),
            Point::from_xy(0.0, blade_y + BLADE_HEIGHT / 2.0),
            stops,
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or(LayerSkip::Unsupported("wipe blade"))?;
        Ok(shader_paint(shader, BlendMode::Plus))
    })?;
    layer.fill_rect(area, blade, frame.transform, None);

    let mask_stops = vec![
        GradientStop::new(trail, Color::TRANSPARENT),
        GradientStop::new(front.min(1.0), Color::BLACK),
        GradientStop::new(lead, Color::TRANSPARENT),
    ];
    let mask = LinearGradient::new(
        Point::from_xy(0.0, 0.0),
        Point::from_xy(inner, inner),
        mask_stops,
        SpreadMode::Pad,
        Transform::identity(),
    )
    .ok_or(LayerSkip::Unsupported("wipe mask"))?;
    layer.fill_rect(area, &shader_paint(mask, BlendMode::DestinationIn), frame.transform, None);

    blur::gaussian_blur(layer, WIPE_BLUR_SIGMA * frame.pixel_ratio);

    let composite = PixmapPaint {
        blend_mode: BlendMode::Plus,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, layer.as_ref(), &composite, Transform::identity(), None);
    Ok(())
}

/// White-to-violet bloom at the focal point while audio is driving the scene.
pub fn bloom(pixmap: &mut Pixmap, frame: &LayerFrame<'_>) -> Result<(), LayerSkip> {
    let state = frame.state;
    let x = finite("bloom.x", state.focal.x)?;
    let y = finite("bloom.y", state.focal.y)?;
    let radius = finite("bloom.radius", state.bloom_radius())?;
    let alpha = finite("bloom.alpha", state.bloom_alpha())?;

    let stops = vec![
        GradientStop::new(0.0, color(WHITE, alpha, "bloom.alpha")?),
        GradientStop::new(0.4, color(VIOLET, alpha * 0.6, "bloom.alpha")?),
        GradientStop::new(1.0, Color::TRANSPARENT),
    ];
    let paint = shader_paint(radial(x, y, radius, stops, "bloom gradient")?, BlendMode::Screen);
    pixmap.fill_rect(frame.bounds, &paint, frame.transform, None);
    Ok(())
}

/// Constant multiply-blended darkening towards the edges.
pub fn vignette(pixmap: &mut Pixmap, cache: &mut GradientCache, frame: &LayerFrame<'_>) -> Result<(), LayerSkip> {
    let inner = finite("vignette.inner", frame.state.inner)?;
    let paint = cache.get_or_try_insert(GradientKey::Vignette, || {
        let stops = vec![
            GradientStop::new(0.0, color(WHITE, 1.0, "vignette.centre")?),
            GradientStop::new(1.0, color(VIGNETTE_EDGE, 0.75, "vignette.edge")?),
        ];
        let shader = radial(inner / 2.0, inner / 2.0, inner * 0.9, stops, "vignette gradient")?;
        Ok(shader_paint(shader, BlendMode::Multiply))
    })?;

    pixmap.fill_rect(frame.bounds, paint, frame.transform, None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::FocalPoint;
    use rand::SeedableRng;

    fn state(load_progress: f32, intensity: f32) -> FrameState {
        FrameState {
            time_ms: 0.0,
            elapsed_ms: 0.0,
            load_progress,
            beat_intensity: intensity,
            intensity,
            playing: true,
            initial_glitch: false,
            inner: 52.0,
            focal: FocalPoint { x: 26.0, y: 26.0 },
        }
    }

    fn frame(state: &FrameState, style: RevealStyle) -> LayerFrame<'_> {
        LayerFrame {
            state,
            transform: Transform::from_translate(6.0, 6.0),
            bounds: Rect::from_xywh(-6.0, -6.0, 64.0, 64.0).unwrap(),
            point_radius: 1.25,
            reveal_style: style,
            pixel_ratio: 1.0,
        }
    }

    fn surface() -> Pixmap {
        let mut pixmap = Pixmap::new(64, 64).unwrap();
        background(&mut pixmap);
        pixmap
    }

    #[test]
    fn cutoff_hides_points_past_threshold() {
        let state = state(0.25, 0.0);
        let frame = frame(&state, RevealStyle::Cutoff);
        assert_eq!(frame.reveal_scale(0.3), Some(1.0));
        assert_eq!(frame.reveal_scale(0.41), None);
    }

    #[test]
    fn grow_scales_points_near_threshold() {
        let state = state(0.25, 0.0);
        let frame = frame(&state, RevealStyle::Grow);
        let scale = frame.reveal_scale(0.35).unwrap();
        assert!((scale - 0.5).abs() < 1e-4);
        assert_eq!(frame.reveal_scale(0.0), Some(1.0));
        assert_eq!(frame.reveal_scale(0.5), None);
    }

    #[test]
    fn points_brighten_the_surface() {
        let state = state(1.0, 0.0);
        let frame = frame(&state, RevealStyle::Cutoff);
        let mut pixmap = surface();
        let mut rng = StdRng::seed_from_u64(7);
        let pts = [ProjectedPoint {
            x: 26.0,
            y: 26.0,
            batch: 0,
            reveal_index: 0.5,
        }];

        let colors = [Rgb8::new(250, 200, 20)];
        let mut sprites = SpriteCache::new();
        sprites.prepare(&colors, &CHROMATIC_TINTS, frame.point_radius, glow_ring(true));

        points(&mut pixmap, &pts, &colors, &sprites, &frame, &mut rng, true).unwrap();

        let lit = pixmap.pixel(32, 32).unwrap();
        assert!(lit.red() > 100);
        let dark = pixmap.pixel(2, 2).unwrap();
        assert_eq!(dark.red(), BACKGROUND.r);
    }

    #[test]
    fn sprites_and_paths_light_the_same_spot() {
        let state = state(1.0, 0.0);
        let frame = frame(&state, RevealStyle::Cutoff);
        let colors = [Rgb8::new(250, 200, 20)];
        let pts = [ProjectedPoint {
            x: 20.0,
            y: 30.0,
            batch: 0,
            reveal_index: 0.5,
        }];

        let mut sprites = SpriteCache::new();
        sprites.prepare(&colors, &CHROMATIC_TINTS, frame.point_radius, glow_ring(false));
        let mut stamped = surface();
        points(&mut stamped, &pts, &colors, &sprites, &frame, &mut StdRng::seed_from_u64(1), false)
            .unwrap();

        let mut filled = surface();
        let empty = SpriteCache::new();
        points(&mut filled, &pts, &colors, &empty, &frame, &mut StdRng::seed_from_u64(1), false)
            .unwrap();

        let (a, b) = (stamped.pixel(26, 36).unwrap(), filled.pixel(26, 36).unwrap());
        assert!(a.red() > 200 && b.red() > 200);
        assert!(a.red().abs_diff(b.red()) < 40);
        assert_eq!(stamped.pixel(40, 36).unwrap().red(), BACKGROUND.r);
    }

    #[test]
    fn growing_points_fall_back_to_paths() {
        let state = state(0.25, 0.0);
        let frame = frame(&state, RevealStyle::Grow);
        let colors = [Rgb8::new(250, 200, 20)];
        let mut sprites = SpriteCache::new();
        sprites.prepare(&colors, &CHROMATIC_TINTS, frame.point_radius, glow_ring(false));
        // Threshold 0.4: the first point is still growing, the second is hidden.
        let pts = [
            ProjectedPoint {
                x: 10.0,
                y: 10.0,
                batch: 0,
                reveal_index: 0.31,
            },
            ProjectedPoint {
                x: 40.0,
                y: 40.0,
                batch: 0,
                reveal_index: 0.9,
            },
        ];

        let mut pixmap = surface();
        points(&mut pixmap, &pts, &colors, &sprites, &frame, &mut StdRng::seed_from_u64(2), false)
            .unwrap();

        assert!(pixmap.pixel(16, 16).unwrap().red() > BACKGROUND.r);
        assert_eq!(pixmap.pixel(46, 46).unwrap().red(), BACKGROUND.r);
    }

    #[test]
    fn chromatic_ghosts_are_offset_and_tinted() {
        let state = state(1.0, 1.0);
        let frame = frame(&state, RevealStyle::Cutoff);
        let mut sprites = SpriteCache::new();
        sprites.prepare(&[], &CHROMATIC_TINTS, frame.point_radius, None);
        let pts = [ProjectedPoint {
            x: 26.0,
            y: 26.0,
            batch: 0,
            reveal_index: 0.0,
        }];

        let mut pixmap = surface();
        chromatic(&mut pixmap, &pts, &sprites, &frame).unwrap();

        let offset = state.chromatic_offset().round() as u32;
        let red = pixmap.pixel(32 - offset, 32).unwrap();
        let blue = pixmap.pixel(32 + offset, 32).unwrap();
        assert!(red.red() > red.blue());
        assert!(blue.blue() > blue.red());
    }

    #[test]
    fn non_finite_focal_skips_halo_and_bloom() {
        let mut state = state(1.0, 1.0);
        state.focal = FocalPoint { x: f32::NAN, y: 3.0 };
        let frame = frame(&state, RevealStyle::Cutoff);
        let mut pixmap = surface();
        let before = pixmap.clone();
        let mut cache = GradientCache::new();

        assert_eq!(
            halo(&mut pixmap, &mut cache, &frame),
            Err(LayerSkip::NonFinite("halo.x"))
        );
        assert_eq!(bloom(&mut pixmap, &frame), Err(LayerSkip::NonFinite("bloom.x")));
        assert_eq!(pixmap, before);
        assert!(cache.is_empty());
    }

    #[test]
    fn halo_and_vignette_populate_cache() {
        let state = state(1.0, 1.0);
        let frame = frame(&state, RevealStyle::Cutoff);
        let mut pixmap = surface();
        let mut cache = GradientCache::new();

        halo(&mut pixmap, &mut cache, &frame).unwrap();
        vignette(&mut pixmap, &mut cache, &frame).unwrap();
        halo(&mut pixmap, &mut cache, &frame).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&GradientKey::Vignette));
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn wipe_lights_band_during_reveal() {
        let state = state(0.3, 0.0);
        let mut frame = frame(&state, RevealStyle::Cutoff);
        // Keep the blur small relative to the tiny test surface.
        frame.pixel_ratio = 0.1;
        let mut pixmap = surface();
        let before = pixmap.clone();
        let mut layer = Pixmap::new(64, 64).unwrap();
        let mut cache = GradientCache::new();

        wipe(&mut pixmap, &mut layer, &mut cache, &frame).unwrap();
        assert_ne!(pixmap, before);
        assert!(cache.contains(&GradientKey::blade(0.3 * 52.0)));
    }

    #[test]
    fn wipe_past_far_corner_draws_nothing() {
        let state = state(0.9, 0.0);
        let frame = frame(&state, RevealStyle::Cutoff);
        let mut pixmap = surface();
        let before = pixmap.clone();
        let mut layer = Pixmap::new(64, 64).unwrap();
        let mut cache = GradientCache::new();

        wipe(&mut pixmap, &mut layer, &mut cache, &frame).unwrap();
        assert_eq!(pixmap, before);
    }
}
