//! Pre-rasterised point sprites.
//!
//! Every point in the field is the same anti-aliased dot in one of a handful
//! of colors, so each dot is rasterised once per color at a few sub-pixel
//! offsets and then screen-blended onto the surface with a plain byte loop.

use tiny_skia::{BlendMode, FillRule, Paint, PathBuilder, Pixmap, Transform};

use crate::palette::Rgb8;

/// Sub-pixel offsets per axis.
const PHASES: usize = 4;

/// One dot at every sub-pixel phase.
#[derive(Debug, Clone)]
pub struct SpriteSet {
    phases: Vec<Pixmap>,
    half: i32,
}

impl SpriteSet {
    /// Dot of `radius` device pixels, optionally with a wider soft ring of
    /// `(radius scale, alpha)` underneath. `None` for unusable radii.
    pub fn new(color: Rgb8, radius: f32, glow: Option<(f32, f32)>) -> Option<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return None;
        }
        let outer = glow.map_or(radius, |(scale, _)| radius * scale.max(1.0));
        let half = outer.ceil() as i32 + 1;
        let side = (2 * half + 2) as u32;

        let mut phases = Vec::with_capacity(PHASES * PHASES);
        for py in 0..PHASES {
            for px in 0..PHASES {
                let cx = half as f32 + px as f32 / PHASES as f32;
                let cy = half as f32 + py as f32 / PHASES as f32;
                let mut sprite = Pixmap::new(side, side)?;
                if let Some((scale, alpha)) = glow {
                    fill_dot(&mut sprite, cx, cy, radius * scale, color, alpha);
                }
                fill_dot(&mut sprite, cx, cy, radius, color, 1.0);
                phases.push(sprite);
            }
        }
        Some(Self { phases, half })
    }

    /// Screen-blends the dot centred on device point `(x, y)`, scaled by
    /// `opacity` (0..=255). Parts outside `dst` are clipped.
    pub fn blit(&self, dst: &mut Pixmap, x: f32, y: f32, opacity: u8) {
        if !x.is_finite() || !y.is_finite() || opacity == 0 {
            return;
        }
        let (ix, iy) = (x.floor(), y.floor());
        let phase = |f: f32| ((f * PHASES as f32) as usize).min(PHASES - 1);
        let sprite = &self.phases[phase(y - iy) * PHASES + phase(x - ix)];
        screen_blit(
            dst,
            sprite,
            ix as i32 - self.half,
            iy as i32 - self.half,
            opacity as u32,
        );
    }
}

fn fill_dot(sprite: &mut Pixmap, cx: f32, cy: f32, radius: f32, color: Rgb8, alpha: f32) {
    let Some(color) = color.with_alpha(alpha) else {
        return;
    };
    let mut pb = PathBuilder::new();
    pb.push_circle(cx, cy, radius);
    let Some(path) = pb.finish() else {
        return;
    };
    let mut paint = Paint {
        blend_mode: BlendMode::Screen,
        anti_alias: true,
        ..Paint::default()
    };
    paint.set_color(color);
    sprite.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
}

fn mul_255(a: u32, b: u32) -> u32 {
    (a * b + 127) / 255
}

/// `dst = s + d - s*d` per premultiplied channel, alpha included.
fn screen_blit(dst: &mut Pixmap, src: &Pixmap, ox: i32, oy: i32, opacity: u32) {
    let (dw, dh) = (dst.width() as i32, dst.height() as i32);
    let (sw, sh) = (src.width() as i32, src.height() as i32);
    let (x0, y0) = (ox.max(0), oy.max(0));
    let (x1, y1) = ((ox + sw).min(dw), (oy + sh).min(dh));
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let len = (x1 - x0) as usize * 4;
    let src_data = src.data();
    let dst_data = dst.data_mut();
    for y in y0..y1 {
        let s = ((y - oy) * sw + (x0 - ox)) as usize * 4;
        let d = (y * dw + x0) as usize * 4;
        for (out, &inc) in dst_data[d..d + len].iter_mut().zip(&src_data[s..s + len]) {
            let inc = mul_255(inc as u32, opacity);
            let cur = *out as u32;
            *out = (inc + cur - mul_255(inc, cur)) as u8;
        }
    }
}

/// Sprites for the current point colors and device radius. Rebuilt only when
/// either changes.
#[derive(Debug, Default)]
pub struct SpriteCache {
    colors: Vec<Rgb8>,
    tints: Vec<Rgb8>,
    radius: f32,
    glow: Option<(f32, f32)>,
    points: Vec<Option<SpriteSet>>,
    tinted: Vec<Option<SpriteSet>>,
    builds: u64,
}

impl SpriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure sprites exist for `colors` (with glow) and `tints` (plain).
    pub fn prepare(
        &mut self,
        colors: &[Rgb8],
        tints: &[Rgb8],
        radius: f32,
        glow: Option<(f32, f32)>,
    ) {
        if self.builds > 0
            && self.radius == radius
            && self.glow == glow
            && self.colors == colors
            && self.tints == tints
        {
            return;
        }

        self.colors = colors.to_vec();
        self.tints = tints.to_vec();
        self.radius = radius;
        self.glow = glow;
        self.points = colors.iter().map(|c| SpriteSet::new(*c, radius, glow)).collect();
        self.tinted = tints.iter().map(|c| SpriteSet::new(*c, radius, None)).collect();
        self.builds += 1;
        tracing::debug!(colors = colors.len(), radius, "point sprites rasterised");
    }

    pub fn point(&self, batch: usize) -> Option<&SpriteSet> {
        self.points.get(batch).and_then(Option::as_ref)
    }

    pub fn tint(&self, index: usize) -> Option<&SpriteSet> {
        self.tinted.get(index).and_then(Option::as_ref)
    }

    pub fn builds(&self) -> u64 {
        self.builds
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
