//! Poster typography on top of the bundled DejaVu Sans Bold face.

use ab_glyph::{point, Font, FontRef, Glyph, GlyphId, PxScale, ScaleFont};
use tiny_skia::{Mask, Paint, Pixmap, Rect, Transform};

use crate::{
    error::{MatrixError, Result},
    palette::Rgb8,
};

static DEJAVU_SANS_BOLD: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Smallest size a line is shrunk to when it does not fit.
const MIN_FIT_PX: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub px: f32,
    /// Extra space after every glyph, in em.
    pub tracking: f32,
    pub color: Rgb8,
}

impl TextStyle {
    pub fn new(px: f32, color: Rgb8) -> Self {
        Self {
            px,
            tracking: 0.0,
            color,
        }
    }

    pub fn tracked(mut self, em: f32) -> Self {
        self.tracking = em;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Typeface {
    font: FontRef<'static>,
}

impl Typeface {
    pub fn bundled() -> Result<Self> {
        let font = FontRef::try_from_slice(DEJAVU_SANS_BOLD)
            .map_err(|_| MatrixError::export("bundled font is unreadable"))?;
        Ok(Self { font })
    }

    /// Distance from the baseline to the top of the tallest glyphs.
    pub fn ascent(&self, px: f32) -> f32 {
        self.font.as_scaled(PxScale::from(px)).ascent()
    }

    /// Advance width of `text`, kerning and tracking included.
    pub fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        self.layout(text, style, 0.0, 0.0).1
    }

    /// `style` with its size reduced until `text` fits in `max_width`.
    pub fn fit(&self, text: &str, style: TextStyle, max_width: f32) -> TextStyle {
        let width = self.measure(text, &style);
        if width <= max_width || width <= 0.0 {
            return style;
        }
        TextStyle {
            px: (style.px * max_width / width).max(MIN_FIT_PX),
            ..style
        }
    }

    fn layout(&self, text: &str, style: &TextStyle, x: f32, baseline: f32) -> (Vec<Glyph>, f32) {
        let scaled = self.font.as_scaled(PxScale::from(style.px));
        let spacing = style.tracking * style.px;

        let mut glyphs = Vec::with_capacity(text.len());
        let mut caret = x;
        let mut previous: Option<GlyphId> = None;
        for c in text.chars().filter(|c| !c.is_control()) {
            let id = scaled.glyph_id(c);
            if let Some(previous) = previous {
                caret += scaled.kern(previous, id);
            }
            glyphs.push(id.with_scale_and_position(style.px, point(caret, baseline)));
            caret += scaled.h_advance(id) + spacing;
            previous = Some(id);
        }

        let width = if glyphs.is_empty() { 0.0 } else { caret - x - spacing };
        (glyphs, width)
    }

    /// Fills `text` onto `canvas` with its left edge at `x`. Returns the
    /// advance width.
    pub fn draw(
        &self,
        canvas: &mut Pixmap,
        text: &str,
        x: f32,
        baseline: f32,
        style: &TextStyle,
    ) -> Result<f32> {
        let (glyphs, width) = self.layout(text, style, x, baseline);
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        let mut mask = Mask::new(canvas.width(), canvas.height())
            .ok_or(MatrixError::InvalidInput("poster canvas is empty"))?;

        let mut ink: Option<(f32, f32, f32, f32)> = None;
        {
            let coverage = mask.data_mut();
            for glyph in glyphs {
                // Whitespace has no outline.
                let Some(outlined) = self.font.outline_glyph(glyph) else {
                    continue;
                };
                let bounds = outlined.px_bounds();
                ink = Some(match ink {
                    Some((l, t, r, b)) => (
                        l.min(bounds.min.x),
                        t.min(bounds.min.y),
                        r.max(bounds.max.x),
                        b.max(bounds.max.y),
                    ),
                    None => (bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y),
                });

                let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
                outlined.draw(|gx, gy, c| {
                    let (px, py) = (left + gx as i32, top + gy as i32);
                    if px < 0 || py < 0 || px >= w || py >= h {
                        return;
                    }
                    let i = (py * w + px) as usize;
                    let value = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
                    coverage[i] = coverage[i].max(value);
                });
            }
        }

        let Some((l, t, r, b)) = ink else {
            return Ok(width);
        };
        let Some(area) = Rect::from_ltrb(l.max(0.0), t.max(0.0), r.min(w as f32), b.min(h as f32))
        else {
            return Ok(width);
        };

        let color = style
            .color
            .with_alpha(1.0)
            .ok_or(MatrixError::InvalidInput("text color"))?;
        let mut paint = Paint::default();
        paint.set_color(color);
        canvas.fill_rect(area, &paint, Transform::identity(), Some(&mask));
        Ok(width)
    }

    /// Like [`Typeface::draw`], with the right edge at `right`.
    pub fn draw_right(
        &self,
        canvas: &mut Pixmap,
        text: &str,
        right: f32,
        baseline: f32,
        style: &TextStyle,
    ) -> Result<f32> {
        let width = self.measure(text, style);
        self.draw(canvas, text, right - width, baseline, style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INK: Rgb8 = Rgb8::new(30, 41, 59);

    fn inked(pixmap: &Pixmap) -> usize {
        pixmap.pixels().iter().filter(|p| p.alpha() > 0).count()
    }

    #[test]
    fn bundled_face_parses() {
        let face = Typeface::bundled().unwrap();
        let ascent = face.ascent(56.0);
        assert!(ascent > 40.0 && ascent < 56.0);
    }

    #[test]
    fn tracking_widens_and_fit_shrinks() {
        let face = Typeface::bundled().unwrap();
        let plain = TextStyle::new(22.0, INK);
        let wide = plain.tracked(0.15);
        assert!(face.measure("QUEEN", &wide) > face.measure("QUEEN", &plain));
        assert_eq!(face.measure("", &plain), 0.0);

        let title = TextStyle::new(56.0, INK);
        let long = "Supercalifragilisticexpialidocious Extended Mix";
        let fitted = face.fit(long, title, 300.0);
        assert!(fitted.px < 56.0);
        assert!(face.measure(long, &fitted) <= 300.5 || fitted.px == MIN_FIT_PX);
        assert_eq!(face.fit("Hi", title, 300.0), title);
    }

    #[test]
    fn draws_ink_inside_its_box() {
        let face = Typeface::bundled().unwrap();
        let mut canvas = Pixmap::new(200, 60).unwrap();
        let style = TextStyle::new(32.0, INK);

        let width = face.draw(&mut canvas, "Hey", 10.0, 40.0, &style).unwrap();
        assert!(width > 30.0);
        assert!(inked(&canvas) > 50);
        // Nothing lands left of the text or below the descender line.
        assert!((0..60).all(|y| canvas.pixel(2, y).unwrap().alpha() == 0));
        assert!((0..200).all(|x| canvas.pixel(x, 58).unwrap().alpha() == 0));

        let solid = canvas.pixels().iter().find(|p| p.alpha() == 255).unwrap();
        assert_eq!((solid.red(), solid.green(), solid.blue()), (30, 41, 59));
    }

    #[test]
    fn whitespace_and_offscreen_text_are_harmless() {
        let face = Typeface::bundled().unwrap();
        let mut canvas = Pixmap::new(40, 40).unwrap();
        let style = TextStyle::new(20.0, INK);
        face.draw(&mut canvas, "   ", 5.0, 20.0, &style).unwrap();
        face.draw(&mut canvas, "far away", 500.0, 20.0, &style).unwrap();
        face.draw_right(&mut canvas, "edge", 10.0, 20.0, &style).unwrap();
        assert!(inked(&canvas) > 0);
        assert!((0..40).all(|y| canvas.pixel(30, y).unwrap().alpha() == 0));
    }
}
