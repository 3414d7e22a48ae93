//! Poster export: a fixed-size, shareable PNG built around a verbatim copy
//! of the live frame.

mod text;

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tiny_skia::{
    FillRule, FilterQuality, LinearGradient, Mask, Paint, Path as SkPath, PathBuilder,
    Pixmap, PixmapPaint, Point, Rect, SpreadMode, Transform,
};

use crate::{
    analysis::TextAnalysis,
    config::PosterConfig,
    error::{MatrixError, Result},
    palette::{FrequencyRamp, Rgb8},
    render::{gaussian_blur, RenderEngine},
    song::SongDetails,
};

pub use text::{TextStyle, Typeface};

const TITLE_GAP: u32 = 6;
const HEADER_TAIL: u32 = 8;
const SHADOW_OFFSET_Y: f32 = 25.0;
const SHADOW_SIGMA: f32 = 30.0;
const SHADOW_ALPHA: u8 = 51;
/// Room left of the legend bar for its "RARE" label.
const LEGEND_LABEL_SLOT: u32 = 56;
const LEGEND_LABEL_GAP: f32 = 12.0;
const LABEL_PX: f32 = 12.0;
const ARTIST_TRACKING: f32 = 0.15;
const LABEL_TRACKING: f32 = 0.1;
const COVER_GAP: f32 = 24.0;
const COVER_RADIUS: f32 = 16.0;

const TITLE_INK: Rgb8 = Rgb8::from_hex(0x1E293B);
const ARTIST_INK: Rgb8 = Rgb8::from_hex(0x6366F1);
const YEAR_INK: Rgb8 = Rgb8::from_hex(0x94A3B8);
const LABEL_INK: Rgb8 = Rgb8::from_hex(0x64748B);

/// Bit-for-bit copy of the engine's current raster.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pixmap: Pixmap,
}

impl FrameSnapshot {
    /// Copies the last drawn frame. Fails if the engine has nothing on screen.
    pub fn capture(engine: &RenderEngine) -> Result<Self> {
        let surface = engine
            .surface()
            .ok_or_else(|| MatrixError::export("no rendered frame to capture"))?;
        Ok(Self {
            pixmap: surface.clone(),
        })
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }
}

/// Text that accompanies the poster. Drawn into the header and legend row,
/// and also stored as PNG text chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PosterMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub year: Option<String>,
    pub total_words: usize,
    pub distinct_words: usize,
    /// Local image path or remote URL. Only local PNG files are drawn.
    pub cover_art: Option<String>,
}

impl PosterMetadata {
    pub fn new(song: &SongDetails, analysis: &TextAnalysis) -> Self {
        Self {
            title: song.title().to_string(),
            artist: song.artist().map(str::to_string),
            year: song.year().map(str::to_string),
            total_words: analysis.total_word_count,
            distinct_words: analysis.distinct_words(),
            cover_art: song
                .cover_art
                .as_deref()
                .map(str::trim)
                .filter(|art| !art.is_empty())
                .map(str::to_string),
        }
    }

    fn chunks(&self) -> Vec<(&'static str, String)> {
        let mut chunks = vec![("Title", self.title.clone())];
        if let Some(artist) = &self.artist {
            chunks.push(("Author", artist.to_uppercase()));
        }
        if let Some(year) = &self.year {
            chunks.push(("Creation Time", year.clone()));
        }
        chunks.push((
            "Description",
            format!(
                "Repetition matrix of {} words ({} distinct)",
                self.total_words, self.distinct_words
            ),
        ));
        chunks.push(("Software", format!("repetition-matrix {}", env!("CARGO_PKG_VERSION"))));
        chunks
    }
}

/// Pixel geometry of the poster canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosterLayout {
    pub width: u32,
    pub height: u32,
    /// Band holding title, artist, year and cover art.
    pub header: Rect,
    /// Square visualization block.
    pub viz: Rect,
    pub legend: Rect,
}

impl PosterLayout {
    pub fn new(config: &PosterConfig) -> Result<Self> {
        if config.viz_size == 0 || config.canvas_width < config.viz_size + 2 * config.padding {
            return Err(MatrixError::InvalidInput(
                "poster canvas must fit the visualization plus padding",
            ));
        }

        let padding = config.padding;
        let header_height = config.title_font_px + TITLE_GAP + config.artist_font_px + HEADER_TAIL;
        let viz_top = padding + header_height + padding;
        let legend_top = viz_top + config.viz_size + padding;
        let height = legend_top + config.legend_height + padding;
        let viz_left = (config.canvas_width - config.viz_size) / 2;

        let rect = |x: u32, y: u32, w: u32, h: u32| {
            Rect::from_xywh(x as f32, y as f32, w as f32, h as f32)
                .ok_or(MatrixError::InvalidInput("poster region is empty"))
        };

        Ok(Self {
            width: config.canvas_width,
            height,
            header: rect(padding, padding, config.canvas_width - 2 * padding, header_height)?,
            viz: rect(viz_left, viz_top, config.viz_size, config.viz_size)?,
            legend: rect(
                viz_left + LEGEND_LABEL_SLOT,
                legend_top,
                config.legend_width,
                config.legend_height.max(1),
            )?,
        })
    }
}

/// Lays out and writes posters. Holds no reference to the live engine; it
/// only ever sees snapshots.
#[derive(Debug, Clone)]
pub struct PosterExporter {
    config: PosterConfig,
    ramp: FrequencyRamp,
}

impl PosterExporter {
    pub fn new(config: PosterConfig) -> Self {
        Self {
            config,
            ramp: FrequencyRamp::default(),
        }
    }

    pub fn with_ramp(mut self, ramp: FrequencyRamp) -> Self {
        self.ramp = ramp;
        self
    }

    pub fn layout(&self) -> Result<PosterLayout> {
        PosterLayout::new(&self.config)
    }

    /// Writes `{title}{tag}.png` into `out_dir`. Either the complete file is
    /// in place when this returns `Ok`, or nothing was written.
    pub fn export(
        &self,
        snapshot: &FrameSnapshot,
        metadata: &PosterMetadata,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let target = out_dir.join(crate::song::export_filename(
            &metadata.title,
            &self.config.file_tag,
        ));

        match self.write_poster(snapshot, metadata, out_dir, &target) {
            Ok(()) => {
                tracing::info!(path = %target.display(), "poster written");
                Ok(target)
            }
            Err(err) => {
                tracing::warn!(path = %target.display(), error = %err, "poster export failed");
                Err(match err {
                    MatrixError::Export(_) => err,
                    other => MatrixError::export(other.to_string()),
                })
            }
        }
    }

    fn write_poster(
        &self,
        snapshot: &FrameSnapshot,
        metadata: &PosterMetadata,
        out_dir: &Path,
        target: &Path,
    ) -> Result<()> {
        let poster = self.compose(snapshot, metadata)?;
        let bytes = encode_png(&poster, metadata)?;

        fs::create_dir_all(out_dir)?;
        let mut file = tempfile::NamedTempFile::new_in(out_dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(target).map_err(|err| MatrixError::Io(err.error))?;
        Ok(())
    }

    /// Renders the poster canvas: transparent background, header text and
    /// cover, shadowed rounded visualization block, and the labelled legend.
    pub fn compose(&self, snapshot: &FrameSnapshot, metadata: &PosterMetadata) -> Result<Pixmap> {
        let layout = self.layout()?;
        let mut canvas = Pixmap::new(layout.width, layout.height)
            .ok_or(MatrixError::InvalidInput("poster canvas is empty"))?;
        let face = Typeface::bundled()?;

        let block = rounded_rect(layout.viz, self.config.corner_radius)
            .ok_or_else(|| MatrixError::export("visualization block has no area"))?;

        self.draw_shadow(&mut canvas, &block)?;
        self.draw_visualization(&mut canvas, snapshot, &layout, &block)?;
        self.draw_header(&mut canvas, &face, &layout, metadata)?;
        self.draw_legend(&mut canvas, &face, &layout, metadata)?;
        Ok(canvas)
    }

    fn draw_header(
        &self,
        canvas: &mut Pixmap,
        face: &Typeface,
        layout: &PosterLayout,
        metadata: &PosterMetadata,
    ) -> Result<()> {
        let header = layout.header;
        let mut text_right = header.right();
        if let Some(cover) = metadata.cover_art.as_deref() {
            if draw_cover(canvas, cover, header)? {
                text_right -= header.height() + COVER_GAP;
            }
        }
        let max_width = (text_right - header.left()).max(0.0);

        let title_style = TextStyle::new(self.config.title_font_px as f32, TITLE_INK);
        let title_style = face.fit(&metadata.title, title_style, max_width);
        let title_baseline = header.top() + face.ascent(title_style.px);
        face.draw(canvas, &metadata.title, header.left(), title_baseline, &title_style)?;

        let artist_px = self.config.artist_font_px as f32;
        let line_baseline = header.top()
            + self.config.title_font_px as f32
            + TITLE_GAP as f32
            + face.ascent(artist_px);

        let year_style = TextStyle::new(artist_px, YEAR_INK);
        let year_width = match &metadata.year {
            Some(year) => face.draw_right(canvas, year, text_right, line_baseline, &year_style)?,
            None => 0.0,
        };

        if let Some(artist) = &metadata.artist {
            let artist = artist.to_uppercase();
            let room = (max_width - year_width - COVER_GAP).max(0.0);
            let style = TextStyle::new(artist_px, ARTIST_INK).tracked(ARTIST_TRACKING);
            let style = face.fit(&artist, style, room);
            face.draw(canvas, &artist, header.left(), line_baseline, &style)?;
        }
        Ok(())
    }

    fn draw_shadow(&self, canvas: &mut Pixmap, block: &SkPath) -> Result<()> {
        let mut shadow = Pixmap::new(canvas.width(), canvas.height())
            .ok_or(MatrixError::InvalidInput("poster canvas is empty"))?;
        let mut paint = Paint::default();
        paint.set_color_rgba8(0, 0, 0, SHADOW_ALPHA);
        shadow.fill_path(
            block,
            &paint,
            FillRule::Winding,
            Transform::from_translate(0.0, SHADOW_OFFSET_Y),
            None,
        );
        gaussian_blur(&mut shadow, SHADOW_SIGMA);
        canvas.draw_pixmap(
            0,
            0,
            shadow.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Ok(())
    }

    fn draw_visualization(
        &self,
        canvas: &mut Pixmap,
        snapshot: &FrameSnapshot,
        layout: &PosterLayout,
        block: &SkPath,
    ) -> Result<()> {
        if snapshot.width() == 0 || snapshot.height() == 0 {
            return Err(MatrixError::export("snapshot is empty"));
        }

        let mut mask = Mask::new(canvas.width(), canvas.height())
            .ok_or(MatrixError::InvalidInput("poster canvas is empty"))?;
        mask.fill_path(block, FillRule::Winding, true, Transform::identity());

        let sx = layout.viz.width() / snapshot.width() as f32;
        let sy = layout.viz.height() / snapshot.height() as f32;
        let quality = if sx == 1.0 && sy == 1.0 {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        };
        let paint = PixmapPaint {
            quality,
            ..PixmapPaint::default()
        };
        let transform = Transform::from_translate(layout.viz.x(), layout.viz.y()).pre_scale(sx, sy);
        canvas.draw_pixmap(0, 0, snapshot.pixmap().as_ref(), &paint, transform, Some(&mask));
        Ok(())
    }

    fn draw_legend(
        &self,
        canvas: &mut Pixmap,
        face: &Typeface,
        layout: &PosterLayout,
        metadata: &PosterMetadata,
    ) -> Result<()> {
        let bar = layout.legend;
        let shader = LinearGradient::new(
            Point::from_xy(bar.left(), 0.0),
            Point::from_xy(bar.right(), 0.0),
            self.ramp.gradient_stops(),
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or_else(|| MatrixError::export("legend gradient rejected"))?;
        let path = rounded_rect(bar, bar.height() / 2.0)
            .ok_or_else(|| MatrixError::export("legend bar has no area"))?;

        let paint = Paint {
            shader,
            anti_alias: true,
            ..Paint::default()
        };
        canvas.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

        // Cap height of the label face is roughly 0.72 em.
        let baseline = bar.top() + bar.height() / 2.0 + LABEL_PX * 0.36;
        let label = TextStyle::new(LABEL_PX, LABEL_INK).tracked(LABEL_TRACKING);
        face.draw_right(canvas, "RARE", bar.left() - LEGEND_LABEL_GAP, baseline, &label)?;
        face.draw(canvas, "HOT", bar.right() + LEGEND_LABEL_GAP, baseline, &label)?;

        let words = format!("{} WORDS", metadata.total_words);
        let right = layout.width as f32 - self.config.padding as f32;
        face.draw_right(canvas, &words, right, baseline, &label)?;
        Ok(())
    }
}

/// Draws a local PNG cover as a rounded square at the right end of the
/// header. Returns whether anything was drawn; unreadable or remote covers
/// are skipped.
fn draw_cover(canvas: &mut Pixmap, reference: &str, header: Rect) -> Result<bool> {
    if reference.contains("://") {
        tracing::debug!(cover = reference, "remote cover art is not fetched");
        return Ok(false);
    }
    let image = match Pixmap::load_png(reference) {
        Ok(image) => image,
        Err(err) => {
            tracing::warn!(cover = reference, error = %err, "cover art skipped");
            return Ok(false);
        }
    };

    let side = header.height();
    let Some(slot) = Rect::from_xywh(header.right() - side, header.top(), side, side) else {
        return Ok(false);
    };
    let Some(frame) = rounded_rect(slot, COVER_RADIUS) else {
        return Ok(false);
    };
    let mut mask = Mask::new(canvas.width(), canvas.height())
        .ok_or(MatrixError::InvalidInput("poster canvas is empty"))?;
    mask.fill_path(&frame, FillRule::Winding, true, Transform::identity());

    // Scale to cover the slot, cropping the longer side.
    let (w, h) = (image.width() as f32, image.height() as f32);
    let scale = side / w.min(h);
    let transform = Transform::from_translate(
        slot.x() + (side - w * scale) / 2.0,
        slot.y() + (side - h * scale) / 2.0,
    )
    .pre_scale(scale, scale);
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    canvas.draw_pixmap(0, 0, image.as_ref(), &paint, transform, Some(&mask));
    Ok(true)
}

/// Rectangle with circular corners of `radius`, clamped to half the shorter side.
fn rounded_rect(rect: Rect, radius: f32) -> Option<SkPath> {
    let r = radius.max(0.0).min(rect.width() / 2.0).min(rect.height() / 2.0);
    if r == 0.0 {
        return Some(PathBuilder::from_rect(rect));
    }

    // Cubic approximation of a quarter circle.
    let k = r * 0.552_284_8;
    let (l, t, rt, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());

    let mut pb = PathBuilder::new();
    pb.move_to(l + r, t);
    pb.line_to(rt - r, t);
    pb.cubic_to(rt - r + k, t, rt, t + r - k, rt, t + r);
    pb.line_to(rt, b - r);
    pb.cubic_to(rt, b - r + k, rt - r + k, b, rt - r, b);
    pb.line_to(l + r, b);
    pb.cubic_to(l + r - k, b, l, b - r + k, l, b - r);
    pb.line_to(l, t + r);
    pb.cubic_to(l, t + r - k, l + r - k, t, l + r, t);
    pb.close();
    pb.finish()
}

/// Straight-alpha RGBA PNG with UTF-8 text chunks.
fn encode_png(pixmap: &Pixmap, metadata: &PosterMetadata) -> Result<Vec<u8>> {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        for (keyword, text) in metadata.chunks() {
            encoder.add_itxt_chunk(keyword.to_string(), text)?;
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&rgba)?;
        writer.finish()?;
    }
    Ok(bytes)
}
