//! Core library for the repetition matrix visualiser.
//!
//! Lyrics go through the [`analysis`] module to produce a word sequence and
//! frequency table, [`field`] turns that into a symmetric self-similarity
//! point field, and [`render`] animates the field frame by frame, reacting
//! to audio supplied through the [`audio`] seam. [`poster`] turns a captured
//! frame into a shareable PNG.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod field;
pub mod palette;
pub mod poster;
pub mod render;
pub mod scene;
pub mod song;
pub mod timeline;

pub use analysis::{analyze_text, TextAnalysis, WordFrequency, WordToken};
pub use audio::{AmplitudeSource, BeatTracker, SpectrumSlot, SpectrumTap};
pub use config::{
    AudioConfig, BeatConfig, IdleConfig, PosterConfig, RenderConfig, RevealStyle,
    VisualizerConfig,
};
pub use error::{LayerSkip, MatrixError, Result};
pub use field::{build_points, PointField, ProjectedPoint, SelfSimilarityPoint};
pub use palette::{FrequencyRamp, Rgb8, HEATMAP_COLORS};
pub use poster::{FrameSnapshot, PosterExporter, PosterLayout, PosterMetadata, TextStyle, Typeface};
pub use render::{FrameAction, FrameReport, Layer, RenderEngine, ViewportHandle};
pub use scene::{FocalPoint, FrameState};
pub use song::{export_filename, SongDetails};
pub use timeline::{RevealPhase, RevealTimeline};
