use std::{
    io::Read,
    path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand};
use repetition_matrix_core::{
    analyze_text, FrameAction, FrameSnapshot, MatrixError, PosterExporter, PosterMetadata,
    RenderEngine, SongDetails, SpectrumTap, ViewportHandle, VisualizerConfig,
};
use tracing_subscriber::EnvFilter;

const FRAME_RATE: f64 = 60.0;

fn main() -> repetition_matrix_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { lyrics, json, top } => run_analyze(&lyrics, json, top),
        Commands::Poster(args) => run_poster(args),
    }
}

fn run_analyze(source: &str, json: bool, top: usize) -> repetition_matrix_core::Result<()> {
    let lyrics = read_lyrics(source)?;
    let analysis = analyze_text(&lyrics);
    tracing::info!(
        words = analysis.total_word_count,
        distinct = analysis.distinct_words(),
        "lyrics analysed"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("sequence length: {}", analysis.sequence.len());
    println!("total words:     {}", analysis.total_word_count);
    println!("distinct words:  {}", analysis.distinct_words());
    for (rank, entry) in analysis.word_data.iter().take(top).enumerate() {
        println!(
            "{:>3}. {:<20} x{:<4} {:.2}",
            rank + 1,
            entry.word,
            entry.count,
            entry.frequency
        );
    }
    Ok(())
}

fn run_poster(args: PosterArgs) -> repetition_matrix_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => VisualizerConfig::from_path(path)?,
        None => VisualizerConfig::default(),
    };

    let song = SongDetails {
        lyrics: read_lyrics(&args.lyrics)?,
        song_name: args.title.clone(),
        artist_name: args.artist.clone(),
        release_year: args.year.clone(),
        cover_art: args.cover.clone(),
        ..SongDetails::default()
    };
    let analysis = analyze_text(&song.lyrics);

    let audio = match &args.audio {
        Some(path) => {
            let clip = read_wav(path)?;
            config.audio.sample_rate = clip.sample_rate;
            Some(clip)
        }
        None => None,
    };

    let viewport = ViewportHandle::new(args.size);
    let mut engine = RenderEngine::from_analysis(&config, &analysis, viewport);

    let mut tap = match &audio {
        Some(_) => {
            let tap = SpectrumTap::new(config.audio.clone())?;
            engine.attach_audio(Box::new(tap.slot()));
            engine.set_playing(true);
            Some(tap)
        }
        None => None,
    };

    let frames = (args.seconds.max(0.0) * FRAME_RATE).ceil().max(1.0) as u64;
    let chunk = (config.audio.sample_rate as f64 / FRAME_RATE).round().max(1.0) as usize;
    let mut cursor = 0;

    tracing::info!(frames, side = args.size, audio = audio.is_some(), "rendering");
    for frame in 0..frames {
        if let (Some(tap), Some(clip)) = (tap.as_mut(), audio.as_ref()) {
            if cursor < clip.samples.len() {
                let end = (cursor + chunk).min(clip.samples.len());
                tap.push_samples(&clip.samples[cursor..end])?;
                cursor = end;
            } else if engine.is_playing() {
                tracing::info!(frame, "audio finished");
                engine.set_playing(false);
                engine.detach_audio();
            }
        }

        let time_ms = frame as f64 * 1000.0 / FRAME_RATE;
        if engine.render(time_ms) == FrameAction::Stop {
            break;
        }
    }

    let report = engine.last_report();
    tracing::info!(
        drawn = report.drawn.len(),
        skipped = report.skipped.len(),
        "final frame"
    );

    let snapshot = FrameSnapshot::capture(&engine)?;
    engine.teardown();

    let exporter = PosterExporter::new(config.poster.clone());
    let path = exporter.export(
        &snapshot,
        &PosterMetadata::new(&song, &analysis),
        &args.out_dir,
    )?;
    println!("{}", path.display());
    Ok(())
}

fn read_lyrics(source: &str) -> repetition_matrix_core::Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

/// Mono PCM in `[-1, 1]`.
struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

fn read_wav(path: &Path) -> repetition_matrix_core::Result<AudioClip> {
    let wav_err = |err: hound::Error| MatrixError::msg(format!("{}: {err}", path.display()));

    let mut reader = hound::WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(wav_err)?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(wav_err)?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect::<Vec<_>>();

    tracing::debug!(
        path = %path.display(),
        channels,
        sample_rate = spec.sample_rate,
        frames = samples.len(),
        "decoded wav"
    );

    Ok(AudioClip {
        samples,
        sample_rate: spec.sample_rate,
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Lyrics repetition matrix visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the word sequence statistics for a lyrics file.
    Analyze {
        /// Lyrics file, or `-` to read from stdin.
        lyrics: String,
        /// Emit the full analysis as JSON.
        #[arg(long)]
        json: bool,
        /// How many of the most frequent words to list.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Animate the matrix offline and export a poster of the final frame.
    Poster(PosterArgs),
}

#[derive(Args, Debug)]
struct PosterArgs {
    /// Lyrics file, or `-` to read from stdin.
    lyrics: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    artist: Option<String>,
    #[arg(long)]
    year: Option<String>,
    /// PNG shown beside the title in the poster header.
    #[arg(long)]
    cover: Option<String>,
    /// WAV file whose spectrum drives the beat effects.
    #[arg(long)]
    audio: Option<PathBuf>,
    /// Length of the simulated session.
    #[arg(long, default_value_t = 4.0)]
    seconds: f64,
    /// Viewport side length in pixels.
    #[arg(long, default_value_t = 720)]
    size: u32,
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}
