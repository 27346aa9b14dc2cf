// Copyright 2022-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt};

use matroska_reader::{MatroskaDocument, ReaderConfig, TrackEntry, UnevenLacingPolicy};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input Matroska or WebM file
    input_fname: std::path::PathBuf,

    /// Reader configuration file in TOML format
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Skip the leftover octets of fixed-size laced blocks which do not
    /// divide evenly, instead of failing.
    #[arg(long)]
    allow_uneven_fixed_lacing: bool,

    /// Print a hex dump of this many frames
    #[arg(long, default_value_t = 0)]
    dump_frames: usize,
}

/// Log to the console, filtered by `RUST_LOG`.
fn init_logging() -> anyhow::Result<()> {
    let console_layer = fmt::layer()
        .with_ansi(!cfg!(windows))
        .with_file(true)
        .with_line_number(true);
    let collector = tracing_subscriber::registry()
        .with(console_layer)
        .with(tracing_subscriber::filter::EnvFilter::from_default_env());
    tracing::subscriber::set_global_default(collector)?;
    Ok(())
}

fn track_summary(track: &TrackEntry) -> String {
    let mut summary = format!(
        "track {}: {:?} {} ({})",
        track.track_number(),
        track.track_type(),
        track.codec_id(),
        track.language()
    );
    if let Some(video) = track.video_track() {
        summary.push_str(&format!(" {}x{}", video.pixel_width, video.pixel_height));
    }
    if let Some(audio) = track.audio_track() {
        summary.push_str(&format!(
            " {} channels, {} Hz, {} bit",
            audio.channels, audio.sampling_frequency, audio.bit_depth
        ));
    }
    summary
}

fn print_summary(doc: &MatroskaDocument) {
    let header = doc.header();
    println!(
        "{} version {} (read version {})",
        header.doc_type(),
        header.doc_type_version(),
        header.doc_type_read_version()
    );
    if let Some(info) = doc.segment_information() {
        println!(
            "timestamp scale {} ns, muxing app \"{}\", writing app \"{}\"",
            info.timestamp_scale_or_default(),
            info.muxing_app(),
            info.writing_app()
        );
        if let Some(title) = info.title() {
            println!("title: {title}");
        }
        if let Some(date) = info.date_utc() {
            println!("date: {date}");
        }
        if let Some(duration) = info.duration() {
            println!("duration: {duration} ticks");
        }
    }
    for track in doc.tracks().values() {
        println!("{}", track_summary(track));
    }
    let n_blocks: usize = doc.clusters().iter().map(|c| c.blocks().len()).sum();
    println!(
        ".. {} clusters, {n_blocks} blocks total ..",
        doc.clusters().len()
    );
}

fn dump_frames(doc: &MatroskaDocument, max_frames: usize) {
    let mut count = 0;
    for (cluster, block) in doc.blocks() {
        let pts = doc
            .presentation_time(cluster, block)
            .map(|pts| format!("{}ms", pts.as_secs_f64() * 1000.0))
            .unwrap_or_else(|| "(before segment start)".to_string());
        for frame in block.frames() {
            if count >= max_frames {
                return;
            }
            println!(
                "frame {count} track {} time {pts} (size {}, keyframe {})",
                block.track_number(),
                frame.len(),
                block.only_keyframes()
            );
            for (line_count, bytes) in frame.chunks(20).enumerate() {
                for byte in bytes.iter() {
                    print!("{byte:02X} ");
                }
                println!();
                if line_count > 10 {
                    break;
                }
            }
            count += 1;
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    tracing::debug!("{:?}", cli);

    let mut cfg = match &cli.config {
        Some(path) => matroska_reader::parse_config_file(path)
            .with_context(|| format!("While parsing configuration file {}", path.display()))?,
        None => ReaderConfig::default(),
    };
    if cli.allow_uneven_fixed_lacing {
        cfg.uneven_fixed_lacing = UnevenLacingPolicy::Discard;
    }

    let doc = matroska_reader::parse_from_file_with_config(&cli.input_fname, cfg)
        .with_context(|| format!("While parsing {}", cli.input_fname.display()))?;

    print_summary(&doc);
    dump_frames(&doc, cli.dump_frames);
    Ok(())
}
