//! Show document information.

use std::path::PathBuf;

use kinetrack_common::FrameClock;
use kinetrack_track_model::ChannelKind;

use super::load_document;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let document = load_document(&path)?;

    println!("Document: {}", document.name);
    println!("  Version: {}", document.version);
    println!("  Created: {}", document.created_at);
    println!("  Modified: {}", document.modified_at);
    println!();

    let clip = &document.clip;
    println!("Clip:");
    println!(
        "  Frames {}..={} every {} ({} steps)",
        clip.start_frame(),
        clip.end_frame(),
        clip.stride(),
        clip.step_count()
    );
    if let Some(count) = clip.frame_count() {
        println!("  Recorded frames: {count}");
    }
    if clip.play_all_steps() {
        println!("  Plays every frame between steps");
    }
    match &document.clock {
        FrameClock::Uniform {
            start_secs,
            frame_duration_secs,
        } => println!(
            "  Clock: uniform, {:.3} fps from {start_secs:.3}s",
            1.0 / frame_duration_secs
        ),
        FrameClock::Explicit { times_secs } => {
            print!("  Clock: explicit, {} frame times", times_secs.len());
            match document.clock.mean_frame_duration(times_secs.len()) {
                Some(duration) if duration > 0.0 => println!(", ~{:.3} fps", 1.0 / duration),
                _ => println!(),
            }
        }
    }
    println!();

    println!("Tracks:");
    for track in &document.tracks {
        println!("  {} ({})", track.id, track.name);
        for (kind, channel) in &track.channels {
            println!(
                "    {:?}: {} values, {} keyframes",
                kind,
                channel.len(),
                channel.keyframes().len()
            );
            if *kind == ChannelKind::Angle {
                for (frame, sample) in channel.iter().filter(|(f, _)| channel.is_keyframe(*f)) {
                    if let Some(angle) = sample.protractor_angle() {
                        println!("      frame {frame}: {:.1}°", angle.to_degrees());
                    }
                }
            }
        }
        if let Some(range) = track.valid_range {
            println!("    Valid frames: {}..={}", range.start, range.end);
        }
        if track.has_positions() {
            println!(
                "    Derivatives: {} (spill {}, acceleration spill {})",
                track.derivatives.algorithm,
                track.derivatives.velocity_spill(),
                track.derivatives.acceleration_spill
            );
        }
    }

    Ok(())
}
