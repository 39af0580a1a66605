mod audio;
mod capture;
mod catalog;
mod cli;
mod config;
mod error;
mod matching;
mod model;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

use audio::microphone::{list_input_devices, Microphone};
use capture::{CaptureGate, CaptureOutcome, GateConfig};
use catalog::Song;
use cli::Cli;
use model::Scorer;
use pipeline::{Identification, Identifier};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect songsense.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("songsense.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("songsense").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("songsense").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.sound_check_ms == config::default_sound_check_ms() {
                cli.sound_check_ms = cfg.capture.sound_check_ms;
            }
            if cli.recording_ms == config::default_recording_ms() {
                cli.recording_ms = cfg.capture.recording_ms;
            }
            if cli.energy_threshold == config::default_energy_threshold() {
                cli.energy_threshold = cfg.capture.energy_threshold;
            }
            if cli.poll_ms == config::default_poll_ms() {
                cli.poll_ms = cfg.capture.poll_ms;
            }
            if cli.device.is_none() {
                cli.device = cfg.capture.device;
            }
            if cli.model_dir == config::default_model_dir() {
                cli.model_dir = cfg.model.dir;
            }
            if cli.catalog == config::default_catalog() {
                cli.catalog = cfg.model.catalog;
            }
            if cli.recommendations == config::default_recommendations() {
                cli.recommendations = cfg.matching.recommendations;
            }
            if cli.min_confidence == 0.0 {
                cli.min_confidence = cfg.matching.min_confidence;
            }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    if cli.list_devices {
        println!("Input devices:");
        for name in list_input_devices()? {
            println!("  {}", name);
        }
        return Ok(());
    }

    if cli.list_songs {
        let songs = catalog::load_catalog(&cli.catalog)?;
        println!("Catalog ({} songs):", songs.len());
        for (i, song) in songs.iter().enumerate() {
            println!("  {:>3}  {:<32} {:<24} {}", i, song.title, song.artist, song.genre);
        }
        return Ok(());
    }

    if let Some(ref tracks_dir) = cli.enroll {
        return run_enroll(&cli, tracks_dir);
    }

    // 1. Load model and catalog before any capture
    let (model_config, scorer) = model::load_model(&cli.model_dir)?;
    let songs = catalog::load_catalog(&cli.catalog)?;
    if scorer.num_classes() != songs.len() {
        anyhow::bail!(
            "Model has {} classes but the catalog lists {} songs",
            scorer.num_classes(),
            songs.len()
        );
    }
    let identifier = Identifier::new(model_config.clone(), scorer, songs)
        .with_recommendations(cli.recommendations)
        .with_min_confidence(cli.min_confidence);

    // 2. Get a sample: decode a file, or listen on the microphone
    let sample = if let Some(ref input) = cli.input {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
        log::info!("Input: {}", input.display());
        let sample = audio::decode::decode_audio(input, Some(model_config.duration))?;
        if sample.is_empty() {
            anyhow::bail!("No audio decoded from {}", input.display());
        }
        sample
    } else {
        let gate_config = GateConfig {
            sound_check: Duration::from_millis(cli.sound_check_ms),
            recording_window: Duration::from_millis(cli.recording_ms),
            energy_threshold: cli.energy_threshold,
            poll_interval: Duration::from_millis(cli.poll_ms),
        };
        gate_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid capture settings: {}", e))?;

        let mut microphone = Microphone::open(cli.device.as_deref())?;
        let gate = CaptureGate::new(gate_config);
        eprintln!("I'm listening. Play a song!");
        match gate.begin(&mut microphone)? {
            CaptureOutcome::Captured(sample) => sample,
            CaptureOutcome::NoSound => {
                eprintln!("Please play a song and try again!");
                return Ok(());
            }
        }
    };

    // 3. Transform, score, decide
    let mut rng = rand::rng();
    let identification = identifier
        .identify(&sample, &mut rng)
        .context("Song identification failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&identification)?);
    } else {
        print_identification(&identification);
    }
    Ok(())
}

fn run_enroll(cli: &Cli, tracks_dir: &Path) -> Result<()> {
    let model_config = if cli.model_dir.join(model::MODEL_INFO_FILE).exists() {
        model::load_model_config(&cli.model_dir)?
    } else {
        log::info!("No model info in {}, using defaults", cli.model_dir.display());
        model::ModelConfig::default()
    };

    let scorer = model::enroll::enroll(
        tracks_dir,
        &cli.model_dir,
        &model_config,
        cli.segments,
        cli.temperature,
    )?;

    if cli.catalog.exists() {
        let songs = catalog::load_catalog(&cli.catalog)?;
        if songs.len() != scorer.num_classes() {
            log::warn!(
                "Enrolled {} tracks but {} lists {} songs; class order must match the catalog",
                scorer.num_classes(),
                cli.catalog.display(),
                songs.len()
            );
        }
    }

    println!("Enrolled classes:");
    for (i, label) in scorer.labels().enumerate() {
        println!("  {:>3}  {}", i, label);
    }
    Ok(())
}

fn print_identification(identification: &Identification) {
    match identification {
        Identification::Matched(result) => {
            println!("SONG IDENTIFIED!");
            print_song(&result.song);
            println!("  Confidence: {:.1}%", result.confidence * 100.0);
            if !result.recommendations.is_empty() {
                println!();
                println!("RECOMMENDED FOR YOU!");
                for rec in &result.recommendations {
                    println!("  {} - {} ({})", rec.title, rec.artist, rec.duration);
                }
            }
        }
        Identification::LowConfidence { best, confidence } => {
            println!("No match found. Try again!");
            println!(
                "  Closest: {} - {} ({:.1}%)",
                best.title,
                best.artist,
                confidence * 100.0
            );
        }
    }
}

fn print_song(song: &Song) {
    println!("  Title: {}", song.title);
    println!("  Artist: {}", song.artist);
    println!("  Genre: {}", song.genre);
    if !song.duration.is_empty() {
        println!("  Duration: {}", song.duration);
    }
    if !song.chord.is_empty() {
        println!("  Chords: {}", song.chord);
    }
}
