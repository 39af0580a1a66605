use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "songsense", about = "Identify the song playing near your microphone")]
pub struct Cli {
    /// Identify this audio file instead of listening on the microphone
    pub input: Option<PathBuf>,

    /// Config file (defaults to songsense.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding model_info.json and scorer.json
    #[arg(short, long, default_value = "model")]
    pub model_dir: PathBuf,

    /// Song catalog (JSON array, same order as the model classes)
    #[arg(long, default_value = "songs.json")]
    pub catalog: PathBuf,

    /// Maximum number of same-genre recommendations
    #[arg(short = 'n', long, default_value_t = 5)]
    pub recommendations: usize,

    /// Report matches below this probability (0.0-1.0) as unidentified
    #[arg(long, default_value_t = 0.0)]
    pub min_confidence: f32,

    /// Input device name (see --list-devices)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Give up if no sound is heard within this many milliseconds
    #[arg(long, default_value_t = 3000)]
    pub sound_check_ms: u64,

    /// Total recording time from the start of listening, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub recording_ms: u64,

    /// Mean spectrum level (0-255) that counts as sound
    #[arg(long, default_value_t = 20.0)]
    pub energy_threshold: f32,

    /// Energy polling interval in milliseconds
    #[arg(long, default_value_t = 100)]
    pub poll_ms: u64,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// List catalog songs and exit
    #[arg(long)]
    pub list_songs: bool,

    /// List input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Build the model from the audio files in this directory and exit
    #[arg(long)]
    pub enroll: Option<PathBuf>,

    /// Reference segments taken from each track when enrolling
    #[arg(long, default_value_t = 6)]
    pub segments: usize,

    /// Softmax temperature of the enrolled scorer
    #[arg(long, default_value_t = 20.0)]
    pub temperature: f32,
}
