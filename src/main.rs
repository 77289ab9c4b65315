use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;

use quality_probe::config::loader::{read_config, resolve_config, CONFIG_PATH};
use quality_probe::config::structs::{Config, LoggingConfig};
use quality_probe::network::classifier::{classify, QualityRating, StreamMetadata, VideoDimensions};
use quality_probe::network::probe::{LiveReport, QualityProbe};
use quality_probe::network::rates::{PerSecondStats, RateProps};
use quality_probe::network::source::{ReplaySubscriber, Subscriber, SyntheticSubscriber, TrackProfile};
use quality_probe::utils;

#[derive(Parser)]
#[command(name = "quality-probe")]
#[command(version)]
#[command(about = "Media subscription network quality test", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: /etc/quality-probe/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print reports as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    stream: StreamArgs,

    #[command(flatten)]
    timing: TimingArgs,
}

/// Stream metadata handed to the classifier
#[derive(Args)]
struct StreamArgs {
    /// Video width in pixels
    #[arg(long, global = true, default_value_t = 1280)]
    width: u32,
    /// Video height in pixels
    #[arg(long, global = true, default_value_t = 720)]
    height: u32,
    /// Nominal frame rate (30, 15 or 7)
    #[arg(long, global = true)]
    frame_rate: Option<f64>,
    /// Stream carries no video
    #[arg(long, global = true)]
    audio_only: bool,
}

impl StreamArgs {
    fn metadata(&self) -> StreamMetadata {
        StreamMetadata {
            has_audio: true,
            has_video: !self.audio_only,
            frame_rate: self.frame_rate,
            video_dimensions: Some(VideoDimensions {
                width: self.width,
                height: self.height,
            }),
        }
    }
}

/// Overrides for the [probe] config section
#[derive(Args)]
struct TimingArgs {
    #[arg(long, global = true)]
    polling_interval_ms: Option<u64>,
    #[arg(long, global = true)]
    window_size_ms: Option<u64>,
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

impl TimingArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(v) = self.polling_interval_ms {
            config.probe.polling_interval_ms = v;
        }
        if let Some(v) = self.window_size_ms {
            config.probe.window_size_ms = v;
        }
        if let Some(v) = self.timeout_ms {
            config.probe.test_timeout_ms = v;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a quality test against a recorded JSON-lines stats trace
    Replay {
        /// One CumulativeStats object per line
        trace: PathBuf,
    },
    /// Run a quality test against generated traffic
    Simulate {
        #[arg(long, default_value_t = 1200.0)]
        video_kbps: f64,
        #[arg(long, default_value_t = 100.0)]
        video_pps: f64,
        /// Fraction of video packets lost (0.0-1.0)
        #[arg(long, default_value_t = 0.0)]
        video_loss: f64,
        #[arg(long, default_value_t = 40.0)]
        audio_kbps: f64,
        #[arg(long, default_value_t = 50.0)]
        audio_pps: f64,
        #[arg(long, default_value_t = 0.0)]
        audio_loss: f64,
        /// Stop producing stats after this many polls
        #[arg(long)]
        samples: Option<usize>,
    },
    /// Classify a single set of rates
    Classify {
        #[arg(long, default_value_t = 0.0)]
        video_kbps: f64,
        #[arg(long, default_value_t = 0.0)]
        video_loss: f64,
        #[arg(long, default_value_t = 0.0)]
        audio_kbps: f64,
        #[arg(long, default_value_t = 0.0)]
        audio_loss: f64,
    },
}

/// ANSI color codes
mod colors {
    pub const RED: &str = "\x1b[0;31m";
    pub const GREEN: &str = "\x1b[0;32m";
    pub const YELLOW: &str = "\x1b[0;33m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const NC: &str = "\x1b[0m";
}

fn rating_color(rating: QualityRating) -> &'static str {
    match rating {
        QualityRating::Excellent | QualityRating::Good => colors::GREEN,
        QualityRating::Fair => colors::YELLOW,
        QualityRating::Poor | QualityRating::Bad => colors::RED,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Read first so the configured level applies, log the outcome once the logger is up
    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_PATH));
    let loaded = read_config(&config_path);
    let level = match &loaded {
        Ok(Some(config)) => config.logging.level.clone(),
        _ => LoggingConfig::default().level,
    };
    utils::logger::init(&level);
    let mut config = resolve_config(&config_path, loaded);
    cli.timing.apply(&mut config);

    let metadata = cli.stream.metadata();

    match cli.command {
        Commands::Replay { ref trace } => {
            let subscriber = ReplaySubscriber::from_trace_file(metadata, trace)?;
            run_test(subscriber, &config, cli.json).await?;
        }
        Commands::Simulate {
            video_kbps,
            video_pps,
            video_loss,
            audio_kbps,
            audio_pps,
            audio_loss,
            samples,
        } => {
            let video = TrackProfile {
                kbps: video_kbps,
                packets_per_second: video_pps,
                loss_ratio: video_loss,
            };
            let audio = TrackProfile {
                kbps: audio_kbps,
                packets_per_second: audio_pps,
                loss_ratio: audio_loss,
            };
            let mut subscriber = SyntheticSubscriber::new(metadata, audio, video);
            if let Some(n) = samples {
                subscriber = subscriber.with_max_samples(n);
            }
            run_test(subscriber, &config, cli.json).await?;
        }
        Commands::Classify {
            video_kbps,
            video_loss,
            audio_kbps,
            audio_loss,
        } => {
            let rates = PerSecondStats {
                audio: RateProps {
                    bits_per_second: audio_kbps * 1000.0,
                    packet_loss_ratio_per_second: audio_loss,
                    ..Default::default()
                },
                video: RateProps {
                    bits_per_second: video_kbps * 1000.0,
                    packet_loss_ratio_per_second: video_loss,
                    ..Default::default()
                },
                ..Default::default()
            };
            let rating = classify(&rates, &metadata);
            if cli.json {
                println!("{}", serde_json::to_string(&rating)?);
            } else {
                println!("{}{}{}{}", colors::BOLD, rating_color(rating), rating, colors::NC);
            }
        }
    }

    Ok(())
}

async fn run_test<S: Subscriber>(subscriber: S, config: &Config, json: bool) -> Result<()> {
    use colors::*;

    let mut probe = QualityProbe::new(subscriber, config.probe.clone())?;
    let handle = probe.handle();

    let print_live = |report: &LiveReport| {
        if json {
            match serde_json::to_string(report) {
                Ok(line) => println!("{}", line),
                Err(e) => error!("Failed to encode report: {}", e),
            }
        } else {
            println!(
                "{}[{:>4.1}s window]{} video {:>7.0} kbps (loss {:.3})  audio {:>5.0} kbps (loss {:.3})  {}{}{}",
                DIM,
                report.stats.window_size,
                NC,
                report.stats.video.kbps(),
                report.stats.video.packet_loss_ratio_per_second,
                report.stats.audio.kbps(),
                report.stats.audio.packet_loss_ratio_per_second,
                rating_color(report.rating),
                report.rating,
                NC
            );
        }
    };

    // Ctrl-C settles the test early with whatever window we have
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            handle.end();
        }
    });

    let report = probe.run(print_live).await.context("Quality test failed")?;
    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!();
        println!(
            "{}Final rating:{} {}{}{} after {}ms",
            BOLD,
            NC,
            rating_color(report.rating),
            report.rating,
            NC,
            report.stats.elapsed_time_ms.unwrap_or(0)
        );
    }
    Ok(())
}
