//! `agro`: NDVI by crop class for the 2023/24 campaign.
//!
//! Steps, in the order they are usually run:
//! - `zonal` monthly NDVI mean per crop class
//! - `chart` time-series chart of the zonal results
//! - `verify` consistency of the monthly rasters
//! - `combine` temporal statistics stack
//! - `clip` crop maps on the combined grid
//! - `compare` / `check-reference` grid checks of the clipped maps
//! - `merge` clipped maps plus NDVI stack

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use grid_processor::Season;
use pipeline::commands;
use pipeline::publish::{self, LinePrompter, SystemGit, DEFAULT_BRANCH};
use pipeline::report;
use pipeline::{BarProgress, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "agro")]
#[command(version, about = "NDVI by crop class for Tres Arroyos", long_about = None)]
struct Cli {
    /// Pipeline config YAML (project layout defaults apply when omitted)
    #[arg(short, long, global = true, env = "AGRO_CONFIG")]
    config: Option<PathBuf>,

    /// Directory with the monthly NDVI_*.tif rasters
    #[arg(long, global = true)]
    ndvi_dir: Option<PathBuf>,

    /// Directory with the INTA crop maps and styles
    #[arg(long, global = true)]
    inta_dir: Option<PathBuf>,

    /// Directory for step outputs
    #[arg(long, global = true)]
    proc_dir: Option<PathBuf>,

    /// Directory for charts and previews
    #[arg(long, global = true)]
    img_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the crop classes of the land-cover styles
    Classes {
        /// Only this season
        #[arg(long, value_enum)]
        season: Option<SeasonArg>,
        /// Write the season's style as JSON
        #[arg(long, requires = "season")]
        export_json: Option<PathBuf>,
        /// Write the season's style as a paletted QML document
        #[arg(long, requires = "season")]
        export_qml: Option<PathBuf>,
    },
    /// Monthly NDVI mean per crop class (step 2)
    Zonal,
    /// Time-series chart of the zonal results (step 3)
    Chart,
    /// Check that the monthly rasters share one grid (step 4)
    Verify,
    /// Stack the monthly rasters with temporal statistics (step 5)
    Combine,
    /// Crop-class presence bands on the combined grid (step 6)
    Clip {
        /// Also write the crop maps resampled onto the combined grid
        #[arg(long)]
        export: bool,
    },
    /// Compare the clipped winter and summer crop maps (step 7)
    Compare,
    /// Check the clipped crop maps against the combined NDVI raster (step 8)
    CheckReference,
    /// Merge the clipped crop maps with the NDVI stack (step 9)
    Merge,
    /// Derive NDVI from the full-band Sentinel-2 scene
    Ndvi {
        /// Scene GeoTIFF (defaults to the configured scene)
        #[arg(long)]
        scene: Option<PathBuf>,
        /// Output GeoTIFF
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// PNG previews of rasters
    Render {
        #[command(subcommand)]
        target: RenderTarget,
    },
    /// Publish the repository to GitHub
    Publish {
        /// Branch to push
        #[arg(long, default_value = DEFAULT_BRANCH)]
        branch: String,
    },
}

#[derive(Subcommand, Debug)]
enum RenderTarget {
    /// Crop map coloured with its style
    Classes {
        #[arg(long, value_enum, default_value = "winter")]
        season: SeasonArg,
        /// Class raster (defaults to the season's crop map)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// NDVI raster on the NDVI colour ramp
    Ndvi {
        /// NDVI GeoTIFF
        input: PathBuf,
        /// Output PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SeasonArg {
    Winter,
    Summer,
}

impl From<SeasonArg> for Season {
    fn from(arg: SeasonArg) -> Self {
        match arg {
            SeasonArg::Winter => Season::Winter,
            SeasonArg::Summer => Season::Summer,
        }
    }
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.ndvi_dir {
        config.ndvi_dir = dir;
    }
    if let Some(dir) = cli.inta_dir {
        config.inta_dir = dir;
    }
    if let Some(dir) = cli.proc_dir {
        config.proc_dir = dir;
    }
    if let Some(dir) = cli.img_dir {
        config.img_dir = dir;
    }

    let progress = if cli.quiet {
        BarProgress::hidden()
    } else {
        BarProgress::terminal()
    };

    match cli.command {
        Commands::Classes {
            season,
            export_json,
            export_qml,
        } => {
            let seasons = match season {
                Some(s) => vec![Season::from(s)],
                None => Season::ALL.to_vec(),
            };
            for season in seasons {
                let style = commands::load_style(&config, season)?;
                println!("{} ({} classes)", style.name, style.len());
                println!("{}", report::style_table(&style));

                if let Some(path) = &export_json {
                    std::fs::write(path, serde_json::to_string_pretty(&style)?)?;
                    info!(path = %path.display(), "Wrote style JSON");
                }
                if let Some(path) = &export_qml {
                    std::fs::write(path, style.to_qml())?;
                    info!(path = %path.display(), "Wrote style QML");
                }
            }
        }

        Commands::Zonal => {
            let result = commands::zonal(&config, &progress)?;
            for season in Season::ALL {
                let series = result.season(season);
                println!("{} ({} months)", season, series.months.len());
                println!("{}", report::summary_table(series));
            }
        }

        Commands::Chart => {
            let path = commands::chart(&config)?;
            println!("Chart saved to {}", path.display());
        }

        Commands::Verify => {
            let result = commands::verify(&config)?;
            println!("{}", report::consistency_table(&result));
            if result.all_consistent() {
                println!("All rasters share CRS, size, nodata, dtype and transform.");
            } else {
                println!("Required actions:");
                for action in result.required_actions() {
                    println!("  - {}", action.description());
                }
            }
        }

        Commands::Combine => {
            let result = commands::combine(&config, &progress)?;
            println!("{}", report::bands_table(&result.band_names));
            println!(
                "{} x {} pixels written to {}",
                result.width,
                result.height,
                result.output.display()
            );
        }

        Commands::Clip { export } => {
            let result = commands::clip(&config, &progress)?;
            println!("{}", report::presence_table(&result));
            println!("{}", report::bands_table(&result.band_names));

            if export {
                for (season, path, valid) in commands::export_clips(&config)? {
                    println!("{}: {} class pixels -> {}", season, valid, path.display());
                }
            }
        }

        Commands::Compare => {
            let result = commands::compare_clips(&config)?;
            println!("{}", report::comparison_table(&result));
            print_verdict(result.all_match());
        }

        Commands::CheckReference => {
            let result = commands::check_reference(&config)?;
            println!("{}", report::comparison_table(&result));
            print_verdict(result.all_match());
        }

        Commands::Merge => {
            let result = commands::merge(&config, &progress)?;
            println!("{}", report::bands_table(&result.band_names));
            println!(
                "Valid pixels: invierno {}, verano {}",
                result.winter_valid, result.summer_valid
            );
        }

        Commands::Ndvi { scene, output } => {
            let scene = scene.unwrap_or_else(|| config.scene_path());
            let output = output.unwrap_or_else(|| commands::scene_ndvi_path(&config, &scene));
            let (valid, mean) = commands::scene_ndvi(&scene, &output)?;
            match mean {
                Some(mean) => println!(
                    "NDVI written to {} ({} valid pixels, mean {:.4})",
                    output.display(),
                    valid,
                    mean
                ),
                None => {
                    warn!(scene = %scene.display(), "Scene has no valid NDVI pixels");
                    println!("NDVI written to {} (no valid pixels)", output.display());
                }
            }
        }

        Commands::Render { target } => match target {
            RenderTarget::Classes {
                season,
                input,
                output,
            } => {
                let season = Season::from(season);
                let style = commands::load_style(&config, season)?;
                let input = input.unwrap_or_else(|| config.mnc(season));
                let output = output
                    .unwrap_or_else(|| config.img_dir.join(format!("mnc_{}.png", season)));
                let counts = commands::render_class_preview(&input, &style, &output)?;
                println!("{}", report::class_count_table(&counts, &style));
                println!("Preview saved to {}", output.display());
            }
            RenderTarget::Ndvi { input, output } => {
                let output = output.unwrap_or_else(|| {
                    let stem = input
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "ndvi".to_string());
                    config.img_dir.join(format!("{}.png", stem))
                });
                commands::render_ndvi_preview(&input, &output)?;
                println!("Preview saved to {}", output.display());
            }
        },

        Commands::Publish { branch } => {
            let mut prompter = LinePrompter::stdio();
            let outcome = publish::publish(&SystemGit, &mut prompter, &branch)?;
            publish::write_outcome(&mut io::stdout(), &outcome)?;
        }
    }

    Ok(())
}

fn print_verdict(all_match: bool) {
    if all_match {
        println!("Conclusion: all rasters share the same grid.");
    } else {
        println!("Conclusion: the rasters differ; see the detailed report.");
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["agro", "--quiet", "clip", "--export"]);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Clip { export: true }));

        let cli = Cli::parse_from(["agro", "check-reference", "--proc-dir", "/tmp/proc"]);
        assert!(matches!(cli.command, Commands::CheckReference));
        assert_eq!(cli.proc_dir, Some(PathBuf::from("/tmp/proc")));

        let cli = Cli::parse_from(["agro", "render", "classes", "--season", "summer"]);
        assert!(matches!(
            cli.command,
            Commands::Render {
                target: RenderTarget::Classes {
                    season: SeasonArg::Summer,
                    ..
                }
            }
        ));
    }

    #[test]
    fn test_export_requires_season() {
        assert!(Cli::try_parse_from(["agro", "classes", "--export-qml", "x.qml"]).is_err());
        assert!(Cli::try_parse_from([
            "agro",
            "classes",
            "--season",
            "winter",
            "--export-qml",
            "x.qml"
        ])
        .is_ok());
    }

    #[test]
    fn test_publish_default_branch() {
        let cli = Cli::parse_from(["agro", "publish"]);
        match cli.command {
            Commands::Publish { branch } => assert_eq!(branch, "main"),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
