use anyhow::Result;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use facesort::config::Config;
use facesort::faces::OnnxFaceEngine;
use facesort::logging;
use facesort::sorter::{SortProgress, Sorter};

#[derive(Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    batch_size: Option<usize>,
    tolerance: Option<f32>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("facesort {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                parsed.config_path = Some(PathBuf::from(require_value(&args, i)));
                i += 1;
            }
            "--input" | "-i" => {
                parsed.input_dir = Some(PathBuf::from(require_value(&args, i)));
                i += 1;
            }
            "--data" | "-d" => {
                parsed.data_dir = Some(PathBuf::from(require_value(&args, i)));
                i += 1;
            }
            "--batch-size" | "-b" => {
                let value = require_value(&args, i);
                match value.parse() {
                    Ok(n) => parsed.batch_size = Some(n),
                    Err(_) => {
                        eprintln!("Error: --batch-size expects a positive integer, got {value}");
                        std::process::exit(1);
                    }
                }
                i += 1;
            }
            "--tolerance" | "-t" => {
                let value = require_value(&args, i);
                match value.parse() {
                    Ok(t) => parsed.tolerance = Some(t),
                    Err(_) => {
                        eprintln!("Error: --tolerance expects a number, got {value}");
                        std::process::exit(1);
                    }
                }
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn require_value(args: &[String], i: usize) -> String {
    if i + 1 < args.len() {
        args[i + 1].clone()
    } else {
        eprintln!("Error: {} requires an argument", args[i]);
        std::process::exit(1);
    }
}

fn print_help() {
    println!(
        r#"facesort - sort a photo dump by face similarity against a reference set

USAGE:
    facesort [OPTIONS]

OPTIONS:
    --input, -i DIR      Reference face images to match against (default: data/faces)
    --data, -d DIR       Candidate images to sort (default: data/sort)
    --batch-size, -b N   Images per detection batch (default: 32)
    --tolerance, -t T    Maximum match distance in [0, 1]; lower is stricter (default: 0.6)
    --config, -c PATH    Path to config file
    --version, -V        Show version
    --help, -h           Show this help message

ENVIRONMENT:
    FACESORT_LOG         Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/facesort/config.toml

Matched photos move to DATA/sorted/matches/, photos that failed processing
move to DATA/sorted/errors/, everything else stays in place."#
    );
}

fn print_progress(progress: SortProgress) {
    match progress {
        SortProgress::Started {
            total_files,
            total_batches,
        } => {
            println!("[ OK ] Filtering {total_files} files in {total_batches} batches... this could take a while!");
        }
        SortProgress::Processing { .. } => {}
        SortProgress::Matched {
            filename,
            destination,
            distance,
        } => {
            println!(
                "[ OK ] Moving \"{filename}\" to \"{}\" (distance {distance:.3})",
                destination.display()
            );
        }
        SortProgress::Quarantined { filename, reason } => {
            println!("[ NON-FATAL ERROR ] \"{filename}\": {reason}. Moved to error folder.");
        }
        SortProgress::Completed { report } => {
            println!(
                "[ OK ] Done: {} matched, {} kept, {} errored across {} batches",
                report.matched, report.kept, report.errored, report.batches
            );
        }
    }
}

fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    // Load configuration, then layer CLI overrides on top
    let mut config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(input_dir) = args.input_dir {
        config.input_dir = input_dir;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(tolerance) = args.tolerance {
        config.tolerance = tolerance;
    }
    config.validate()?;

    println!("[ OK ] Loading source faces");
    let mut engine = OnnxFaceEngine::load(&config.models.dir)?;

    let (tx, rx) = mpsc::channel();
    let printer = thread::spawn(move || {
        for progress in rx {
            print_progress(progress);
        }
    });

    let result = Sorter::new(config).run(&mut engine, Some(tx));

    // The sender is dropped once the run returns, ending the printer loop.
    let _ = printer.join();

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("[ ERROR ] {e}");
            std::process::exit(1);
        }
    }
}
