//! pdfdocx CLI - PDF to DOCX conversion tool

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use pdfdocx::{ConversionReport, ConvertOptions, Converter, TargetFormat};

#[derive(Parser)]
#[command(name = "pdfdocx")]
#[command(version)]
#[command(about = "Convert PDF documents to editable DOCX", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a PDF to DOCX or plain text
    Convert {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (input name with the format's extension if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (inferred from the output extension if not specified)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Convert with the standard engine only
        #[arg(long)]
        no_race: bool,

        /// Print the conversion report as JSON
        #[arg(long)]
        report: bool,
    },

    /// Show the inferred layout as JSON
    Analyze {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Convert several PDFs in parallel
    Batch {
        /// Input PDF files
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short = 'd', long, value_name = "DIR")]
        dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "docx")]
        format: Format,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Office Open XML document
    Docx,
    /// Plain text
    Txt,
}

impl From<Format> for TargetFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Docx => TargetFormat::Docx,
            Format::Txt => TargetFormat::Txt,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Convert {
            input,
            output,
            format,
            no_race,
            report,
        }) => cmd_convert(&input, output.as_deref(), format, no_race, report),
        Some(Commands::Analyze { input, compact }) => cmd_analyze(&input, compact),
        Some(Commands::Batch {
            inputs,
            dir,
            format,
        }) => cmd_batch(&inputs, &dir, format),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: convert if input is provided
            if let Some(input) = cli.input {
                cmd_convert(&input, cli.output.as_deref(), None, false, false)
            } else {
                println!("{}", "Usage: pdfdocx <FILE> [OUTPUT]".yellow());
                println!("       pdfdocx --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Target from the flag, else from the output extension, else DOCX.
fn resolve_target(format: Option<Format>, output: Option<&Path>) -> TargetFormat {
    format
        .map(TargetFormat::from)
        .or_else(|| output.and_then(TargetFormat::from_path))
        .unwrap_or_default()
}

fn default_output(input: &Path, dir: Option<&Path>, target: TargetFormat) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let name = format!("{}.{}", stem, target.extension());
    match dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    format: Option<Format>,
    no_race: bool,
    print_report: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = resolve_target(format, output);
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(input, None, target));

    let mut options = ConvertOptions::new().with_target(target);
    if no_race {
        options = options.without_race();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Converting {}...", input.display()));

    let report = Converter::new()
        .with_options(options)
        .convert_file(input, &output);
    pb.finish_and_clear();
    let report = report?;

    if print_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &ConversionReport) {
    println!("{} {}", "Saved to".green(), report.output.display());
    println!("  {} {} pages", "├─".dimmed(), report.page_count);
    if let Some(profile) = &report.profile {
        println!(
            "  {} {} ({:?})",
            "├─".dimmed(),
            profile.doc_type.as_str(),
            profile.complexity
        );
    }
    if let Some(engine) = &report.engine {
        println!("  {} engine {}", "├─".dimmed(), engine);
    }
    println!(
        "  {} {} diagnostics",
        "└─".dimmed(),
        report.diagnostics.len()
    );
    for diagnostic in &report.diagnostics {
        println!("     {} {}", "!".yellow(), diagnostic);
    }
}

fn cmd_analyze(input: &Path, compact: bool) -> Result<(), Box<dyn std::error::Error>> {
    let analysis = Converter::new().analyze_file(input)?;

    let json = if compact {
        serde_json::to_string(&analysis)?
    } else {
        serde_json::to_string_pretty(&analysis)?
    };
    println!("{}", json);

    Ok(())
}

fn cmd_batch(inputs: &[PathBuf], dir: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)?;
    let target = TargetFormat::from(format);

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let results: Vec<(PathBuf, Result<ConversionReport, String>)> = inputs
        .par_iter()
        .map(|input| {
            let output = default_output(input, Some(dir), target);
            let result = Converter::new()
                .with_options(ConvertOptions::new().with_target(target))
                .convert_file(input, &output)
                .map_err(|e| e.to_string());
            pb.inc(1);
            (input.clone(), result)
        })
        .collect();
    pb.finish_and_clear();

    let mut failed = 0;
    for (input, result) in &results {
        match result {
            Ok(report) => println!(
                "{} {} -> {}",
                "Converted".green(),
                input.display(),
                report.output.display()
            ),
            Err(e) => {
                failed += 1;
                println!("{} {}: {}", "Failed".red(), input.display(), e);
            }
        }
    }

    println!(
        "\n{} {} converted, {} failed",
        "Done!".green().bold(),
        results.len() - failed,
        failed
    );
    if failed > 0 {
        return Err(format!("{} of {} conversions failed", failed, results.len()).into());
    }
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdfdocx".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF to DOCX structural reconstruction");
    println!();
    println!("License: MIT");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target(Some(Format::Txt), None), TargetFormat::Txt);
        assert_eq!(
            resolve_target(None, Some(Path::new("out/notes.txt"))),
            TargetFormat::Txt
        );
        assert_eq!(
            resolve_target(Some(Format::Docx), Some(Path::new("notes.txt"))),
            TargetFormat::Docx
        );
        assert_eq!(resolve_target(None, None), TargetFormat::Docx);
    }

    #[test]
    fn test_default_output() {
        let input = Path::new("docs/cv.pdf");
        assert_eq!(
            default_output(input, None, TargetFormat::Docx),
            PathBuf::from("docs/cv.docx")
        );
        assert_eq!(
            default_output(input, Some(Path::new("out")), TargetFormat::Txt),
            PathBuf::from("out/cv.txt")
        );
    }
}
