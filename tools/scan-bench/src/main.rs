//! Scan benchmark CLI for adaptive-ocr.
//!
//! Runs the full pipeline against the Tesseract CLI configured in the
//! settings file / environment.
//!
//! Usage:
//!   scan-bench <image>                       JSON report for one image
//!   scan-bench <image> --mode certificate    Force a label (or auto / generic)
//!   scan-bench <image> --lang eng+deu        Override the language
//!   scan-bench <image> --image               Include the processed image as a data URI
//!   scan-bench <image> --save-settings       Keep --mode / --lang as the new defaults
//!   scan-bench --batch <directory>           Every image in a directory → CSV

use adaptive_ocr::settings::{load_settings, save_settings};
use adaptive_ocr::{ScanMode, ScanReport, ScanSettings, Scanner, SourceImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

struct Args {
    target: Option<String>,
    batch: bool,
    mode: Option<String>,
    lang: Option<String>,
    include_image: bool,
    save: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        target: None,
        batch: false,
        mode: None,
        lang: None,
        include_image: false,
        save: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--batch" => {
                args.batch = true;
                args.target = iter.next();
            }
            "--mode" => args.mode = iter.next(),
            "--lang" => args.lang = iter.next(),
            "--image" => args.include_image = true,
            "--save-settings" => args.save = true,
            _ if args.target.is_none() => args.target = Some(arg),
            other => eprintln!("Ignoring argument: {}", other),
        }
    }
    args
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  scan-bench <image> [--mode M] [--lang L] [--image] [--save-settings]");
    eprintln!("  scan-bench --batch <directory> [--mode M] [--lang L] [--save-settings]");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    adaptive_ocr::bootstrap();
    let args = parse_args();
    let Some(target) = args.target.clone() else {
        usage();
    };

    let mut settings = load_settings();
    if let Some(mode) = &args.mode {
        match mode.parse::<ScanMode>() {
            Ok(m) => settings.mode = m,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }
    if let Some(lang) = &args.lang {
        settings.language = lang.clone();
    }
    if args.save {
        if let Err(e) = save_settings(&settings) {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    if args.batch {
        run_batch(Path::new(&target), settings).await;
    } else {
        run_single(Path::new(&target), settings, args.include_image).await;
    }
}

async fn scan_file(scanner: &Scanner, path: &Path) -> Result<(ScanReport, f64), String> {
    let source = SourceImage::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let start = Instant::now();
    let report = scanner.scan(&source).await.map_err(|e| e.to_string())?;
    Ok((report, start.elapsed().as_micros() as f64 / 1000.0))
}

async fn run_single(path: &Path, settings: ScanSettings, include_image: bool) {
    let scanner = Scanner::with_tesseract(settings);
    let (report, wall_ms) = match scan_file(&scanner, path).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Scan failed: {}", e);
            std::process::exit(1);
        }
    };

    let mut json = match serde_json::to_value(&report) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Failed to serialize report: {}", e);
            std::process::exit(1);
        }
    };
    json["wallMs"] = serde_json::json!(wall_ms);
    if include_image {
        match report.primary_png_data_uri() {
            Ok(uri) => json["primaryImage"] = serde_json::json!(uri),
            Err(e) => log::warn!("[PIPELINE] Could not encode processed image: {}", e),
        }
    }
    match serde_json::to_string_pretty(&json) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to print report: {}", e),
    }
}

fn image_files(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| format!("Failed to read {}: {}", dir.display(), e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    entries.sort();
    Ok(entries)
}

async fn run_batch(dir: &Path, settings: ScanSettings) {
    if !dir.is_dir() {
        eprintln!("Not a directory: {}", dir.display());
        std::process::exit(1);
    }
    let entries = match image_files(dir) {
        Ok(e) if !e.is_empty() => e,
        Ok(_) => {
            eprintln!("No image files found in {}", dir.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let scanner = Scanner::with_tesseract(settings);
    println!("file,label,status,chars,ms");
    let mut latencies: Vec<f64> = Vec::new();
    let mut failures = 0usize;

    for path in &entries {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match scan_file(&scanner, path).await {
            Ok((report, wall_ms)) => {
                println!(
                    "{},{},{:?},{},{:.1}",
                    filename,
                    report.kind.map(|k| k.as_str()).unwrap_or("generic"),
                    report.status,
                    report.text.chars().count(),
                    wall_ms
                );
                latencies.push(wall_ms);
            }
            Err(e) => {
                println!("{},,error,0,", filename);
                eprintln!("  {}", e);
                failures += 1;
            }
        }
        std::io::stdout().flush().ok();
    }

    eprintln!("\n--- Benchmark Summary ---");
    eprintln!("  Images processed: {}", entries.len());
    eprintln!("  Failures: {}", failures);
    if !latencies.is_empty() {
        print_latency_summary(&mut latencies);
    }
}

fn print_latency_summary(latencies: &mut [f64]) {
    latencies.sort_by(|a, b| a.total_cmp(b));
    let median = latencies[latencies.len() / 2];
    let p99_idx = ((latencies.len() as f64 * 0.99).ceil() as usize).min(latencies.len() - 1);
    let p99 = latencies[p99_idx];
    let avg: f64 = latencies.iter().sum::<f64>() / latencies.len() as f64;

    eprintln!("    Median: {:.1}ms", median);
    eprintln!("    Average: {:.1}ms", avg);
    eprintln!("    P99: {:.1}ms", p99);
}
