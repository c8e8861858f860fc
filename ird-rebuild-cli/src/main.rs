//! ird-rebuild CLI
//!
//! Command-line interface for verifying extracted PS3 dumps against IRD
//! archives and rebuilding the original disc images.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use ird_rebuild_core::{
    RebuildError, disc_listing, load_ird, load_sfo, net, rebuild_iso, sfo::SFO_REL_PATH,
    util::session_tmp_dir, verify_dump,
};

#[derive(Parser)]
#[command(name = "ird-rebuild")]
#[command(about = "Rebuild PS3 disc images from extracted dumps and IRD archives", long_about = None)]
struct Cli {
    /// Extracted dump folder (must contain PS3_GAME/PARAM.SFO)
    folder: PathBuf,

    /// Output image file name (default: <TITLE-ID>.iso)
    #[arg(short, long)]
    filename: Option<String>,

    /// Directory to write the image into (default: current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use a local IRD archive instead of downloading one
    #[arg(short = 'r', long)]
    ird: Option<PathBuf>,

    /// Also download the matching firmware updater into the dump
    #[arg(short, long)]
    pup: bool,

    /// List the disc contents and exit
    #[arg(long)]
    list: bool,

    /// Verify the dump and exit without rebuilding
    #[arg(long)]
    verify_only: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{} {}",
                "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                e,
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), RebuildError> {
    if !cli.folder.is_dir() {
        return Err(RebuildError::invalid_argument(format!(
            "'{}' is not a directory",
            cli.folder.display()
        )));
    }

    let sfo = load_sfo(&cli.folder.join(SFO_REL_PATH))?;
    println!(
        "Title: {} (system {}, disc {}, app {})",
        sfo.title_id.if_supports_color(Stdout, |t| t.bold()),
        sfo.system_version,
        sfo.disc_version,
        sfo.app_version,
    );

    let tmp_dir = session_tmp_dir(sfo.signature)?;

    let ird_path = match &cli.ird {
        Some(path) => path.clone(),
        None => {
            let path = tmp_dir.join("ird.bin");
            net::download_ird(sfo.signature, &path)?;
            path
        }
    };

    if cli.pup {
        let update_dir = cli.folder.join("PS3_UPDATE");
        std::fs::create_dir_all(&update_dir)?;
        net::download_pup(&sfo.system_version, &update_dir.join("PS3UPDAT.PUP"))?;
        println!(
            "{} Firmware updater downloaded",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        );
    }

    let ird = load_ird(&ird_path, &tmp_dir)?;

    if cli.list {
        return run_list(&ird);
    }

    run_verify(&ird, &cli.folder)?;
    if cli.verify_only {
        return Ok(());
    }

    let name = cli
        .filename
        .clone()
        .unwrap_or_else(|| default_iso_name(&ird.title_id));
    let out_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(name);

    println!("Rebuilding {}...", out_path.display());
    rebuild_iso(&ird, &cli.folder, &out_path)?;
    println!(
        "{} Image written to {}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        out_path.display().if_supports_color(Stdout, |t| t.cyan()),
    );
    Ok(())
}

/// Print the disc's directories and files.
fn run_list(ird: &ird_rebuild_core::IrdFile) -> Result<(), RebuildError> {
    let listing = disc_listing(ird)?;

    println!("{}", "Directories:".if_supports_color(Stdout, |t| t.bold()));
    for name in &listing.directories {
        println!("  {name}");
    }
    println!();
    println!("{}", "Files:".if_supports_color(Stdout, |t| t.bold()));
    for (block, path) in &listing.files {
        println!(
            "  {} {}",
            format!("[{block:>8}]").if_supports_color(Stdout, |t| t.dimmed()),
            path,
        );
    }
    Ok(())
}

/// Verify the dump and print the validity report. Verification findings do
/// not stop the rebuild; a rebuilt image from a bad dump is still useful for
/// inspection.
fn run_verify(ird: &ird_rebuild_core::IrdFile, folder: &PathBuf) -> Result<(), RebuildError> {
    println!("Verifying {} files...", ird.file_hashes.len());
    let report = verify_dump(ird, folder)?;

    if report.all_verified {
        println!(
            "{} {}",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
            "< No issues to report >".if_supports_color(Stdout, |t| t.green()),
        );
        return Ok(());
    }

    println!(
        "{}",
        "< Validity Report >".if_supports_color(Stdout, |t| t.yellow()),
    );
    for (path, state) in &report.issues {
        println!(
            "  {} {}: {}",
            "\u{2718}".if_supports_color(Stdout, |t| t.red()),
            path,
            state.describe().if_supports_color(Stdout, |t| t.yellow()),
        );
    }
    Ok(())
}

/// Derive the conventional image name from a nine-character title id
/// (`BLUS30443` becomes `BLUS-30443.iso`).
fn default_iso_name(title_id: &str) -> String {
    if title_id.len() == 9 && title_id.is_char_boundary(4) {
        format!("{}-{}.iso", &title_id[..4], &title_id[4..])
    } else {
        format!("{title_id}.iso")
    }
}
