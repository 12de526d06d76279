use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use inkstream::compositor::{self, Format, RenderOpts};
use inkstream::gfx::output::Output;
use inkstream::pdf::file::PdfFile;

/// Render one page of a PDF file to PNG, EPS, PDF or SVG.
#[derive(Parser)]
#[command(name = "inkrender", version, about)]
struct Args {
    /// Produce a PNG bitmap (the default)
    #[arg(long, group = "format")]
    png: bool,
    /// Produce Encapsulated PostScript
    #[arg(long, group = "format")]
    eps: bool,
    /// Produce PDF
    #[arg(long, group = "format")]
    pdf: bool,
    /// Produce SVG
    #[arg(long, group = "format")]
    svg: bool,
    /// Page to render, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Resolution in dots per inch (PNG only)
    #[arg(long, default_value_t = 72.0)]
    resolution: f64,
    /// Curve flattening tolerance
    #[arg(long, default_value_t = 0.1)]
    tolerance: f64,
    /// Render on a transparent background (PNG only)
    #[arg(long)]
    transparent: bool,
    /// Use the page's media box instead of the tight bounding box
    #[arg(long)]
    nocrop: bool,
    /// Input PDF file
    infile: PathBuf,
    /// Output file
    outfile: PathBuf,
}

fn run(args: &Args) -> inkstream::Result<()> {
    let format = if args.eps {
        Format::Eps
    } else if args.pdf {
        Format::Pdf
    } else if args.svg {
        Format::Svg
    } else {
        Format::Png
    };
    let file = PdfFile::parse_file(&args.infile)?;
    let pno = args.page.saturating_sub(1);
    let zoom = args.resolution / 72.0;
    let opts = RenderOpts {
        tolerance: args.tolerance,
        transparent: args.transparent,
        no_crop: args.nocrop,
    };
    let out = Output::to_path(&args.outfile)?;
    compositor::save_pdf_page(format, out, &file, pno, zoom, &opts)
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("inkrender: {err}");
            ExitCode::FAILURE
        }
    }
}
