// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blattwerk — PDF toolbox
//
// Command-line front-end. Reads local files into a `Request`, hands it to the
// engine's dispatcher and writes the delivered document to disk. Exit status
// is 0 on success, 1 when the engine reports an error and 2 for usage errors.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::human_errors::humanize_error;
use blattwerk_core::{AppConfig, Delivery, InputBlob, MediaType, Request};
use blattwerk_engine::Dispatcher;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// MIME type sent for files whose extension Blattwerk does not recognise.
const UNKNOWN_MIME: &str = "application/octet-stream";

#[derive(Parser, Debug)]
#[command(name = "blattwerk", version, about = "Blattwerk: merge, split, convert and secure PDFs")]
struct Cli {
    /// Where to write the result. Defaults to the operation's suggested file name.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// JSON configuration file. Missing files fall back to the defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Concatenate PDFs in the order given.
    Merge {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Split a PDF into one document per page, bundled as a zip.
    Split { input: PathBuf },
    /// Rewrite a PDF with compressed streams.
    Compress { input: PathBuf },
    /// Rasterise every page to PNG, bundled as a zip.
    #[command(name = "pdf2img")]
    PdfToImg { input: PathBuf },
    /// Lay images out as PDF pages.
    #[command(name = "img2pdf")]
    ImgToPdf {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Convert a PDF's text to a Word document.
    #[command(name = "pdf2word")]
    PdfToWord { input: PathBuf },
    /// Rotate every page by a multiple of 90 degrees.
    Rotate {
        input: PathBuf,
        #[arg(allow_negative_numbers = true)]
        angle: String,
    },
    /// Extract the text layer as plain text.
    #[command(name = "extractText")]
    ExtractText { input: PathBuf },
    /// Stamp the first page of STAMP onto every page of INPUT.
    Watermark { input: PathBuf, stamp: PathBuf },
    /// Encrypt a PDF with a password.
    Protect { input: PathBuf, password: String },
    /// Remove the password from an encrypted PDF.
    Unlock { input: PathBuf, password: String },
    /// Rebuild a damaged PDF.
    Repair { input: PathBuf },
}

impl Command {
    /// Operation name, input files and parameters for the engine.
    fn into_parts(self) -> (&'static str, Vec<PathBuf>, Vec<(&'static str, String)>) {
        match self {
            Self::Merge { inputs } => ("merge", inputs, vec![]),
            Self::Split { input } => ("split", vec![input], vec![]),
            Self::Compress { input } => ("compress", vec![input], vec![]),
            Self::PdfToImg { input } => ("pdf2img", vec![input], vec![]),
            Self::ImgToPdf { inputs } => ("img2pdf", inputs, vec![]),
            Self::PdfToWord { input } => ("pdf2word", vec![input], vec![]),
            Self::Rotate { input, angle } => ("rotate", vec![input], vec![("angle", angle)]),
            Self::ExtractText { input } => ("extractText", vec![input], vec![]),
            Self::Watermark { input, stamp } => ("watermark", vec![input, stamp], vec![]),
            Self::Protect { input, password } => {
                ("protect", vec![input], vec![("password", password)])
            }
            Self::Unlock { input, password } => {
                ("unlock", vec![input], vec![("password", password)])
            }
            Self::Repair { input } => ("repair", vec![input], vec![]),
        }
    }
}

/// MIME type declared for a local file, judged by its extension.
fn declared_mime(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(MediaType::from_extension)
        .map_or(UNKNOWN_MIME, |media_type| media_type.mime_type())
}

/// Read every input file and assemble the request.
fn build_request(command: Command) -> Result<Request> {
    let (operation, paths, params) = command.into_parts();
    let mut request = Request::new(operation);
    for path in paths {
        let bytes = std::fs::read(&path).map_err(|err| {
            BlattwerkError::validation(format!("cannot read '{}': {err}", path.display()))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        request.inputs.push(InputBlob {
            name,
            media_type: declared_mime(&path).to_string(),
            bytes,
        });
    }
    for (name, value) in params {
        request = request.with_param(name, value);
    }
    Ok(request)
}

fn init_logging(config: &AppConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, config: AppConfig) -> Result<PathBuf> {
    let request = build_request(cli.command)?;
    let dispatcher = Dispatcher::new(config)?;
    let Delivery {
        bytes,
        suggested_filename,
        ..
    } = dispatcher.dispatch_with_timeout(request).await?;

    let target = cli.out.unwrap_or_else(|| PathBuf::from(suggested_filename));
    std::fs::write(&target, &bytes).map_err(|err| {
        BlattwerkError::non_fatal(format!("cannot write '{}': {err}", target.display()))
    })?;
    Ok(target)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(AppConfig::load).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            eprintln!("blattwerk: cannot load configuration: {err}");
            return ExitCode::from(2);
        }
    };
    init_logging(&config);

    match run(cli, config).await {
        Ok(target) => {
            info!(path = %target.display(), "result written");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(kind = err.kind().as_str(), "request failed: {err}");
            let body = humanize_error(&err);
            eprintln!("blattwerk: {}", body.message);
            if body.retryable {
                eprintln!("blattwerk: this error is temporary; try again.");
            }
            ExitCode::FAILURE
        }
    }
}
