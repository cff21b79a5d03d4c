mod cli;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use dicom_xml::config::{self, Settings};
use dicom_xml::{decoder, encoder, image, observability, parser, redact, writer};

use cli::{Cli, Commands, ConvertArgs, RedactArgs};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let settings = config::load(cli.config.as_deref()).context("failed to load settings")?;
    let level = cli.log_level.as_deref().unwrap_or(&settings.log_level);
    observability::init_tracing_with_level(level);

    let written = match &cli.command {
        Commands::ToXml(args) => to_xml(args, &settings)?,
        Commands::ToDicom(args) => to_dicom(args, &settings)?,
        Commands::ToImage(args) => to_image(args, &settings)?,
        Commands::FromImage(args) => from_image(args)?,
        Commands::Redact(args) => redact_file(args, &settings)?,
    };

    println!("{}", written.display());
    Ok(())
}

/// `<dir>/<stem><suffix>.<extension>` next to the input.
fn derived_output(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    input.with_file_name(format!("{stem}{suffix}.{extension}"))
}

fn output_path(args: &ConvertArgs, suffix: &str, extension: &str) -> PathBuf {
    args.output
        .clone()
        .unwrap_or_else(|| derived_output(&args.input, suffix, extension))
}

fn to_xml(args: &ConvertArgs, settings: &Settings) -> Result<PathBuf> {
    let output = output_path(args, "", "xml");
    let file = parser::read_file(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let document = encoder::encode_with(&file.dataset, &settings.encode_options());
    fs::write(&output, document.to_xml_with_indent(settings.document.indent))
        .with_context(|| format!("failed to write {}", output.display()))?;

    tracing::info!(records = document.len(), path = %output.display(), "wrote document");
    Ok(output)
}

fn to_dicom(args: &ConvertArgs, settings: &Settings) -> Result<PathBuf> {
    let output = output_path(args, "_reconstructed", "dcm");
    let xml = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let decoded = decoder::decode_with(&xml, &settings.decode_options())
        .with_context(|| format!("failed to decode {}", args.input.display()))?;
    for warning in &decoded.warnings {
        tracing::warn!(%warning, "document element degraded");
    }

    writer::write_file(&output, &decoded.dataset)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(output)
}

fn to_image(args: &ConvertArgs, settings: &Settings) -> Result<PathBuf> {
    let output = output_path(args, "", &settings.image.format.to_ascii_lowercase());
    let file = parser::read_file(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    image::export_image(&file.dataset, &output)
        .with_context(|| format!("failed to export {}", output.display()))?;
    Ok(output)
}

fn from_image(args: &ConvertArgs) -> Result<PathBuf> {
    let output = output_path(args, "", "dcm");
    let dataset = image::dataset_from_image(&args.input)
        .with_context(|| format!("failed to import {}", args.input.display()))?;

    writer::write_file(&output, &dataset)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(output)
}

fn redact_file(args: &RedactArgs, settings: &Settings) -> Result<PathBuf> {
    let output = output_path(&args.files, "_M", "dcm");
    let tags = if args.tags.is_empty() {
        settings.redacted_tags()?
    } else {
        redact::resolve_tags(&args.tags)?
    };

    let file = parser::read_file(&args.files.input)
        .with_context(|| format!("failed to read {}", args.files.input.display()))?;
    let redacted = redact::redact(&file.dataset, &tags);
    tracing::info!(
        removed = file.dataset.len() - redacted.len(),
        "redacted dataset"
    );

    writer::write_file(&output, &redacted)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_output_names() {
        let input = Path::new("/data/scan.dcm");
        assert_eq!(derived_output(input, "", "xml"), PathBuf::from("/data/scan.xml"));
        assert_eq!(
            derived_output(Path::new("scan.xml"), "_reconstructed", "dcm"),
            PathBuf::from("scan_reconstructed.dcm")
        );
        assert_eq!(derived_output(input, "_M", "dcm"), PathBuf::from("/data/scan_M.dcm"));
    }
}
