use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dicom_xml")]
#[command(about = "Convert DICOM files to and from XML documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to ./dicom_xml.toml when present)
    #[arg(long, global = true, env = "DICOM_XML_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overrides the settings file
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode a DICOM file as an XML document
    ToXml(ConvertArgs),
    /// Rebuild a DICOM file from an XML document
    ToDicom(ConvertArgs),
    /// Render the pixel data of a DICOM file as an image
    ToImage(ConvertArgs),
    /// Wrap a greyscale image in a new secondary capture DICOM file
    FromImage(ConvertArgs),
    /// Remove patient identifying elements from a DICOM file
    Redact(RedactArgs),
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Input file
    pub input: PathBuf,
    /// Output file (derived from the input name when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RedactArgs {
    #[command(flatten)]
    pub files: ConvertArgs,
    /// Tag to remove, as a keyword or (GGGG,EEEE); repeatable, replaces the configured list
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,
}
