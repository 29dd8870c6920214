//! CLI argument definitions using clap derive

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::core::config::{Config, EngineSelection};

/// Two-letter single-dash flags and the long options they stand for
const LEGACY_FLAGS: [(&str, &str); 6] = [
    ("-vj", "--validate-stream"),
    ("-ve", "--validate-document"),
    ("-vx", "--validate-xml"),
    ("-pj", "--passthrough-stream"),
    ("-pe", "--passthrough-document"),
    ("-nv", "--no-version"),
];

#[derive(Parser, Debug)]
#[command(name = "docval")]
#[command(version, about = "Validate JSON documents against a JSON Schema and XML documents against a DTD")]
#[command(long_about = "Validate a batch of JSON documents against a JSON Schema and XML documents \
against a DTD. Every enabled engine runs on every file; the exit code summarizes the whole batch.")]
#[command(after_help = "Exit codes:\n  0  success\n  1  syntax error (passthrough)\n  \
2  validation error\n  3  internal error\n  4  I/O error\n  5  usage error")]
pub struct Cli {
    /// Validate JSON with the streaming schema engine [-vj]
    #[arg(long)]
    pub validate_stream: bool,

    /// Validate JSON with the whole-document schema engine [-ve]
    #[arg(long)]
    pub validate_document: bool,

    /// Check XML well-formedness, and validity when a DOCTYPE references the DTD [-vx]
    #[arg(long)]
    pub validate_xml: bool,

    /// Parse JSON with the streaming parser only [-pj]
    #[arg(long)]
    pub passthrough_stream: bool,

    /// Parse JSON with the document parser only [-pe]
    #[arg(long)]
    pub passthrough_document: bool,

    /// JSON Schema file (required with -vj or -ve)
    #[arg(short = 's', long, env = "DOCVAL_SCHEMA", value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// DTD applied to documents whose DOCTYPE names a file with the same base name
    #[arg(short = 'd', long, env = "DOCVAL_DTD", value_name = "FILE")]
    pub dtd: Option<PathBuf>,

    /// Suppress problem detail and progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not print the version banner [-nv]
    #[arg(long)]
    pub no_version: bool,

    /// Files to validate, in order
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Parse arguments, accepting the two-letter single-dash flags
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_args(args))
    }
}

/// Rewrite two-letter flags to their long forms. Everything after `--` is
/// left alone.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut escaped = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if escaped {
                return arg;
            }
            if arg == "--" {
                escaped = true;
                return arg;
            }
            LEGACY_FLAGS
                .iter()
                .find(|(short, _)| arg == *short)
                .map(|(_, long)| OsString::from(*long))
                .unwrap_or(arg)
        })
        .collect()
}

fn non_empty(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            selection: EngineSelection {
                stream_schema: cli.validate_stream,
                document_schema: cli.validate_document,
                xml_dtd: cli.validate_xml,
                stream_passthrough: cli.passthrough_stream,
                document_passthrough: cli.passthrough_document,
            },
            schema: non_empty(cli.schema),
            dtd: non_empty(cli.dtd),
            quiet: cli.quiet,
            show_version: !cli.no_version && !cli.quiet,
            files: cli.files,
        }
    }
}
