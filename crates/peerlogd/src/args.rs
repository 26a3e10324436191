//! Command-line flags. Each one overrides the matching config field.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use peerlog_core::config::PeerlogConfig;

#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub table_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub extract_only: bool,
    pub from_beginning: bool,
    pub help: bool,
}

impl Args {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut parsed = Args::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .with_context(|| format!("{flag} requires a value"))
            };
            match arg.as_str() {
                "-c" | "--config" => parsed.config = Some(value(arg)?.into()),
                "-l" | "--log" => parsed.log_path = Some(value(arg)?.into()),
                "-i" | "--input" => parsed.table_path = Some(value(arg)?.into()),
                "-d" | "--dir" => parsed.output_dir = Some(value(arg)?.into()),
                "--workers" => {
                    let n = value(arg)?.parse().context("--workers must be a number")?;
                    parsed.workers = Some(n);
                }
                "--extract-only" => parsed.extract_only = true,
                "--from-beginning" => parsed.from_beginning = true,
                "-h" | "--help" => parsed.help = true,
                other => bail!("unknown argument: {other}"),
            }
        }
        Ok(parsed)
    }

    pub fn apply(&self, config: &mut PeerlogConfig) {
        if let Some(p) = &self.log_path {
            config.source.log_path = Some(p.clone());
        }
        if let Some(p) = &self.table_path {
            config.content.table_path = Some(p.clone());
        }
        if let Some(p) = &self.output_dir {
            config.output.dir = p.clone();
        }
        if let Some(n) = self.workers {
            config.pipeline.workers = n;
        }
        if self.extract_only {
            config.resolver.enabled = false;
        }
        if self.from_beginning {
            config.source.from_beginning = true;
        }
    }
}

pub fn print_usage() {
    println!("Usage: peerlogd -l <node log> -i <content table> [options]");
    println!();
    println!("Options:");
    println!("  -l, --log <path>     Node log file to follow");
    println!("  -i, --input <path>   JSON content table (CID -> filename/filetype)");
    println!("  -d, --dir <path>     Output directory for peer records (default: ./data)");
    println!("  -c, --config <path>  Config file (must exist; default: $PEERLOG_CONFIG or");
    println!("                       ~/.config/peerlog/config.toml, created if missing)");
    println!("      --workers <n>    Resolve/store workers (default: 1, strictly sequential)");
    println!("      --extract-only   Log tracked wants without resolving or storing");
    println!("      --from-beginning Process lines already in the log before following");
    println!("  -h, --help           Show this help");
}
