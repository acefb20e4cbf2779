use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ffindex_core::{Coalescer, DiskIndex, Index, Mode};

use crate::config::ToolConfig;

pub(crate) const USAGE: &str = "usage:
  ffindex-tool info <index>
  ffindex-tool get <index> <mode> <id>...
  ffindex-tool coalesce <source> <target> <delta>";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Info {
        index: PathBuf,
    },
    Get {
        index: PathBuf,
        mode: Mode,
        ids: Vec<String>,
    },
    Coalesce {
        source: PathBuf,
        target: PathBuf,
        delta: f32,
    },
}

impl Command {
    /// Parses the arguments following the program name.
    pub(crate) fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let name = args.next().context("missing command")?;
        let rest: Vec<String> = args.collect();

        match (name.as_str(), rest.as_slice()) {
            ("info", [index]) => Ok(Self::Info {
                index: PathBuf::from(index),
            }),
            ("get", [index, mode, ids @ ..]) if !ids.is_empty() => Ok(Self::Get {
                index: PathBuf::from(index),
                mode: mode
                    .parse()
                    .with_context(|| format!("invalid retrieval mode '{mode}'"))?,
                ids: ids.to_vec(),
            }),
            ("coalesce", [source, target, delta]) => Ok(Self::Coalesce {
                source: PathBuf::from(source),
                target: PathBuf::from(target),
                delta: delta
                    .parse()
                    .with_context(|| format!("delta must be a number, got '{delta}'"))?,
            }),
            _ => anyhow::bail!("invalid arguments for '{name}'\n{USAGE}"),
        }
    }

    pub(crate) fn run(&self, config: &ToolConfig, out: &mut dyn Write) -> Result<()> {
        match self {
            Self::Info { index } => info(index, out),
            Self::Get { index, mode, ids } => get(index, *mode, ids, out),
            Self::Coalesce {
                source,
                target,
                delta,
            } => coalesce(source, target, *delta, config, out),
        }
    }
}

fn open(path: &Path) -> Result<DiskIndex> {
    DiskIndex::open(path).with_context(|| format!("failed to open index '{}'", path.display()))
}

fn info(path: &Path, out: &mut dyn Write) -> Result<()> {
    let index = open(path)?;
    writeln!(out, "path={}", index.path().display())?;
    writeln!(out, "format_version={}", index.format_version())?;
    writeln!(out, "dim={}", index.dim())?;
    writeln!(out, "dtype={}", index.dtype())?;
    writeln!(out, "len={}", index.len())?;
    writeln!(out, "capacity={}", index.capacity())?;
    writeln!(out, "strict_finite={}", index.strict_finite())?;
    writeln!(out, "documents={}", index.identifiers().doc_count())?;
    writeln!(out, "passages={}", index.identifiers().psg_count())?;
    Ok(())
}

fn get(path: &Path, mode: Mode, ids: &[String], out: &mut dyn Write) -> Result<()> {
    let index = open(path)?;
    let requested: Vec<&str> = ids.iter().map(String::as_str).collect();
    let retrieved = index
        .get_vectors(&requested, mode)
        .context("failed to read vectors")?;

    writeln!(out, "mode={mode}")?;
    for (position, id) in ids.iter().enumerate() {
        let vectors = retrieved.group(position);
        let norms: Vec<String> = vectors
            .iter()
            .map(|values| {
                let norm = values.iter().map(|value| value * value).sum::<f32>().sqrt();
                format!("{norm:.4}")
            })
            .collect();
        writeln!(
            out,
            "id={id} vectors={} norms=[{}]",
            vectors.len(),
            norms.join(",")
        )?;
    }
    writeln!(out, "unresolved={}", retrieved.unresolved.join(","))?;
    Ok(())
}

fn coalesce(
    source_path: &Path,
    target_path: &Path,
    delta: f32,
    config: &ToolConfig,
    out: &mut dyn Write,
) -> Result<()> {
    if same_file(source_path, target_path)? {
        anyhow::bail!(
            "target '{}' is the source index; coalescing must write a new file",
            target_path.display()
        );
    }
    let source = open(source_path)?;
    let target_config = config.index_config(source.dim())?;
    let mut target = DiskIndex::create(target_path, &target_config)
        .with_context(|| format!("failed to create index '{}'", target_path.display()))?;

    let mut coalescer = Coalescer::new(delta).with_distance(config.distance.function());
    if let Some(batch_size) = config.batch_size {
        coalescer = coalescer.with_batch_size(batch_size);
    }
    let report = coalescer
        .run(&source, &mut target)
        .context("coalescing failed")?;

    writeln!(out, "distance={}", config.distance)?;
    writeln!(out, "delta={delta}")?;
    writeln!(out, "documents={}", report.documents)?;
    writeln!(out, "input_vectors={}", report.input_vectors)?;
    writeln!(out, "output_vectors={}", report.output_vectors)?;
    writeln!(out, "flushes={}", report.flushes)?;
    if report.input_vectors > 0 {
        let ratio = report.output_vectors as f64 / report.input_vectors as f64;
        writeln!(out, "compression_ratio={ratio:.4}")?;
    }
    Ok(())
}

fn same_file(source: &Path, target: &Path) -> Result<bool> {
    if !source.exists() || !target.exists() {
        return Ok(false);
    }
    let source = source
        .canonicalize()
        .with_context(|| format!("failed to resolve '{}'", source.display()))?;
    let target = target
        .canonicalize()
        .with_context(|| format!("failed to resolve '{}'", target.display()))?;
    Ok(source == target)
}
