use anyhow::{anyhow, bail, Context, Result};
use arrow::util::pretty::pretty_format_batches;
use glob::glob;
use rhessys_import::{logging::init_logging, Delimiter, ImportConfig, TableBuilder};
use std::{env, path::PathBuf, process::exit, time::Instant};
use tracing::{error, info};

const USAGE: &str =
    "usage: rhessys-import [--whitespace] [--config FILE] [--rows N] <FILE|GLOB>...";
const DEFAULT_PREVIEW_ROWS: usize = 10;

struct Args {
    config: ImportConfig,
    preview_rows: usize,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> Result<Args> {
    let mut config_path: Option<PathBuf> = None;
    let mut whitespace = false;
    let mut preview_rows = DEFAULT_PREVIEW_ROWS;
    let mut patterns = Vec::new();

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--whitespace" => whitespace = true,
            "--config" => {
                let path = argv.next().ok_or_else(|| anyhow!("--config needs a file"))?;
                config_path = Some(PathBuf::from(path));
            }
            "--rows" => {
                let n = argv.next().ok_or_else(|| anyhow!("--rows needs a number"))?;
                preview_rows = n
                    .parse()
                    .with_context(|| format!("--rows expects a number, got `{}`", n))?;
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                exit(0);
            }
            flag if flag.starts_with("--") => bail!("unknown flag `{}`\n{}", flag, USAGE),
            _ => patterns.push(arg),
        }
    }

    let mut config = match config_path {
        Some(path) => ImportConfig::from_yaml_file(&path)?,
        None => ImportConfig::default(),
    };
    if whitespace {
        config.options.delimiter = Delimiter::Whitespace;
    }
    for pattern in patterns {
        config.files.extend(expand_input(&pattern)?);
    }
    if config.files.is_empty() {
        bail!("no input files\n{}", USAGE);
    }

    Ok(Args {
        config,
        preview_rows,
    })
}

/// Plain paths pass through untouched so a missing file is reported by the
/// loader; glob patterns expand to their sorted matches.
fn expand_input(pattern: &str) -> Result<Vec<PathBuf>> {
    if !pattern.contains(['*', '?', '[']) {
        return Ok(vec![PathBuf::from(pattern)]);
    }
    let mut paths: Vec<PathBuf> = glob(pattern)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .collect();
    if paths.is_empty() {
        bail!("No files match '{}'", pattern);
    }
    paths.sort();
    Ok(paths)
}

fn run(args: Args) -> Result<()> {
    let start = Instant::now();
    let builder = TableBuilder::new(args.config.options.clone());
    let table = builder.build(&args.config.files)?;
    info!(elapsed = ?start.elapsed(), "built table");

    println!("=== Schema ===");
    for field in table.schema().fields() {
        println!("- {:<30} | {}", field.name(), field.data_type());
    }
    println!();

    let shown = args.preview_rows.min(table.num_rows());
    println!("=== First {} of {} rows ===", shown, table.num_rows());
    println!("{}", pretty_format_batches(&[table.slice(0, shown)])?);
    Ok(())
}

fn main() {
    init_logging();

    let result = parse_args(env::args().skip(1)).and_then(run);
    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn flags_and_paths() -> Result<()> {
        let parsed = parse_args(args(&["--whitespace", "--rows", "3", "a.daily", "b.daily"]))?;
        assert_eq!(parsed.preview_rows, 3);
        assert_eq!(parsed.config.options.delimiter, Delimiter::Whitespace);
        assert_eq!(
            parsed.config.files,
            vec![PathBuf::from("a.daily"), PathBuf::from("b.daily")]
        );
        Ok(())
    }

    #[test]
    fn no_inputs_is_an_error() {
        assert!(parse_args(args(&["--whitespace"])).is_err());
        assert!(parse_args(args(&["--bogus", "a.csv"])).is_err());
    }

    #[test]
    fn glob_patterns_expand_sorted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b.csv", "a.csv", "c.txt"] {
            std::fs::write(dir.path().join(name), "x\n1\n")?;
        }
        let pattern = format!("{}/*.csv", dir.path().display());
        let paths = expand_input(&pattern)?;
        assert_eq!(
            paths,
            vec![dir.path().join("a.csv"), dir.path().join("b.csv")]
        );
        assert!(expand_input(&format!("{}/*.parquet", dir.path().display())).is_err());
        Ok(())
    }
}
