//! End-to-end run: resolve paths, select tiles, write the extract, then the
//! optional traffic extract.

use std::fs;
use std::path::{Path, PathBuf};

use butterfly_common::{Error, Result};
use tracing::info;

use crate::archive::{
    build_archive, check_overwrite_permission, ArchiveSummary, BuildOptions, OverwriteBehavior,
    ProgressCallback,
};
use crate::config::MjolnirConfig;
use crate::diagnostics::Diagnostics;
use crate::filter::Selection;
use crate::source::TileResolver;
use crate::traffic::build_traffic_archive;

#[derive(Clone, Default)]
pub struct PipelineOptions {
    /// Tile locations, already merged with command-line overrides
    pub config: MjolnirConfig,
    /// Extract to write when the source is an existing extract
    pub output: Option<PathBuf>,
    pub bbox: Option<String>,
    pub polygons: Option<PathBuf>,
    pub with_traffic: bool,
    pub overwrite: OverwriteBehavior,
    pub progress: Option<ProgressCallback>,
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    /// `None` when only the traffic extract was rebuilt
    pub extract: Option<ArchiveSummary>,
    pub traffic: Option<ArchiveSummary>,
}

/// Files a run reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
struct Plan {
    source: PathBuf,
    output: Option<PathBuf>,
    traffic: Option<PathBuf>,
}

/// Run the pipeline with log output scoped to `diagnostics`
pub fn run(options: &PipelineOptions, diagnostics: &Diagnostics) -> Result<PipelineReport> {
    diagnostics.scope(|| run_stages(options))
}

fn run_stages(options: &PipelineOptions) -> Result<PipelineReport> {
    let selection = Selection::from_args(options.bbox.as_deref(), options.polygons.as_deref())?;
    let plan = resolve_plan(options, &selection)?;
    info!(
        source = %plan.source.display(),
        output = ?plan.output,
        traffic = ?plan.traffic,
        "planned run"
    );

    for output in plan.output.iter().chain(&plan.traffic) {
        check_overwrite_permission(output, options.overwrite)?;
    }

    let build = BuildOptions {
        overwrite: options.overwrite,
        progress: options.progress.clone(),
    };
    let mut report = PipelineReport::default();

    if let Some(output) = &plan.output {
        // The resolver, and any source archive handle it holds, ends here
        let summary = {
            let mut resolver = TileResolver::open(&plan.source)?;
            selection.apply(&mut resolver)?;
            build_archive(&resolver, output, &build)?
        };
        report.extract = Some(summary);
    }

    if let Some(traffic) = &plan.traffic {
        let extract = plan.output.as_deref().unwrap_or(&plan.source);
        let summary = build_traffic_archive(extract, traffic, &build)
            .map_err(|e| Error::Traffic(Box::new(e)))?;
        report.traffic = Some(summary);
    }

    Ok(report)
}

fn resolve_plan(options: &PipelineOptions, selection: &Selection) -> Result<Plan> {
    let config = &options.config;
    let traffic = if options.with_traffic {
        Some(config.traffic_extract.clone().ok_or_else(|| {
            Error::validation("--with-traffic needs traffic_extract in the config or --traffic-extract")
        })?)
    } else {
        None
    };

    let (source, output) = match (&config.tile_dir, &config.tile_extract) {
        (Some(dir), _) if dir.is_dir() => {
            let output = options
                .output
                .clone()
                .or_else(|| config.tile_extract.clone())
                .ok_or_else(|| {
                    Error::validation("no output: set tile_extract in the config or --output")
                })?;
            (dir.clone(), Some(output))
        }
        (_, Some(extract)) if extract.is_file() => {
            if options.output.is_none() {
                if !options.with_traffic {
                    return Err(Error::validation(format!(
                        "tile source {} is already an extract: pass --output to repack it or --with-traffic",
                        extract.display()
                    )));
                }
                if !selection.is_all() {
                    return Err(Error::validation(
                        "--bbox/--polygons need --output when the source is an extract",
                    ));
                }
            }
            (extract.clone(), options.output.clone())
        }
        _ => {
            return Err(Error::validation(format!(
                "no tile source: tile_dir {} is not a directory and tile_extract {} is not a file",
                display_opt(config.tile_dir.as_deref()),
                display_opt(config.tile_extract.as_deref())
            )))
        }
    };

    if let Some(output) = &output {
        if same_file(output, &source) {
            return Err(Error::validation(format!(
                "output {} is the tile source {}",
                output.display(),
                source.display()
            )));
        }
    }
    if let Some(traffic) = &traffic {
        let clobbers_output = output.as_deref().is_some_and(|o| same_file(traffic, o));
        if same_file(traffic, &source) || clobbers_output {
            return Err(Error::validation(format!(
                "traffic extract {} would overwrite another input or output",
                traffic.display()
            )));
        }
    }

    Ok(Plan {
        source,
        output,
        traffic,
    })
}

/// Absolute form of `path` with `..` and symlinks resolved. A file that does
/// not exist yet is resolved through its parent directory.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(path) = fs::canonicalize(path) {
        return path;
    }
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    fs::canonicalize(parent)
        .map(|dir| dir.join(name))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// True when both spellings name the same file
fn same_file(a: &Path, b: &Path) -> bool {
    a == b || resolved(a) == resolved(b)
}

fn display_opt(path: Option<&Path>) -> String {
    path.map_or_else(|| "(unset)".to_string(), |p| p.display().to_string())
}
