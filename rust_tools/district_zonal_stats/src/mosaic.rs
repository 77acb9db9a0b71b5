use crate::error::{Result, ZonalStatsError};
use log::{debug, info};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const BUILD_VRT: &str = "gdalbuildvrt";
pub const TRANSLATE: &str = "gdal_translate";

/// Creation options for the physical mosaic
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicOptions {
    pub compression: String,
    /// `ALL_CPUS` or a thread count
    pub num_threads: String,
    pub tiled: bool,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self {
            compression: "LZW".to_string(),
            num_threads: "ALL_CPUS".to_string(),
            tiled: true,
        }
    }
}

/// Intermediate files produced for one district. They are left on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicArtifacts {
    pub vrt_path: PathBuf,
    pub tif_path: PathBuf,
}

impl MosaicArtifacts {
    pub fn for_district(temp_dir: &Path, code: i32) -> Self {
        Self {
            vrt_path: temp_dir.join(format!("district_{}_merged.vrt", code)),
            tif_path: temp_dir.join(format!("district_{}_mosaiced.tif", code)),
        }
    }
}

/// Validate compression type
pub fn validate_compression(compression: &str) -> Result<()> {
    let valid_types = ["DEFLATE", "LZW", "ZSTD", "NONE"];
    if !valid_types.contains(&compression) {
        return Err(ZonalStatsError::InvalidCompression(compression.to_string()));
    }
    Ok(())
}

/// Validate the translator thread setting (`ALL_CPUS` or a positive count)
pub fn validate_num_threads(num_threads: &str) -> Result<()> {
    if num_threads == "ALL_CPUS" {
        return Ok(());
    }
    match num_threads.parse::<usize>() {
        Ok(n) if n > 0 => Ok(()),
        _ => Err(ZonalStatsError::InvalidInput(format!(
            "NUM_THREADS must be ALL_CPUS or a positive integer, got '{}'",
            num_threads
        ))),
    }
}

/// `-co` creation options passed to gdal_translate
pub fn creation_options(options: &MosaicOptions) -> Vec<String> {
    let mut opts = vec![
        format!("COMPRESS={}", options.compression),
        format!("NUM_THREADS={}", options.num_threads),
    ];
    if options.tiled {
        opts.push("TILED=YES".to_string());
    }
    opts
}

pub fn build_vrt_args(vrt_path: &Path, tiles: &[PathBuf]) -> Vec<OsString> {
    let mut args = vec![vrt_path.as_os_str().to_owned()];
    args.extend(tiles.iter().map(|t| t.as_os_str().to_owned()));
    args
}

pub fn translate_args(options: &MosaicOptions, vrt_path: &Path, tif_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-of".into(), "GTiff".into()];
    for opt in creation_options(options) {
        args.push("-co".into());
        args.push(opt.into());
    }
    args.push(vrt_path.as_os_str().to_owned());
    args.push(tif_path.as_os_str().to_owned());
    args
}

/// Build the VRT index over `tiles`, then materialize it as a GeoTIFF.
pub fn build_mosaic(
    tiles: &[PathBuf],
    artifacts: &MosaicArtifacts,
    options: &MosaicOptions,
) -> Result<()> {
    if tiles.is_empty() {
        return Err(ZonalStatsError::InvalidInput(
            "cannot build a mosaic from an empty tile list".to_string(),
        ));
    }
    validate_compression(&options.compression)?;
    validate_num_threads(&options.num_threads)?;

    for dir in [&artifacts.vrt_path, &artifacts.tif_path]
        .iter()
        .filter_map(|p| p.parent())
    {
        std::fs::create_dir_all(dir)?;
    }

    info!(
        "Building VRT from {} tiles: {}",
        tiles.len(),
        artifacts.vrt_path.display()
    );
    run_tool(BUILD_VRT, &build_vrt_args(&artifacts.vrt_path, tiles))?;

    info!("Translating to GeoTIFF: {}", artifacts.tif_path.display());
    run_tool(
        TRANSLATE,
        &translate_args(options, &artifacts.vrt_path, &artifacts.tif_path),
    )?;

    info!("Mosaic created successfully");
    Ok(())
}

/// Run an external tool to completion, classifying the failure.
fn run_tool(tool: &str, args: &[OsString]) -> Result<()> {
    debug!("Running {} {:?}", tool, args);

    let output = Command::new(tool).args(args).output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ZonalStatsError::ToolMissing(tool.to_string())
        } else {
            ZonalStatsError::Io(e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ZonalStatsError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    debug!("{} finished: {}", tool, String::from_utf8_lossy(&output.stdout).trim());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_compression_valid() {
        assert!(validate_compression("DEFLATE").is_ok());
        assert!(validate_compression("LZW").is_ok());
        assert!(validate_compression("ZSTD").is_ok());
        assert!(validate_compression("NONE").is_ok());
    }

    #[test]
    fn test_validate_compression_invalid() {
        assert!(validate_compression("INVALID").is_err());
        assert!(validate_compression("lzw").is_err());
    }

    #[test]
    fn test_validate_num_threads() {
        assert!(validate_num_threads("ALL_CPUS").is_ok());
        assert!(validate_num_threads("8").is_ok());
        assert!(validate_num_threads("0").is_err());
        assert!(validate_num_threads("many").is_err());
    }

    #[test]
    fn test_default_creation_options() {
        let opts = creation_options(&MosaicOptions::default());
        assert_eq!(
            opts,
            vec!["COMPRESS=LZW", "NUM_THREADS=ALL_CPUS", "TILED=YES"]
        );
    }

    #[test]
    fn test_artifact_paths_embed_district_code() {
        let artifacts = MosaicArtifacts::for_district(Path::new("/scratch/temp"), 532);
        assert_eq!(
            artifacts.vrt_path,
            PathBuf::from("/scratch/temp/district_532_merged.vrt")
        );
        assert_eq!(
            artifacts.tif_path,
            PathBuf::from("/scratch/temp/district_532_mosaiced.tif")
        );
    }

    #[test]
    fn test_command_lines() {
        let tiles = vec![PathBuf::from("/e/a.tif"), PathBuf::from("/e/b.tif")];
        let vrt = Path::new("/t/m.vrt");
        let tif = Path::new("/t/m.tif");

        assert_eq!(
            build_vrt_args(vrt, &tiles),
            vec![
                OsString::from("/t/m.vrt"),
                OsString::from("/e/a.tif"),
                OsString::from("/e/b.tif"),
            ]
        );

        let args = translate_args(&MosaicOptions::default(), vrt, tif);
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            vec![
                "-of",
                "GTiff",
                "-co",
                "COMPRESS=LZW",
                "-co",
                "NUM_THREADS=ALL_CPUS",
                "-co",
                "TILED=YES",
                "/t/m.vrt",
                "/t/m.tif",
            ]
        );
    }

    #[test]
    fn test_empty_tile_list_is_rejected_before_running_tools() {
        let artifacts = MosaicArtifacts::for_district(Path::new("/nonexistent"), 1);
        let result = build_mosaic(&[], &artifacts, &MosaicOptions::default());
        assert!(matches!(result, Err(ZonalStatsError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_tool_is_classified() {
        let result = run_tool("definitely-not-a-gdal-tool", &[]);
        assert!(matches!(result, Err(ZonalStatsError::ToolMissing(t)) if t == "definitely-not-a-gdal-tool"));
    }
}
