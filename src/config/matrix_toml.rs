//! SketchMatrix.toml configuration parsing
//!
//! Every section is optional and falls back to the platform defaults, so a
//! minimal file only needs the three toolchain paths:
//!
//! ```toml
//! [toolchain]
//! root = "~/Documents/arduino-1.8.5"
//! packages = "~/.arduino15/packages"
//! sketchbook = "~/Documents/Arduino"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{hints, MatrixError};
use crate::utils::paths::{expand_home, home_dir, CONFIG_FILE_NAME};

/// Root configuration from SketchMatrix.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MatrixConfig {
    /// Toolchain installation layout
    pub toolchain: ToolchainConfig,

    /// Where run outputs and scratch builds go
    pub output: OutputConfig,

    /// Fields of the variant string that are not read from board definitions
    pub variant: VariantConfig,

    /// Sketch discovery settings
    pub sketches: SketchesConfig,

    /// Board discovery settings
    pub boards: BoardsConfig,

    /// Run-time settings
    pub run: RunConfig,
}

/// [toolchain] section
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Arduino IDE installation directory
    pub root: PathBuf,
    /// Board packages directory (Arduino15/packages)
    pub packages: PathBuf,
    /// Sketchbook directory, its `libraries` folder is searched
    pub sketchbook: PathBuf,
    /// Builder executable, relative to `root` or looked up on PATH
    pub builder: PathBuf,
    /// Value of the `-ide-version=` argument
    pub ide_version: String,
    /// Additional `-hardware` directories
    pub extra_hardware: Vec<PathBuf>,
    /// Additional `-tools` directories
    pub extra_tools: Vec<PathBuf>,
    /// Additional `-libraries` directories
    pub extra_libraries: Vec<PathBuf>,
}

/// [output] section
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory receiving one `build_<timestamp>` folder per run
    pub root: PathBuf,
    /// Scratch build directory prefix handed to the builder as `-build-path`
    pub scratch: PathBuf,
}

/// [variant] section
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct VariantConfig {
    /// Package vendor, first field of the variant string
    pub vendor: String,
    /// Architecture, second field of the variant string
    pub architecture: String,
    /// `upload_method=` option
    pub upload_method: String,
    /// `xserial=` option
    pub serial_mode: String,
    /// `usb=` option, omitted when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usb_mode: Option<String>,
    /// `opt=` option
    pub build_option: String,
}

/// [sketches] section
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SketchesConfig {
    /// Sketch file extension, without the dot
    pub suffix: String,
    /// Sketch built when no selection flag is given, relative to the toolchain root
    pub default: PathBuf,
    /// Exclusion list applied in all/pattern mode when `--exclude` is absent
    pub exclude_file: PathBuf,
}

/// [boards] section
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BoardsConfig {
    /// Glob matched against board definition file names
    pub definition_file: String,
}

/// [run] section
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Worker count for parallel sweeps, defaults to the CPU count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    /// Kill a build after this many seconds and classify it as an error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Extension of the binary staged with `--bin`
    pub artifact_extension: String,
    /// Give every board its own scratch directory in sequential mode too
    pub per_board_build_path: bool,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
        let (root, packages, sketchbook) = if cfg!(target_os = "windows") {
            (
                PathBuf::from("C:\\Program Files (x86)\\Arduino"),
                home.join("AppData\\Local\\Arduino15\\packages"),
                home.join("My Documents\\Arduino"),
            )
        } else if cfg!(target_os = "macos") {
            (
                home.join("Applications/Arduino"),
                home.join("Library/Arduino15/packages"),
                home.join("Documents/Arduino"),
            )
        } else {
            (
                home.join("Documents/arduino-1.8.5"),
                home.join(".arduino15/packages"),
                home.join("Documents/Arduino"),
            )
        };

        Self {
            root,
            packages,
            sketchbook,
            builder: PathBuf::from("arduino-builder"),
            ide_version: "10805".to_string(),
            extra_hardware: Vec::new(),
            extra_tools: Vec::new(),
            extra_libraries: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
        let root = if cfg!(target_os = "windows") {
            home.join("arduinoBuilderOutput")
        } else {
            home.join("Documents/arduinoBuilderOutput")
        };
        Self {
            root,
            scratch: std::env::temp_dir().join("temp_arduinoBuilderOutput"),
        }
    }
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            vendor: "STM32".to_string(),
            architecture: "stm32".to_string(),
            upload_method: "STLink".to_string(),
            serial_mode: "generic".to_string(),
            usb_mode: None,
            build_option: "osstd".to_string(),
        }
    }
}

impl Default for SketchesConfig {
    fn default() -> Self {
        Self {
            suffix: "ino".to_string(),
            default: PathBuf::from("examples/01.Basics/Blink/Blink.ino"),
            exclude_file: PathBuf::from("conf/exclude_list.txt"),
        }
    }
}

impl Default for BoardsConfig {
    fn default() -> Self {
        Self {
            definition_file: "boards.txt".to_string(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            timeout_secs: None,
            artifact_extension: "bin".to_string(),
            per_board_build_path: false,
        }
    }
}

impl MatrixConfig {
    /// Load SketchMatrix.toml from an explicit path, or from the current directory
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => {
                let path = Path::new(CONFIG_FILE_NAME);
                if !path.exists() {
                    return Err(MatrixError::config_error_with_hint(
                        format!("{} not found in current directory", CONFIG_FILE_NAME),
                        hints::config_not_found(),
                    )
                    .into());
                }
                Self::load_from_path(path)
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(MatrixError::config_error_with_hint(
                format!("Configuration file does not exist: {}", path.display()),
                hints::config_not_found(),
            )
            .into());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parse configuration from TOML string, expanding `~` in every path
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| MatrixError::config_error(format!("Failed to parse TOML: {}", e)))?;
        config.expand_paths();
        super::validation::validate_config(&config)?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    fn expand_paths(&mut self) {
        let tc = &mut self.toolchain;
        tc.root = expand_home(&tc.root);
        tc.packages = expand_home(&tc.packages);
        tc.sketchbook = expand_home(&tc.sketchbook);
        for dir in tc
            .extra_hardware
            .iter_mut()
            .chain(tc.extra_tools.iter_mut())
            .chain(tc.extra_libraries.iter_mut())
        {
            *dir = expand_home(dir);
        }
        self.output.root = expand_home(&self.output.root);
        self.output.scratch = expand_home(&self.output.scratch);
        self.sketches.exclude_file = expand_home(&self.sketches.exclude_file);
    }
}
