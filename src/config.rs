/// External configuration loader.
///
/// Reads `lifter.toml` from an explicit path, or from the executable's
/// directory (or CWD). Falls back to defaults if the file is missing or
/// incomplete.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::rules::Action;
use crate::domain::search::SearchOptions;

const CONFIG_FILE: &str = "lifter.toml";

// ── Public Config Struct ──

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifterConfig {
    pub search: SearchConfig,
    pub maps_dir: PathBuf,
    pub log_filter: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    pub move_order: [Action; 4],
    pub assume_lift_open: bool,
}

impl SearchConfig {
    pub fn options(&self) -> SearchOptions {
        SearchOptions { assume_lift_open: self.assume_lift_open, order: self.move_order }
    }
}

impl Default for LifterConfig {
    fn default() -> Self {
        LifterConfig::from_toml(TomlConfig::default(), &[])
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    search: TomlSearch,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSearch {
    #[serde(default = "default_move_order")]
    move_order: String,
    #[serde(default)]
    assume_lift_open: bool,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_maps_dir")]
    maps_dir: String,
    #[serde(default = "default_log_filter")]
    log_filter: String,
}

// ── Defaults ──

fn default_move_order() -> String { "DLRU".into() }
fn default_maps_dir() -> String { "maps".into() }
fn default_log_filter() -> String { "warn".into() }

impl Default for TomlSearch {
    fn default() -> Self {
        TomlSearch {
            move_order: default_move_order(),
            assume_lift_open: false,
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            maps_dir: default_maps_dir(),
            log_filter: default_log_filter(),
        }
    }
}

// ── Loading ──

impl LifterConfig {
    /// Load config from `explicit`, or from `lifter.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = match explicit {
            Some(path) => read_toml(path).unwrap_or_default(),
            None => search_dirs
                .iter()
                .map(|d| d.join(CONFIG_FILE))
                .find(|p| p.exists())
                .and_then(|p| read_toml(&p))
                .unwrap_or_default(),
        };
        LifterConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse config text directly. Errors fall back to defaults.
    pub fn from_toml_str(text: &str) -> Self {
        let toml_cfg = match toml::from_str::<TomlConfig>(text) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Warning: config parse error: {e}");
                eprintln!("Using default settings.");
                TomlConfig::default()
            }
        };
        LifterConfig::from_toml(toml_cfg, &[])
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let move_order = parse_move_order(&toml_cfg.search.move_order).unwrap_or_else(|| {
            eprintln!(
                "Warning: move_order {:?} is not a permutation of DLRU, using default",
                toml_cfg.search.move_order
            );
            Action::DIRECTIONS
        });

        // Resolve maps directory
        let maps_dir_str = &toml_cfg.general.maps_dir;
        let maps_dir = if PathBuf::from(maps_dir_str).is_absolute() {
            PathBuf::from(maps_dir_str)
        } else {
            search_dirs
                .iter()
                .map(|d| d.join(maps_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(maps_dir_str))
        };

        LifterConfig {
            search: SearchConfig {
                move_order,
                assume_lift_open: toml_cfg.search.assume_lift_open,
            },
            maps_dir,
            log_filter: toml_cfg.general.log_filter,
        }
    }
}

/// `"DLRU"`-style order: all four directions, each exactly once.
fn parse_move_order(text: &str) -> Option<[Action; 4]> {
    let actions: Vec<Action> = text.trim().chars().map(Action::from_char).collect::<Option<_>>()?;
    let order: [Action; 4] = actions.try_into().ok()?;
    let complete = Action::DIRECTIONS.iter().all(|d| order.contains(d));
    complete.then_some(order)
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

fn read_toml(path: &Path) -> Option<TomlConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str::<TomlConfig>(&text) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                eprintln!("Warning: {} parse error: {e}", path.display());
                eprintln!("Using default settings.");
                None
            }
        },
        Err(e) => {
            eprintln!("Warning: could not read {}: {e}", path.display());
            None
        }
    }
}
