//! Configuration file discovery.
//!
//! Walks up from a starting directory collecting `.crix.toml` files, then appends the global
//! `~/.crix.toml` when no file along the way declared itself the root.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::parse::is_root_config;

/// The configuration filename.
pub const CONFIG_FILENAME: &str = ".crix.toml";

/// Discovers all configuration files relevant to the given directory.
///
/// Returns paths in precedence order: closest to `cwd` first, global config last. A file with
/// `root = true` ends the walk and suppresses the global config.
pub fn discover_config_files(cwd: &Path) -> Vec<PathBuf> {
    let mut configs = Vec::new();

    for dir in cwd.ancestors() {
        let candidate = dir.join(CONFIG_FILENAME);
        if !candidate.is_file() {
            continue;
        }
        let stop = is_root_config(&candidate);
        configs.push(candidate);
        if stop {
            return configs;
        }
    }

    if let Some(global) = global_config_path()
        && global.is_file()
        && !configs.contains(&global)
    {
        configs.push(global);
    }

    configs
}

/// Returns the path to the global configuration file (`~/.crix.toml`).
///
/// Returns `None` if the home directory cannot be determined.
pub fn global_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(CONFIG_FILENAME))
}

/// Checks if a path is the global configuration file.
pub fn is_global_config(path: &Path) -> bool {
    global_config_path().is_some_and(|global| path == global)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::TestDir;

    /// Drops the global config, which depends on the machine running the tests.
    fn local_only(configs: Vec<PathBuf>) -> Vec<PathBuf> {
        configs
            .into_iter()
            .filter(|p| !is_global_config(p))
            .collect()
    }

    #[test]
    fn test_discover_nothing() {
        let test_dir = TestDir::new();
        let subdir = test_dir.create_dir("x/y");

        assert!(local_only(discover_config_files(&subdir)).is_empty());
    }

    #[test]
    fn test_discover_closest_first() {
        let test_dir = TestDir::new();
        let outer = test_dir.create_config_at_root();
        let inner = test_dir.create_config("site/content");
        let cwd = test_dir.create_dir("site/content/pages");

        let configs = local_only(discover_config_files(&cwd));

        assert_eq!(configs, vec![inner, outer]);
    }

    #[test]
    fn test_discover_in_cwd_itself() {
        let test_dir = TestDir::new();
        let config = test_dir.create_config_at_root();

        let configs = local_only(discover_config_files(test_dir.path()));

        assert_eq!(configs, vec![config]);
    }

    #[test]
    fn test_directory_named_like_config_is_ignored() {
        let test_dir = TestDir::new();
        fs::create_dir_all(test_dir.path().join(CONFIG_FILENAME)).unwrap();
        let cwd = test_dir.create_dir("sub");

        assert!(local_only(discover_config_files(&cwd)).is_empty());
    }

    #[test]
    fn test_root_config_stops_walk_and_skips_global() {
        let test_dir = TestDir::new();
        test_dir.create_config_at_root();
        let project = test_dir.create_root_config("project");
        let child = test_dir.create_config("project/sub");
        let cwd = test_dir.create_dir("project/sub/deep");

        let configs = discover_config_files(&cwd);

        assert_eq!(configs, vec![child, project]);
    }

    #[test]
    fn test_root_false_keeps_walking() {
        let test_dir = TestDir::new();
        let outer = test_dir.create_config_at_root();
        let inner = test_dir.create_config_with_content("project", "root = false\n");
        let cwd = test_dir.create_dir("project/src");

        let configs = local_only(discover_config_files(&cwd));

        assert_eq!(configs, vec![inner, outer]);
    }

    #[test]
    fn test_global_config_path_uses_filename() {
        let path = global_config_path().unwrap();
        assert!(path.ends_with(CONFIG_FILENAME));
        assert!(is_global_config(&path));
        assert!(!is_global_config(Path::new("/srv/site/.crix.toml")));
    }
}
