use lotto_core::{EngineConfig, Result};
use std::path::{Path, PathBuf};

/// Where the database lives when neither `--data-dir`, the config file nor
/// `LOTTO_DATA_DIR` says otherwise.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lotto")
}

/// Config file, then environment, then command-line flags.
pub fn resolve(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(config_path)?;

    match data_dir {
        Some(dir) => config.data_dir = dir,
        None if config.data_dir == Path::new(".") => config.data_dir = default_data_dir(),
        None => {}
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flag_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lotto.toml");
        std::fs::write(&path, "data_dir = \"/srv/lotto\"\n").unwrap();

        let from_file = resolve(Some(&path), None).unwrap();
        assert_eq!(from_file.data_dir, PathBuf::from("/srv/lotto"));

        let flagged = resolve(Some(&path), Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(flagged.data_dir, dir.path());
    }
}
