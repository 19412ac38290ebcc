use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use readitlater_engine::{AtomicFileWriter, Settings};
use readitlater_logging::{engine_info, engine_warn};

/// Load settings from a RON file. Fields the file leaves out keep their
/// defaults; no path at all means all defaults.
pub(crate) fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            engine_warn!("Settings file {:?} not found, using defaults", path);
            return Ok(Settings::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read settings from {}", path.display()))
        }
    };
    let settings: Settings = ron::from_str(&content)
        .with_context(|| format!("failed to parse settings from {}", path.display()))?;
    engine_info!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Write the default settings as pretty RON, refusing to replace an existing file.
pub(crate) fn write_default_settings(path: &Path) -> Result<()> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(&Settings::default(), pretty)
        .context("failed to serialize default settings")?;

    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("settings path has no file name")?;
    AtomicFileWriter::new(dir).write_new(file_name, &content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.ron");
        fs::write(&path, r#"(inbox_dir: "Clippings", download_images: false)"#).unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.inbox_dir, "Clippings");
        assert!(!settings.download_images);
        assert_eq!(settings.assets_dir, Settings::default().assets_dir);
    }

    #[test]
    fn defaults_round_trip_through_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.ron");
        write_default_settings(&path).unwrap();
        assert_eq!(load_settings(Some(&path)).unwrap(), Settings::default());
        assert!(write_default_settings(&path).is_err());
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(Some(&dir.path().join("absent.ron"))).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
