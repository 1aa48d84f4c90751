use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use super::{ConfigError, EngineConfig};
use crate::definition::WizardDefinition;
use crate::errors::WizardError;

const CONFIG_FILE: &str = "config.json";
const DEFINITIONS_DIR: &str = "definitions";
const DEFINITION_EXTENSION: &str = "json";
const TMP_SUFFIX: &str = "tmp";

/// Loads and saves [`EngineConfig`] plus stored wizard definitions.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    definitions_dir: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf, definitions_dir: PathBuf) -> Self {
        Self {
            config_path,
            definitions_dir,
        }
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&base)?;
        let definitions_dir = base.join(DEFINITIONS_DIR);
        fs::create_dir_all(&definitions_dir)?;
        Ok(Self::new(base.join(CONFIG_FILE), definitions_dir))
    }

    /// `<platform config dir>/wizard_core`.
    pub fn default_location() -> Result<Self, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Self::with_base_dir(base.join("wizard_core"))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn definitions_dir(&self) -> &Path {
        &self.definitions_dir
    }

    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        if self.config_path.exists() {
            let data = fs::read_to_string(&self.config_path)?;
            serde_json::from_str(&data).map_err(|err| ConfigError::Serde(err.to_string()))
        } else {
            Ok(EngineConfig::default())
        }
    }

    pub fn save(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(config)
            .map_err(|err| ConfigError::Serde(err.to_string()))?;
        replace_file(&self.config_path, &json)
    }

    /// Reads `<name>.json` from the configured definitions directory.
    ///
    /// The definition is returned uncompiled; call
    /// [`WizardDefinition::compile`] to validate it.
    pub fn load_definition(&self, name: &str) -> Result<WizardDefinition, ConfigError> {
        let path = self.definition_path(name)?;
        if !path.exists() {
            return Err(ConfigError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("wizard definition `{}` not found", name),
            )));
        }
        debug!(path = %path.display(), "loading wizard definition");
        let data = fs::read_to_string(&path)?;
        WizardDefinition::from_json(&data)
    }

    pub fn save_definition(&self, definition: &WizardDefinition) -> Result<PathBuf, ConfigError> {
        let path = self.definition_path(&definition.name)?;
        let json = serde_json::to_string_pretty(definition)
            .map_err(|err| ConfigError::Serde(err.to_string()))?;
        replace_file(&path, &json)?;
        Ok(path)
    }

    /// Names of stored definitions, sorted.
    pub fn list_definitions(&self) -> Result<Vec<String>, ConfigError> {
        let dir = self.resolved_definitions_dir()?;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DEFINITION_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn resolved_definitions_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self
            .load()?
            .definitions_dir
            .unwrap_or_else(|| self.definitions_dir.clone()))
    }

    fn definition_path(&self, name: &str) -> Result<PathBuf, ConfigError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-'));
        if !valid {
            return Err(WizardError::InvalidConfig(format!(
                "`{}` is not a valid definition name",
                name
            ))
            .into());
        }
        Ok(self
            .resolved_definitions_dir()?
            .join(format!("{}.{}", name, DEFINITION_EXTENSION)))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

/// Writes to a sibling temp file, then renames it over `path`.
fn replace_file(path: &Path, data: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    fs::rename(&tmp, path)?;
    Ok(())
}
