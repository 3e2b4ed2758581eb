//! YAML loading with tag expansion
//!
//! Tags are expanded depth-first while the document is walked, so an
//! included file may itself use `!secret` or further includes.

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Loads YAML documents relative to a config directory
pub struct YamlLoader {
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being expanded, outermost first
    chain: Vec<PathBuf>,
}

impl YamlLoader {
    /// Create a loader, reading secrets.yaml from `config_dir` if present
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    /// Create a loader with an explicit secrets store
    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            chain: Vec::new(),
        }
    }

    /// Load a file and expand every tag in it
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve(path.as_ref());

        if self.chain.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        debug!(path = %path.display(), "Loading YAML file");
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.chain.push(path.clone());
        let result = self.load_str(&content, &path);
        self.chain.pop();
        result
    }

    /// Parse a document and expand its tags; `origin` anchors relative includes
    pub fn load_str(&mut self, content: &str, origin: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: origin.to_path_buf(),
            source: e,
        })?;
        self.expand(value, origin)
    }

    fn expand(&mut self, value: Value, origin: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.expand_tag(*tagged, origin),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.expand(item, origin))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(map) => {
                let mut out = serde_yaml::Mapping::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key, self.expand(item, origin)?);
                }
                Ok(Value::Mapping(out))
            }
            other => Ok(other),
        }
    }

    fn expand_tag(&mut self, tagged: TaggedValue, origin: &Path) -> ConfigResult<Value> {
        let TaggedValue { tag, value } = tagged;
        trace!(%tag, "Expanding tag");

        if tag == "include" {
            let target = self.tag_path(&value, origin)?;
            self.load_file(target)
        } else if tag == "include_dir_merge_list" {
            self.include_dir_merge_list(&value, origin)
        } else if tag == "secret" {
            let key = tag_argument(&value, "!secret")?;
            self.secrets
                .get(key)
                .map(|secret| Value::String(secret.to_string()))
        } else if tag == "env_var" {
            env_var(tag_argument(&value, "!env_var")?)
        } else {
            // Unknown tags pass through with their contents expanded
            let value = self.expand(value, origin)?;
            Ok(Value::Tagged(Box::new(TaggedValue { tag, value })))
        }
    }

    /// Concatenate the top-level lists of every YAML file in a directory
    fn include_dir_merge_list(&mut self, value: &Value, origin: &Path) -> ConfigResult<Value> {
        let dir = self.tag_path(value, origin)?;
        let mut merged = Vec::new();

        for file in yaml_files(&dir)? {
            match self.load_file(&file)? {
                Value::Sequence(items) => merged.extend(items),
                Value::Null => {}
                other => merged.push(other),
            }
        }

        Ok(Value::Sequence(merged))
    }

    /// Resolve a tag's path argument against the including file's directory
    fn tag_path(&self, value: &Value, origin: &Path) -> ConfigResult<PathBuf> {
        let raw = value
            .as_str()
            .ok_or_else(|| ConfigError::InvalidIncludePath {
                path: format!("{:?}", value),
                reason: "expected a string path".to_string(),
            })?;

        let relative = Path::new(raw);
        if relative.is_absolute() {
            return Ok(relative.to_path_buf());
        }

        let base = origin
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(&self.config_dir);
        Ok(base.join(relative))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn tag_argument<'a>(value: &'a Value, tag: &str) -> ConfigResult<&'a str> {
    value.as_str().ok_or_else(|| ConfigError::InvalidValue {
        key: tag.to_string(),
        reason: "expected a string argument".to_string(),
    })
}

/// Resolve `VAR` or `VAR default`
fn env_var(argument: &str) -> ConfigResult<Value> {
    let mut parts = argument.trim().splitn(2, char::is_whitespace);
    let var = parts.next().unwrap_or_default();
    let fallback = parts.next().map(str::trim);

    match (std::env::var(var), fallback) {
        (Ok(value), _) => Ok(Value::String(value)),
        (Err(_), Some(fallback)) => Ok(Value::String(fallback.to_string())),
        (Err(_), None) => Err(ConfigError::EnvVarNotFound {
            var: var.to_string(),
        }),
    }
}

/// YAML files in a directory, sorted by name, skipping hidden files
fn yaml_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConfigError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = fs::read_dir(dir).map_err(|e| ConfigError::ReadFile {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with('.'));
            let yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            );
            path.is_file() && yaml && !hidden
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Load `file` from `config_dir` with tag expansion
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir)?.load_file(file)
}
