use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::Gcmt3dError;
use crate::fs_util;

pub const REQUIRED_KEYS: &[&str] = &["database", "duration", "parameters"];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputParams {
    pub database: Utf8PathBuf,
    pub duration: f64,
    pub parameters: IndexMap<String, ParameterSpec>,
    #[serde(default)]
    pub start_label: Option<String>,
    #[serde(default)]
    pub processparams: Option<Utf8PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eventdir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub max_downloads: usize,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParameterSpec {
    pub scale: f64,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl InputParams {
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }

    pub fn scaling_vector(&self) -> Vec<f64> {
        self.parameters.values().map(|spec| spec.scale).collect()
    }

    pub fn label_suffix(&self) -> String {
        match self.start_label.as_deref() {
            Some(label) if !label.is_empty() => format!("_{label}"),
            _ => String::new(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: &Utf8Path) -> Result<InputParams, Gcmt3dError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| Gcmt3dError::ConfigRead(path.to_owned()))?;
        Self::resolve_str(&content, path)
    }

    pub fn resolve_str(content: &str, origin: &Utf8Path) -> Result<InputParams, Gcmt3dError> {
        let parse_err = |err: serde_yaml::Error| Gcmt3dError::ConfigParse {
            path: origin.to_owned(),
            message: err.to_string(),
        };
        let document: Value = serde_yaml::from_str(content).map_err(parse_err)?;
        Self::check_required(&document, origin)?;
        let params: InputParams = serde_yaml::from_value(document).map_err(parse_err)?;

        if !params.duration.is_finite() || params.duration <= 0.0 {
            return Err(Gcmt3dError::ConfigParse {
                path: origin.to_owned(),
                message: format!("duration must be a positive number, got {}", params.duration),
            });
        }
        Ok(params)
    }

    pub fn write(params: &InputParams, path: &Utf8Path) -> Result<(), Gcmt3dError> {
        let content = serde_yaml::to_string(params)
            .map_err(|err| Gcmt3dError::Filesystem(err.to_string()))?;
        fs_util::write_bytes_atomic(path, content.as_bytes())
    }

    fn check_required(document: &Value, origin: &Utf8Path) -> Result<(), Gcmt3dError> {
        let missing = |key: String| Gcmt3dError::MissingConfigKey {
            path: origin.to_owned(),
            key,
        };
        let mapping = document.as_mapping().ok_or_else(|| Gcmt3dError::ConfigParse {
            path: origin.to_owned(),
            message: "expected a key-value document".to_string(),
        })?;

        for key in REQUIRED_KEYS {
            if mapping.get(*key).is_none_or(Value::is_null) {
                return Err(missing(key.to_string()));
            }
        }

        if let Some(parameters) = mapping.get("parameters").and_then(Value::as_mapping) {
            for (name, spec) in parameters {
                if spec.get("scale").is_none_or(Value::is_null) {
                    let name = name.as_str().unwrap_or("?");
                    return Err(missing(format!("parameters.{name}.scale")));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const INPUT: &str = r#"
database: /data/events
duration: 11000.0
start_label: gcmt
processparams: null
parameters:
  m_rr: {scale: 1.0e+25}
  m_tt: {scale: 1.0e+25}
  time_shift: {scale: 1.0, pert: 0.5}
"#;

    #[test]
    fn parse_config_preserves_parameter_order() {
        let params = ConfigLoader::resolve_str(INPUT, Utf8Path::new("input.yml")).unwrap();
        assert_eq!(params.parameter_names(), vec!["m_rr", "m_tt", "time_shift"]);
        assert_eq!(params.scaling_vector(), vec![1.0e25, 1.0e25, 1.0]);
        assert_eq!(params.label_suffix(), "_gcmt");
        assert_eq!(params.max_downloads, 0);
        assert!(params.parameters["time_shift"].extra.contains_key("pert"));
    }

    #[test]
    fn missing_duration_names_the_key() {
        let content = INPUT.replace("duration: 11000.0\n", "");
        let err = ConfigLoader::resolve_str(&content, Utf8Path::new("input.yml")).unwrap_err();
        assert_matches!(err, Gcmt3dError::MissingConfigKey { key, .. } if key == "duration");
    }

    #[test]
    fn missing_scale_names_the_parameter() {
        let content = INPUT.replace("m_tt: {scale: 1.0e+25}", "m_tt: {}");
        let err = ConfigLoader::resolve_str(&content, Utf8Path::new("input.yml")).unwrap_err();
        assert_matches!(err, Gcmt3dError::MissingConfigKey { key, .. } if key == "parameters.m_tt.scale");
    }
}
