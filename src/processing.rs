use std::fs;

use camino::Utf8Path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::config::InputParams;
use crate::error::Gcmt3dError;
use crate::fs_util;
use crate::rules::RuleTable;

const DEFAULT_TEMPLATE: &str = include_str!("process.yml");

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ProcessingConfig {
    pub waves: IndexMap<String, WaveProcessing>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WaveProcessing {
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub process: ProcessSettings,
    #[serde(default)]
    pub window: Vec<WindowSettings>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProcessSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_filt: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_endtime: Option<f64>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WindowSettings {
    #[serde(default)]
    pub config: WindowConfig,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WindowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_period: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_period: Option<f64>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ProcessingConfig {
    pub fn builtin() -> Result<Self, Gcmt3dError> {
        serde_yaml::from_str(DEFAULT_TEMPLATE).map_err(|err| Gcmt3dError::ConfigParse {
            path: "<builtin process.yml>".into(),
            message: err.to_string(),
        })
    }

    pub fn load(path: &Utf8Path) -> Result<Self, Gcmt3dError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| Gcmt3dError::ConfigRead(path.to_owned()))?;
        serde_yaml::from_str(&content).map_err(|err| Gcmt3dError::ConfigParse {
            path: path.to_owned(),
            message: err.to_string(),
        })
    }

    pub fn template_for(params: &InputParams) -> Result<Self, Gcmt3dError> {
        match &params.processparams {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), Gcmt3dError> {
        let content =
            serde_yaml::to_string(self).map_err(|err| Gcmt3dError::Filesystem(err.to_string()))?;
        fs_util::write_bytes_atomic(path, content.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    pub fn get(&self, wave: &str) -> Option<&WaveProcessing> {
        self.waves.get(wave)
    }
}

/// Windows take `min_period` from corner 3 (shortest) and `max_period` from corner 0.
pub fn adapt(
    magnitude: f64,
    depth_in_m: f64,
    template: ProcessingConfig,
    max_duration: f64,
    rules: &dyn RuleTable,
) -> ProcessingConfig {
    let table = rules.determine(magnitude, depth_in_m);
    let mut waves = template.waves;

    waves.retain(|wave, settings| {
        let Some(rule) = table.get(wave) else {
            debug!(wave = %wave, "no rule for wave type, dropping");
            return false;
        };
        let weight = match rule.weight {
            Some(weight) if weight > 0.0 => weight,
            _ => {
                debug!(wave = %wave, "zero weight, dropping");
                return false;
            }
        };

        settings.weight = weight;
        settings.process.pre_filt = Some(rule.filter.map(|period| 1.0 / period));
        settings.process.relative_endtime = Some(rule.relative_endtime.min(max_duration));
        for window in &mut settings.window {
            window.config.min_period = Some(rule.filter[3]);
            window.config.max_period = Some(rule.filter[0]);
        }
        true
    });

    ProcessingConfig { waves }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::GcmtRules;

    #[test]
    fn builtin_template_parses() {
        let template = ProcessingConfig::builtin().unwrap();
        assert_eq!(
            template.waves.keys().collect::<Vec<_>>(),
            vec!["body", "surface", "mantle"]
        );
        let body = template.get("body").unwrap();
        assert!(!body.window.is_empty());
        assert!(body.process.extra.contains_key("remove_response_flag"));
    }

    #[test]
    fn adapt_builtin_for_moderate_event() {
        let template = ProcessingConfig::builtin().unwrap();
        let adapted = adapt(6.0, 15_000.0, template, 11_000.0, &GcmtRules);
        assert_eq!(
            adapted.waves.keys().collect::<Vec<_>>(),
            vec!["body", "surface", "mantle"]
        );
        let mantle = adapted.get("mantle").unwrap();
        assert_eq!(mantle.process.relative_endtime, Some(10_800.0));
        assert_eq!(mantle.window[0].config.min_period, Some(125.0));
        assert_eq!(mantle.window[0].config.max_period, Some(350.0));
    }

    #[test]
    fn unknown_extra_keys_survive_adaptation() {
        let template = ProcessingConfig::builtin().unwrap();
        let before = template.get("body").unwrap().process.extra.clone();
        let adapted = adapt(6.0, 15_000.0, template, 11_000.0, &GcmtRules);
        assert_eq!(adapted.get("body").unwrap().process.extra, before);
    }
}
