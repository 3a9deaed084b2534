use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::Spanned;

use super::diagnostics::{
    Diagnostic, Error, FieldOrigin, LoadError, MergeError, SourceInfo, Warning,
};
use super::LogLevel;

/// One config file as written, every field optional and span-tagged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(default)]
    pub imports: Vec<String>,

    pub logging: Option<PartialLoggingConfig>,
    pub schedule: Option<PartialScheduleConfig>,
    pub hvac: Option<PartialHvacConfig>,
    pub comfort: Option<PartialComfortConfig>,
    pub state: Option<PartialStateConfig>,
    pub automations: Option<PartialAutomationsConfig>,
    pub alerts: Option<PartialAlertsConfig>,
    pub api: Option<PartialApiConfig>,
    pub weather: Option<PartialWeatherConfig>,
    pub notify: Option<PartialNotifyConfig>,
    pub devices: Option<PartialDevicesConfig>,

    #[serde(skip)]
    pub source: Option<SourceInfo>,

    /// field path -> where the surviving value was defined (filled by merge)
    #[serde(skip)]
    pub origins: HashMap<String, FieldOrigin>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialLoggingConfig {
    pub level: Option<Spanned<LogLevel>>,
    pub overrides: Option<HashMap<String, Spanned<LogLevel>>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialScheduleConfig {
    pub wake_time: Option<Spanned<String>>,
    pub sleep_time: Option<Spanned<String>>,
    pub window_minutes: Option<Spanned<u32>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialHvacConfig {
    pub heat_below: Option<Spanned<f64>>,
    pub cool_above: Option<Spanned<f64>>,
    pub override_delta: Option<Spanned<f64>>,
    pub fallback_outdoor_f: Option<Spanned<f64>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialComfortConfig {
    pub default_f: Option<Spanned<f64>>,
    pub cold_outdoor_below: Option<Spanned<f64>>,
    pub cold_target_f: Option<Spanned<f64>>,
    pub hot_outdoor_above: Option<Spanned<f64>>,
    pub hot_target_f: Option<Spanned<f64>>,
    pub ac_sleep_f: Option<Spanned<f64>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialStateConfig {
    pub dir: Option<Spanned<PathBuf>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialAutomationsConfig {
    pub dry_run: Option<Spanned<bool>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialAlertsConfig {
    pub cooldown_minutes: Option<Spanned<u32>>,
    pub freeze_below_f: Option<Spanned<f64>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialApiConfig {
    pub listen: Option<Spanned<String>>,
    pub port: Option<Spanned<u16>>,
    pub token: Option<Spanned<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialWeatherConfig {
    pub latitude: Option<Spanned<f64>>,
    pub longitude: Option<Spanned<f64>>,
    pub base_url: Option<Spanned<String>>,
    pub timeout_secs: Option<Spanned<u64>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialNotifyConfig {
    pub token: Option<Spanned<String>>,
    pub user: Option<Spanned<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialDevicesConfig {
    pub thermostat: Option<PartialDeviceConfig>,
    pub ac: Option<PartialDeviceConfig>,
    pub outlets: Option<PartialDeviceConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialDeviceConfig {
    pub name: Option<Spanned<String>>,
    pub url: Option<Spanned<String>>,
    pub timeout_secs: Option<Spanned<u64>>,
}

/// First-wins field merger that keeps collecting conflicts instead of stopping
/// at the first one.
#[derive(Default)]
struct Merger {
    origins: HashMap<String, FieldOrigin>,
    diagnostics: Vec<Diagnostic>,
}

impl Merger {
    fn field<T>(
        &mut self,
        field_path: String,
        slot: &mut Option<Spanned<T>>,
        incoming: Option<Spanned<T>>,
        source: &SourceInfo,
    ) {
        let Some(value) = incoming else {
            return;
        };

        let origin = FieldOrigin {
            file_path: source.file_path.clone(),
            span: value.span(),
            content: source.content.clone(),
        };

        if let Some(prev) = self.origins.get(&field_path) {
            self.diagnostics.push(Diagnostic::Error(Error::Merge(MergeError {
                field_path,
                conflicts: vec![prev.clone(), origin],
            })));
        } else {
            *slot = Some(value);
            self.origins.insert(field_path, origin);
        }
    }
}

/// A config section whose fields merge one by one.
trait MergeSection: Default {
    fn merge_from(&mut self, other: Self, prefix: &str, merger: &mut Merger, source: &SourceInfo);
}

macro_rules! merge_section {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl MergeSection for $ty {
            fn merge_from(
                &mut self,
                other: Self,
                prefix: &str,
                merger: &mut Merger,
                source: &SourceInfo,
            ) {
                $(
                    merger.field(
                        format!("{}.{}", prefix, stringify!($field)),
                        &mut self.$field,
                        other.$field,
                        source,
                    );
                )+
            }
        }
    };
}

merge_section!(PartialScheduleConfig { wake_time, sleep_time, window_minutes });
merge_section!(PartialHvacConfig { heat_below, cool_above, override_delta, fallback_outdoor_f });
merge_section!(PartialComfortConfig {
    default_f,
    cold_outdoor_below,
    cold_target_f,
    hot_outdoor_above,
    hot_target_f,
    ac_sleep_f,
});
merge_section!(PartialStateConfig { dir });
merge_section!(PartialAutomationsConfig { dry_run });
merge_section!(PartialAlertsConfig { cooldown_minutes, freeze_below_f });
merge_section!(PartialApiConfig { listen, port, token });
merge_section!(PartialWeatherConfig { latitude, longitude, base_url, timeout_secs });
merge_section!(PartialNotifyConfig { token, user });
merge_section!(PartialDeviceConfig { name, url, timeout_secs });

impl MergeSection for PartialLoggingConfig {
    fn merge_from(&mut self, other: Self, prefix: &str, merger: &mut Merger, source: &SourceInfo) {
        merger.field(format!("{}.level", prefix), &mut self.level, other.level, source);

        // Overrides merge per target so two files can each add their own
        if let Some(overrides) = other.overrides {
            let result = self.overrides.get_or_insert_with(HashMap::new);
            for (target, level) in overrides {
                let mut slot = result.remove(&target);
                merger.field(
                    format!("{}.overrides.{}", prefix, target),
                    &mut slot,
                    Some(level),
                    source,
                );
                if let Some(level) = slot {
                    result.insert(target, level);
                }
            }
        }
    }
}

impl MergeSection for PartialDevicesConfig {
    fn merge_from(&mut self, other: Self, prefix: &str, merger: &mut Merger, source: &SourceInfo) {
        merge_optional(&mut self.thermostat, other.thermostat, &format!("{}.thermostat", prefix), merger, source);
        merge_optional(&mut self.ac, other.ac, &format!("{}.ac", prefix), merger, source);
        merge_optional(&mut self.outlets, other.outlets, &format!("{}.outlets", prefix), merger, source);
    }
}

fn merge_optional<S: MergeSection>(
    slot: &mut Option<S>,
    incoming: Option<S>,
    prefix: &str,
    merger: &mut Merger,
    source: &SourceInfo,
) {
    if let Some(incoming) = incoming {
        slot.get_or_insert_with(S::default)
            .merge_from(incoming, prefix, merger, source);
    }
}

impl PartialConfig {
    /// Load a single config file without processing imports
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|error| LoadError::Io {
            path: path.to_path_buf(),
            error,
        })?;

        let mut config: PartialConfig =
            toml::from_str(&content).map_err(|error| LoadError::Parse {
                path: path.to_path_buf(),
                error,
            })?;

        config.source = Some(SourceInfo {
            file_path: path.to_path_buf(),
            content,
        });

        Ok(config)
    }

    /// Load config files with import resolution.
    ///
    /// Returns every loaded file in order: imports come before the file that
    /// imported them, so the importing file's values lose to nothing but
    /// conflict with everything.
    pub fn load_with_imports(paths: &[PathBuf]) -> Result<Vec<Self>, LoadError> {
        let mut visiting = HashSet::new();
        let mut all_configs = Vec::new();

        for path in paths {
            Self::load_recursive(path, &mut visiting, &mut all_configs)?;
        }

        Ok(all_configs)
    }

    fn load_recursive(
        path: &Path,
        visiting: &mut HashSet<PathBuf>,
        configs: &mut Vec<Self>,
    ) -> Result<(), LoadError> {
        let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if !visiting.insert(canonical_path.clone()) {
            return Err(LoadError::ImportCycle {
                path: canonical_path,
            });
        }

        let config = Self::from_file(path)?;

        for import in &config.imports {
            let import_path = PathBuf::from(import);
            let resolved = if import_path.is_absolute() {
                import_path
            } else {
                path.parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(import_path)
            };
            Self::load_recursive(&resolved, visiting, configs)?;
        }

        configs.push(config);

        // Sibling branches may import the same file again; only ancestors count
        visiting.remove(&canonical_path);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.imports.is_empty()
            && self.logging.is_none()
            && self.schedule.is_none()
            && self.hvac.is_none()
            && self.comfort.is_none()
            && self.state.is_none()
            && self.automations.is_none()
            && self.alerts.is_none()
            && self.api.is_none()
            && self.weather.is_none()
            && self.notify.is_none()
            && self.devices.is_none()
    }

    /// Merge partial configs with first-wins semantics.
    ///
    /// A field set by more than one file is an error, but merging carries on so
    /// every conflict is reported in one pass.
    pub fn merge<I>(configs: I) -> (Self, Vec<Diagnostic>)
    where
        I: IntoIterator<Item = Self>,
    {
        let mut result = PartialConfig::default();
        let mut merger = Merger::default();
        let mut imports = Vec::new();

        for config in configs {
            let source = config.source.clone().unwrap_or_else(|| SourceInfo {
                file_path: PathBuf::from("<unknown>"),
                content: String::new(),
            });

            if config.is_empty() {
                merger
                    .diagnostics
                    .push(Diagnostic::Warning(Warning::EmptyConfig {
                        file_path: source.file_path.clone(),
                    }));
            }

            imports.extend(config.imports);

            merge_optional(&mut result.logging, config.logging, "logging", &mut merger, &source);
            merge_optional(&mut result.schedule, config.schedule, "schedule", &mut merger, &source);
            merge_optional(&mut result.hvac, config.hvac, "hvac", &mut merger, &source);
            merge_optional(&mut result.comfort, config.comfort, "comfort", &mut merger, &source);
            merge_optional(&mut result.state, config.state, "state", &mut merger, &source);
            merge_optional(
                &mut result.automations,
                config.automations,
                "automations",
                &mut merger,
                &source,
            );
            merge_optional(&mut result.alerts, config.alerts, "alerts", &mut merger, &source);
            merge_optional(&mut result.api, config.api, "api", &mut merger, &source);
            merge_optional(&mut result.weather, config.weather, "weather", &mut merger, &source);
            merge_optional(&mut result.notify, config.notify, "notify", &mut merger, &source);
            merge_optional(&mut result.devices, config.devices, "devices", &mut merger, &source);
        }

        result.imports = imports;
        result.origins = merger.origins;

        (result, merger.diagnostics)
    }
}
