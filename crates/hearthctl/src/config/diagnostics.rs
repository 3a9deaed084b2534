use std::collections::HashSet;
use std::ops::Range;
use std::path::PathBuf;

/// The file a value came from, kept around so diagnostics can point into it
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub file_path: PathBuf,
    pub content: String,
}

/// Where a single field was defined
#[derive(Debug, Clone)]
pub struct FieldOrigin {
    pub file_path: PathBuf,
    pub span: Range<usize>,
    pub content: String,
}

/// A diagnostic message that can be either a warning or an error
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Warning(Warning),
    Error(Error),
}

/// Warnings never stop the config from loading
#[derive(Debug, Clone)]
pub enum Warning {
    EmptyConfig { file_path: PathBuf },
    MissingWeatherLocation,
}

#[derive(Debug, Clone)]
pub enum Error {
    Merge(MergeError),
    Validation(ValidationError),
}

/// The same field was set by more than one file
#[derive(Debug, Clone)]
pub struct MergeError {
    pub field_path: String,
    pub conflicts: Vec<FieldOrigin>,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field_path: String,
    pub message: String,
    pub origin: Option<FieldOrigin>,
}

/// Config loading failures that stop before merging (IO, TOML syntax, imports)
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read '{}': {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Failed to parse '{}': {error}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        error: toml::de::Error,
    },

    #[error("Import cycle detected at '{}'", path.display())]
    ImportCycle { path: PathBuf },
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        matches!(self, Diagnostic::Error(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::Warning(_))
    }
}

/// Render diagnostics for a terminal with ariadne.
///
/// Merge conflicts get a label on every definition site. Validation errors get a
/// label when the offending value's origin is known and a single line otherwise.
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    use ariadne::{Color, Config, Label, Report, ReportKind, Source};

    let mut output = Vec::new();
    let config = Config::default().with_color(false);

    for diagnostic in diagnostics {
        match diagnostic {
            Diagnostic::Warning(Warning::EmptyConfig { file_path }) => {
                output.extend_from_slice(
                    format!(
                        "Warning: Config file '{}' is empty and has no effect\n",
                        file_path.display()
                    )
                    .as_bytes(),
                );
            }
            Diagnostic::Warning(Warning::MissingWeatherLocation) => {
                output.extend_from_slice(
                    b"Warning: [weather] latitude/longitude not set, outdoor temperature will use the fallback\n",
                );
            }
            Diagnostic::Error(Error::Merge(merge_error)) => {
                let Some(first) = merge_error.conflicts.first() else {
                    continue;
                };
                let mut report = Report::build(
                    ReportKind::Error,
                    (first.file_path.to_string_lossy().to_string(), first.span.clone()),
                )
                .with_config(config)
                .with_message(format!("Merge conflict in field '{}'", merge_error.field_path))
                .with_note(format!(
                    "'{}' is defined in multiple config files",
                    merge_error.field_path
                ));

                for (idx, conflict) in merge_error.conflicts.iter().enumerate() {
                    let label_msg = if idx == 0 {
                        "first definition here"
                    } else {
                        "conflicts with this definition"
                    };
                    report = report.with_label(
                        Label::new((
                            conflict.file_path.to_string_lossy().to_string(),
                            conflict.span.clone(),
                        ))
                        .with_message(label_msg)
                        .with_color(if idx == 0 { Color::Red } else { Color::Yellow }),
                    );
                }

                let finished = report.finish();
                let mut written = HashSet::new();
                for conflict in &merge_error.conflicts {
                    let file_id = conflict.file_path.to_string_lossy().to_string();
                    if written.insert(file_id.clone()) {
                        finished
                            .write((file_id, Source::from(&conflict.content)), &mut output)
                            .ok();
                    }
                }
            }
            Diagnostic::Error(Error::Validation(validation)) => match &validation.origin {
                Some(origin) => {
                    let file_id = origin.file_path.to_string_lossy().to_string();
                    Report::build(ReportKind::Error, (file_id.clone(), origin.span.clone()))
                        .with_config(config)
                        .with_message(format!(
                            "Validation error in '{}'",
                            validation.field_path
                        ))
                        .with_label(
                            Label::new((file_id.clone(), origin.span.clone()))
                                .with_message(&validation.message)
                                .with_color(Color::Red),
                        )
                        .finish()
                        .write((file_id, Source::from(&origin.content)), &mut output)
                        .ok();
                }
                None => {
                    output.extend_from_slice(
                        format!(
                            "Validation error in '{}': {}\n",
                            validation.field_path, validation.message
                        )
                        .as_bytes(),
                    );
                }
            },
        }
    }

    String::from_utf8_lossy(&output).to_string()
}
