//! ## Creating a workflow file
//!
//! Workflow files list which annotation sources to read and which exports to
//! produce from them. We use a [TOML file](https://toml.io/) with the ending
//! `.toml` to configure the workflow.
//!
//! ### Scope
//!
//! The top-level `scope` key names the project or document the annotations
//! belong to. It is written as the `source` of every W3C target and used to
//! name the W3C output file.
//!
//! ```toml
//! scope = "project-42"
//! ```
//!
//! ### Import
//!
//! An import step starts with the header `[[import]]`[^toml-array], and a
//! configuration value for the key `path` where to read the annotations from
//! and the key `format` which declares in which format they are encoded. The
//! file path is relative to the workflow file. Importers also need an
//! additional configuration header, marked with `[import.config]`, even if it
//! does not set any specific configuration option.
//!
//! ```toml
//! [[import]]
//! path = "annotations/"
//! format = "json"
//!
//! [import.config]
//! layers = ["layer-1"]
//! ```
//!
//! You can have more than one importer. Their annotations are concatenated in
//! the order of the import steps.
//!
//! ### Export
//!
//! Exporters work similar to importers, but use the keyword `[[export]]`
//! instead. The `path` is the directory the exported files are written to.
//!
//! ```toml
//! [[export]]
//! path = "output/tei"
//! format = "tei"
//!
//! [export.config]
//! source = "sources/letter.xml"
//! ```
//!
//! ### Full example
//!
//! ```toml
//! scope = "project-42"
//!
//! [[import]]
//! path = "annotations/"
//! format = "json"
//!
//! [import.config]
//!
//! [[export]]
//! path = "output/w3c"
//! format = "w3c"
//!
//! [export.config]
//! include_private = false
//!
//! [[export]]
//! path = "output/tables"
//! format = "table"
//!
//! [export.config]
//! delimiter = ";"
//! ```
//!
//! [^toml-array]: TOML can represent lists of the things as [Arrays of Tables](https://toml.io/en/v1.0.0#array-of-tables).
//!
use std::{
    convert::TryFrom,
    fs,
    path::{Path, PathBuf},
    sync::mpsc::Sender,
};

use normpath::PathExt;
use rayon::prelude::*;
use regex::Regex;
use serde_derive::Deserialize;

use crate::{
    ExporterStep, ImporterStep, Step, StepID,
    error::{ExportError, Result},
    exporter::{ExportInput, ExportReport},
    models::annotation::Annotation,
    progress::ProgressReporter,
};

/// Status updates are send as single messages when the workflow is executed.
#[derive(Debug)]
pub enum StatusMessage {
    /// Sent at the beginning when the workflow is parsed and before the pipeline steps are executed.
    StepsCreated(Vec<StepID>),
    /// An informing message.
    Info(String),
    /// A warning message.
    Warning(String),
    /// Progress report for a single step.
    Progress {
        /// Determines which step the progress is reported for.
        id: StepID,
        /// Estimated total needed steps to complete the step
        total_work: Option<usize>,
        /// Number of steps finished. Should never be larger than `total_work`.
        finished_work: usize,
    },
    /// Indicates a step has finished.
    StepDone { id: StepID },
}

pub type StatusSender = Sender<StatusMessage>;

/// What a workflow run imported and what each export step wrote.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Number of annotations read by all import steps.
    pub imported: usize,
    /// Reports of the export steps, in the order of the workflow file.
    pub exports: Vec<(StepID, ExportReport)>,
}

/// A workflow describes the steps of an export. It can be represented as TOML file.
///
/// First, all importers are executed in parallel. Their annotations are
/// concatenated in step order. Then all exporters are called with the now
/// read-only annotations in parallel.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Workflow {
    scope: String,
    import: Vec<ImporterStep>,
    export: Option<Vec<ExporterStep>>,
}

fn contained_variables(workflow: &'_ str) -> Result<Vec<(usize, &'_ str)>> {
    let pattern = Regex::new("[$][^\\s\\-/\"'.;,?!\\[\\]{}]+")?;
    Ok(pattern
        .find_iter(workflow)
        .map(|m| (m.start(), m.as_str()))
        .collect())
}

fn parse_variables(workflow: &str) -> Result<String> {
    let mut buf = String::with_capacity(workflow.len());
    let mut p = 0;
    for (start_index, var) in contained_variables(workflow)? {
        buf.push_str(&workflow[p..start_index]);
        p = start_index + var.len();
        if let Ok(value) = std::env::var(&var[1..]) {
            buf.push_str(&value);
        } else {
            buf.push_str(var);
        }
    }
    buf.push_str(&workflow[p..]);
    Ok(buf)
}

fn read_workflow(path: &Path, read_env: bool) -> Result<String> {
    let toml_content =
        fs::read_to_string(path).map_err(|reason| ExportError::OpenWorkflowFile {
            file: path.to_path_buf(),
            reason,
        })?;
    if read_env {
        parse_variables(&toml_content)
    } else {
        Ok(toml_content)
    }
}

impl TryFrom<(PathBuf, bool)> for Workflow {
    type Error = ExportError;
    fn try_from(workflow_config: (PathBuf, bool)) -> Result<Workflow> {
        let (workflow_file, read_env) = workflow_config;
        let final_content = read_workflow(&workflow_file, read_env)?;
        let workflow: Workflow = toml::from_str(final_content.as_str())?;
        Ok(workflow)
    }
}

/// Executes a workflow from a TOML file.
///
/// * `workflow_file` - The TOML workflow file.
/// * `read_env` - Replace `$VARIABLE` references with the values of environment variables.
/// * `tx` - If supported by the caller, this is a sender object that allows to send [status updates](enum.StatusMessage.html) (like information messages, warnings and module progress) to the calling entity.
pub fn execute_from_file(
    workflow_file: &Path,
    read_env: bool,
    tx: Option<StatusSender>,
) -> Result<RunSummary> {
    let wf = Workflow::try_from((workflow_file.to_path_buf(), read_env))?;
    let parent_dir = if let Some(directory) = workflow_file.parent() {
        directory
    } else {
        Path::new("")
    };
    wf.execute(tx, parent_dir)
}

impl Workflow {
    pub fn execute(
        &self,
        tx: Option<StatusSender>,
        workflow_directory: &Path,
    ) -> Result<RunSummary> {
        // Create a vector of all steps and report these as current status
        if let Some(tx) = &tx {
            let mut steps: Vec<StepID> = Vec::default();
            steps.extend(self.import.iter().map(|importer| importer.get_step_id()));
            if let Some(ref exporters) = self.export {
                steps.extend(exporters.iter().map(|exporter| exporter.get_step_id()));
            }
            tx.send(StatusMessage::StepsCreated(steps))?;
        }

        // Execute all importers in parallel, keeping the step order
        let imported: Result<Vec<Vec<Annotation>>> = self
            .import
            .par_iter()
            .map_with(tx.clone(), |tx, step| {
                self.execute_single_importer(step, workflow_directory, tx.clone())
            })
            .collect();
        let annotations: Vec<Annotation> = imported?.into_iter().flatten().collect();
        let reporter = ProgressReporter::new_unknown_total_work(
            tx.clone(),
            StepID {
                module_name: "workflow".to_string(),
                path: None,
            },
        )?;
        reporter.info(&format!(
            "Imported {} annotation(s) for scope {}",
            annotations.len(),
            self.scope
        ))?;

        let mut summary = RunSummary {
            imported: annotations.len(),
            exports: Vec::new(),
        };
        // Execute all exporters in parallel
        if let Some(ref exporters) = self.export {
            let input = ExportInput {
                annotations: &annotations,
                scope: &self.scope,
                workflow_directory,
            };
            let export_result: Result<Vec<_>> = exporters
                .par_iter()
                .map_with(tx, |tx, step| {
                    self.execute_single_exporter(&input, step, workflow_directory, tx.clone())
                })
                .collect();
            summary.exports = export_result?;
        }
        Ok(summary)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn import_steps(&self) -> &Vec<ImporterStep> {
        &self.import
    }

    pub fn export_steps(&self) -> Option<&Vec<ExporterStep>> {
        self.export.as_ref()
    }

    fn execute_single_importer(
        &self,
        step: &ImporterStep,
        workflow_directory: &Path,
        tx: Option<StatusSender>,
    ) -> Result<Vec<Annotation>> {
        let import_path = if step.path.is_relative() {
            workflow_directory.join(&step.path)
        } else {
            step.path.clone()
        };
        let resolved_import_path: PathBuf = if import_path.exists() {
            import_path.normalize()?.into()
        } else {
            import_path
        };

        let annotations = step
            .module
            .reader()
            .import_annotations(
                resolved_import_path.as_path(),
                step.get_step_id(),
                tx.clone(),
            )
            .map_err(|reason| ExportError::Import {
                reason: reason.to_string(),
                importer: step.module.as_ref().to_string(),
                path: step.path.to_path_buf(),
            })?;
        if let Some(ref tx) = tx {
            tx.send(StatusMessage::StepDone {
                id: step.get_step_id(),
            })?;
        }
        Ok(annotations)
    }

    fn execute_single_exporter(
        &self,
        input: &ExportInput,
        step: &ExporterStep,
        workflow_directory: &Path,
        tx: Option<StatusSender>,
    ) -> Result<(StepID, ExportReport)> {
        let output_path = if step.path.is_relative() {
            workflow_directory.join(&step.path)
        } else {
            step.path.clone()
        };
        // normalizing requires an existing path
        fs::create_dir_all(&output_path)?;
        let resolved_output_path = output_path.normalize()?;

        let report = step
            .module
            .writer()
            .export_annotations(
                input,
                resolved_output_path.as_path(),
                step.get_step_id(),
                tx.clone(),
            )
            .map_err(|reason| ExportError::Export {
                reason: reason.to_string(),
                exporter: step.module.as_ref().to_string(),
                path: step.path.clone(),
            })?;
        if let Some(ref tx) = tx {
            tx.send(StatusMessage::StepDone {
                id: step.get_step_id(),
            })?;
        }
        Ok((step.get_step_id(), report))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use pretty_assertions::assert_eq;
    use serde_json::Value;

    use super::*;

    #[test]
    fn export_workflow() {
        let tmp = tempfile::tempdir().unwrap();
        let workflow_file = tmp.path().join("workflow.toml");
        fs::copy(
            "tests/data/workflow/annotations.json",
            tmp.path().join("annotations.json"),
        )
        .unwrap();
        fs::copy(
            "tests/data/workflow/letter.xml",
            tmp.path().join("letter.xml"),
        )
        .unwrap();
        fs::copy("tests/data/workflow/workflow.toml", &workflow_file).unwrap();

        let (tx, rx) = mpsc::channel();
        let summary = execute_from_file(&workflow_file, false, Some(tx)).unwrap();
        assert_eq!(4, summary.imported);
        let reports: Vec<_> = summary
            .exports
            .iter()
            .map(|(id, report)| (id.module_name.as_str(), report.exported, report.skipped.len()))
            .collect();
        assert_eq!(
            vec![("export_w3c", 3, 0), ("export_tei", 2, 1), ("export_table", 3, 0)],
            reports
        );

        let w3c: Value = serde_json::from_str(
            &fs::read_to_string(tmp.path().join("out/w3c/letter-1.json")).unwrap(),
        )
        .unwrap();
        let ids: Vec<_> = w3c
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(vec!["a1", "a2", "a3"], ids);
        assert_eq!("letter-1", w3c[0]["target"]["source"]);

        let tei = fs::read_to_string(tmp.path().join("out/tei/letter.xml")).unwrap();
        assert!(tei.contains("<standOff>"));
        for entity in ["annotations", "targets", "bodies"] {
            assert!(tmp.path().join(format!("out/tables/{entity}.csv")).exists());
        }

        let messages: Vec<_> = rx.iter().collect();
        let steps = messages
            .iter()
            .find_map(|m| match m {
                StatusMessage::StepsCreated(steps) => Some(steps.len()),
                _ => None,
            })
            .unwrap();
        assert_eq!(4, steps);
        let done = messages
            .iter()
            .filter(|m| matches!(m, StatusMessage::StepDone { .. }))
            .count();
        assert_eq!(4, done);
    }

    #[test]
    fn without_export_steps() {
        let workflow: Workflow = toml::from_str(
            r#"
            scope = "doc"

            [[import]]
            format = "json"
            path = "tests/data/workflow/annotations.json"

            [import.config]
            "#,
        )
        .unwrap();
        assert!(workflow.export_steps().is_none());
        workflow.execute(None, Path::new(".")).unwrap();
    }

    #[test]
    fn missing_scope_is_rejected() {
        let result: std::result::Result<Workflow, _> = toml::from_str(
            r#"
            [[import]]
            format = "json"
            path = "a.json"

            [import.config]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let result: std::result::Result<Workflow, _> = toml::from_str(
            r#"
            scope = "doc"

            [[import]]
            format = "xml"
            path = "a.xml"

            [import.config]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn import_errors_name_the_step() {
        let workflow: Workflow = toml::from_str(
            r#"
            scope = "doc"

            [[import]]
            format = "json"
            path = "does/not/exist.json"

            [import.config]
            "#,
        )
        .unwrap();
        let result = workflow.execute(None, Path::new("."));
        assert!(matches!(
            result,
            Err(ExportError::Import { ref importer, .. }) if importer == "json"
        ));
    }

    #[test]
    fn with_env() {
        let k1 = "ANNO_EXPORT_TEST_FORMAT";
        let k2 = "ANNO_EXPORT_TEST_SCOPE";
        // SAFETY: no other test reads these variables
        unsafe {
            std::env::set_var(k1, "table");
            std::env::set_var(k2, "letter-1");
        }
        let with_vars = read_workflow(Path::new("tests/data/workflow/with_vars.toml"), true);
        assert!(
            with_vars.is_ok(),
            "Failed to read variable workflow with error {:?}",
            with_vars.err()
        );
        let without_vars =
            read_workflow(Path::new("tests/data/workflow/without_vars.toml"), false).unwrap();
        assert_eq!(without_vars, with_vars.unwrap());
        // unset variables are kept as they are
        assert_eq!(
            "path = \"$ANNO_EXPORT_TEST_UNSET/out\"",
            parse_variables("path = \"$ANNO_EXPORT_TEST_UNSET/out\"").unwrap()
        );
    }
}
