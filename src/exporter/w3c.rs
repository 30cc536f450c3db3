use std::{fs, io::BufWriter, path::Path};

use chrono::{DateTime, Utc};
use documented::{Documented, DocumentedFields};
use log::debug;
use serde::{Deserialize, Serialize};
use struct_field_names_as_array::FieldNamesAsSlice;

use super::{ExportInput, ExportReport, Exporter};
use crate::{
    StepID,
    classifier::classify,
    crosswalk::OutputBody,
    models::annotation::Annotation,
    progress::ProgressReporter,
    serializer::{W3cTarget, serialize, serialize_unclassified},
    util::file_name_for,
    workflow::StatusSender,
};

pub const W3C_CONTEXT: &str = "http://www.w3.org/ns/anno.jsonld";

/// Exports the annotations as a JSON array of
/// [W3C Web Annotations](https://www.w3.org/TR/annotation-model/).
///
/// The file is named after the last segment of the workflow scope.
///
/// Example:
///
/// ```toml
/// [[export]]
/// format = "w3c"
/// path = "output/"
///
/// [export.config]
/// include_private = true
/// ```
#[derive(
    Deserialize, Documented, DocumentedFields, FieldNamesAsSlice, Serialize, Clone, PartialEq, Debug,
)]
#[serde(deny_unknown_fields)]
pub struct ExportW3c {
    /// If `true`, annotations with private visibility are exported as well.
    /// They are left out by default.
    #[serde(default)]
    include_private: bool,
    /// Indent the written JSON (the default). Set to `false` for a compact
    /// file.
    #[serde(default = "default_pretty")]
    pretty: bool,
    /// What to do with annotations whose selector has no known shape. With
    /// `mark` (the default), the record is written with the stored selector
    /// and `"unclassified": true` on its target. With `skip`, it is left out.
    /// Both report a warning.
    ///
    /// Example:
    ///
    /// ```toml
    /// [export.config]
    /// on_unrecognized = "skip"
    /// ```
    #[serde(default)]
    on_unrecognized: UnrecognizedPolicy,
}

impl Default for ExportW3c {
    fn default() -> Self {
        Self {
            include_private: false,
            pretty: default_pretty(),
            on_unrecognized: UnrecognizedPolicy::default(),
        }
    }
}

fn default_pretty() -> bool {
    true
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnrecognizedPolicy {
    #[default]
    Mark,
    Skip,
}

/// One annotation in the W3C Web Annotation vocabulary.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct W3cRecord {
    #[serde(rename = "@context")]
    pub context: &'static str,
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub body: Vec<OutputBody>,
    pub target: W3cTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// Serialize annotations as W3C records in input order.
///
/// Private annotations are removed before anything is serialized unless
/// `include_private` is set. Annotations with an unrecognized selector are
/// passed through with an unclassified target.
pub fn to_w3c(annotations: &[Annotation], scope: &str, include_private: bool) -> Vec<W3cRecord> {
    annotations
        .iter()
        .filter(|a| include_private || !a.is_private())
        .map(|a| to_record(a, scope))
        .collect()
}

fn to_record(annotation: &Annotation, scope: &str) -> W3cRecord {
    let fragment = match classify(annotation) {
        Ok(profile) => serialize(annotation, &profile, scope),
        Err(e) => {
            debug!("{e}");
            serialize_unclassified(annotation, scope)
        }
    };
    W3cRecord {
        context: W3C_CONTEXT,
        id: annotation.id.clone(),
        record_type: "Annotation",
        body: fragment.body,
        created: fragment.target.created,
        modified: fragment.target.updated,
        target: fragment.target,
    }
}

const FILE_EXTENSION: &str = "json";

impl Exporter for ExportW3c {
    fn export_annotations(
        &self,
        input: &ExportInput,
        output_path: &Path,
        step_id: StepID,
        tx: Option<StatusSender>,
    ) -> Result<ExportReport, Box<dyn std::error::Error>> {
        let progress = ProgressReporter::new(tx, step_id, 1)?;
        let mut records = to_w3c(input.annotations, input.scope, self.include_private);
        let mut report = ExportReport::default();

        let unclassified = records
            .iter()
            .filter(|r| r.target.unclassified)
            .map(|r| r.id.clone())
            .collect::<Vec<_>>();
        if !unclassified.is_empty() {
            let action = match self.on_unrecognized {
                UnrecognizedPolicy::Mark => "Marked",
                UnrecognizedPolicy::Skip => "Skipped",
            };
            progress.warn(&format!(
                "{action} {} annotation(s) with an unrecognized selector: {}",
                unclassified.len(),
                unclassified.join(", ")
            ))?;
            match self.on_unrecognized {
                UnrecognizedPolicy::Mark => report.unclassified = unclassified,
                UnrecognizedPolicy::Skip => {
                    records.retain(|r| !r.target.unclassified);
                    report.skipped = unclassified;
                }
            }
        }
        report.exported = records.len();

        fs::create_dir_all(output_path)?;
        let file_path = output_path.join(file_name_for(input.scope, self.file_extension()));
        let writer = BufWriter::new(fs::File::create(&file_path)?);
        if self.pretty {
            serde_json::to_writer_pretty(writer, &records)?;
        } else {
            serde_json::to_writer(writer, &records)?;
        }
        progress.info(&format!(
            "Wrote {} annotation(s) to {}",
            records.len(),
            file_path.to_string_lossy()
        ))?;
        progress.worked(1)?;
        Ok(report)
    }

    fn file_extension(&self) -> &str {
        FILE_EXTENSION
    }
}
