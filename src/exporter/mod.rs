//! Contains exporters and their traits.

pub mod table;
pub mod tei;
pub mod w3c;

use std::path::Path;

use crate::{StepID, models::annotation::Annotation, workflow::StatusSender};

/// Everything an exporter reads: the imported annotations and the context of
/// the workflow they belong to.
pub struct ExportInput<'a> {
    /// The annotations in import order.
    pub annotations: &'a [Annotation],
    /// Project or document id used for provenance.
    pub scope: &'a str,
    /// Directory of the workflow file. Relative paths in exporter
    /// configurations are resolved against it.
    pub workflow_directory: &'a Path,
}

impl ExportInput<'_> {
    /// The annotations an exporter may write, respecting their visibility.
    pub fn visible(&self, include_private: bool) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .iter()
            .filter(move |a| include_private || !a.is_private())
    }
}

/// What an export step wrote and which annotations it could not represent.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExportReport {
    /// Number of annotations written.
    pub exported: usize,
    /// Ids of annotations left out of the output.
    pub skipped: Vec<String>,
    /// Ids of annotations written without a recognized selector.
    pub unclassified: Vec<String>,
}

/// An exporter is a module that writes the imported annotations into the given
/// directory in a specific format.
pub trait Exporter: Sync {
    /// Export the annotations and report what was written.
    ///
    /// # Arguments
    ///
    /// * `input` - The annotations and their workflow context.
    /// * `output_path` - The directory where to save the exported files to.
    /// * `step_id` - The ID of this step, used for status reports.
    /// * `tx` - If supported by the caller, this is a sender object that allows to send [status updates](../workflow/enum.StatusMessage.html) (like information messages, warnings and module progress) to the calling entity.
    fn export_annotations(
        &self,
        input: &ExportInput,
        output_path: &Path,
        step_id: StepID,
        tx: Option<StatusSender>,
    ) -> Result<ExportReport, Box<dyn std::error::Error>>;

    fn file_extension(&self) -> &str;
}
