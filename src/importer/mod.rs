//! Importers read annotation records handed over by the annotation store.

pub mod json;

use crate::{StepID, models::annotation::Annotation, workflow::StatusSender};
use std::path::Path;

/// An importer is a module that reads annotation records from a file or a
/// directory of files.
pub trait Importer: Sync {
    /// Read the annotations of the given path, in file order.
    ///
    /// # Arguments
    ///
    /// * `input_path` - A file or a directory with files to read.
    /// * `step_id` - The ID of this step, used for status reports.
    /// * `tx` - If supported by the caller, this is a sender object that allows to send [status updates](../workflow/enum.StatusMessage.html) (like information messages, warnings and module progress) to the calling entity.
    fn import_annotations(
        &self,
        input_path: &Path,
        step_id: StepID,
        tx: Option<StatusSender>,
    ) -> Result<Vec<Annotation>, Box<dyn std::error::Error>>;

    fn file_extensions(&self) -> &[&str];
}
