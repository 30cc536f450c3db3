use std::{
    fs,
    io::BufReader,
    path::{Path, PathBuf},
};

use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use struct_field_names_as_array::FieldNamesAsSlice;

use super::Importer;
use crate::{
    StepID, error::Result, models::annotation::Annotation, progress::ProgressReporter,
    util::get_all_files, workflow::StatusSender,
};

/// Reads annotation records from JSON. The path can be a single file or a
/// directory, in which case all `.json` files below it are read in path order.
/// Each file holds either an array of annotation records or an object with an
/// `annotations` array.
///
/// Drafts (annotations without a selector and without any body) are never
/// exported and are dropped with a warning.
///
/// Example:
///
/// ```toml
/// [[import]]
/// format = "json"
/// path = "annotations/"
///
/// [import.config]
/// layers = ["layer-1"]
/// ```
#[derive(
    Default,
    Deserialize,
    Documented,
    DocumentedFields,
    FieldNamesAsSlice,
    Serialize,
    Clone,
    PartialEq,
    Debug,
)]
#[serde(default, deny_unknown_fields)]
pub struct ImportJson {
    /// Only keep annotations of these layers. All annotations are kept when
    /// the list is empty (the default).
    layers: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnnotationFile {
    List(Vec<Annotation>),
    Wrapped { annotations: Vec<Annotation> },
}

impl From<AnnotationFile> for Vec<Annotation> {
    fn from(file: AnnotationFile) -> Self {
        match file {
            AnnotationFile::List(annotations) => annotations,
            AnnotationFile::Wrapped { annotations } => annotations,
        }
    }
}

const FILE_EXTENSIONS: [&str; 1] = ["json"];

impl ImportJson {
    fn input_files(&self, input_path: &Path) -> Result<Vec<PathBuf>> {
        if input_path.is_dir() {
            get_all_files(input_path, self.file_extensions())
        } else {
            Ok(vec![input_path.to_path_buf()])
        }
    }

    fn read_file(&self, path: &Path) -> Result<Vec<Annotation>> {
        let reader = BufReader::new(fs::File::open(path)?);
        let file: AnnotationFile = serde_json::from_reader(reader)?;
        Ok(file.into())
    }

    fn keep_layer(&self, annotation: &Annotation) -> bool {
        self.layers.is_empty()
            || annotation
                .layer_id
                .as_ref()
                .is_some_and(|l| self.layers.contains(l))
    }
}

impl Importer for ImportJson {
    fn import_annotations(
        &self,
        input_path: &Path,
        step_id: StepID,
        tx: Option<StatusSender>,
    ) -> std::result::Result<Vec<Annotation>, Box<dyn std::error::Error>> {
        let files = self.input_files(input_path)?;
        let progress = ProgressReporter::new(tx, step_id, files.len())?;
        let mut result = Vec::new();
        let mut drafts = Vec::new();
        for path in files {
            for annotation in self.read_file(&path)? {
                if !self.keep_layer(&annotation) {
                    continue;
                }
                if annotation.is_draft() {
                    drafts.push(annotation.id);
                } else {
                    result.push(annotation);
                }
            }
            progress.worked(1)?;
        }
        if !drafts.is_empty() {
            progress.warn(&format!(
                "Dropped {} draft annotation(s): {}",
                drafts.len(),
                drafts.join(", ")
            ))?;
        }
        Ok(result)
    }

    fn file_extensions(&self) -> &[&str] {
        &FILE_EXTENSIONS
    }
}
