pub mod classifier;
pub mod crosswalk;
pub mod error;
pub mod exporter;
pub mod importer;
pub mod models;
pub mod progress;
pub mod serializer;
pub mod util;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_util;

use std::{fmt::Display, path::PathBuf};

use documented::{Documented, DocumentedFields};
use exporter::{Exporter, table::ExportTable, tei::ExportTei, w3c::ExportW3c};
use importer::{Importer, json::ImportJson};
use serde_derive::Deserialize;
use strum::{AsRefStr, EnumDiscriminants, EnumIter};
use struct_field_names_as_array::FieldNamesAsSlice;
use tabled::Tabled;

/// Name and documentation of one configuration field of a module.
#[derive(Tabled)]
pub struct ModuleConfiguration {
    pub name: String,
    pub description: String,
}

fn module_configs<T: FieldNamesAsSlice + DocumentedFields>() -> Vec<ModuleConfiguration> {
    T::FIELD_NAMES_AS_SLICE
        .iter()
        .map(|name| ModuleConfiguration {
            name: name.to_string(),
            description: T::get_field_docs(name).unwrap_or_default().to_string(),
        })
        .collect()
}

#[derive(Deserialize, EnumDiscriminants, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[strum_discriminants(derive(EnumIter, AsRefStr), strum(serialize_all = "lowercase"))]
#[serde(tag = "format", rename_all = "lowercase", content = "config")]
pub enum ReadFrom {
    Json(ImportJson),
}

impl ReadFrom {
    fn reader(&self) -> &dyn Importer {
        match self {
            ReadFrom::Json(m) => m,
        }
    }
}

impl ReadFromDiscriminants {
    pub fn module_doc(&self) -> &str {
        match self {
            ReadFromDiscriminants::Json => ImportJson::DOCS,
        }
    }

    pub fn module_configs(&self) -> Vec<ModuleConfiguration> {
        match self {
            ReadFromDiscriminants::Json => module_configs::<ImportJson>(),
        }
    }
}

#[derive(Deserialize, EnumDiscriminants, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[strum_discriminants(derive(EnumIter, AsRefStr), strum(serialize_all = "lowercase"))]
#[serde(tag = "format", rename_all = "lowercase", content = "config")]
pub enum WriteAs {
    W3c(ExportW3c),
    Tei(ExportTei),
    Table(ExportTable),
}

impl WriteAs {
    fn writer(&self) -> &dyn Exporter {
        match self {
            WriteAs::W3c(m) => m,
            WriteAs::Tei(m) => m,
            WriteAs::Table(m) => m,
        }
    }
}

impl WriteAsDiscriminants {
    pub fn module_doc(&self) -> &str {
        match self {
            WriteAsDiscriminants::W3c => ExportW3c::DOCS,
            WriteAsDiscriminants::Tei => ExportTei::DOCS,
            WriteAsDiscriminants::Table => ExportTable::DOCS,
        }
    }

    pub fn module_configs(&self) -> Vec<ModuleConfiguration> {
        match self {
            WriteAsDiscriminants::W3c => module_configs::<ExportW3c>(),
            WriteAsDiscriminants::Tei => module_configs::<ExportTei>(),
            WriteAsDiscriminants::Table => module_configs::<ExportTable>(),
        }
    }
}

/// Unique ID of a single step in the export pipeline.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct StepID {
    /// The name of the module used in this step.
    pub module_name: String,
    /// The path (input or output) used in this step.
    pub path: Option<PathBuf>,
}

impl Display for StepID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{} [{}]", self.module_name, path.to_string_lossy())
        } else {
            write!(f, "{}", self.module_name)
        }
    }
}

/// Represents a single step in an export pipeline.
pub trait Step {
    fn get_step_id(&self) -> StepID;
}

#[derive(Deserialize)]
pub struct ImporterStep {
    #[serde(flatten)]
    module: ReadFrom,
    path: PathBuf,
}

impl Step for ImporterStep {
    fn get_step_id(&self) -> StepID {
        StepID {
            module_name: format!("import_{}", self.module.as_ref()),
            path: Some(self.path.clone()),
        }
    }
}

#[derive(Deserialize)]
pub struct ExporterStep {
    #[serde(flatten)]
    module: WriteAs,
    path: PathBuf,
}

impl Step for ExporterStep {
    fn get_step_id(&self) -> StepID {
        StepID {
            module_name: format!("export_{}", self.module.as_ref()),
            path: Some(self.path.clone()),
        }
    }
}
