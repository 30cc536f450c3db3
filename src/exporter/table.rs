use std::{fs, io, path::Path};

use chrono::{DateTime, SecondsFormat, Utc};
use documented::{Documented, DocumentedFields};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};
use struct_field_names_as_array::FieldNamesAsSlice;

use super::{ExportInput, ExportReport, Exporter};
use crate::{
    StepID,
    classifier::{ImageSelector, Profile, classify},
    error::Result,
    models::annotation::{Annotation, UserRef},
    progress::ProgressReporter,
    workflow::StatusSender,
};

/// This module flattens the annotations into three tables, one file per
/// entity: `annotations.csv`, `targets.csv` (one row per selected range or
/// region) and `bodies.csv`. Body values are written as stored.
#[derive(
    Deserialize, Documented, DocumentedFields, FieldNamesAsSlice, Serialize, Clone, PartialEq, Debug,
)]
#[serde(deny_unknown_fields)]
pub struct ExportTable {
    /// The provided character defines the column delimiter. The default value is a comma.
    ///
    /// Example:
    /// ```toml
    /// [export.config]
    /// delimiter = ";"
    /// ```
    #[serde(default = "default_delimiter")]
    delimiter: char,
    /// The provided character will be used for quoting values. If nothing is provided, values are only
    /// quoted where necessary. If a character is provided, all values will be quoted.
    ///
    /// Example:
    /// ```toml
    /// [export.config]
    /// quote_char = "\""
    /// ```
    #[serde(default)]
    quote_char: Option<char>,
    /// Provides the string sequence used for n/a. Default is the empty string.
    ///
    /// Example:
    /// ```toml
    /// [export.config]
    /// no_value = "n/a"
    /// ```
    #[serde(default)]
    no_value: String,
    /// If true, do not output the first line with the column names.
    #[serde(default)]
    skip_header: bool,
    /// If `true`, annotations with private visibility are exported as well.
    #[serde(default)]
    include_private: bool,
}

impl Default for ExportTable {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            quote_char: Default::default(),
            no_value: Default::default(),
            skip_header: Default::default(),
            include_private: Default::default(),
        }
    }
}

fn default_delimiter() -> char {
    ','
}

/// Profile name used for annotations whose selector could not be classified.
pub const UNRECOGNIZED: &str = "UNRECOGNIZED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Entity {
    Annotations,
    Targets,
    Bodies,
}

impl Entity {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Entity::Annotations => &[
                "id",
                "layer_id",
                "visibility",
                "profile",
                "created",
                "updated",
                "creator",
            ],
            Entity::Targets => &[
                "annotation_id",
                "profile",
                "start",
                "end",
                "page_number",
                "quote",
                "xpath_start",
                "xpath_end",
                "geometry",
                "geometry_type",
            ],
            Entity::Bodies => &[
                "id",
                "annotation_id",
                "purpose",
                "type",
                "format",
                "value",
                "creator",
                "created",
                "updated",
            ],
        }
    }
}

type Row = Vec<Option<String>>;

/// The rows of one entity. Missing values are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub entity: Entity,
    pub rows: Vec<Row>,
}

/// Flatten the annotations into one table per entity, in the order of
/// [`Entity`].
pub fn to_tables<'a, I>(annotations: I) -> Vec<Table>
where
    I: IntoIterator<Item = &'a Annotation>,
{
    let mut tables = Entity::iter()
        .map(|entity| Table {
            entity,
            rows: Vec::new(),
        })
        .collect_vec();
    for annotation in annotations {
        let profile = classify(annotation).ok();
        let profile_name = profile
            .as_ref()
            .map_or(UNRECOGNIZED.to_string(), |p| p.kind().to_string());
        let t = &annotation.target;
        tables[0].rows.push(vec![
            Some(annotation.id.clone()),
            annotation.layer_id.clone(),
            Some(annotation.visibility.to_string()),
            Some(profile_name.clone()),
            timestamp(t.created),
            timestamp(t.updated),
            user_id(t.creator.as_ref()),
        ]);
        tables[1]
            .rows
            .extend(target_rows(annotation, profile.as_ref(), &profile_name));
        for body in annotation.all_bodies() {
            tables[2].rows.push(vec![
                Some(body.id.clone()),
                Some(annotation.id.clone()),
                body.purpose.map(|p| p.to_string()),
                body.body_type.clone(),
                body.format.clone(),
                Some(body.value.clone()),
                user_id(body.creator.as_ref()),
                timestamp(body.created),
                timestamp(body.updated),
            ]);
        }
    }
    tables
}

fn timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn user_id(user: Option<&UserRef>) -> Option<String> {
    user.map(|u| u.id.clone())
}

fn target_rows(annotation: &Annotation, profile: Option<&Profile>, profile_name: &str) -> Vec<Row> {
    let row = |start: Option<&Number>,
               end: Option<&Number>,
               page: Option<&Number>,
               quote: Option<&String>,
               xpaths: Option<(&str, &str)>,
               geometry: Option<(String, &str)>| {
        vec![
            Some(annotation.id.clone()),
            Some(profile_name.to_string()),
            start.map(|v| v.to_string()),
            end.map(|v| v.to_string()),
            page.map(|v| v.to_string()),
            quote.cloned(),
            xpaths.map(|(s, _)| s.to_string()),
            xpaths.map(|(_, e)| e.to_string()),
            geometry.as_ref().map(|(g, _)| g.clone()),
            geometry.map(|(_, kind)| kind.to_string()),
        ]
    };
    match profile {
        Some(Profile::Note) => vec![row(None, None, None, None, None, None)],
        Some(Profile::Image(image)) => {
            let geometry = match image {
                ImageSelector::Rectangle { geometry: g } => {
                    (format!("{},{},{},{}", g.x, g.y, g.w, g.h), "RECTANGLE")
                }
                ImageSelector::Polygon { geometry } => (
                    geometry
                        .points
                        .iter()
                        .map(|[x, y]| format!("{x},{y}"))
                        .join(" "),
                    "POLYGON",
                ),
            };
            vec![row(None, None, None, None, None, Some(geometry))]
        }
        Some(Profile::TextPlain(ranges)) => ranges
            .iter()
            .map(|r| row(Some(&r.start), Some(&r.end), None, r.quote.as_ref(), None, None))
            .collect(),
        Some(Profile::TextPdf(ranges)) => ranges
            .iter()
            .map(|r| {
                row(
                    Some(&r.range.start),
                    Some(&r.range.end),
                    Some(&r.page_number),
                    r.range.quote.as_ref(),
                    None,
                    None,
                )
            })
            .collect(),
        Some(Profile::TextTei(ranges)) => ranges
            .iter()
            .map(|r| {
                row(
                    Some(&r.range.start),
                    Some(&r.range.end),
                    None,
                    r.range.quote.as_ref(),
                    Some((r.start_selector.value.as_str(), r.end_selector.value.as_str())),
                    None,
                )
            })
            .collect(),
        None => {
            // keep the stored selector so the row can still be interpreted
            let raw = annotation
                .target
                .selector
                .as_ref()
                .map(|s| (s.to_string(), UNRECOGNIZED));
            vec![row(None, None, None, None, None, raw)]
        }
    }
}

impl ExportTable {
    fn write_table<W: io::Write>(&self, table: &Table, output: W) -> Result<()> {
        let mut writer_builder = csv::WriterBuilder::new();
        writer_builder.delimiter(self.delimiter as u8);
        if let Some(c) = &self.quote_char {
            writer_builder.quote(*c as u8);
            writer_builder.quote_style(csv::QuoteStyle::Always);
        }
        let mut writer = writer_builder.from_writer(output);
        if !self.skip_header {
            writer.write_record(table.entity.columns())?;
        }
        for row in &table.rows {
            writer.write_record(
                row.iter()
                    .map(|value| value.as_deref().unwrap_or(&self.no_value)),
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

const FILE_EXTENSION: &str = "csv";

impl Exporter for ExportTable {
    fn export_annotations(
        &self,
        input: &ExportInput,
        output_path: &Path,
        step_id: StepID,
        tx: Option<StatusSender>,
    ) -> std::result::Result<ExportReport, Box<dyn std::error::Error>> {
        let visible: Vec<&Annotation> = input.visible(self.include_private).collect();
        let tables = to_tables(visible.iter().copied());
        let progress = ProgressReporter::new(tx, step_id, tables.len())?;
        fs::create_dir_all(output_path)?;
        for table in tables {
            let file_path = output_path.join(format!(
                "{}.{}",
                table.entity.as_ref(),
                self.file_extension()
            ));
            let file = fs::File::create(&file_path)?;
            self.write_table(&table, io::BufWriter::new(file))?;
            progress.worked(1)?;
        }
        Ok(ExportReport {
            exported: visible.len(),
            skipped: Vec::new(),
            unclassified: visible
                .iter()
                .filter(|a| classify(a).is_err())
                .map(|a| a.id.clone())
                .collect(),
        })
    }

    fn file_extension(&self) -> &str {
        FILE_EXTENSION
    }
}
