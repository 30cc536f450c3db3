//! Merges annotations as TEI stand-off markup into an existing TEI document.
//!
//! The source document is validated with a tree parser first, then streamed
//! through unchanged. Entity references are copied as written. The `<standOff>` block is written as the last child of the
//! first `<teiHeader>`, which is created as the first child of the root element
//! when the document has none. Everything outside the insertion point is copied
//! as it was read.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use documented::{Documented, DocumentedFields};
use quick_xml::{
    Reader, Writer,
    events::{BytesEnd, BytesStart, BytesText, Event},
};
use serde::{Deserialize, Serialize};
use struct_field_names_as_array::FieldNamesAsSlice;

use super::{ExportInput, ExportReport, Exporter};
use crate::{
    StepID,
    classifier::{Profile, classify},
    crosswalk::resolve_creator,
    error::{ExportError, Result},
    models::annotation::{Annotation, Body, Purpose, Target, UserRef},
    progress::ProgressReporter,
    serializer::tei::target_attribute,
    workflow::StatusSender,
};

const TEI_HEADER: &str = "teiHeader";

/// Merges the text range annotations and document notes into a TEI source
/// document as a `<standOff>` block in the `<teiHeader>`. Image and PDF
/// annotations cannot be addressed in the XML tree and are skipped with a
/// warning.
///
/// The merged document is written into the output directory under the file
/// name of the source document.
///
/// Example:
///
/// ```toml
/// [[export]]
/// format = "tei"
/// path = "output/"
///
/// [export.config]
/// source = "sources/letter.xml"
/// ```
#[derive(
    Deserialize, Documented, DocumentedFields, FieldNamesAsSlice, Serialize, Clone, PartialEq, Debug,
)]
#[serde(deny_unknown_fields)]
pub struct ExportTei {
    /// Path of the TEI document the annotations refer to. Relative paths are
    /// resolved against the directory of the workflow file. The file itself is
    /// never changed.
    source: PathBuf,
    /// If `true`, annotations with private visibility are merged as well.
    #[serde(default)]
    include_private: bool,
    /// Which element of an annotation (its target or one of its bodies) is
    /// reported as the last change in the revision history. `earliest` (the
    /// default) picks the element with the earliest timestamp, `latest` the
    /// one with the most recent timestamp. The timestamp of an element is when
    /// it was updated, or when it was created if it was never updated.
    ///
    /// Example:
    ///
    /// ```toml
    /// [export.config]
    /// source = "letter.xml"
    /// last_change = "latest"
    /// ```
    #[serde(default)]
    last_change: LastChange,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LastChange {
    #[default]
    Earliest,
    Latest,
}

/// The merged document and the ids of the annotations that were left out.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub xml: String,
    pub skipped: Vec<String>,
}

/// Merge the annotations into the XML document and return the new document.
///
/// Fails with [`ExportError::MalformedSourceDocument`] if `xml` is not
/// well-formed. Merging into a document that already has a stand-off block
/// adds a second block.
pub fn merge_annotations(xml: &str, annotations: &[Annotation]) -> Result<String> {
    merge_with(xml, annotations, LastChange::default()).map(|merged| merged.xml)
}

/// Like [`merge_annotations`], but with a configurable revision history and
/// reporting which annotations were skipped because of their profile.
pub fn merge_with<'a, I>(xml: &str, annotations: I, last_change: LastChange) -> Result<Merged>
where
    I: IntoIterator<Item = &'a Annotation>,
{
    let header = header_position(xml)?;

    let mut stand_off = StandOff {
        entries: Vec::new(),
        last_change,
    };
    let mut skipped = Vec::new();
    for annotation in annotations {
        match classify(annotation) {
            Ok(Profile::Note) => stand_off.entries.push((annotation, None)),
            Ok(Profile::TextTei(ranges)) => stand_off
                .entries
                .push((annotation, target_attribute(&ranges))),
            Ok(_) | Err(_) => skipped.push(annotation.id.clone()),
        }
    }

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut element_index = 0;
    // depth of the current element relative to the header, while inside it
    let mut header_depth: Option<usize> = None;
    loop {
        let event = reader
            .read_event()
            .map_err(|e| ExportError::MalformedSourceDocument(e.to_string()))?;
        match event {
            Event::Eof => break,
            Event::Start(start) => {
                let index = element_index;
                element_index += 1;
                if let Some(depth) = header_depth.as_mut() {
                    *depth += 1;
                }
                writer.write_event(Event::Start(start))?;
                if header == Some(index) {
                    header_depth = Some(0);
                } else if header.is_none() && index == 0 {
                    write_header(&mut writer, &stand_off)?;
                }
            }
            Event::Empty(empty) => {
                let index = element_index;
                element_index += 1;
                if header == Some(index) {
                    writer.write_event(Event::Start(empty.clone()))?;
                    stand_off.write(&mut writer)?;
                    writer.write_event(Event::End(empty.to_end()))?;
                } else if header.is_none() && index == 0 {
                    writer.write_event(Event::Start(empty.clone()))?;
                    write_header(&mut writer, &stand_off)?;
                    writer.write_event(Event::End(empty.to_end()))?;
                } else {
                    writer.write_event(Event::Empty(empty))?;
                }
            }
            Event::End(end) => {
                match header_depth {
                    Some(0) => {
                        stand_off.write(&mut writer)?;
                        header_depth = None;
                    }
                    Some(depth) => header_depth = Some(depth - 1),
                    None => {}
                }
                writer.write_event(Event::End(end))?;
            }
            other => writer.write_event(other)?,
        }
    }

    Ok(Merged {
        xml: String::from_utf8(writer.into_inner())?,
        skipped,
    })
}

/// Index of the first `teiHeader` among all elements in document order, as
/// seen by the streaming reader. Entity references are not expanded, so the
/// index matches the element events of the merge pass.
fn header_position(xml: &str) -> Result<Option<usize>> {
    let mut options = roxmltree::ParsingOptions::default();
    options.allow_dtd = true;
    roxmltree::Document::parse_with_options(xml, options)
        .map_err(|e| ExportError::MalformedSourceDocument(e.to_string()))?;

    let mut reader = Reader::from_str(xml);
    let mut index = 0;
    loop {
        match reader
            .read_event()
            .map_err(|e| ExportError::MalformedSourceDocument(e.to_string()))?
        {
            Event::Start(element) | Event::Empty(element) => {
                if element.local_name().as_ref() == TEI_HEADER.as_bytes() {
                    return Ok(Some(index));
                }
                index += 1;
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn write_header<W: Write>(writer: &mut Writer<W>, stand_off: &StandOff) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(TEI_HEADER)))?;
    stand_off.write(writer)?;
    writer.write_event(Event::End(BytesEnd::new(TEI_HEADER)))?;
    Ok(())
}

struct StandOff<'a> {
    /// Annotations in input order with their `target` attribute.
    entries: Vec<(&'a Annotation, Option<String>)>,
    last_change: LastChange,
}

impl StandOff<'_> {
    fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("standOff")))?;
        writer.write_event(Event::Start(BytesStart::new("listAnnotation")))?;
        for (annotation, target) in &self.entries {
            self.write_annotation(writer, annotation, target.as_deref())?;
        }
        writer.write_event(Event::End(BytesEnd::new("listAnnotation")))?;
        writer.write_event(Event::End(BytesEnd::new("standOff")))?;
        Ok(())
    }

    fn write_annotation<W: Write>(
        &self,
        writer: &mut Writer<W>,
        annotation: &Annotation,
        target: Option<&str>,
    ) -> Result<()> {
        let xml_id = format!("#{}", annotation.id);
        let mut start = BytesStart::new("annotation");
        start.push_attribute(("xml:id", xml_id.as_str()));
        if let Some(target) = target {
            start.push_attribute(("target", target));
        }
        writer.write_event(Event::Start(start))?;

        let changes = revisions(annotation, self.last_change);
        if !changes.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("revisionDesc")))?;
            for change in changes {
                let when = change.when.to_rfc3339_opts(SecondsFormat::Millis, true);
                let mut element = BytesStart::new("change");
                element.push_attribute(("status", change.status));
                element.push_attribute(("when", when.as_str()));
                if let Some(who) = &change.who {
                    element.push_attribute(("who", who.as_str()));
                }
                writer.write_event(Event::Empty(element))?;
            }
            writer.write_event(Event::End(BytesEnd::new("revisionDesc")))?;
        }

        for body in annotation
            .all_bodies()
            .filter(|b| b.purpose == Some(Purpose::Commenting))
        {
            writer.write_event(Event::Start(BytesStart::new("note")))?;
            writer.write_event(Event::Text(BytesText::new(&body.value)))?;
            writer.write_event(Event::End(BytesEnd::new("note")))?;
        }

        let tags: Vec<&str> = annotation
            .all_bodies()
            .filter(|b| b.purpose == Some(Purpose::Tagging))
            .map(|b| b.value.as_str())
            .collect();
        if !tags.is_empty() {
            let ana = tags.join(" ");
            let mut rs = BytesStart::new("rs");
            rs.push_attribute(("ana", ana.as_str()));
            writer.write_event(Event::Empty(rs))?;
        }

        writer.write_event(Event::End(BytesEnd::new("annotation")))?;
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct Change {
    status: &'static str,
    when: DateTime<Utc>,
    who: Option<String>,
}

/// Timestamps and users of one element of an annotation.
struct Revision<'a> {
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    creator: Option<&'a UserRef>,
    updated_by: Option<&'a UserRef>,
}

impl<'a> From<&'a Target> for Revision<'a> {
    fn from(t: &'a Target) -> Self {
        Revision {
            created: t.created,
            updated: t.updated,
            creator: t.creator.as_ref(),
            updated_by: t.updated_by.as_ref(),
        }
    }
}

impl<'a> From<&'a Body> for Revision<'a> {
    fn from(b: &'a Body) -> Self {
        Revision {
            created: b.created,
            updated: b.updated,
            creator: b.creator.as_ref(),
            updated_by: b.updated_by.as_ref(),
        }
    }
}

impl<'a> Revision<'a> {
    fn when(&self) -> Option<DateTime<Utc>> {
        self.updated.or(self.created)
    }

    fn who(&self) -> Option<&'a UserRef> {
        if self.updated.is_some() {
            self.updated_by
        } else {
            self.creator
        }
    }
}

fn who(user: Option<&UserRef>) -> Option<String> {
    resolve_creator(user).map(|c| format!("#{}", c.name))
}

fn revisions(annotation: &Annotation, last_change: LastChange) -> Vec<Change> {
    let mut changes = Vec::with_capacity(2);
    let target = &annotation.target;
    if let (Some(created), Some(creator)) = (target.created, who(target.creator.as_ref())) {
        changes.push(Change {
            status: "created",
            when: created,
            who: Some(creator),
        });
    }

    let candidates: Vec<(DateTime<Utc>, Option<&UserRef>)> = std::iter::once(Revision::from(target))
        .chain(annotation.all_bodies().map(Revision::from))
        .filter_map(|r| Some((r.when()?, r.who())))
        .collect();
    // both keep the first candidate on equal timestamps
    let selected = match last_change {
        LastChange::Earliest => candidates.iter().min_by_key(|(when, _)| *when),
        LastChange::Latest => candidates.iter().rev().max_by_key(|(when, _)| *when),
    };
    if let Some((when, user)) = selected {
        changes.push(Change {
            status: "modified",
            when: *when,
            who: who(*user),
        });
    }
    changes
}

const FILE_EXTENSION: &str = "xml";

impl Exporter for ExportTei {
    fn export_annotations(
        &self,
        input: &ExportInput,
        output_path: &Path,
        step_id: StepID,
        tx: Option<StatusSender>,
    ) -> std::result::Result<ExportReport, Box<dyn std::error::Error>> {
        let progress = ProgressReporter::new(tx, step_id, 1)?;
        let source_path = if self.source.is_relative() {
            input.workflow_directory.join(&self.source)
        } else {
            self.source.clone()
        };
        let xml = fs::read_to_string(&source_path)?;
        let visible: Vec<&Annotation> = input.visible(self.include_private).collect();
        let merged = merge_with(&xml, visible.iter().copied(), self.last_change)?;
        if !merged.skipped.is_empty() {
            progress.warn(&format!(
                "Skipped {} annotation(s) that do not address the TEI document: {}",
                merged.skipped.len(),
                merged.skipped.join(", ")
            ))?;
        }

        fs::create_dir_all(output_path)?;
        let file_name = source_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("annotations.{FILE_EXTENSION}")));
        let file_path = output_path.join(file_name);
        fs::write(&file_path, merged.xml)?;
        progress.info(&format!("Wrote {}", file_path.to_string_lossy()))?;
        progress.worked(1)?;
        Ok(ExportReport {
            exported: visible.len() - merged.skipped.len(),
            skipped: merged.skipped,
            unclassified: Vec::new(),
        })
    }

    fn file_extension(&self) -> &str {
        FILE_EXTENSION
    }
}

#[cfg(test)]
mod tests;
