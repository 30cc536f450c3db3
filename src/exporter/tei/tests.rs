use std::{collections::BTreeSet, fs, sync::mpsc};

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use super::*;
use crate::{
    models::annotation::Visibility,
    test_util::{annotation, comment, tag, timestamp, user, xpath},
    workflow::StatusMessage,
};

fn tei_range(start: &str, end: &str) -> Value {
    json!([{"start": 10, "end": 20, "startSelector": xpath(start), "endSelector": xpath(end)}])
}

fn scenario_annotation() -> Annotation {
    let mut a = annotation("a1", Some(tei_range("//p[1]", "//p[1]")));
    a.target.created = Some(timestamp("2024-01-01T00:00:00Z"));
    a.target.creator = Some(user("u1", "Alice"));
    let mut body = comment("b1", "a1", "hello");
    body.created = Some(timestamp("2024-01-02T00:00:00Z"));
    a.bodies.push(body);
    a
}

#[test]
fn serialize_custom() {
    let module: ExportTei = toml::from_str(
        r#"
        source = "letter.xml"
        include_private = true
        last_change = "latest"
        "#,
    )
    .unwrap();
    assert_eq!(
        ExportTei {
            source: PathBuf::from("letter.xml"),
            include_private: true,
            last_change: LastChange::Latest,
        },
        module
    );
    let module: ExportTei = toml::from_str(r#"source = "letter.xml""#).unwrap();
    assert_eq!(LastChange::Earliest, module.last_change);
    assert!(toml::from_str::<ExportTei>("include_private = true").is_err());
}

#[test]
fn merge_into_document_without_header() {
    let merged = merge_annotations("<TEI><text/></TEI>", &[scenario_annotation()]).unwrap();
    assert_eq!(
        concat!(
            "<TEI><teiHeader><standOff><listAnnotation>",
            r##"<annotation xml:id="#a1" target="//p[1] //p[1]">"##,
            "<revisionDesc>",
            r##"<change status="created" when="2024-01-01T00:00:00.000Z" who="#Alice"/>"##,
            r##"<change status="modified" when="2024-01-01T00:00:00.000Z" who="#Alice"/>"##,
            "</revisionDesc>",
            "<note>hello</note>",
            "</annotation></listAnnotation></standOff></teiHeader><text/></TEI>"
        ),
        merged
    );
}

#[test]
fn header_is_the_first_child_of_the_root() {
    let merged = merge_annotations("<TEI><text/></TEI>", &[scenario_annotation()]).unwrap();
    let doc = roxmltree::Document::parse(&merged).unwrap();
    let first = doc.root_element().first_element_child().unwrap();
    assert_eq!("teiHeader", first.tag_name().name());
    let stand_off = first.last_element_child().unwrap();
    assert_eq!("standOff", stand_off.tag_name().name());
}

#[test]
fn stand_off_is_the_last_child_of_an_existing_header() {
    let source = "<TEI><teiHeader><fileDesc><title>T</title></fileDesc><teiHeader/></teiHeader><text/></TEI>";
    let merged = merge_annotations(source, &[scenario_annotation()]).unwrap();
    assert!(merged.starts_with(
        "<TEI><teiHeader><fileDesc><title>T</title></fileDesc><teiHeader/><standOff>"
    ));
    assert!(merged.ends_with("</standOff></teiHeader><text/></TEI>"));
}

#[test]
fn empty_header_element_is_expanded() {
    let merged = merge_annotations("<TEI><teiHeader/><text/></TEI>", &[]).unwrap();
    assert_eq!(
        "<TEI><teiHeader><standOff><listAnnotation></listAnnotation></standOff></teiHeader><text/></TEI>",
        merged
    );
    let merged = merge_annotations("<TEI/>", &[]).unwrap();
    assert_eq!(
        "<TEI><teiHeader><standOff><listAnnotation></listAnnotation></standOff></teiHeader></TEI>",
        merged
    );
}

#[test]
fn content_outside_the_insertion_point_is_kept() {
    let source = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<!-- letter -->\n",
        "<TEI xmlns=\"http://www.tei-c.org/ns/1.0\">\n",
        "  <teiHeader>\n    <fileDesc/>\n  </teiHeader>\n",
        "  <text><body><p n=\"1\">a &amp; b<![CDATA[<raw>]]></p></body></text>\n",
        "</TEI>\n"
    );
    let merged = merge_annotations(source, &[]).unwrap();
    assert_eq!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!-- letter -->\n",
            "<TEI xmlns=\"http://www.tei-c.org/ns/1.0\">\n",
            "  <teiHeader>\n    <fileDesc/>\n  ",
            "<standOff><listAnnotation></listAnnotation></standOff></teiHeader>\n",
            "  <text><body><p n=\"1\">a &amp; b<![CDATA[<raw>]]></p></body></text>\n",
            "</TEI>\n"
        ),
        merged
    );
}

#[test]
fn entities_expanding_to_markup_do_not_move_the_header() {
    let source = r#"<!DOCTYPE TEI [<!ENTITY sig "<hi>x</hi>">]><TEI><text>&sig;</text><teiHeader/></TEI>"#;
    let merged = merge_annotations(source, &[scenario_annotation()]).unwrap();
    assert!(merged.starts_with(r#"<!DOCTYPE TEI [<!ENTITY sig "<hi>x</hi>">]>"#));
    assert!(merged.contains(
        r##"<text>&sig;</text><teiHeader><standOff><listAnnotation><annotation xml:id="#a1""##
    ));
    assert!(merged.ends_with("</standOff></teiHeader></TEI>"));

    let mut options = roxmltree::ParsingOptions::default();
    options.allow_dtd = true;
    let doc = roxmltree::Document::parse_with_options(&merged, options).unwrap();
    let annotations = doc
        .descendants()
        .filter(|n| n.has_tag_name("annotation"))
        .count();
    assert_eq!(1, annotations);
}

#[test]
fn one_annotation_element_per_input_with_distinct_ids() {
    let mut annotations = Vec::new();
    for i in 0..5 {
        let mut a = annotation(&format!("a{i}"), Some(tei_range("//p[1]", "//p[2]")));
        a.bodies.push(comment(&format!("b{i}"), &format!("a{i}"), "x"));
        annotations.push(a);
    }
    annotations.push(annotation("note", None));

    let merged = merge_annotations("<TEI><text/></TEI>", &annotations).unwrap();
    let doc = roxmltree::Document::parse(&merged).unwrap();
    let list = doc
        .descendants()
        .find(|n| n.has_tag_name("listAnnotation"))
        .unwrap();
    let ids: Vec<_> = list
        .children()
        .filter(|n| n.has_tag_name("annotation"))
        .map(|n| {
            n.attribute(("http://www.w3.org/XML/1998/namespace", "id"))
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(annotations.len(), ids.len());
    assert_eq!(ids.len(), ids.iter().collect::<BTreeSet<_>>().len());
    assert_eq!("#note", ids[5]);
}

#[test]
fn merge_is_repeatable_against_the_original() {
    let source = "<TEI><teiHeader/><text><p>x</p></text></TEI>";
    let annotations = vec![scenario_annotation()];
    let first = merge_annotations(source, &annotations).unwrap();
    let second = merge_annotations(source, &annotations).unwrap();
    assert_eq!(first, second);

    let twice = merge_annotations(&first, &annotations).unwrap();
    assert_eq!(2, twice.matches("<standOff>").count());
}

#[test]
fn malformed_source_is_fatal() {
    for source in ["<TEI><text></TEI>", "", "just text"] {
        let result = merge_annotations(source, &[scenario_annotation()]);
        assert!(
            matches!(result, Err(ExportError::MalformedSourceDocument(_))),
            "{source:?} should have been rejected"
        );
    }
}

#[test]
fn other_profiles_are_skipped() {
    let image = annotation(
        "img",
        Some(json!({"type": "RECTANGLE", "geometry": {"x": 0, "y": 0, "w": 1, "h": 1}})),
    );
    let plain = annotation("plain", Some(json!([{"start": 0, "end": 1}])));
    let unknown = annotation("unknown", Some(json!({"type": "CIRCLE"})));
    let merged = merge_with(
        "<TEI/>",
        &[image, scenario_annotation(), plain, unknown],
        LastChange::Earliest,
    )
    .unwrap();
    assert_eq!(vec!["img", "plain", "unknown"], merged.skipped);
    assert_eq!(1, merged.xml.matches("<annotation ").count());
}

#[test]
fn notes_and_tags() {
    let mut a = annotation("a1", None);
    a.bodies.push(comment("c1", "a1", "first & <second>"));
    a.bodies.push(tag("t1", "a1", "person"));
    let mut reply = comment("r1", "a1", "a reply");
    reply.purpose = Some(Purpose::Replying);
    a.bodies.push(reply);
    a.bodies.push(tag("t2", "a1", "place"));
    a.body = Some(comment("c2", "a1", "legacy"));

    let merged = merge_annotations("<TEI/>", &[a]).unwrap();
    assert!(merged.contains(
        r##"<annotation xml:id="#a1"><note>first &amp; &lt;second&gt;</note><note>legacy</note><rs ana="person place"/></annotation>"##
    ));
    assert!(!merged.contains("a reply"));
    assert!(!merged.contains("revisionDesc"));
}

fn annotation_with_history() -> Annotation {
    let mut a = annotation("a1", Some(tei_range("//p[1]", "//p[3]")));
    a.target.created = Some(timestamp("2024-01-01T00:00:00Z"));
    a.target.creator = Some(user("u1", "Alice"));
    let mut edited = comment("b1", "a1", "edited");
    edited.created = Some(timestamp("2024-01-02T00:00:00Z"));
    edited.updated = Some(timestamp("2024-03-01T00:00:00Z"));
    edited.creator = Some(user("u1", "Alice"));
    edited.updated_by = Some(user("u2", "Bob"));
    a.bodies.push(edited);
    let mut later = comment("b2", "a1", "later");
    later.created = Some(timestamp("2024-02-01T00:00:00Z"));
    later.creator = Some(user("u3", "Carol"));
    a.bodies.push(later);
    a
}

#[test]
fn last_change_earliest() {
    let changes = revisions(&annotation_with_history(), LastChange::Earliest);
    assert_eq!(
        Change {
            status: "modified",
            when: timestamp("2024-01-01T00:00:00Z"),
            who: Some("#Alice".to_string()),
        },
        changes[1]
    );
}

#[test]
fn last_change_latest() {
    let changes = revisions(&annotation_with_history(), LastChange::Latest);
    assert_eq!(2, changes.len());
    assert_eq!(
        Change {
            status: "modified",
            when: timestamp("2024-03-01T00:00:00Z"),
            who: Some("#Bob".to_string()),
        },
        changes[1]
    );
}

#[test]
fn unresolvable_users_are_omitted() {
    let mut a = annotation("a1", None);
    a.target.created = Some(timestamp("2024-01-01T00:00:00Z"));
    a.target.creator = Some(crate::models::annotation::UserRef {
        id: "u9".to_string(),
        name: None,
    });
    let changes = revisions(&a, LastChange::Earliest);
    assert_eq!(
        vec![Change {
            status: "modified",
            when: timestamp("2024-01-01T00:00:00Z"),
            who: None,
        }],
        changes
    );
}

#[test]
fn export_to_directory() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("letter.xml"), "<TEI><text/></TEI>").unwrap();
    let mut private = scenario_annotation();
    private.id = "private".to_string();
    private.visibility = Visibility::Private;
    let image = annotation(
        "img",
        Some(json!({"type": "RECTANGLE", "geometry": {"x": 0, "y": 0, "w": 1, "h": 1}})),
    );
    let annotations = vec![scenario_annotation(), private, image];

    let module = ExportTei {
        source: PathBuf::from("letter.xml"),
        include_private: false,
        last_change: LastChange::Earliest,
    };
    let input = ExportInput {
        annotations: &annotations,
        scope: "doc-1",
        workflow_directory: tmp.path(),
    };
    let (tx, rx) = mpsc::channel();
    let step_id = StepID {
        module_name: "export_tei".to_string(),
        path: None,
    };
    let report = module
        .export_annotations(&input, &tmp.path().join("out"), step_id, Some(tx))
        .unwrap();
    assert_eq!(1, report.exported);
    assert_eq!(vec!["img"], report.skipped);

    let written = fs::read_to_string(tmp.path().join("out/letter.xml")).unwrap();
    assert!(written.contains(r##"xml:id="#a1""##));
    assert!(!written.contains(r##"xml:id="#private""##));
    let warnings: Vec<_> = rx
        .try_iter()
        .filter_map(|m| match m {
            StatusMessage::Warning(msg) => Some(msg),
            _ => None,
        })
        .collect();
    assert_eq!(1, warnings.len());
    assert!(warnings[0].contains("img"));
    // the source is left untouched
    assert_eq!(
        "<TEI><text/></TEI>",
        fs::read_to_string(tmp.path().join("letter.xml")).unwrap()
    );
}
