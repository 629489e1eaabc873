use anyhow::Context;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::db::types::ExamType;

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 54;
const BODY_FONT_SIZE: i64 = 11;
const TITLE_FONT_SIZE: i64 = 16;
const LEADING: i64 = 16;
const MAX_LINE_CHARS: usize = 88;
const LINES_PER_PAGE: usize = 44;

/// Renders a completed exam into a paginated PDF: a title block followed by
/// one line-wrapped entry per answer. Plain formatting, no layout engine.
pub(crate) fn assemble_submission_pdf(
    exam_title: &str,
    exam_type: ExamType,
    examinee_name: &str,
    examinee_id: &str,
    submitted_at: &str,
    answers: &serde_json::Value,
) -> anyhow::Result<Vec<u8>> {
    let mut lines = Vec::new();
    lines.push(format!("Examinee: {examinee_name} ({examinee_id})"));
    lines.push(format!("Exam type: {}", exam_type.as_str()));
    lines.push(format!("Submitted: {submitted_at}"));
    lines.push(String::new());
    lines.extend(answer_lines(answers));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for (index, chunk) in lines.chunks(LINES_PER_PAGE).enumerate() {
        let title = if index == 0 { Some(exam_title) } else { None };
        let content = Content { operations: page_operations(title, chunk) };
        let encoded = content.encode().context("Failed to encode page content")?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0i64.into(), 0i64.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).context("Failed to serialize PDF document")?;
    Ok(bytes)
}

fn page_operations(title: Option<&str>, lines: &[String]) -> Vec<Operation> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), BODY_FONT_SIZE.into()]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
    ];

    if let Some(title) = title {
        operations.push(Operation::new("Tf", vec!["F1".into(), TITLE_FONT_SIZE.into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(title)]));
        operations.push(Operation::new("T*", vec![]));
        operations.push(Operation::new("T*", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), BODY_FONT_SIZE.into()]));
    }

    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
        operations.push(Operation::new("T*", vec![]));
    }

    operations.push(Operation::new("ET", vec![]));
    operations
}

/// Flattens the opaque answers blob into display lines, one entry per
/// question key, wrapped to the page width.
fn answer_lines(answers: &serde_json::Value) -> Vec<String> {
    let mut lines = Vec::new();

    match answers {
        serde_json::Value::Object(entries) => {
            for (key, value) in entries {
                push_wrapped(&mut lines, &format!("{key}: {}", value_text(value)));
            }
        }
        serde_json::Value::Array(entries) => {
            for (index, value) in entries.iter().enumerate() {
                push_wrapped(&mut lines, &format!("{}. {}", index + 1, value_text(value)));
            }
        }
        other => push_wrapped(&mut lines, &value_text(other)),
    }

    if lines.is_empty() {
        lines.push("(no answers recorded)".to_string());
    }

    lines
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => "(blank)".to_string(),
        other => other.to_string(),
    }
}

fn push_wrapped(lines: &mut Vec<String>, text: &str) {
    for raw_line in text.split('\n') {
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if current.len() + 1 + word.len() <= MAX_LINE_CHARS {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        lines.push(current);
    }
}
