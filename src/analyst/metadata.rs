use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

const PREVIEW_LINES: usize = 5;
const PREVIEW_CHARS: usize = 400;
const TEXT_EXTENSIONS: &[&str] = &["csv", "tsv", "txt", "json", "jsonl", "md"];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttachmentSummary {
    pub name: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Summaries of the uploaded attachments, in the order given. Files that
/// cannot be inspected are left out.
pub fn summarize_attachments<'a>(
    workdir: &Path,
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<AttachmentSummary> {
    names
        .into_iter()
        .filter_map(|name| match summarize(workdir, name) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Skipping attachment {} in prompt metadata: {}", name, e);
                None
            }
        })
        .collect()
}

fn summarize(workdir: &Path, name: &str) -> std::io::Result<AttachmentSummary> {
    let path = workdir.join(name);
    let size_bytes = std::fs::metadata(&path)?.len();
    let preview = if is_text_like(name) {
        Some(preview_of(&path)?)
    } else {
        None
    };
    Ok(AttachmentSummary {
        name: name.to_string(),
        size_bytes,
        preview,
    })
}

fn is_text_like(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            TEXT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn preview_of(path: &Path) -> std::io::Result<String> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut lines = Vec::with_capacity(PREVIEW_LINES);
    for line in reader.split(b'\n').take(PREVIEW_LINES) {
        let line = line?;
        lines.push(String::from_utf8_lossy(&line).trim_end_matches('\r').to_string());
    }
    Ok(clip(&lines.join("\n"), PREVIEW_CHARS))
}

fn clip(value: &str, max_chars: usize) -> String {
    let mut iter = value.chars();
    let collected: String = iter.by_ref().take(max_chars).collect();
    if iter.next().is_some() {
        format!("{}…", collected)
    } else {
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_gets_head_preview() {
        let dir = tempfile::tempdir().unwrap();
        let rows: String = (0..20).map(|i| format!("{},{}\r\n", i, i * 2)).collect();
        std::fs::write(dir.path().join("data.csv"), format!("x,y\r\n{}", rows)).unwrap();

        let summaries = summarize_attachments(dir.path(), ["data.csv"]);
        assert_eq!(summaries.len(), 1);
        let preview = summaries[0].preview.as_deref().unwrap();
        assert_eq!(preview, "x,y\n0,0\n1,2\n2,4\n3,6");
        assert!(summaries[0].size_bytes > 0);
    }

    #[test]
    fn binary_files_have_no_preview() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chart.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let summaries = summarize_attachments(dir.path(), ["chart.png"]);
        assert_eq!(
            summaries,
            vec![AttachmentSummary {
                name: "chart.png".into(),
                size_bytes: 4,
                preview: None,
            }]
        );
    }

    #[test]
    fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let summaries = summarize_attachments(dir.path(), ["gone.csv", "a.txt"]);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "a.txt");
    }

    #[test]
    fn long_previews_are_clipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wide.csv"), "c".repeat(1_000)).unwrap();
        let summaries = summarize_attachments(dir.path(), ["wide.csv"]);
        let preview = summaries[0].preview.as_deref().unwrap();
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 1);
        assert!(preview.ends_with('…'));
    }
}
