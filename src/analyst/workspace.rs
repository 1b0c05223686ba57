use super::error::{AnalystError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

pub const QUESTIONS_FILE: &str = "questions.txt";

/// A file received from the caller, before it is written to disk.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Scratch directory owned by exactly one request. Removed recursively when
/// dropped, whichever way the request ends.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(request_id: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("task_{}_", request_id))
            .tempdir()?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an uploaded file into the workspace under its bare filename.
    pub fn store(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let file_name = sanitize_file_name(name)?;
        std::fs::write(self.dir.path().join(&file_name), bytes)?;
        Ok(file_name)
    }
}

fn sanitize_file_name(name: &str) -> Result<String> {
    let candidate = Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::trim)
        .unwrap_or("");
    // Windows-style paths are not split by Path on unix
    let candidate = candidate.rsplit('\\').next().unwrap_or(candidate);
    if candidate.is_empty() || candidate == "." || candidate == ".." {
        return Err(AnalystError::InvalidRequest(format!(
            "invalid upload filename '{}'",
            name
        )));
    }
    Ok(candidate.to_string())
}

/// Decode text, silently dropping byte sequences that are not valid UTF-8.
pub fn decode_lenient(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

pub struct RequestContext {
    pub request_id: String,
    pub files: Vec<String>,
    pub question: String,
    workspace: Workspace,
}

impl RequestContext {
    pub fn from_uploads(uploads: Vec<Upload>) -> Result<Self> {
        let request_id = new_request_id();
        let workspace = Workspace::create(&request_id)?;

        let mut files: Vec<String> = Vec::new();
        let mut question: Option<String> = None;
        for upload in &uploads {
            let stored = workspace.store(&upload.name, &upload.bytes)?;
            if stored.eq_ignore_ascii_case(QUESTIONS_FILE) {
                question = Some(decode_lenient(&upload.bytes));
            }
            if !files.contains(&stored) {
                files.push(stored);
            }
        }

        Self::finish(request_id, workspace, files, question)
    }

    /// Build a context from files already on disk (CLI path).
    pub fn from_paths(questions: &Path, attachments: &[PathBuf]) -> Result<Self> {
        let mut uploads = Vec::with_capacity(attachments.len() + 1);
        uploads.push(Upload::new(QUESTIONS_FILE, std::fs::read(questions)?));
        for path in attachments {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    AnalystError::InvalidRequest(format!(
                        "attachment path has no filename: {}",
                        path.display()
                    ))
                })?;
            uploads.push(Upload::new(name, std::fs::read(path)?));
        }
        Self::from_uploads(uploads)
    }

    fn finish(
        request_id: String,
        workspace: Workspace,
        files: Vec<String>,
        question: Option<String>,
    ) -> Result<Self> {
        let question = match question {
            Some(text) if !text.trim().is_empty() => text,
            Some(_) => {
                return Err(AnalystError::InvalidRequest(format!(
                    "{} is empty",
                    QUESTIONS_FILE
                )))
            }
            None => {
                return Err(AnalystError::InvalidRequest(format!(
                    "{} is required",
                    QUESTIONS_FILE
                )))
            }
        };

        info!(
            request_id = %request_id,
            files = files.len(),
            question_chars = question.len(),
            "Request workspace ready"
        );

        Ok(Self {
            request_id,
            files,
            question,
            workspace,
        })
    }

    pub fn workdir(&self) -> &Path {
        self.workspace.path()
    }

    pub fn attachments(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .map(String::as_str)
            .filter(|name| !name.eq_ignore_ascii_case(QUESTIONS_FILE))
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
