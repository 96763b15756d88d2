use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::LexError;

pub const MAX_SOURCE_SIZE: u64 = 1 << 20;


/// One compilation unit: the name used in diagnostics plus the full text.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    name: String,
    text: String,
    line_starts: Vec<usize>,
}

impl Source {
    pub fn new(name: &str, text: &str) -> Source {
        // A vertical tab starts a new line, as it does in the lexer.
        let line_starts = std::iter::once(0)
            .chain(text.match_indices(|c| c == '\n' || c == '\x0b').map(|(i, _)| i + 1))
            .collect();
        Source {
            name: name.to_string(),
            text: text.to_string(),
            line_starts,
        }
    }

    pub fn load(path: &Path) -> Result<Source, LexError> {
        if path.as_os_str().is_empty() {
            return Err(LexError::InvalidPath);
        }

        let metadata = fs::metadata(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => LexError::NotFound(path.to_path_buf()),
            _ => LexError::Unreadable { path: path.to_path_buf(), source: err },
        })?;

        if metadata.len() > MAX_SOURCE_SIZE {
            return Err(LexError::TooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: MAX_SOURCE_SIZE,
            });
        }
        if metadata.len() == 0 {
            return Err(LexError::Empty(path.to_path_buf()));
        }

        let text = fs::read_to_string(path).map_err(|err| LexError::Unreadable {
            path: PathBuf::from(path),
            source: err,
        })?;
        Ok(Source::new(&path.display().to_string(), &text))
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn text(&self) -> &str { &self.text }

    /// Text of a 1-based line, without its terminating newline.
    pub fn line(&self, line: u32) -> Option<&str> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let end = self.line_starts.get(idx + 1)
            .map(|&next| next - 1)
            .unwrap_or_else(|| self.text.len());
        Some(self.text[start..end].trim_end_matches('\r'))
    }
}
