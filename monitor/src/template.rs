//! Message templating with `{name}` placeholders.
//!
//! Templates are parsed once into a [`Template`] which validates every
//! placeholder against the fixed variable set. Rendering a parsed template is
//! infallible, so a bad template is reported as a configuration error before
//! any substitution happens.
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{filename}` | file name |
//! | `{dir}` | containing directory |
//! | `{dirdate}` | detection time, `YYYY-MM-DD HH:MM:SS` |
//! | `{filesize}` | human-readable size |
//! | `{filetype}` | extension with leading dot |
//! | `{filepath}` | absolute path |
//! | `{time}` | `HH:MM:SS` |
//! | `{date}` | `YYYY-MM-DD` |
//! | `{timestamp}` | Unix seconds |
//! | `{foldername}` | name of the containing directory |
//! | `{filecount}` | regular files in the containing directory |
//! | `{filehash}` | MD5 hex digest |
//! | `{alert}` | `@everyone` |
//! | `{rtnfile}` | same as `{dir}` |
//!
//! `{{` and `}}` produce literal braces.
//!
//! # Example
//!
//! ```
//! use chrono::Local;
//! use hookwatch_monitor::metadata::FileMetadata;
//! use hookwatch_monitor::template::render;
//!
//! let meta = FileMetadata::sample(Local::now());
//! let text = render("New: {filename} in {dir}", &meta).unwrap();
//! assert_eq!(text, "New: test.txt in /test");
//! ```

use std::str::FromStr;

use thiserror::Error;

use crate::metadata::FileMetadata;

/// Literal substituted for `{alert}`.
pub const ALERT_MENTION: &str = "@everyone";

/// Every placeholder name a template may reference.
pub const VARIABLES: [&str; 14] = [
    "filename",
    "dir",
    "dirdate",
    "filesize",
    "filetype",
    "filepath",
    "time",
    "date",
    "timestamp",
    "foldername",
    "filecount",
    "filehash",
    "alert",
    "rtnfile",
];

/// Errors produced while parsing a template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template references a name outside [`VARIABLES`].
    #[error("unknown placeholder {{{name}}}")]
    UnknownPlaceholder { name: String },

    /// Unbalanced brace at the given byte offset.
    #[error("unmatched '{brace}' at position {position}")]
    Malformed { brace: char, position: usize },
}

/// A recognised template variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Filename,
    Dir,
    DirDate,
    FileSize,
    FileType,
    FilePath,
    Time,
    Date,
    Timestamp,
    FolderName,
    FileCount,
    FileHash,
    Alert,
    RtnFile,
}

impl Variable {
    /// Resolves this variable against `meta`.
    #[must_use]
    pub fn value(self, meta: &FileMetadata) -> String {
        match self {
            Self::Filename => meta.filename.clone(),
            Self::Dir | Self::RtnFile => meta.directory_path().to_string(),
            Self::DirDate => meta.detected_at_iso(),
            Self::FileSize => meta.human_size(),
            Self::FileType => meta.extension.clone(),
            Self::FilePath => meta.absolute_path.clone(),
            Self::Time => meta.time_of_day(),
            Self::Date => meta.date_only(),
            Self::Timestamp => meta.unix_timestamp().to_string(),
            Self::FolderName => meta.parent_folder_name.clone(),
            Self::FileCount => meta.sibling_count_label(),
            Self::FileHash => meta.content_hash_label(),
            Self::Alert => ALERT_MENTION.to_string(),
        }
    }
}

impl FromStr for Variable {
    type Err = TemplateError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let var = match name {
            "filename" => Self::Filename,
            "dir" => Self::Dir,
            "dirdate" => Self::DirDate,
            "filesize" => Self::FileSize,
            "filetype" => Self::FileType,
            "filepath" => Self::FilePath,
            "time" => Self::Time,
            "date" => Self::Date,
            "timestamp" => Self::Timestamp,
            "foldername" => Self::FolderName,
            "filecount" => Self::FileCount,
            "filehash" => Self::FileHash,
            "alert" => Self::Alert,
            "rtnfile" => Self::RtnFile,
            _ => {
                return Err(TemplateError::UnknownPlaceholder {
                    name: name.to_string(),
                })
            }
        };
        Ok(var)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(Variable),
}

/// A validated message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses and validates `source`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownPlaceholder`] for the first name not in
    /// [`VARIABLES`] and [`TemplateError::Malformed`] for unbalanced braces.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let start = pos + 1;
                    let end = source[start..]
                        .find('}')
                        .map(|offset| start + offset)
                        .ok_or(TemplateError::Malformed {
                            brace: '{',
                            position: pos,
                        })?;
                    let var: Variable = source[start..end].parse()?;

                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Var(var));

                    while chars.peek().is_some_and(|&(i, _)| i <= end) {
                        chars.next();
                    }
                }
                '}' => {
                    return Err(TemplateError::Malformed {
                        brace: '}',
                        position: pos,
                    })
                }
                _ => text.push(c),
            }
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variables referenced by the template, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var(v) => Some(*v),
            Segment::Text(_) => None,
        })
    }

    /// Substitutes `meta` into the template.
    #[must_use]
    pub fn render(&self, meta: &FileMetadata) -> String {
        let mut out = String::with_capacity(self.source.len() + 64);
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Var(v) => out.push_str(&v.value(meta)),
            }
        }
        out
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parses `template` and renders it against `meta` in one step.
///
/// # Errors
///
/// See [`Template::parse`].
pub fn render(template: &str, meta: &FileMetadata) -> Result<String, TemplateError> {
    Ok(Template::parse(template)?.render(meta))
}
