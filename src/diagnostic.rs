//! Typed, positioned diagnostic records.
//!
//! Every failure in the parser and postprocessor produces a [`Diagnostic`]
//! rather than propagating an error across component boundaries (see
//! spec §7). Severity is a property of the [`DiagnosticKind`], not
//! something callers choose per-instance, mirroring the class-attribute
//! `severity` pattern in the original implementation's diagnostics
//! hierarchy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A 1-based line, optional column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: Option<u32>,
}

impl Position {
    pub fn new(line: u32, column: Option<u32>) -> Self {
        Position { line, column }
    }

    pub fn line_only(line: u32) -> Self {
        Position { line, column: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// The non-exhaustive kind list from spec §7, given exact severities
/// from the original implementation's diagnostics hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    UnexpectedIndentation,
    InvalidURL,
    ExpectedPathArg { name: PathBuf },
    ExpectedImgArg,
    ImgExpectedButNotRequired,
    OptionsNotSupported { names: Vec<String> },
    GitMergeConflictArtifactFound { path: PathBuf },
    DocUtilsParseError { message: String },
    ErrorParsingYAMLFile { path: PathBuf, reason: String },
    InvalidLiteralInclude { message: String },
    SubstitutionRefError { message: String },
    InvalidTableStructure { message: String },
    MissingOption { name: String },
    MissingRef { name: String },
    FailedToInheritRef { message: String },
    RefAlreadyExists { message: String },
    UnknownSubstitution { name: String },
    TargetNotFound { key: String },
    AmbiguousTarget { key: String, count: usize },
    TodoInfo { message: String },
    ErrorLoadingFile { path: PathBuf, reason: String },
    CannotOpenFile { path: PathBuf, reason: String },
    MissingFacet { name: String },
    ConstantNotDeclared { name: String },
    ConfigurationProblem { message: String },
    UnsupportedFormat { format: String },
    UnknownOptionId { name: String },
    /// Catch-all for cases the other variants don't fit, carrying a
    /// free-form message. Used sparingly.
    Other { message: String },
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        use DiagnosticKind::*;
        match self {
            UnexpectedIndentation
            | InvalidURL
            | ExpectedPathArg { .. }
            | ExpectedImgArg
            | OptionsNotSupported { .. }
            | GitMergeConflictArtifactFound { .. }
            | ErrorParsingYAMLFile { .. }
            | InvalidLiteralInclude { .. }
            | SubstitutionRefError { .. }
            | InvalidTableStructure { .. }
            | MissingOption { .. }
            | MissingRef { .. }
            | FailedToInheritRef { .. }
            | RefAlreadyExists { .. }
            | TargetNotFound { .. }
            | AmbiguousTarget { .. }
            | ErrorLoadingFile { .. }
            | CannotOpenFile { .. }
            | MissingFacet { .. }
            | ConstantNotDeclared { .. }
            | ConfigurationProblem { .. }
            | UnsupportedFormat { .. }
            | UnknownOptionId { .. }
            | Other { .. } => Severity::Error,

            ImgExpectedButNotRequired | DocUtilsParseError { .. } | UnknownSubstitution { .. } => {
                Severity::Warning
            }

            TodoInfo { .. } => Severity::Info,
        }
    }

    pub fn message(&self) -> String {
        use DiagnosticKind::*;
        match self {
            UnexpectedIndentation => "unexpected indentation".to_string(),
            InvalidURL => "invalid URL".to_string(),
            ExpectedPathArg { name } => format!("expected a path argument, got {name:?}"),
            ExpectedImgArg => "expected an image path argument".to_string(),
            ImgExpectedButNotRequired => "image argument given but not required".to_string(),
            OptionsNotSupported { names } => format!("options not supported: {}", names.join(", ")),
            GitMergeConflictArtifactFound { path } => {
                format!("git merge conflict artifact found in {}", path.display())
            }
            DocUtilsParseError { message } => message.clone(),
            ErrorParsingYAMLFile { path, reason } => {
                format!("error parsing YAML file {}: {reason}", path.display())
            }
            InvalidLiteralInclude { message } => message.clone(),
            SubstitutionRefError { message } => message.clone(),
            InvalidTableStructure { message } => message.clone(),
            MissingOption { name } => format!("missing required option '{name}'"),
            MissingRef { name } => format!("missing ref: {name}"),
            FailedToInheritRef { message } => message.clone(),
            RefAlreadyExists { message } => message.clone(),
            UnknownSubstitution { name } => format!("unknown substitution '{name}'"),
            TargetNotFound { key } => format!("target not found: {key}"),
            AmbiguousTarget { key, count } => format!("ambiguous target '{key}': {count} matches"),
            TodoInfo { message } => message.clone(),
            ErrorLoadingFile { path, reason } => {
                format!("error loading file {}: {reason}", path.display())
            }
            CannotOpenFile { path, reason } => {
                format!("cannot open file {}: {reason}", path.display())
            }
            MissingFacet { name } => format!("missing facet '{name}'"),
            ConstantNotDeclared { name } => format!("constant '{name}' is not declared"),
            ConfigurationProblem { message } => message.clone(),
            UnsupportedFormat { format } => format!("unsupported format '{format}'"),
            UnknownOptionId { name } => format!("unknown option id '{name}'"),
            Other { message } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub start: Position,
    pub end: Position,
}

impl Diagnostic {
    /// Matches the original's `Diagnostic.__init__`: an int-or-tuple
    /// start normalizes to `(line, column)`; end defaults to a wide
    /// column on the start line so the whole line is underlined.
    pub fn new(kind: DiagnosticKind, start_line: u32) -> Self {
        Diagnostic {
            kind,
            start: Position::line_only(start_line),
            end: Position::new(start_line, Some(1000)),
        }
    }

    pub fn with_span(kind: DiagnosticKind, start: Position, end: Position) -> Self {
        Diagnostic { kind, start, end }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn message(&self) -> String {
        self.kind.message()
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.start.line,
            self.start.column.unwrap_or(0),
            self.severity(),
            self.message()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_matches_known_kinds() {
        assert_eq!(
            DiagnosticKind::TodoInfo {
                message: "x".into()
            }
            .severity(),
            Severity::Info
        );
        assert_eq!(
            DiagnosticKind::UnknownSubstitution { name: "x".into() }.severity(),
            Severity::Warning
        );
        assert_eq!(
            DiagnosticKind::MissingRef { name: "x".into() }.severity(),
            Severity::Error
        );
    }

    #[test]
    fn new_defaults_wide_end_column() {
        let d = Diagnostic::new(DiagnosticKind::TodoInfo { message: "hi".into() }, 4);
        assert_eq!(d.start.line, 4);
        assert_eq!(d.end.column, Some(1000));
    }
}
