use std::path::PathBuf;

/// Content could not be read as the selected report format.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("missing root element: {0}")]
    MissingRoot(String),

    #[error("unexpected report shape: {0}")]
    Shape(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Unsupported test framework: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported file extension '{extension}' for {}. Please specify the report format manually", path.display())]
    UnsupportedExtension { path: PathBuf, extension: String },

    #[error("Unable to auto-detect the report format of {}. Please specify the report format manually", path.display())]
    AmbiguousFormat { path: PathBuf },

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Parse { path, .. }
            | Self::UnsupportedExtension { path, .. }
            | Self::AmbiguousFormat { path }
            | Self::Io { path, .. } => Some(path),
            Self::UnsupportedFormat(_) => None,
        }
    }
}
