//! Download requests and content kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::queue::SessionId;

/// The kind of content a library holds. Drives layout and renaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[serde(alias = "movie", alias = "film", alias = "films")]
    Movies,
    #[serde(alias = "tv", alias = "show", alias = "shows")]
    Series,
    Anime,
    #[serde(rename = "documentary", alias = "documentaries")]
    Documentaries,
    Docuseries,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        Self::Movies,
        Self::Series,
        Self::Anime,
        Self::Documentaries,
        Self::Docuseries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movies => "movies",
            Self::Series => "series",
            Self::Anime => "anime",
            Self::Documentaries => "documentary",
            Self::Docuseries => "docuseries",
        }
    }

    /// Episodic content, organized in `Season NN` folders.
    pub fn is_series(&self) -> bool {
        matches!(self, Self::Series | Self::Anime | Self::Docuseries)
    }

    /// Parse a user-supplied kind, accepting common singular/plural forms.
    pub fn normalize(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" | "film" | "films" => Some(Self::Movies),
            "series" | "tv" | "show" | "shows" => Some(Self::Series),
            "anime" => Some(Self::Anime),
            "documentary" | "documentaries" => Some(Self::Documentaries),
            "docuseries" => Some(Self::Docuseries),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to download one link into a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub session: SessionId,
    /// Library name, matched case-insensitively.
    pub library: String,
    /// Link handed to the download tool.
    pub uri: String,
    /// Content title; names the content folder and renamed files.
    pub title: String,
    /// Target season for series-like libraries.
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub year: Option<u32>,
    /// Multi-file transfer.
    #[serde(default)]
    pub grouped: bool,
    /// Label shown in the queue; defaults to the link.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl DownloadRequest {
    pub fn new(
        session: impl Into<SessionId>,
        library: impl Into<String>,
        uri: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            session: session.into(),
            library: library.into(),
            uri: uri.into(),
            title: title.into(),
            season: None,
            year: None,
            grouped: false,
            display_name: None,
        }
    }

    pub fn with_season(mut self, season: u32) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn grouped(mut self, grouped: bool) -> Self {
        self.grouped = grouped;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Label used for the queued task.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.uri)
    }
}
