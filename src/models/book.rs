use serde::{Deserialize, Serialize};

use super::BookId;

/// A book author as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

/// A catalog book with its authors already expanded
///
/// Only the title is required. Every bibliographic field is kept exactly as
/// the catalog returned it, so an absent publisher stays `None` rather than
/// becoming an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: BookId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub work_id: Option<String>,
    #[serde(default)]
    pub edition_information: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub num_pages: Option<i32>,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub series_name: Option<String>,
    #[serde(default)]
    pub series_position: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
}

impl BookRecord {
    /// Creates a record with only the required fields set
    pub fn new(id: impl Into<BookId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            language: None,
            work_id: None,
            edition_information: None,
            publisher: None,
            num_pages: None,
            series_id: None,
            series_name: None,
            series_position: None,
            authors: Vec::new(),
        }
    }

    /// First listed author, if any
    pub fn primary_author(&self) -> Option<&Author> {
        self.authors.first()
    }
}
