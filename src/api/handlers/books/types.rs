//! Book records, list ordering, and form payloads.

use serde::Deserialize;
use time::{format_description::FormatItem, macros::format_description, Date};
use uuid::Uuid;

pub(crate) const DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// A book on the current user's shelf.
#[derive(Debug, Clone)]
pub struct Book {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub author: String,
    pub notes: Option<String>,
    pub rating: f64,
    pub date_read: Date,
    pub cover_url: String,
}

impl Book {
    /// Date formatted for display and for `<input type="date">` values.
    #[must_use]
    pub fn date_read_display(&self) -> String {
        self.date_read
            .format(DATE_FORMAT)
            .unwrap_or_else(|_| self.date_read.to_string())
    }
}

/// List ordering for the shelf page; unrecognized keys fall back to the
/// most-recently-read ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Rating,
    Title,
    #[default]
    DateRead,
}

impl SortKey {
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("rating") => Self::Rating,
            Some("title") => Self::Title,
            _ => Self::DateRead,
        }
    }

    /// ORDER BY clause; values are fixed here, never caller-supplied.
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            Self::Rating => "rating DESC",
            Self::Title => "title ASC",
            Self::DateRead => "date_read DESC",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rating => "rating",
            Self::Title => "title",
            Self::DateRead => "date_read",
        }
    }
}

/// Raw form body for add/edit. Numeric and date fields arrive as text and
/// are validated into a [`BookInput`] so bad input becomes a flash message
/// instead of a rejected request.
#[derive(Debug, Deserialize)]
pub struct BookForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub date_read: String,
    #[serde(default)]
    pub cover_url: Option<String>,
}

/// Validated book fields: required title/author/rating/date, optional notes.
#[derive(Debug, Clone, PartialEq)]
pub struct BookInput {
    pub title: String,
    pub author: String,
    pub notes: Option<String>,
    pub rating: f64,
    pub date_read: Date,
    pub cover_url: Option<String>,
}

impl BookForm {
    pub(crate) fn validate(self) -> Result<BookInput, &'static str> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err("Title is required.");
        }

        let author = self.author.trim().to_string();
        if author.is_empty() {
            return Err("Author is required.");
        }

        let rating: f64 = self
            .rating
            .trim()
            .parse()
            .map_err(|_| "Rating must be a number.")?;
        if !rating.is_finite() {
            return Err("Rating must be a number.");
        }

        let date_read = Date::parse(self.date_read.trim(), DATE_FORMAT)
            .map_err(|_| "Enter the date read as YYYY-MM-DD.")?;

        let notes = self
            .notes
            .map(|notes| notes.trim().to_string())
            .filter(|notes| !notes.is_empty());

        let cover_url = self
            .cover_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(BookInput {
            title,
            author,
            notes,
            rating,
            date_read,
            cover_url,
        })
    }
}
