//! Write operations as handed to a backend, plus their options and results.

use bson::Document;
use chrono::{DateTime, Utc};

use crate::{path::ResourcePath, value::UpdateData};

/// A condition the stored document must satisfy for a write to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// The document must (or must not) exist.
    Exists(bool),
    /// The document must exist with exactly this update time.
    UpdateTime(DateTime<Utc>),
}

/// How a `set` combines with the stored document.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SetMode {
    /// Replace the whole document.
    #[default]
    Overwrite,
    /// Deep-merge the supplied fields into the stored document.
    Merge,
    /// Copy only the listed field paths from the supplied data.
    MergeFields(Vec<String>),
}

/// Options for `set` writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    pub mode: SetMode,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { mode: SetMode::Merge }
    }

    pub fn merge_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { mode: SetMode::MergeFields(fields.into_iter().map(Into::into).collect()) }
    }
}

/// Optional parameters for `update` and `delete`.
///
/// Preconditions are honoured by direct accessors only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteParams {
    pub precondition: Option<Precondition>,
}

impl WriteParams {
    pub fn exists(exists: bool) -> Self {
        Self { precondition: Some(Precondition::Exists(exists)) }
    }

    pub fn last_update_time(update_time: DateTime<Utc>) -> Self {
        Self { precondition: Some(Precondition::UpdateTime(update_time)) }
    }
}

/// A single mutation of one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Set {
        path: ResourcePath,
        data: Document,
        mode: SetMode,
        precondition: Option<Precondition>,
    },
    Update {
        path: ResourcePath,
        fields: UpdateData,
        precondition: Option<Precondition>,
    },
    Delete {
        path: ResourcePath,
        precondition: Option<Precondition>,
    },
}

impl Write {
    /// A set that fails if the document already exists.
    pub fn create(path: ResourcePath, data: Document) -> Self {
        Write::Set {
            path,
            data,
            mode: SetMode::Overwrite,
            precondition: Some(Precondition::Exists(false)),
        }
    }

    pub fn set(path: ResourcePath, data: Document, options: Option<SetOptions>) -> Self {
        Write::Set {
            path,
            data,
            mode: options.unwrap_or_default().mode,
            precondition: None,
        }
    }

    /// An update; without an explicit precondition the document must exist.
    pub fn update(path: ResourcePath, fields: UpdateData, precondition: Option<Precondition>) -> Self {
        Write::Update {
            path,
            fields,
            precondition: Some(precondition.unwrap_or(Precondition::Exists(true))),
        }
    }

    pub fn delete(path: ResourcePath, precondition: Option<Precondition>) -> Self {
        Write::Delete { path, precondition }
    }

    pub fn path(&self) -> &ResourcePath {
        match self {
            Write::Set { path, .. } | Write::Update { path, .. } | Write::Delete { path, .. } => path,
        }
    }

    pub fn precondition(&self) -> Option<&Precondition> {
        match self {
            Write::Set { precondition, .. }
            | Write::Update { precondition, .. }
            | Write::Delete { precondition, .. } => precondition.as_ref(),
        }
    }
}

/// The outcome of one write.
///
/// Writes staged on a transaction or batch resolve immediately with a
/// placeholder carrying no update time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WriteResult {
    update_time: Option<DateTime<Utc>>,
}

impl WriteResult {
    pub fn committed(update_time: DateTime<Utc>) -> Self {
        Self { update_time: Some(update_time) }
    }

    pub fn staged() -> Self {
        Self { update_time: None }
    }

    pub fn update_time(&self) -> Option<DateTime<Utc>> {
        self.update_time
    }

    pub fn is_staged(&self) -> bool {
        self.update_time.is_none()
    }
}
