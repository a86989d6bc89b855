//! # Compliance Checklist
//!
//! The compliance view is an ordered list of sections, each holding an
//! ordered list of checklist items. An item is identified by the pair
//! `(section id, item id)`; that pair is unique within a view.
//!
//! The stream carries two message shapes, discriminated by an explicit
//! `type` tag:
//!
//! ```text
//! {"type":"full",  "sections":[{"id":"A","items":[{"id":"x","status":"pass"}]}], "timestamp":...}
//! {"type":"patch", "updates":[{"sectionId":"A","itemId":"x","status":"fail"}],   "timestamp":...}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp::WireTimestamp;

/// Outcome of a single compliance check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Check passed
    Pass,
    /// Check failed
    Fail,
    /// Check passed with caveats
    Warning,
    /// Not evaluated yet
    #[default]
    Unknown,
}

impl CheckStatus {
    /// Short lowercase label, matching the wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warning => "warning",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceItem {
    /// Identifier, unique within its section
    pub id: String,
    /// Current outcome
    pub status: CheckStatus,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Extra detail (failure reason, measured value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComplianceItem {
    /// Create an unlabeled item.
    pub fn new(id: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            id: id.into(),
            status,
            label: None,
            detail: None,
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach a detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A named group of checklist items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSection {
    /// Identifier, unique within the view
    pub id: String,
    /// Human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Items in display order
    #[serde(default)]
    pub items: Vec<ComplianceItem>,
}

impl ComplianceSection {
    /// Create an untitled section.
    pub fn new(id: impl Into<String>, items: Vec<ComplianceItem>) -> Self {
        Self {
            id: id.into(),
            title: None,
            items,
        }
    }

    /// Attach a title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Look up an item by id.
    pub fn item(&self, item_id: &str) -> Option<&ComplianceItem> {
        self.items.iter().find(|item| item.id == item_id)
    }
}

/// Per-status tally over a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Items that passed
    pub pass: usize,
    /// Items that failed
    pub fail: usize,
    /// Items with warnings
    pub warning: usize,
    /// Items not yet evaluated
    pub unknown: usize,
}

impl StatusCounts {
    /// Total number of items counted.
    pub fn total(&self) -> usize {
        self.pass + self.fail + self.warning + self.unknown
    }

    fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.pass += 1,
            CheckStatus::Fail => self.fail += 1,
            CheckStatus::Warning => self.warning += 1,
            CheckStatus::Unknown => self.unknown += 1,
        }
    }
}

/// Ordered compliance checklist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplianceView {
    sections: Vec<ComplianceSection>,
}

impl ComplianceView {
    /// Build a view from sections in display order.
    pub fn new(sections: Vec<ComplianceSection>) -> Self {
        Self { sections }
    }

    /// Sections in display order.
    pub fn sections(&self) -> &[ComplianceSection] {
        &self.sections
    }

    /// Mutable access for reconciliation.
    pub fn sections_mut(&mut self) -> &mut [ComplianceSection] {
        &mut self.sections
    }

    /// Consume the view.
    pub fn into_sections(self) -> Vec<ComplianceSection> {
        self.sections
    }

    /// Look up a section by id.
    pub fn section(&self, section_id: &str) -> Option<&ComplianceSection> {
        self.sections.iter().find(|section| section.id == section_id)
    }

    /// Look up an item by its `(section id, item id)` identity.
    pub fn item(&self, section_id: &str, item_id: &str) -> Option<&ComplianceItem> {
        self.section(section_id)?.item(item_id)
    }

    /// Number of sections.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Number of items across all sections.
    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|section| section.items.len()).sum()
    }

    /// Tally items by status.
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for item in self.sections.iter().flat_map(|section| section.items.iter()) {
            counts.record(item.status);
        }
        counts
    }

    /// Overall verdict.
    ///
    /// Any failure fails the view; otherwise any warning warns; a view passes
    /// only when every item passed. Empty views are `Unknown`.
    pub fn verdict(&self) -> CheckStatus {
        let counts = self.status_counts();
        if counts.fail > 0 {
            CheckStatus::Fail
        } else if counts.warning > 0 {
            CheckStatus::Warning
        } else if counts.total() > 0 && counts.pass == counts.total() {
            CheckStatus::Pass
        } else {
            CheckStatus::Unknown
        }
    }
}

impl From<Vec<ComplianceSection>> for ComplianceView {
    fn from(sections: Vec<ComplianceSection>) -> Self {
        Self::new(sections)
    }
}

/// Targeted status change for one existing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Section holding the item
    pub section_id: String,
    /// Item within the section
    pub item_id: String,
    /// New status
    pub status: CheckStatus,
}

impl StatusUpdate {
    /// Create an update.
    pub fn new(section_id: impl Into<String>, item_id: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            section_id: section_id.into(),
            item_id: item_id.into(),
            status,
        }
    }
}

/// Message on the compliance stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ComplianceMessage {
    /// Full-state snapshot replacing the view
    Full {
        /// Complete section list
        sections: Vec<ComplianceSection>,
        /// Server emit time
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<WireTimestamp>,
    },
    /// Incremental status updates for existing items
    Patch {
        /// Updates in application order
        updates: Vec<StatusUpdate>,
        /// Server emit time
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<WireTimestamp>,
    },
}

impl ComplianceMessage {
    /// Server emit time, when present and well formed.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Full { timestamp, .. } | Self::Patch { timestamp, .. } => {
                timestamp.as_ref().and_then(WireTimestamp::to_utc)
            }
        }
    }
}
