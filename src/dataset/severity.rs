//! Severity label classification rules.
//!
//! Raw interaction descriptions are free text; the engine reduces them to
//! a three-way severity target through an explicit, versioned keyword
//! table. The rule is total: severe keywords are checked first, then
//! moderate ones, and anything unmatched (including empty descriptions)
//! maps to `None`. Changing the table or its precedence invalidates
//! trained checkpoints, so the version is persisted alongside them.

use serde::{Deserialize, Serialize};

/// Version of the keyword rule table below.
pub const SEVERITY_RULES_VERSION: u32 = 1;

/// Three-way interaction severity target.
///
/// The class index is part of the label encoding persisted in checkpoints.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SeverityLabel {
    /// No clinically relevant interaction detected.
    None,
    /// Interaction requiring caution or monitoring.
    Moderate,
    /// Dangerous interaction; the costliest class to miss.
    Severe,
}

impl SeverityLabel {
    /// All labels in class-index order.
    pub const ALL: [SeverityLabel; 3] = [
        SeverityLabel::None,
        SeverityLabel::Moderate,
        SeverityLabel::Severe,
    ];

    /// Fixed class index used by the classifier and checkpoints.
    #[must_use]
    pub fn class_index(self) -> usize {
        match self {
            SeverityLabel::None => 0,
            SeverityLabel::Moderate => 1,
            SeverityLabel::Severe => 2,
        }
    }

    /// Inverse of [`class_index`](Self::class_index).
    #[must_use]
    pub fn from_class_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Canonical display name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SeverityLabel::None => "None",
            SeverityLabel::Moderate => "Moderate",
            SeverityLabel::Severe => "Severe",
        }
    }
}

impl std::fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keywords indicating a severe interaction. Checked before the moderate
/// list; first match wins.
const SEVERE_KEYWORDS: &[&str] = &[
    "contraindicated",
    "avoid",
    "dangerous",
    "fatal",
    "death",
    "severe",
    "serious",
    "life-threatening",
    "toxic",
    "toxicity",
    "hemorrhage",
    "bleeding",
    "cardiac arrest",
    "respiratory",
    "seizure",
    "coma",
    "overdose",
];

/// Keywords indicating a moderate interaction.
const MODERATE_KEYWORDS: &[&str] = &[
    "caution",
    "monitor",
    "may increase",
    "may decrease",
    "reduce",
    "adjust",
    "moderate",
    "careful",
    "watch",
    "consider",
    "potential",
    "risk",
    "effect",
];

/// Classifies a raw interaction description into a severity label.
///
/// Case-insensitive substring matching; severe keywords take precedence
/// over moderate ones; unmatched or empty text maps to
/// [`SeverityLabel::None`]. Total by construction, so no row is ever
/// dropped for lacking a mapping.
///
/// # Examples
///
/// ```
/// use farmaco::dataset::{classify_severity, SeverityLabel};
///
/// assert_eq!(
///     classify_severity("May increase the risk of hemorrhage."),
///     SeverityLabel::Severe
/// );
/// assert_eq!(
///     classify_severity("Monitor serum levels."),
///     SeverityLabel::Moderate
/// );
/// assert_eq!(classify_severity(""), SeverityLabel::None);
/// ```
#[must_use]
pub fn classify_severity(raw_label: &str) -> SeverityLabel {
    let text = raw_label.to_lowercase();
    if text.trim().is_empty() {
        return SeverityLabel::None;
    }
    if SEVERE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return SeverityLabel::Severe;
    }
    if MODERATE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return SeverityLabel::Moderate;
    }
    SeverityLabel::None
}
