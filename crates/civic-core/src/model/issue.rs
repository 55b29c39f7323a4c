use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;

/// Fixed set of issue categories offered at report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Roads & Potholes")]
    Roads,
    #[serde(rename = "Waste Management")]
    Waste,
    #[serde(rename = "Water & Sewage")]
    Water,
    #[serde(rename = "Electricity & Lights")]
    Electricity,
    #[serde(rename = "Public Parks")]
    Parks,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Self; 6] = [
        Self::Roads,
        Self::Waste,
        Self::Water,
        Self::Electricity,
        Self::Parks,
        Self::Other,
    ];

    /// Stored and displayed form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Roads => "Roads & Potholes",
            Self::Waste => "Waste Management",
            Self::Water => "Water & Sewage",
            Self::Electricity => "Electricity & Lights",
            Self::Parks => "Public Parks",
            Self::Other => "Other",
        }
    }

    /// Short form accepted on the command line.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Roads => "roads",
            Self::Waste => "waste",
            Self::Water => "water",
            Self::Electricity => "electricity",
            Self::Parks => "parks",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle) || c.slug().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ParseEnumError {
                expected: "category",
                got: s.to_string(),
            })
    }
}

/// Externally derived urgency of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError {
                expected: "severity",
                got: s.to_string(),
            }),
        }
    }
}

/// The three lifecycle states of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl Status {
    pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Resolved];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
        }
    }

    /// True when `target` lies earlier in the Pending → In Progress →
    /// Resolved order.
    #[must_use]
    pub fn is_backward(self, target: Self) -> bool {
        target < self
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "inprogress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A stored issue record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub severity: Option<Severity>,
    pub status: Status,
    pub author_id: String,
    pub author_name: String,
    pub location: Option<GeoPoint>,
    pub image_url: Option<String>,
    pub like_count: u64,
    pub view_count: u64,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// Fields supplied when reporting a new issue. Status always starts at
/// [`Status::Pending`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub location: Option<GeoPoint>,
    pub image_url: Option<String>,
}
