//! Node and user records
//!
//! Enumerations are read case-insensitively and written back in their
//! canonical uppercase form (`ON`, `WATER`, ...).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Operational status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeStatus {
    /// Not reporting
    #[default]
    Off,
    /// Reporting on every scheduler tick
    On,
}

impl NodeStatus {
    /// Name used in the backing file
    pub fn canonical(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::On => write!(f, "on"),
        }
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "on" => Ok(Self::On),
            other => Err(format!("unknown node status '{}'", other)),
        }
    }
}

impl Serialize for NodeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical())
    }
}

impl<'de> Deserialize<'de> for NodeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Utility delivered by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Electricity,
    Water,
    Gas,
}

impl NodeType {
    /// Name used in the backing file
    pub fn canonical(&self) -> &'static str {
        match self {
            Self::Electricity => "ELECTRICITY",
            Self::Water => "WATER",
            Self::Gas => "GAS",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Electricity => write!(f, "electricity"),
            Self::Water => write!(f, "water"),
            Self::Gas => write!(f, "gas"),
        }
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "electricity" => Ok(Self::Electricity),
            "water" => Ok(Self::Water),
            "gas" => Ok(Self::Gas),
            other => Err(format!("unknown node type '{}'", other)),
        }
    }
}

impl Serialize for NodeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical())
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A simulated household device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NodeRecord")]
pub struct Node {
    /// Stable identifier (slug of the name when the file omits it)
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Utility delivered
    pub node_type: NodeType,
    /// Whether the node is reporting
    pub status: NodeStatus,
    /// Consumption metric sent with every report
    pub provision_rate: f64,
    /// Destination for reports; empty means no reporting target
    pub endpoint_url: String,
    /// Username of the user operating the node
    pub assigned_user: Option<String>,
}

impl Node {
    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::On
    }

    /// True when the node has somewhere to report to
    pub fn has_endpoint(&self) -> bool {
        !self.endpoint_url.trim().is_empty()
    }
}

/// On-disk shape of a node, before normalization
#[derive(Deserialize)]
struct NodeRecord {
    #[serde(default)]
    id: Option<String>,
    name: String,
    node_type: NodeType,
    #[serde(default)]
    status: NodeStatus,
    provision_rate: f64,
    #[serde(default)]
    endpoint_url: Option<String>,
    #[serde(default)]
    assigned_user: Option<String>,
}

impl TryFrom<NodeRecord> for Node {
    type Error = String;

    fn try_from(record: NodeRecord) -> Result<Self, Self::Error> {
        if record.provision_rate.is_nan() || record.provision_rate < 0.0 {
            return Err(format!(
                "node '{}' has invalid provision_rate {}",
                record.name, record.provision_rate
            ));
        }

        let id = match record.id {
            Some(id) if !id.is_empty() => id,
            _ => slugify(&record.name),
        };

        Ok(Self {
            id,
            name: record.name,
            node_type: record.node_type,
            status: record.status,
            provision_rate: record.provision_rate,
            endpoint_url: record.endpoint_url.unwrap_or_default(),
            assigned_user: record.assigned_user,
        })
    }
}

/// A virtual user that can be assigned to a running node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

/// Result of a start/stop request
///
/// Missing nodes and unknown users are reported here with `success == false`
/// rather than as errors, so callers always get a message to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Derive a node id from its name: lowercase, non-alphanumeric runs become `-`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}
