//! core::model
//!
//! Dataset-side domain types: entity types, pending changes and library links.
//!
//! # Example
//!
//! ```
//! use datagit::core::model::{Change, DiffType, EntityType};
//!
//! let change =
//!     Change::for_entity(EntityType::Process, &["Energy", "Coal"], "p1", DiffType::Added);
//! assert_eq!(change.path, "process/Energy/Coal/p1.json");
//! assert!(!change.is_deletion());
//! ```

use serde::{Deserialize, Serialize};

use super::naming;

/// The root entity types of a dataset, each stored under its own folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Actor,
    Source,
    UnitGroup,
    FlowProperty,
    Flow,
    Currency,
    Location,
    Parameter,
    DqSystem,
    ImpactCategory,
    ImpactMethod,
    SocialIndicator,
    Process,
    ProductSystem,
    Project,
    Result,
    Epd,
}

impl EntityType {
    /// All root entity types.
    pub const ALL: [EntityType; 17] = [
        EntityType::Actor,
        EntityType::Source,
        EntityType::UnitGroup,
        EntityType::FlowProperty,
        EntityType::Flow,
        EntityType::Currency,
        EntityType::Location,
        EntityType::Parameter,
        EntityType::DqSystem,
        EntityType::ImpactCategory,
        EntityType::ImpactMethod,
        EntityType::SocialIndicator,
        EntityType::Process,
        EntityType::ProductSystem,
        EntityType::Project,
        EntityType::Result,
        EntityType::Epd,
    ];

    /// The folder name used at the repository root.
    pub fn folder(&self) -> &'static str {
        match self {
            EntityType::Actor => "actor",
            EntityType::Source => "source",
            EntityType::UnitGroup => "unit_group",
            EntityType::FlowProperty => "flow_property",
            EntityType::Flow => "flow",
            EntityType::Currency => "currency",
            EntityType::Location => "location",
            EntityType::Parameter => "parameter",
            EntityType::DqSystem => "dq_system",
            EntityType::ImpactCategory => "impact_category",
            EntityType::ImpactMethod => "impact_method",
            EntityType::SocialIndicator => "social_indicator",
            EntityType::Process => "process",
            EntityType::ProductSystem => "product_system",
            EntityType::Project => "project",
            EntityType::Result => "result",
            EntityType::Epd => "epd",
        }
    }

    /// Look up an entity type by its folder name.
    pub fn from_folder(folder: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.folder() == folder)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.folder())
    }
}

/// How a path differs from the committed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    Added,
    Modified,
    Deleted,
}

/// A pending mutation of one dataset leaf.
///
/// `binaries` describes the leaf's sidecar directory:
///
/// - `None` leaves the stored sidecar as it is
/// - `Some(files)` replaces it with exactly `files`, relative to the
///   sidecar; an empty list removes it
///
/// File contents are supplied by a
/// [`BinaryResolver`](crate::sync::BinaryResolver) at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Full leaf path, e.g. `process/Energy/p1.json`.
    pub path: String,
    pub diff: DiffType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binaries: Option<Vec<String>>,
}

impl Change {
    pub fn new(path: impl Into<String>, diff: DiffType) -> Self {
        Self {
            path: path.into(),
            diff,
            binaries: None,
        }
    }

    /// Build the change of an entity from its type, category names and ref id.
    pub fn for_entity(
        entity_type: EntityType,
        categories: &[&str],
        ref_id: &str,
        diff: DiffType,
    ) -> Self {
        let mut path = entity_type.folder().to_string();
        for category in categories {
            path = naming::join(&path, &naming::encode_segment(category));
        }
        Self::new(naming::join(&path, &naming::leaf_name(ref_id)), diff)
    }

    /// Replace the sidecar with `files`.
    pub fn with_binaries<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binaries = Some(files.into_iter().map(Into::into).collect());
        self
    }

    /// Remove the sidecar while keeping the leaf.
    pub fn without_binaries(mut self) -> Self {
        self.binaries = Some(Vec::new());
        self
    }

    pub fn is_deletion(&self) -> bool {
        self.diff == DiffType::Deleted
    }

    /// The sidecar directory path of this change's leaf, if it is a leaf.
    pub fn sidecar_path(&self) -> Option<String> {
        let (parent, leaf) = naming::split_last(&self.path);
        naming::sidecar_of(leaf).map(|bin| naming::join(parent, &bin))
    }
}

/// A library a repository declares a dependency on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryLink {
    pub name: String,
    pub version: String,
}

impl LibraryLink {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}
