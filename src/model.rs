// Wire-level data model for the catalog service, camelCase field names.

use serde::{Deserialize, Serialize};

/// Discriminator for what a content code names. Decided by the caller that
/// supplied the code; immutable once a job starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Map,
    MapSet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TexturedMesh {
    #[serde(default)]
    pub mesh_link: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshInfo {
    #[serde(default)]
    pub textured_mesh: TexturedMesh,
}

/// Descriptor for a single map. `mesh_link()` may be empty; the map simply
/// has no mesh available, which is not an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDescriptor {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub map_code: String,
    #[serde(default)]
    pub map_mesh: MeshInfo,
}

impl MapDescriptor {
    pub fn mesh_link(&self) -> &str {
        &self.map_mesh.textured_mesh.mesh_link
    }
}

/// One member of a map-set: the map itself plus the pose it takes within
/// the assembled composite.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSetEntry {
    pub map: MapDescriptor,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Quat,
}

impl MapSetEntry {
    pub fn placement(&self) -> Placement {
        Placement {
            position: self.position,
            rotation: self.rotation,
        }
    }
}

/// Composite descriptor. Member order is preserved for deterministic
/// iteration; completion is order-independent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSetDescriptor {
    #[serde(default)]
    pub map_set_code: String,
    #[serde(default)]
    pub map_set_data: Vec<MapSetEntry>,
}

/// Envelope the catalog wraps map-set payloads in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSetResult {
    pub map_set: MapSetDescriptor,
}

/// Pose applied to a member node within its composite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        // Identity rotation.
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Transient download URL payload.
#[derive(Debug, Clone, Deserialize)]
pub struct FileUrl {
    #[serde(default)]
    pub url: String,
}

/// Session token payload returned by a successful authentication.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthToken {
    #[serde(default)]
    pub token: String,
}

/// Error payload decoded whenever a catalog call reports non-success.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: String,
}
