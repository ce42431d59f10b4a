use {
    super::error::EventError,
    super::outbox::Action,
    serde::{Deserialize, Serialize},
};

/// Payload shape version written by this release.
pub const CURRENT_VERSION: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: String,
    /// Tag identifying the team downstream; also its authorization scope there.
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: String,
    pub identifier: String,
    pub team: TeamRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTeamDto {
    pub team: TeamRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAssetDto {
    pub asset: AssetRef,
}

/// `dup_assets` counts other assets of the same team that share the
/// identifier, taken when the row was written. While it is above zero the
/// downstream target must keep the team tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAssetDto {
    pub asset: AssetRef,
    pub dup_assets: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAssetDto {
    pub old_asset: AssetRef,
    pub new_asset: AssetRef,
    /// Duplicates of `old_asset` remaining after the update.
    pub dup_assets: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAllAssetsDto {
    pub team: TeamRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingOverwriteDto {
    pub finding_id: String,
    pub tag: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A decoded log entry: one variant per [`Action`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    DeleteTeam(DeleteTeamDto),
    CreateAsset(CreateAssetDto),
    DeleteAsset(DeleteAssetDto),
    UpdateAsset(UpdateAssetDto),
    DeleteAllAssets(DeleteAllAssetsDto),
    FindingOverwrite(FindingOverwriteDto),
}

impl Event {
    /// Decode a stored entry. Unknown tags and versions are rejected here, at
    /// the storage boundary; past this point the action set is closed.
    pub fn decode(action: &str, version: i32, payload: &[u8]) -> Result<Self, EventError> {
        let action = Action::try_from(action)?;
        if version != CURRENT_VERSION {
            return Err(EventError::UnsupportedVersion {
                action: action.to_string(),
                version,
            });
        }

        let event = match action {
            Action::DeleteTeam => Self::DeleteTeam(serde_json::from_slice(payload)?),
            Action::CreateAsset => Self::CreateAsset(serde_json::from_slice(payload)?),
            Action::DeleteAsset => Self::DeleteAsset(serde_json::from_slice(payload)?),
            Action::UpdateAsset => Self::UpdateAsset(serde_json::from_slice(payload)?),
            Action::DeleteAllAssets => Self::DeleteAllAssets(serde_json::from_slice(payload)?),
            Action::FindingOverwrite => Self::FindingOverwrite(serde_json::from_slice(payload)?),
        };
        Ok(event)
    }

    pub fn action(&self) -> Action {
        match self {
            Self::DeleteTeam(_) => Action::DeleteTeam,
            Self::CreateAsset(_) => Action::CreateAsset,
            Self::DeleteAsset(_) => Action::DeleteAsset,
            Self::UpdateAsset(_) => Action::UpdateAsset,
            Self::DeleteAllAssets(_) => Action::DeleteAllAssets,
            Self::FindingOverwrite(_) => Action::FindingOverwrite,
        }
    }

    /// Serialize the payload in the current version's shape.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::DeleteTeam(dto) => serde_json::to_vec(dto),
            Self::CreateAsset(dto) => serde_json::to_vec(dto),
            Self::DeleteAsset(dto) => serde_json::to_vec(dto),
            Self::UpdateAsset(dto) => serde_json::to_vec(dto),
            Self::DeleteAllAssets(dto) => serde_json::to_vec(dto),
            Self::FindingOverwrite(dto) => serde_json::to_vec(dto),
        }
    }
}
