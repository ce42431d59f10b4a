use {
    crate::domain::error::{DownstreamError, EventError},
    crate::domain::event::{AssetRef, Event, FindingOverwriteDto, TeamRef},
    crate::domain::outbox::LogEntry,
    crate::domain::vulndb::{FindingUpdate, VulnDb},
    std::sync::Arc,
};

/// Replays outbox entries against the vulnerability database.
#[derive(Clone)]
pub struct EventParser {
    client: Arc<dyn VulnDb>,
}

impl EventParser {
    pub fn new(client: Arc<dyn VulnDb>) -> Self {
        Self { client }
    }

    /// Apply `entries` in order and return how many were applied.
    ///
    /// The count is always a prefix: the first entry that cannot be resolved
    /// stops the pass and nothing after it is attempted.
    pub async fn parse(&self, entries: &[LogEntry]) -> usize {
        for (n, entry) in entries.iter().enumerate() {
            if let Err(e) = self.apply(entry).await {
                tracing::error!(
                    component = "cdc.parser",
                    entry_id = %entry.id,
                    action = %entry.action,
                    attempts = entry.attempts,
                    error = %e,
                    "could not apply outbox entry"
                );
                return n;
            }
        }
        entries.len()
    }

    pub async fn apply(&self, entry: &LogEntry) -> Result<(), EventError> {
        let event = Event::decode(&entry.action, entry.version, &entry.payload)?;
        self.apply_event(&event).await
    }

    pub async fn apply_event(&self, event: &Event) -> Result<(), EventError> {
        match event {
            Event::DeleteTeam(dto) => self.delete_team_tag(&dto.team).await,
            Event::DeleteAllAssets(dto) => self.delete_team_tag(&dto.team).await,
            Event::CreateAsset(dto) => self.create_asset(&dto.asset).await,
            Event::DeleteAsset(dto) => self.delete_asset(&dto.asset, dto.dup_assets).await,
            Event::UpdateAsset(dto) => {
                // Both halves must be safe to repeat: a failed creation
                // replays the deletion on the next pass.
                self.delete_asset(&dto.old_asset, dto.dup_assets).await?;
                self.create_asset(&dto.new_asset).await
            }
            Event::FindingOverwrite(dto) => self.overwrite_finding(dto).await,
        }
    }

    async fn delete_team_tag(&self, team: &TeamRef) -> Result<(), EventError> {
        absorb(self.client.delete_tag(&team.tag, &team.tag).await, |e| {
            e.is_not_found()
        })
    }

    async fn create_asset(&self, asset: &AssetRef) -> Result<(), EventError> {
        let tags = [asset.team.tag.clone()];
        self.client.create_target(&asset.identifier, &tags).await?;
        Ok(())
    }

    async fn delete_asset(&self, asset: &AssetRef, dup_assets: i64) -> Result<(), EventError> {
        if dup_assets > 0 {
            tracing::debug!(
                component = "cdc.parser",
                asset_id = %asset.id,
                dup_assets,
                "asset still has duplicates, keeping downstream tag"
            );
            return Ok(());
        }

        let mut targets = self.client.targets_by_identifier(&asset.identifier).await?;
        if targets.len() > 1 {
            return Err(EventError::TargetNotUnique {
                identifier: asset.identifier.clone(),
                count: targets.len(),
            });
        }
        let Some(target) = targets.pop() else {
            return Ok(());
        };

        let team_tag = &asset.team.tag;
        absorb(
            self.client
                .delete_target_tag(team_tag, &target.id, team_tag)
                .await,
            |e| e.is_not_found() || e.is_forbidden(),
        )
    }

    async fn overwrite_finding(&self, dto: &FindingOverwriteDto) -> Result<(), EventError> {
        let update = FindingUpdate {
            status: dto.status.clone(),
            notes: dto.notes.clone(),
        };
        absorb(
            self.client
                .update_finding(&dto.finding_id, &update, &dto.tag)
                .await,
            |e| e.is_not_found(),
        )
    }
}

/// Treat the downstream errors matched by `already_done` as success.
fn absorb(
    result: Result<(), DownstreamError>,
    already_done: impl Fn(&DownstreamError) -> bool,
) -> Result<(), EventError> {
    match result {
        Err(e) if already_done(&e) => {
            tracing::debug!(component = "cdc.parser", error = %e, "downstream already in desired state");
            Ok(())
        }
        other => other.map_err(EventError::from),
    }
}
