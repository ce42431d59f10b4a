use {
    super::error::DownstreamError,
    super::outbox::BoxFuture,
    serde::{Deserialize, Serialize},
};

/// A scan target as the vulnerability database knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub identifier: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingUpdate {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Downstream operations replayed from the outbox.
///
/// Every call is expected to be safe to repeat, or to fail with
/// [`DownstreamError::NotFound`] / [`DownstreamError::Forbidden`] when the
/// work was already done.
pub trait VulnDb: Send + Sync {
    /// Create (or tag an existing) target with `identifier`.
    fn create_target<'a>(
        &'a self,
        identifier: &'a str,
        tags: &'a [String],
    ) -> BoxFuture<'a, Result<Target, DownstreamError>>;

    /// Remove `tag` from every target, scoped to what `auth_tag` may see.
    fn delete_tag<'a>(
        &'a self,
        auth_tag: &'a str,
        tag: &'a str,
    ) -> BoxFuture<'a, Result<(), DownstreamError>>;

    /// Remove `tag` from a single target.
    fn delete_target_tag<'a>(
        &'a self,
        auth_tag: &'a str,
        target_id: &'a str,
        tag: &'a str,
    ) -> BoxFuture<'a, Result<(), DownstreamError>>;

    /// Targets whose identifier equals `identifier` exactly.
    fn targets_by_identifier<'a>(
        &'a self,
        identifier: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Target>, DownstreamError>>;

    fn update_finding<'a>(
        &'a self,
        finding_id: &'a str,
        update: &'a FindingUpdate,
        tag: &'a str,
    ) -> BoxFuture<'a, Result<(), DownstreamError>>;
}
