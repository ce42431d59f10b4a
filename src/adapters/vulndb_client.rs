use {
    crate::domain::{
        error::DownstreamError,
        outbox::BoxFuture,
        vulndb::{FindingUpdate, Target, VulnDb},
    },
    reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header::AUTHORIZATION},
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

#[derive(Debug, Clone)]
pub struct VulnDbConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct CreateTargetRequest<'a> {
    identifier: &'a str,
    tags: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TargetsResponse {
    #[serde(default)]
    targets: Vec<Target>,
}

#[derive(Debug, Serialize)]
struct UpdateFindingRequest<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
    tag: &'a str,
}

/// JSON/HTTP client for the vulnerability database. The team tag a call is
/// scoped to travels in the `Authorization` header.
pub struct HttpVulnDb {
    base_url: Url,
    client: Client,
}

impl HttpVulnDb {
    pub fn new(config: &VulnDbConfig) -> Result<Self, DownstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DownstreamError::Transport(format!("building HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
        })
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, DownstreamError> {
        let url = endpoint(&self.base_url, segments)?;
        Ok(self.client.request(method, url))
    }

    async fn create_target_inner(
        &self,
        identifier: &str,
        tags: &[String],
    ) -> Result<Target, DownstreamError> {
        let response = self
            .request(Method::POST, &["targets"])?
            .json(&CreateTargetRequest { identifier, tags })
            .send()
            .await
            .map_err(transport)?;

        check(response).await?.json().await.map_err(transport)
    }

    async fn delete_tag_inner(&self, auth_tag: &str, tag: &str) -> Result<(), DownstreamError> {
        let response = self
            .request(Method::DELETE, &["tags", tag])?
            .header(AUTHORIZATION, auth_tag)
            .send()
            .await
            .map_err(transport)?;

        check(response).await?;
        Ok(())
    }

    async fn delete_target_tag_inner(
        &self,
        auth_tag: &str,
        target_id: &str,
        tag: &str,
    ) -> Result<(), DownstreamError> {
        let response = self
            .request(Method::DELETE, &["targets", target_id, "tags", tag])?
            .header(AUTHORIZATION, auth_tag)
            .send()
            .await
            .map_err(transport)?;

        check(response).await?;
        Ok(())
    }

    async fn targets_by_identifier_inner(
        &self,
        identifier: &str,
    ) -> Result<Vec<Target>, DownstreamError> {
        let response = self
            .request(Method::GET, &["targets"])?
            .query(&[("identifier", identifier)])
            .send()
            .await
            .map_err(transport)?;

        let body: TargetsResponse = check(response).await?.json().await.map_err(transport)?;
        // The API matches loosely; only exact identifiers count.
        Ok(body
            .targets
            .into_iter()
            .filter(|t| t.identifier == identifier)
            .collect())
    }

    async fn update_finding_inner(
        &self,
        finding_id: &str,
        update: &FindingUpdate,
        tag: &str,
    ) -> Result<(), DownstreamError> {
        let response = self
            .request(Method::PATCH, &["findings", finding_id])?
            .header(AUTHORIZATION, tag)
            .json(&UpdateFindingRequest {
                status: &update.status,
                notes: update.notes.as_deref(),
                tag,
            })
            .send()
            .await
            .map_err(transport)?;

        check(response).await?;
        Ok(())
    }
}

impl VulnDb for HttpVulnDb {
    fn create_target<'a>(
        &'a self,
        identifier: &'a str,
        tags: &'a [String],
    ) -> BoxFuture<'a, Result<Target, DownstreamError>> {
        Box::pin(self.create_target_inner(identifier, tags))
    }

    fn delete_tag<'a>(
        &'a self,
        auth_tag: &'a str,
        tag: &'a str,
    ) -> BoxFuture<'a, Result<(), DownstreamError>> {
        Box::pin(self.delete_tag_inner(auth_tag, tag))
    }

    fn delete_target_tag<'a>(
        &'a self,
        auth_tag: &'a str,
        target_id: &'a str,
        tag: &'a str,
    ) -> BoxFuture<'a, Result<(), DownstreamError>> {
        Box::pin(self.delete_target_tag_inner(auth_tag, target_id, tag))
    }

    fn targets_by_identifier<'a>(
        &'a self,
        identifier: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Target>, DownstreamError>> {
        Box::pin(self.targets_by_identifier_inner(identifier))
    }

    fn update_finding<'a>(
        &'a self,
        finding_id: &'a str,
        update: &'a FindingUpdate,
        tag: &'a str,
    ) -> BoxFuture<'a, Result<(), DownstreamError>> {
        Box::pin(self.update_finding_inner(finding_id, update, tag))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Append path segments to `base`, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, DownstreamError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| DownstreamError::Transport(format!("base URL cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn classify(status: StatusCode, body: String) -> DownstreamError {
    match status {
        StatusCode::NOT_FOUND => DownstreamError::NotFound,
        StatusCode::FORBIDDEN => DownstreamError::Forbidden,
        other => DownstreamError::Status {
            status: other.as_u16(),
            body,
        },
    }
}

async fn check(response: Response) -> Result<Response, DownstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, body))
}

fn transport(e: reqwest::Error) -> DownstreamError {
    DownstreamError::Transport(e.to_string())
}
