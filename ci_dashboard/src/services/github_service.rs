//! GitHub integration — webhook signature validation and the Actions jobs API.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::job_service::FetchError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the `X-Hub-Signature-256` value for `payload`.
#[cfg(test)]
pub fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Validate a GitHub webhook signature (X-Hub-Signature-256).
///
/// An empty secret or an empty signature never validates.
pub fn validate_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() || signature.is_empty() {
        return false;
    }

    let Some(sig) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let sig_bytes = match hex::decode(sig) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    // Constant-time comparison.
    mac.verify_slice(&sig_bytes).is_ok()
}

/// One job as returned by `GET /repos/{owner}/{repo}/actions/runs/{run_id}/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteJob {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub steps: Vec<RemoteStep>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteStep {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<RemoteJob>,
}

/// Source of job-level detail for a workflow run.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn run_jobs(
        &self,
        owner: &str,
        repo: &str,
        run_id: i64,
    ) -> Result<Vec<RemoteJob>, FetchError>;
}

/// Jobs API client. One `reqwest::Client` is shared by every request.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("ci-dashboard")
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn jobs_url(&self, owner: &str, repo: &str, run_id: i64) -> String {
        format!(
            "{}/repos/{owner}/{repo}/actions/runs/{run_id}/jobs?per_page=100",
            self.api_url
        )
    }
}

#[async_trait]
impl JobSource for GitHubClient {
    async fn run_jobs(
        &self,
        owner: &str,
        repo: &str,
        run_id: i64,
    ) -> Result<Vec<RemoteJob>, FetchError> {
        if self.token.is_empty() {
            return Err(FetchError::Configuration("GITHUB_TOKEN not set".to_string()));
        }

        let resp = self
            .http
            .get(self.jobs_url(owner, repo, run_id))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FetchError::Upstream(format!("status {status}: {text}")));
        }

        let parsed: JobsResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Upstream(format!("decode jobs json: {e}")))?;
        Ok(parsed.jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips() {
        let body = br#"{"workflow_run":{"id":42}}"#;
        let sig = sign("s3cret", body);
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), "sha256=".len() + 64);
        assert!(validate_signature("s3cret", body, &sig));
    }

    #[test]
    fn single_bit_flip_in_body_fails() {
        let body = b"payload bytes".to_vec();
        let sig = sign("s3cret", &body);
        for i in 0..body.len() {
            for bit in 0..8 {
                let mut mutated = body.clone();
                mutated[i] ^= 1 << bit;
                assert!(!validate_signature("s3cret", &mutated, &sig));
            }
        }
    }

    #[test]
    fn single_bit_flip_in_secret_fails() {
        let body = b"payload bytes";
        let secret = "s3cret";
        let sig = sign(secret, body);
        for i in 0..secret.len() {
            let mut bytes = secret.as_bytes().to_vec();
            bytes[i] ^= 1;
            let mutated = String::from_utf8(bytes).unwrap();
            assert!(!validate_signature(&mutated, body, &sig));
        }
    }

    #[test]
    fn empty_secret_or_signature_is_rejected() {
        let body = b"{}";
        assert!(!validate_signature("", body, &sign("", body)));
        assert!(!validate_signature("s3cret", body, ""));
    }

    #[test]
    fn signature_without_prefix_or_bad_hex_is_rejected() {
        let body = b"{}";
        let sig = sign("s3cret", body);
        let bare = sig.trim_start_matches("sha256=");
        assert!(!validate_signature("s3cret", body, bare));
        assert!(!validate_signature("s3cret", body, "sha256=not-hex"));
        assert!(!validate_signature("s3cret", body, &format!("sha1={bare}")));
    }

    #[test]
    fn jobs_response_decodes_null_fields_and_steps() {
        let body = serde_json::json!({
            "total_count": 1,
            "jobs": [{
                "id": 9001,
                "name": "build",
                "status": "completed",
                "conclusion": null,
                "started_at": "2024-05-01T10:00:00Z",
                "completed_at": null,
                "steps": [
                    {"name": "Checkout", "status": "completed", "conclusion": "success", "number": 1}
                ]
            }]
        });
        let parsed: JobsResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.jobs.len(), 1);
        assert_eq!(parsed.jobs[0].id, 9001);
        assert_eq!(parsed.jobs[0].conclusion, None);
        assert_eq!(parsed.jobs[0].steps[0].name, "Checkout");
    }

    #[test]
    fn jobs_url_trims_trailing_slash() {
        let client =
            GitHubClient::new("https://ghe.example.com/api/v3/", "t", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            client.jobs_url("octo", "repo", 77),
            "https://ghe.example.com/api/v3/repos/octo/repo/actions/runs/77/jobs?per_page=100"
        );
    }

    #[tokio::test]
    async fn missing_token_is_a_configuration_error() {
        let client =
            GitHubClient::new("https://api.github.com", "", Duration::from_secs(1)).unwrap();
        let err = client.run_jobs("octo", "repo", 1).await.unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));
    }

    #[tokio::test]
    async fn silent_upstream_hits_the_client_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // Hold the connection open without ever answering.
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let client =
            GitHubClient::new(&format!("http://{addr}"), "t", Duration::from_millis(300))
                .unwrap();
        let err = tokio::time::timeout(Duration::from_secs(5), client.run_jobs("octo", "repo", 1))
            .await
            .expect("job fetch should give up on its own")
            .unwrap_err();
        match err {
            FetchError::Transport(e) => assert!(e.is_timeout()),
            other => panic!("expected a transport timeout, got {other:?}"),
        }
        server.abort();
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let client =
            GitHubClient::new("http://127.0.0.1:1", "token", Duration::from_secs(2)).unwrap();
        let err = client.run_jobs("octo", "repo", 1).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
