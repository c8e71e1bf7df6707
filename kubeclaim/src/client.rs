use std::{env, path::Path};

use async_trait::async_trait;
use reqwest::{Certificate, Method, RequestBuilder, Url};
use tracing::{debug, instrument};

use crate::{
    api::read_json,
    claim::{ClaimList, PersistentVolumeClaim},
    ClaimApi,
};

/// Where the kubelet mounts the pod's service account credentials.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// A Kubernetes API client scoped to `PersistentVolumeClaim`s.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl Client {
    /// Create a client for the API server at `base`, authenticating with an
    /// optional bearer token.
    #[must_use]
    pub fn new(base: Url, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: with_trailing_slash(base),
            token,
        }
    }

    /// Like [`Client::new`], but additionally trusting the PEM-encoded CA
    /// certificate `ca_pem`.
    ///
    /// # Errors
    ///
    /// - malformed certificate
    /// - TLS backend initialization failure
    pub fn with_root_certificate(
        base: Url,
        token: Option<String>,
        ca_pem: &[u8],
    ) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .add_root_certificate(Certificate::from_pem(ca_pem)?)
            .build()?;

        Ok(Self {
            http,
            base: with_trailing_slash(base),
            token,
        })
    }

    /// Build a client from the service account mounted into the current pod.
    ///
    /// # Errors
    ///
    /// - not running inside a cluster (`KUBERNETES_SERVICE_HOST` unset)
    /// - unreadable token or CA certificate
    pub async fn in_cluster() -> crate::Result<Self> {
        Self::in_cluster_from(Path::new(SERVICE_ACCOUNT_DIR)).await
    }

    async fn in_cluster_from(account_dir: &Path) -> crate::Result<Self> {
        let host = env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| crate::Error::NotConfigured("KUBERNETES_SERVICE_HOST"))?;
        let port = env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());

        // IPv6 service hosts need brackets.
        let base = if host.contains(':') {
            Url::parse(&format!("https://[{host}]:{port}"))?
        } else {
            Url::parse(&format!("https://{host}:{port}"))?
        };

        let token = tokio::fs::read_to_string(account_dir.join("token")).await?;
        let ca = tokio::fs::read(account_dir.join("ca.crt")).await?;

        debug!("using in-cluster api server {}", base);

        Self::with_root_certificate(base, Some(token.trim().to_owned()), &ca)
    }

    /// Build a client from `KUBE_API_URL` (and optionally `KUBE_TOKEN`), or
    /// fall back to [`Client::in_cluster`] if `KUBE_API_URL` is not set.
    ///
    /// # Errors
    ///
    /// See [`Client::in_cluster`]; additionally fails if `KUBE_API_URL` is
    /// not a valid url.
    pub async fn from_env() -> crate::Result<Self> {
        match env::var("KUBE_API_URL") {
            Ok(url) => {
                let base = Url::parse(&url)?;
                let token = env::var("KUBE_TOKEN").ok();

                debug!("using api server {} from environment", base);

                Ok(Self::new(base, token))
            }
            Err(_) => Self::in_cluster().await,
        }
    }

    /// The API server this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn claims_url(&self, namespace: &str) -> crate::Result<Url> {
        self.base
            .join(&format!(
                "api/v1/namespaces/{namespace}/persistentvolumeclaims"
            ))
            .map_err(Into::into)
    }

    fn req(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);

        match self.token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    url
}

#[async_trait]
impl ClaimApi for Client {
    #[instrument(skip(self))]
    async fn list_claims(&self, namespace: &str) -> crate::Result<Vec<PersistentVolumeClaim>> {
        let res = self
            .req(Method::GET, self.claims_url(namespace)?)
            .send()
            .await?;

        let list: ClaimList = read_json(res).await?;

        debug!("listed {} claims", list.items.len());

        Ok(list.items)
    }

    #[instrument(skip(self, claim), fields(claim = claim.name().unwrap_or_default()))]
    async fn create_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> crate::Result<PersistentVolumeClaim> {
        let res = self
            .req(Method::POST, self.claims_url(namespace)?)
            .json(claim)
            .send()
            .await?;

        read_json(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_url() {
        let client = Client::new(Url::parse("https://10.0.0.1:6443").unwrap(), None);

        assert_eq!(
            client.claims_url("jhub").unwrap().as_str(),
            "https://10.0.0.1:6443/api/v1/namespaces/jhub/persistentvolumeclaims"
        );
    }

    #[test]
    fn claims_url_behind_proxy_path() {
        let client = Client::new(
            Url::parse("https://proxy.example.com/k8s").unwrap(),
            Some("t0ken".into()),
        );

        assert_eq!(client.base_url().as_str(), "https://proxy.example.com/k8s/");
        assert_eq!(
            client.claims_url("jhub").unwrap().as_str(),
            "https://proxy.example.com/k8s/api/v1/namespaces/jhub/persistentvolumeclaims"
        );
    }
}
