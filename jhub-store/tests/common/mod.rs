#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use jhub_store::{
    clock::Sleeper, identity::UserIdentity, login, session::Session, template::ClaimTemplate,
    Config, Context,
};
use kubeclaim::{api::Status, ClaimApi, PersistentVolumeClaim};
use tempfile::TempDir;

#[derive(Debug)]
struct StoredClaim {
    claim: PersistentVolumeClaim,
    /// Lists to go before the claim gets bound, `None` for never.
    lists_until_bound: Option<usize>,
}

/// An in-memory cluster. Created claims are bound after a configurable number
/// of list requests.
#[derive(Debug, Default)]
pub struct FakeCluster {
    claims: Mutex<Vec<StoredClaim>>,
    bind_after: Option<usize>,
    unavailable: bool,
    lists: AtomicUsize,
    creates: AtomicUsize,
}

impl FakeCluster {
    /// Binds new claims at the first list following their creation.
    pub fn new() -> Self {
        Self::binding_after(0)
    }

    /// Binds new claims once `lists` list requests have passed after creation.
    pub fn binding_after(lists: usize) -> Self {
        Self {
            bind_after: Some(lists),
            ..Self::default()
        }
    }

    /// Never binds anything.
    pub fn never_binding() -> Self {
        Self::default()
    }

    /// Fails every request with a 503.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_claim(self, claim: PersistentVolumeClaim) -> Self {
        self.claims.lock().unwrap().push(StoredClaim {
            claim,
            lists_until_bound: None,
        });
        self
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn claims(&self) -> Vec<PersistentVolumeClaim> {
        self.claims
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.claim.clone())
            .collect()
    }

    fn outage() -> kubeclaim::Error {
        kubeclaim::Error::Kube(Status {
            code: 503,
            message: Some("the server is currently unable to handle the request".into()),
            reason: None,
        })
    }
}

#[async_trait]
impl ClaimApi for FakeCluster {
    async fn list_claims(
        &self,
        _namespace: &str,
    ) -> kubeclaim::Result<Vec<PersistentVolumeClaim>> {
        self.lists.fetch_add(1, Ordering::SeqCst);

        if self.unavailable {
            return Err(Self::outage());
        }

        let snapshot = {
            let mut claims = self.claims.lock().unwrap();

            for stored in claims.iter_mut() {
                match stored.lists_until_bound {
                    Some(0) => {
                        let name = stored.claim.name().unwrap_or_default().to_owned();
                        stored.claim.spec.volume_name = Some(format!("pvc-{name}"));
                        stored.lists_until_bound = None;
                    }
                    Some(n) => stored.lists_until_bound = Some(n - 1),
                    None => {}
                }
            }

            claims.iter().map(|c| c.claim.clone()).collect()
        };

        // let concurrent callers observe the same snapshot
        tokio::task::yield_now().await;

        Ok(snapshot)
    }

    async fn create_claim(
        &self,
        _namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> kubeclaim::Result<PersistentVolumeClaim> {
        self.creates.fetch_add(1, Ordering::SeqCst);

        if self.unavailable {
            return Err(Self::outage());
        }

        let mut claims = self.claims.lock().unwrap();

        if claims.iter().any(|c| c.claim.name() == claim.name()) {
            return Err(kubeclaim::Error::AlreadyExists);
        }

        claims.push(StoredClaim {
            claim: claim.clone(),
            lists_until_bound: self.bind_after,
        });

        Ok(claim.clone())
    }
}

/// Records every requested pause and returns without sleeping.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

pub fn user(name: &str) -> UserIdentity {
    name.parse().unwrap()
}

/// A claim for `name` as the hub would create it, bound to `volume` if given.
pub fn claim_for(name: &str, volume: Option<&str>) -> PersistentVolumeClaim {
    let mut claim = ClaimTemplate::default().render("jhub", &user(name));
    claim.spec.volume_name = volume.map(str::to_owned);
    claim
}

pub fn context(
    cluster: FakeCluster,
    mount_root: &std::path::Path,
) -> (Context<FakeCluster>, RecordingSleeper) {
    let sleeper = RecordingSleeper::default();
    let config = Config {
        mount_root: mount_root.to_owned(),
        ..Config::default()
    };

    (Context::new(cluster, config).with_sleeper(sleeper.clone()), sleeper)
}

/// A logged-in session for `name` whose volume is an empty temporary
/// directory.
pub async fn session(name: &str) -> (TempDir, Context<FakeCluster>, Session) {
    let root = tempfile::tempdir().unwrap();
    let cluster = FakeCluster::never_binding().with_claim(claim_for(name, Some("pvc-test")));
    let (ctx, _) = context(cluster, root.path());

    let session = login::login(&ctx, Some(name), false).await.unwrap();
    std::fs::create_dir_all(session.volume().path()).unwrap();

    (root, ctx, session)
}
