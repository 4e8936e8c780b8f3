//! In-memory collaborators for tests.
//!
//! MUST NEVER be used in production.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::lookup::{Identity, IdentityLookup, LookupError, User, UserLookup};
use crate::message::{PublishError, Publisher};
use crate::provider::{
    NormalizedUser, ProviderError, ProviderLogin, ProviderRequest,
    ProviderSecrets, Providers,
};
use crate::service::{AuthService, ServiceParams};
use crate::store::MemoryStore;
use crate::token::tests::manager;
use crate::token::{ClaimsPolicy, TokenPair};

pub const TOPIC: &str = "AuthService.Create";
pub const ART_ID: i64 = 42;
pub const SOFIA_ID: i64 = 7;
pub const SOFIA_ORCID: &str = "0000-0001-2345-6789";

/// Provider answering with a fixed user, rejecting the code `"expired"`.
pub struct FakeProvider(pub NormalizedUser);

#[async_trait]
impl ProviderLogin for FakeProvider {
    async fn login(
        &self,
        request: &ProviderRequest,
        _secret: &str,
    ) -> Result<NormalizedUser, ProviderError> {
        if request.code == "expired" {
            return Err(ProviderError::Rejected("invalid_grant".into()));
        }
        Ok(self.0.clone())
    }
}

/// Identity and user records, reachable until marked down.
#[derive(Default)]
pub struct Directory {
    identities: HashMap<(String, String), Identity>,
    users: HashMap<i64, User>,
    down: AtomicBool,
}

impl Directory {
    pub fn add(&mut self, provider: &str, identifier: &str, user_id: i64) {
        self.identities.insert(
            (provider.to_owned(), identifier.to_owned()),
            Identity {
                id: user_id * 10,
                identifier: identifier.to_owned(),
                provider: provider.to_owned(),
                user_id,
                ..Default::default()
            },
        );
        let mut attributes = serde_json::Map::new();
        attributes.insert("email".into(), json!(format!("{user_id}@example.com")));
        self.users.insert(user_id, User { id: user_id, attributes });
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), LookupError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(LookupError::Upstream("directory is down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityLookup for Directory {
    async fn get_identity(
        &self,
        provider: &str,
        identifier: &str,
    ) -> Result<Identity, LookupError> {
        self.check()?;
        self.identities
            .get(&(provider.to_owned(), identifier.to_owned()))
            .cloned()
            .ok_or_else(|| LookupError::NotFound(format!("identity {identifier}")))
    }
}

#[async_trait]
impl UserLookup for Directory {
    async fn get_user(&self, id: i64) -> Result<User, LookupError> {
        self.check()?;
        self.users
            .get(&id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(format!("user {id}")))
    }
}

/// Publisher keeping every message.
#[derive(Default)]
pub struct RecordingPublisher {
    pub sent: Mutex<Vec<(String, TokenPair)>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, TokenPair)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish_tokens(
        &self,
        subject: &str,
        tokens: &TokenPair,
    ) -> Result<(), PublishError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::Publish {
                subject: subject.to_owned(),
                message: "no responders".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_owned(), tokens.clone()));
        Ok(())
    }
}

/// Collaborators behind a test [`AuthService`].
pub struct Fixture {
    pub service: AuthService,
    pub store: MemoryStore,
    pub directory: Arc<Directory>,
    pub publisher: Arc<RecordingPublisher>,
}

pub fn google_user() -> NormalizedUser {
    NormalizedUser {
        name: "Art Vandelay".into(),
        email: "art@example.com".into(),
        id: "1093".into(),
        provider: "google".into(),
    }
}

pub fn orcid_user() -> NormalizedUser {
    NormalizedUser {
        name: "Sofia Garcia".into(),
        email: String::new(),
        id: SOFIA_ORCID.into(),
        provider: "orcid".into(),
    }
}

/// Service knowing Art on Google and Sofia on ORCID.
pub fn fixture() -> Fixture {
    let mut directory = Directory::default();
    directory.add("google", "art@example.com", ART_ID);
    directory.add("orcid", SOFIA_ORCID, SOFIA_ID);
    let directory = Arc::new(directory);

    let store = MemoryStore::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let providers = Providers::new(ProviderSecrets::default())
        .register("google", FakeProvider(google_user()))
        .register("orcid", FakeProvider(orcid_user()));

    let service = AuthService::new(ServiceParams {
        token: manager(),
        policy: ClaimsPolicy::default(),
        store: Arc::new(store.clone()),
        providers,
        identities: directory.clone(),
        users: directory.clone(),
        publisher: publisher.clone(),
        topic: TOPIC.to_owned(),
    });

    Fixture {
        service,
        store,
        directory,
        publisher,
    }
}
