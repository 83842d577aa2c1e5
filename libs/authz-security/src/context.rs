use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use uuid::Uuid;
use xxhash_rust::xxh3::Xxh3;

use crate::credential::{CredentialDefinition, VerifiedCredential};

/// `ActorContext` carries the already-authenticated grants of the caller.
///
/// Built once per request by the authentication layer and passed through the
/// request lifecycle. The authorization engine only ever reads it.
///
/// Credentials are kept in ordered sets, so duplicates collapse on insertion
/// and iteration order is canonical.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ActorContext {
    /// Subject ID: the authenticated user, service, or system.
    subject_id: Uuid,
    /// Locally issued credentials held by the subject.
    #[serde(default)]
    credentials: BTreeSet<CredentialDefinition>,
    /// Credentials asserted by external issuers.
    #[serde(default)]
    verified_credentials: BTreeSet<VerifiedCredential>,
    /// True when the request carries no authenticated identity.
    #[serde(default)]
    anonymous: bool,
}

impl ActorContext {
    /// Create a new `ActorContext` builder
    #[must_use]
    pub fn builder() -> ActorContextBuilder {
        ActorContextBuilder::default()
    }

    /// Create an anonymous `ActorContext` with no subject and no credentials
    #[must_use]
    pub fn anonymous() -> Self {
        ActorContextBuilder::default().anonymous(true).build()
    }

    #[must_use]
    pub fn subject_id(&self) -> Uuid {
        self.subject_id
    }

    #[must_use]
    pub fn credentials(&self) -> &BTreeSet<CredentialDefinition> {
        &self.credentials
    }

    #[must_use]
    pub fn verified_credentials(&self) -> &BTreeSet<VerifiedCredential> {
        &self.verified_credentials
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Stable hash of everything that can influence a privilege decision.
    ///
    /// The subject id is not part of it: two actors holding the same
    /// credentials resolve to the same privileges and share cache entries.
    /// Every string and collection is length-prefixed, so no value can
    /// imitate the framing of another.
    #[must_use]
    pub fn credential_fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(&[u8::from(self.anonymous)]);
        write_len(&mut hasher, self.credentials.len());
        for cred in &self.credentials {
            write_str(&mut hasher, cred.credential_type.as_str());
            match cred.resource_id {
                Some(id) => {
                    hasher.update(&[1]);
                    hasher.update(id.as_uuid().as_bytes());
                }
                None => hasher.update(&[0]),
            }
        }
        write_len(&mut hasher, self.verified_credentials.len());
        for vc in &self.verified_credentials {
            write_str(&mut hasher, &vc.credential_type);
            write_str(&mut hasher, &vc.issuer);
            write_len(&mut hasher, vc.claims.len());
            for (name, value) in &vc.claims {
                write_str(&mut hasher, name);
                write_str(&mut hasher, value);
            }
        }
        hasher.digest()
    }

    /// Cache key standing for this actor's credentials.
    #[must_use]
    pub fn credential_key(&self) -> CredentialKey {
        CredentialKey {
            fingerprint: self.credential_fingerprint(),
            set: Arc::new(CredentialSet {
                anonymous: self.anonymous,
                credentials: self.credentials.clone(),
                verified_credentials: self.verified_credentials.clone(),
            }),
        }
    }
}

fn write_len(hasher: &mut Xxh3, len: usize) {
    hasher.update(&u64::try_from(len).unwrap_or(u64::MAX).to_le_bytes());
}

fn write_str(hasher: &mut Xxh3, value: &str) {
    write_len(hasher, value.len());
    hasher.update(value.as_bytes());
}

#[derive(Debug, PartialEq, Eq)]
struct CredentialSet {
    anonymous: bool,
    credentials: BTreeSet<CredentialDefinition>,
    verified_credentials: BTreeSet<VerifiedCredential>,
}

/// Canonical credential set of an actor, used in decision cache keys.
///
/// Hashes by fingerprint but compares by content, so two actors only share
/// an entry when they hold exactly the same credentials.
#[derive(Debug, Clone)]
pub struct CredentialKey {
    fingerprint: u64,
    set: Arc<CredentialSet>,
}

impl CredentialKey {
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

impl PartialEq for CredentialKey {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
            && (Arc::ptr_eq(&self.set, &other.set) || self.set == other.set)
    }
}

impl Eq for CredentialKey {}

impl Hash for CredentialKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint);
    }
}

#[derive(Default)]
pub struct ActorContextBuilder {
    subject_id: Option<Uuid>,
    credentials: BTreeSet<CredentialDefinition>,
    verified_credentials: BTreeSet<VerifiedCredential>,
    anonymous: bool,
}

impl ActorContextBuilder {
    #[must_use]
    pub fn subject_id(mut self, subject_id: Uuid) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    #[must_use]
    pub fn credential(mut self, credential: CredentialDefinition) -> Self {
        self.credentials.insert(credential);
        self
    }

    #[must_use]
    pub fn credentials(mut self, credentials: impl IntoIterator<Item = CredentialDefinition>) -> Self {
        self.credentials.extend(credentials);
        self
    }

    #[must_use]
    pub fn verified_credential(mut self, credential: VerifiedCredential) -> Self {
        self.verified_credentials.insert(credential);
        self
    }

    #[must_use]
    pub fn anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    #[must_use]
    pub fn build(self) -> ActorContext {
        ActorContext {
            subject_id: self.subject_id.unwrap_or_default(),
            credentials: self.credentials,
            verified_credentials: self.verified_credentials,
            anonymous: self.anonymous,
        }
    }
}
