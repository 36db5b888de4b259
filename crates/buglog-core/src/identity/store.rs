use super::{Identity, IdentityError};
use crate::entity::Id;
use std::collections::BTreeMap;
use tracing::debug;

/// Persistence collaborator for identities and the current-user pointer.
pub trait IdentityStore {
    type Error: From<IdentityError>;

    /// Durably store an identity. Storing the same identity twice is allowed.
    fn store_identity(&mut self, identity: &Identity) -> Result<(), Self::Error>;

    fn load_identity(&self, id: &Id) -> Result<Identity, Self::Error>;

    fn list_identities(&self) -> Result<Vec<Identity>, Self::Error>;

    /// The identity operations are authored as, if one has been chosen.
    fn current_user(&self) -> Result<Option<Identity>, Self::Error>;

    fn set_current_user(&mut self, id: &Id) -> Result<(), Self::Error>;

    fn is_user_set(&self) -> Result<bool, Self::Error>;
}

/// An identity that is either still pending or already durable.
#[derive(Debug, Clone)]
pub struct IdentityHandle {
    identity: Identity,
    durable: bool,
}

impl IdentityHandle {
    /// Wrap a freshly created identity that has not been stored yet.
    #[must_use]
    pub const fn new(identity: Identity) -> Self {
        Self {
            identity,
            durable: false,
        }
    }

    /// Wrap an identity that was read back from a store.
    #[must_use]
    pub const fn loaded(identity: Identity) -> Self {
        Self {
            identity,
            durable: true,
        }
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub const fn is_durable(&self) -> bool {
        self.durable
    }

    /// Validate and store the identity unless it is already durable.
    ///
    /// Returns `true` when something was written.
    ///
    /// # Errors
    ///
    /// Returns the store's error if validation or the write fails. The handle
    /// stays pending in that case.
    pub fn commit_as_needed<S: IdentityStore>(&mut self, store: &mut S) -> Result<bool, S::Error> {
        if self.durable {
            return Ok(false);
        }
        self.identity.validate()?;
        store.store_identity(&self.identity)?;
        self.durable = true;
        debug!(identity = %self.identity.id(), "identity committed");
        Ok(true)
    }
}

/// Errors from [`MemoryIdentityStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("identity {0} not found")]
    NotFound(Id),
    #[error(transparent)]
    Invalid(#[from] IdentityError),
}

/// Identity store kept entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryIdentityStore {
    identities: BTreeMap<Id, Identity>,
    user: Option<Id>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    type Error = MemoryStoreError;

    fn store_identity(&mut self, identity: &Identity) -> Result<(), Self::Error> {
        self.identities.insert(identity.id(), identity.clone());
        Ok(())
    }

    fn load_identity(&self, id: &Id) -> Result<Identity, Self::Error> {
        self.identities
            .get(id)
            .cloned()
            .ok_or_else(|| MemoryStoreError::NotFound(id.clone()))
    }

    fn list_identities(&self) -> Result<Vec<Identity>, Self::Error> {
        Ok(self.identities.values().cloned().collect())
    }

    fn current_user(&self) -> Result<Option<Identity>, Self::Error> {
        self.user.as_ref().map(|id| self.load_identity(id)).transpose()
    }

    fn set_current_user(&mut self, id: &Id) -> Result<(), Self::Error> {
        if !self.identities.contains_key(id) {
            return Err(MemoryStoreError::NotFound(id.clone()));
        }
        self.user = Some(id.clone());
        Ok(())
    }

    fn is_user_set(&self) -> Result<bool, Self::Error> {
        Ok(self.user.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::fixture;

    #[test]
    fn commit_as_needed_is_idempotent() {
        let mut store = MemoryIdentityStore::new();
        let mut handle = IdentityHandle::new(fixture("Alice"));
        assert!(!handle.is_durable());

        assert_eq!(handle.commit_as_needed(&mut store), Ok(true));
        assert!(handle.is_durable());
        assert_eq!(handle.commit_as_needed(&mut store), Ok(false));
        assert_eq!(store.list_identities().map(|v| v.len()), Ok(1));
    }

    #[test]
    fn loaded_handle_never_writes() {
        let mut store = MemoryIdentityStore::new();
        let mut handle = IdentityHandle::loaded(fixture("Alice"));
        assert_eq!(handle.commit_as_needed(&mut store), Ok(false));
        assert_eq!(store.list_identities().map(|v| v.len()), Ok(0));
    }

    #[test]
    fn invalid_identity_stays_pending() {
        let mut store = MemoryIdentityStore::new();
        let mut handle = IdentityHandle::new(fixture(""));
        assert_eq!(
            handle.commit_as_needed(&mut store),
            Err(MemoryStoreError::Invalid(IdentityError::EmptyName))
        );
        assert!(!handle.is_durable());
    }

    #[test]
    fn current_user_pointer() {
        let mut store = MemoryIdentityStore::new();
        let alice = fixture("Alice");
        assert_eq!(store.is_user_set(), Ok(false));
        assert!(store.set_current_user(&alice.id()).is_err());

        store.store_identity(&alice).expect("store");
        store.set_current_user(&alice.id()).expect("set user");
        assert_eq!(store.is_user_set(), Ok(true));
        assert_eq!(store.current_user(), Ok(Some(alice)));
    }
}
