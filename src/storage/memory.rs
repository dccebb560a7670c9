// ABOUTME: In-memory implementation of every storage contract with transactional undo journals
// ABOUTME: Records written by an open transaction are locked; other writers get a serialization failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::context::{RequestContext, TransactionId};
use crate::errors::StorageError;
use crate::models::RequestId;
use crate::oauth2_server::request::Request;
use crate::oauth2_server::storage::{
    AccessTokenStorage, AuthorizeCodeStorage, ConsumedVerifierStorage, PkceRequestStorage,
    RefreshTokenStorage, ResourceOwnerAuthenticator, StoredGrant, TokenRevocationStorage,
    Transactional,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Table {
    Codes,
    Access,
    Refresh,
    Pkce,
    Consumed,
}

#[derive(Debug, Clone)]
struct RefreshRecord {
    grant: StoredGrant,
    access_signature: String,
}

/// Previous value of one record, restored on rollback
#[derive(Debug)]
enum Undo {
    Code(String, Option<StoredGrant>),
    Access(String, Option<Request>),
    Refresh(String, Option<RefreshRecord>),
    Pkce(String, Option<Request>),
    Consumed(String),
}

#[derive(Debug)]
struct User {
    password: String,
    subject: String,
}

#[derive(Debug, Default)]
struct State {
    codes: HashMap<String, StoredGrant>,
    access: HashMap<String, Request>,
    refresh: HashMap<String, RefreshRecord>,
    pkce: HashMap<String, Request>,
    consumed: HashSet<String>,
    users: HashMap<String, User>,
    journals: HashMap<TransactionId, Vec<Undo>>,
    locks: HashMap<(Table, String), TransactionId>,
    next_transaction: u64,
}

fn restore<V>(map: &mut HashMap<String, V>, key: String, previous: Option<V>) {
    match previous {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

impl State {
    /// Take the write lock on a record for the context's transaction
    fn claim(&mut self, ctx: &RequestContext, table: Table, key: &str) -> Result<(), StorageError> {
        ctx.ensure_active()?;
        let record = (table, key.to_owned());
        match (self.locks.get(&record).copied(), ctx.transaction()) {
            (Some(owner), Some(tx)) if owner == tx => Ok(()),
            (Some(owner), _) => {
                debug!(table = ?table, owner = %owner, "Record locked by another transaction");
                Err(StorageError::SerializationFailure)
            }
            (None, Some(tx)) => {
                if !self.journals.contains_key(&tx) {
                    return Err(StorageError::backend(format!("unknown transaction {tx}")));
                }
                self.locks.insert(record, tx);
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    fn journal(&mut self, ctx: &RequestContext, undo: Undo) {
        if let Some(journal) = ctx.transaction().and_then(|tx| self.journals.get_mut(&tx)) {
            journal.push(undo);
        }
    }

    fn release(&mut self, tx: TransactionId) {
        self.locks.retain(|_, owner| *owner != tx);
    }

    fn apply(&mut self, undo: Undo) {
        match undo {
            Undo::Code(key, previous) => restore(&mut self.codes, key, previous),
            Undo::Access(key, previous) => restore(&mut self.access, key, previous),
            Undo::Refresh(key, previous) => restore(&mut self.refresh, key, previous),
            Undo::Pkce(key, previous) => restore(&mut self.pkce, key, previous),
            Undo::Consumed(key) => {
                self.consumed.remove(&key);
            }
        }
    }

    fn put_access(&mut self, ctx: &RequestContext, signature: &str, request: Option<Request>) -> Result<(), StorageError> {
        self.claim(ctx, Table::Access, signature)?;
        let previous = match request {
            Some(request) => self.access.insert(signature.to_owned(), request),
            None => self.access.remove(signature),
        };
        self.journal(ctx, Undo::Access(signature.to_owned(), previous));
        Ok(())
    }

    fn put_refresh(
        &mut self,
        ctx: &RequestContext,
        signature: &str,
        record: Option<RefreshRecord>,
    ) -> Result<(), StorageError> {
        self.claim(ctx, Table::Refresh, signature)?;
        let previous = match record {
            Some(record) => self.refresh.insert(signature.to_owned(), record),
            None => self.refresh.remove(signature),
        };
        self.journal(ctx, Undo::Refresh(signature.to_owned(), previous));
        Ok(())
    }

    fn deactivate_refresh(&mut self, ctx: &RequestContext, signature: &str) -> Result<(), StorageError> {
        let Some(mut record) = self.refresh.get(signature).cloned() else {
            return Err(StorageError::NotFound);
        };
        record.grant.active = false;
        self.put_refresh(ctx, signature, Some(record))
    }

    fn access_signatures_of(&self, request_id: RequestId) -> Vec<String> {
        self.access
            .iter()
            .filter(|(_, request)| request.id == request_id)
            .map(|(signature, _)| signature.clone())
            .collect()
    }
}

/// Storage backed by process memory
///
/// Every contract is implemented, including [`Transactional`]. Writes made
/// through a transaction-bound context are journaled and lock the records
/// they touch until commit or rollback.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register resource owner credentials for the password grant
    pub async fn add_user(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
        subject: impl Into<String>,
    ) {
        self.state.write().await.users.insert(
            username.into(),
            User {
                password: password.into(),
                subject: subject.into(),
            },
        );
    }

    /// Number of stored access token sessions belonging to `request_id`
    pub async fn access_token_count(&self, request_id: RequestId) -> usize {
        self.state.read().await.access_signatures_of(request_id).len()
    }

    /// Number of open transactions
    pub async fn open_transactions(&self) -> usize {
        self.state.read().await.journals.len()
    }
}

#[async_trait]
impl AuthorizeCodeStorage for MemoryStore {
    async fn create_authorize_code_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
        request: &Request,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.claim(ctx, Table::Codes, signature)?;
        let previous = state.codes.insert(
            signature.to_owned(),
            StoredGrant {
                request: request.clone(),
                active: true,
            },
        );
        state.journal(ctx, Undo::Code(signature.to_owned(), previous));
        Ok(())
    }

    async fn get_authorize_code_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<StoredGrant, StorageError> {
        ctx.ensure_active()?;
        self.state
            .read()
            .await
            .codes
            .get(signature)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn invalidate_authorize_code_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.claim(ctx, Table::Codes, signature)?;
        let Some(stored) = state.codes.get_mut(signature) else {
            return Err(StorageError::NotFound);
        };
        if !stored.active {
            return Err(StorageError::Inactive);
        }
        let previous = stored.clone();
        stored.active = false;
        state.journal(ctx, Undo::Code(signature.to_owned(), Some(previous)));
        Ok(())
    }
}

#[async_trait]
impl AccessTokenStorage for MemoryStore {
    async fn create_access_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
        request: &Request,
    ) -> Result<(), StorageError> {
        self.state
            .write()
            .await
            .put_access(ctx, signature, Some(request.clone()))
    }

    async fn get_access_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<Request, StorageError> {
        ctx.ensure_active()?;
        self.state
            .read()
            .await
            .access
            .get(signature)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete_access_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.access.contains_key(signature) {
            return Err(StorageError::NotFound);
        }
        state.put_access(ctx, signature, None)
    }
}

#[async_trait]
impl RefreshTokenStorage for MemoryStore {
    async fn create_refresh_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
        access_signature: &str,
        request: &Request,
    ) -> Result<(), StorageError> {
        let record = RefreshRecord {
            grant: StoredGrant {
                request: request.clone(),
                active: true,
            },
            access_signature: access_signature.to_owned(),
        };
        self.state
            .write()
            .await
            .put_refresh(ctx, signature, Some(record))
    }

    async fn get_refresh_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<StoredGrant, StorageError> {
        ctx.ensure_active()?;
        self.state
            .read()
            .await
            .refresh
            .get(signature)
            .map(|record| record.grant.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn delete_refresh_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.refresh.contains_key(signature) {
            return Err(StorageError::NotFound);
        }
        state.put_refresh(ctx, signature, None)
    }

    async fn rotate_refresh_token(
        &self,
        ctx: &RequestContext,
        request_id: RequestId,
        signature: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let linked = state
            .refresh
            .get(signature)
            .map(|record| record.access_signature.clone())
            .ok_or(StorageError::NotFound)?;
        state.deactivate_refresh(ctx, signature)?;

        let mut dropped = state.access_signatures_of(request_id);
        if !dropped.contains(&linked) && state.access.contains_key(&linked) {
            dropped.push(linked);
        }
        for access_signature in &dropped {
            state.put_access(ctx, access_signature, None)?;
        }
        debug!(request_id = %request_id, dropped_access_tokens = dropped.len(), "Refresh token rotated");
        Ok(())
    }
}

#[async_trait]
impl TokenRevocationStorage for MemoryStore {
    async fn revoke_refresh_token(
        &self,
        ctx: &RequestContext,
        request_id: RequestId,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let signatures: Vec<String> = state
            .refresh
            .iter()
            .filter(|(_, record)| record.grant.request.id == request_id && record.grant.active)
            .map(|(signature, _)| signature.clone())
            .collect();
        for signature in &signatures {
            state.deactivate_refresh(ctx, signature)?;
        }
        Ok(())
    }

    async fn revoke_access_token(
        &self,
        ctx: &RequestContext,
        request_id: RequestId,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        for signature in state.access_signatures_of(request_id) {
            state.put_access(ctx, &signature, None)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceOwnerAuthenticator for MemoryStore {
    async fn authenticate(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<String, StorageError> {
        ctx.ensure_active()?;
        let state = self.state.read().await;
        let Some(user) = state.users.get(username) else {
            return Err(StorageError::NotFound);
        };
        if bool::from(user.password.as_bytes().ct_eq(password.as_bytes())) {
            Ok(user.subject.clone())
        } else {
            Err(StorageError::NotFound)
        }
    }
}

#[async_trait]
impl PkceRequestStorage for MemoryStore {
    async fn create_pkce_request_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
        request: &Request,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.claim(ctx, Table::Pkce, signature)?;
        let previous = state.pkce.insert(signature.to_owned(), request.clone());
        state.journal(ctx, Undo::Pkce(signature.to_owned(), previous));
        Ok(())
    }

    async fn get_pkce_request_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<Request, StorageError> {
        ctx.ensure_active()?;
        self.state
            .read()
            .await
            .pkce
            .get(signature)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete_pkce_request_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.claim(ctx, Table::Pkce, signature)?;
        let Some(previous) = state.pkce.remove(signature) else {
            return Err(StorageError::NotFound);
        };
        state.journal(ctx, Undo::Pkce(signature.to_owned(), Some(previous)));
        Ok(())
    }
}

#[async_trait]
impl ConsumedVerifierStorage for MemoryStore {
    async fn consume_verifier(&self, ctx: &RequestContext, key: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.claim(ctx, Table::Consumed, key)?;
        if !state.consumed.insert(key.to_owned()) {
            return Err(StorageError::Inactive);
        }
        state.journal(ctx, Undo::Consumed(key.to_owned()));
        Ok(())
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    async fn begin_tx(&self, ctx: &RequestContext) -> Result<RequestContext, StorageError> {
        ctx.ensure_active()?;
        let mut state = self.state.write().await;
        state.next_transaction += 1;
        let tx = TransactionId(state.next_transaction);
        state.journals.insert(tx, Vec::new());
        debug!(transaction = %tx, "Transaction started");
        Ok(ctx.with_transaction(tx))
    }

    async fn commit(&self, ctx: &RequestContext) -> Result<(), StorageError> {
        let Some(tx) = ctx.transaction() else {
            return Ok(());
        };
        let mut state = self.state.write().await;
        let Some(journal) = state.journals.remove(&tx) else {
            return Err(StorageError::backend(format!("unknown transaction {tx}")));
        };
        state.release(tx);
        debug!(transaction = %tx, writes = journal.len(), "Transaction committed");
        Ok(())
    }

    async fn rollback(&self, ctx: &RequestContext) -> Result<(), StorageError> {
        let Some(tx) = ctx.transaction() else {
            return Ok(());
        };
        let mut state = self.state.write().await;
        let Some(journal) = state.journals.remove(&tx) else {
            warn!(transaction = %tx, "Rollback of unknown transaction");
            return Err(StorageError::backend(format!("unknown transaction {tx}")));
        };
        let writes = journal.len();
        for undo in journal.into_iter().rev() {
            state.apply(undo);
        }
        state.release(tx);
        debug!(transaction = %tx, writes, "Transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Client;

    fn request() -> Request {
        Request::new(Arc::new(Client::new("app")))
    }

    #[tokio::test]
    async fn test_rollback_restores_previous_records() {
        let store = MemoryStore::new();
        let ctx = RequestContext::new();
        let original = request();
        store
            .create_authorize_code_session(&ctx, "code", &original)
            .await
            .unwrap();

        let tx = store.begin_tx(&ctx).await.unwrap();
        store.invalidate_authorize_code_session(&tx, "code").await.unwrap();
        store.create_access_token_session(&tx, "at", &original).await.unwrap();
        store.rollback(&tx).await.unwrap();

        assert!(store.get_authorize_code_session(&ctx, "code").await.unwrap().active);
        assert!(matches!(
            store.get_access_token_session(&ctx, "at").await,
            Err(StorageError::NotFound)
        ));
        assert_eq!(store.open_transactions().await, 0);
    }

    #[tokio::test]
    async fn test_locked_record_conflicts() {
        let store = MemoryStore::new();
        let ctx = RequestContext::new();
        store
            .create_authorize_code_session(&ctx, "code", &request())
            .await
            .unwrap();

        let first = store.begin_tx(&ctx).await.unwrap();
        let second = store.begin_tx(&ctx).await.unwrap();
        store.invalidate_authorize_code_session(&first, "code").await.unwrap();
        assert!(matches!(
            store.invalidate_authorize_code_session(&second, "code").await,
            Err(StorageError::SerializationFailure)
        ));

        store.commit(&first).await.unwrap();
        assert!(matches!(
            store.invalidate_authorize_code_session(&second, "code").await,
            Err(StorageError::Inactive)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_context_refuses_writes() {
        let store = MemoryStore::new();
        let ctx = RequestContext::new();
        ctx.cancel();
        assert!(matches!(
            store.create_access_token_session(&ctx, "at", &request()).await,
            Err(StorageError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_consume_verifier_once() {
        let store = MemoryStore::new();
        let ctx = RequestContext::new();
        store.consume_verifier(&ctx, "flow:login_verifier").await.unwrap();
        assert!(matches!(
            store.consume_verifier(&ctx, "flow:login_verifier").await,
            Err(StorageError::Inactive)
        ));
    }
}
