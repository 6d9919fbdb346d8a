//! Batched author/community hydration (§4.4): feeds return bare DIDs in
//! their `Post`/`Comment` rows, and this is the one place that turns a page
//! of rows into a page of hydrated view models without an N+1 query per
//! row. A small `moka` read-through cache absorbs repeat hydration of the
//! same handful of hot authors/communities across requests.

use std::{sync::Arc, time::Duration};

use moka::future::Cache;

use crate::models::{Community, User};
use crate::store::{communities, users, DbPool};

const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 10_000;

#[derive(Clone)]
pub struct Hydrator {
    pool: DbPool,
    users: Cache<String, Option<Arc<User>>>,
    communities: Cache<String, Option<Arc<Community>>>,
}

impl Hydrator {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            users: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
            communities: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Resolves the subset of `dids` not already cached in one batch query,
    /// preserving no particular order — callers join by `did`.
    pub async fn hydrate_users(&self, dids: &[String]) -> anyhow::Result<Vec<Arc<User>>> {
        let mut out = Vec::with_capacity(dids.len());
        let mut missing = Vec::new();
        for did in dids {
            match self.users.get(did).await {
                Some(Some(user)) => out.push(user),
                Some(None) => {}
                None => missing.push(did.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(out);
        }
        let fetched = users::get_by_dids(&self.pool, &missing).await?;
        let mut found = std::collections::HashSet::new();
        for user in fetched {
            found.insert(user.did.clone());
            let user = Arc::new(user);
            self.users.insert(user.did.clone(), Some(user.clone())).await;
            out.push(user);
        }
        for did in missing {
            if !found.contains(&did) {
                self.users.insert(did, None).await;
            }
        }
        Ok(out)
    }

    pub async fn hydrate_communities(&self, dids: &[String]) -> anyhow::Result<Vec<Arc<Community>>> {
        let mut out = Vec::with_capacity(dids.len());
        let mut missing = Vec::new();
        for did in dids {
            match self.communities.get(did).await {
                Some(Some(community)) => out.push(community),
                Some(None) => {}
                None => missing.push(did.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(out);
        }
        let fetched = communities::get_by_dids(&self.pool, &missing).await?;
        let mut found = std::collections::HashSet::new();
        for community in fetched {
            found.insert(community.did.clone());
            let community = Arc::new(community);
            self.communities
                .insert(community.did.clone(), Some(community.clone()))
                .await;
            out.push(community);
        }
        for did in missing {
            if !found.contains(&did) {
                self.communities.insert(did, None).await;
            }
        }
        Ok(out)
    }

    /// Invalidates a single author entry, called by the identity consumer
    /// on handle change so a stale hydrated handle doesn't linger for the
    /// remainder of the TTL (§4.1.1).
    pub async fn invalidate_user(&self, did: &str) {
        self.users.invalidate(did).await;
    }

    pub async fn invalidate_community(&self, did: &str) {
        self.communities.invalidate(did).await;
    }
}
