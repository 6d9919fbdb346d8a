//! Wire view models (§6): hydrated, JSON-serializable projections of the
//! plain `FromRow` structs in `crate::models`. Kept separate from the store
//! layer so a schema column never accidentally becomes part of the public
//! API just by deriving `Serialize` on the row type.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::feed::hydrate::Hydrator;
use crate::models::{Community, Post, User};

#[derive(Debug, Serialize)]
pub struct AuthorView {
    pub did: String,
    pub handle: String,
}

impl From<&User> for AuthorView {
    fn from(u: &User) -> Self {
        Self { did: u.did.clone(), handle: u.handle.clone() }
    }
}

#[derive(Debug, Serialize)]
pub struct CommunityView {
    pub did: String,
    pub handle: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub description: Option<String>,
}

impl From<&Community> for CommunityView {
    fn from(c: &Community) -> Self {
        Self {
            did: c.did.clone(),
            handle: c.handle.clone(),
            name: c.name.clone(),
            display_name: c.display_name.clone(),
            description: c.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: Option<AuthorView>,
    pub community: Option<CommunityView>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub embed: Option<Value>,
    pub labels: Option<Value>,
    pub score: i64,
    #[serde(rename = "upvoteCount")]
    pub upvote_count: i64,
    #[serde(rename = "downvoteCount")]
    pub downvote_count: i64,
    #[serde(rename = "commentCount")]
    pub comment_count: i64,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Joins a page of bare `Post` rows against the author/community hydrator
/// in two batch queries total, regardless of page size (§4.4).
pub async fn hydrate_post_views(hydrator: &Hydrator, posts: Vec<Post>) -> anyhow::Result<Vec<PostView>> {
    let author_dids: Vec<String> = posts.iter().map(|p| p.author_did.clone()).collect();
    let community_dids: Vec<String> = posts.iter().map(|p| p.community_did.clone()).collect();
    let authors = hydrator.hydrate_users(&author_dids).await?;
    let communities = hydrator.hydrate_communities(&community_dids).await?;

    let author_by_did: std::collections::HashMap<_, _> =
        authors.iter().map(|u| (u.did.clone(), u.clone())).collect();
    let community_by_did: std::collections::HashMap<_, _> =
        communities.iter().map(|c| (c.did.clone(), c.clone())).collect();

    Ok(posts
        .into_iter()
        .map(|p| {
            let author: Option<Arc<User>> = author_by_did.get(&p.author_did).cloned();
            let community: Option<Arc<Community>> = community_by_did.get(&p.community_did).cloned();
            PostView {
                uri: p.uri,
                cid: p.cid,
                author: author.as_deref().map(AuthorView::from),
                community: community.as_deref().map(CommunityView::from),
                title: p.title,
                content: p.content,
                embed: p.embed,
                labels: p.labels,
                score: p.score,
                upvote_count: p.upvote_count,
                downvote_count: p.downvote_count,
                comment_count: p.comment_count,
                created_at: p.created_at,
            }
        })
        .collect())
}
