//! Blocking Reddit API client.
//!
//! Authenticates with the application-only OAuth2 flow: the client id and
//! secret are exchanged for a bearer token on first use, and the token is
//! kept for the lifetime of the process. Reads then go through
//! `oauth.reddit.com`.

use std::sync::Mutex;

use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::client::{CommentNode, ForumClient, Thread};
use crate::config::Settings;
use crate::error::ClientError;

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

pub struct RedditClient {
    http: reqwest::blocking::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<String>>,
}

impl RedditClient {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    /// Returns the cached bearer token, requesting one if necessary.
    fn token(&self) -> Result<String, ClientError> {
        let mut guard = self.token.lock().unwrap();
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        tracing::debug!("requesting application-only access token");
        let resp = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;
        let resp = check_status(resp)?;
        let auth: AccessToken = resp.json()?;

        *guard = Some(auth.access_token.clone());
        Ok(auth.access_token)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let token = self.token()?;
        let resp = self.http.get(url).bearer_auth(token).send()?;
        let resp = check_status(resp)?;
        Ok(resp.json()?)
    }
}

fn check_status(
    resp: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().unwrap_or_default();
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp)
}

impl ForumClient for RedditClient {
    fn hot_threads(&self, source: &str, limit: u32) -> Result<Vec<Thread>, ClientError> {
        tracing::info!(source, limit, "listing hot threads");
        let url = format!("{API_BASE}/r/{source}/hot?limit={limit}&raw_json=1");
        let listing: Listing<LinkThing> = self.get_json(&url)?;

        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| Thread {
                id: child.data.id,
                title: child.data.title,
            })
            .collect())
    }

    fn comments(&self, thread: &Thread) -> Result<Vec<CommentNode>, ClientError> {
        tracing::debug!(thread = %thread.id, "fetching comment listing");
        let url = format!("{API_BASE}/comments/{}?raw_json=1", thread.id);
        // The endpoint returns a two-element array: the submission itself,
        // then the top-level comment listing.
        let (_, listing): (IgnoredAny, Listing<CommentThing>) = self.get_json(&url)?;

        Ok(listing
            .data
            .children
            .into_iter()
            .map(CommentThing::into_node)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    children: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct LinkThing {
    data: LinkData,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
enum CommentThing {
    #[serde(rename = "t1")]
    Comment { data: CommentData },
    #[serde(rename = "more")]
    More { data: IgnoredAny },
}

#[derive(Debug, Deserialize)]
struct CommentData {
    author: Option<String>,
    body: String,
}

impl CommentThing {
    fn into_node(self) -> CommentNode {
        match self {
            CommentThing::Comment { data } => CommentNode::Comment {
                author: data.author,
                body: data.body,
            },
            CommentThing::More { .. } => CommentNode::More,
        }
    }
}
