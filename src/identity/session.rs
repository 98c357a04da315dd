use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use base64::Engine;
use parking_lot::RwLock;

use crate::tprintln;

use super::principal::Identity;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub identity: Identity,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<SessionToken, Session>,
    user_index: HashMap<String, HashSet<SessionToken>>,
}

impl SessionTable {
    fn forget(&mut self, token: &str) -> Option<Session> {
        let s = self.sessions.remove(token)?;
        if let Some(set) = self.user_index.get_mut(&s.identity.user_id) {
            set.remove(token);
            if set.is_empty() { self.user_index.remove(&s.identity.user_id); }
        }
        Some(s)
    }

    fn sweep_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<SessionToken> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.expires_at <= now)
            .map(|(t, _)| t.clone())
            .collect();
        for t in &expired { self.forget(t); }
        expired.len()
    }
}

// 256-bit random id, base64url without padding
fn gen_id() -> Result<String> {
    encode_random(getrandom::getrandom)
}

fn encode_random(fill: impl FnOnce(&mut [u8]) -> Result<(), getrandom::Error>) -> Result<String> {
    let mut buf = [0u8; 32];
    fill(&mut buf).map_err(|e| anyhow!("random source unavailable: {e}"))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Issues and validates opaque bearer tokens. Cheap to clone; clones share the table.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    table: Arc<RwLock<SessionTable>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, table: Arc::new(RwLock::new(SessionTable::default())) }
    }

    /// Fails only when the OS random source does; no token is handed out then.
    pub fn issue(&self, identity: Identity) -> Result<Session> {
        let sid = gen_id()?;
        let token = gen_id()?;
        let now = Instant::now();
        let sess = Session {
            session_id: sid.clone(),
            token: token.clone(),
            identity: identity.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let swept = {
            let mut t = self.table.write();
            let swept = t.sweep_expired(now);
            t.sessions.insert(token.clone(), sess.clone());
            t.user_index.entry(identity.user_id.clone()).or_default().insert(token);
            swept
        };
        tprintln!("session.issue user={} sid={} ttl_secs={} swept={}", identity.user_id, sid, self.ttl.as_secs(), swept);
        Ok(sess)
    }

    /// Identity for a live token; expired tokens are dropped on sight.
    pub fn validate(&self, token: &str) -> Option<Identity> {
        let now = Instant::now();
        {
            let t = self.table.read();
            match t.sessions.get(token) {
                Some(s) if s.expires_at > now => return Some(s.identity.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.table.write().forget(token);
        None
    }

    pub fn logout(&self, token: &str) -> bool {
        self.table.write().forget(token).is_some()
    }

    /// Revoke every session held by `user_id`; returns how many were live.
    pub fn revoke_user(&self, user_id: &str) -> usize {
        let mut t = self.table.write();
        let tokens = t.user_index.remove(user_id).unwrap_or_default();
        let count = tokens.iter().filter(|tok| t.sessions.remove(*tok).is_some()).count();
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }
}
