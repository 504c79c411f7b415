//! Who may submit requests.
//!
//! Checked by front ends before `TaskQueue::submit`; the queue itself assumes
//! every job is authorized.

use crate::config::AccessConfig;
use crate::job::{RequesterId, SinkId};

#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allowed_users: Vec<RequesterId>,
    target_channel: Option<SinkId>,
}

impl AccessPolicy {
    pub fn new(allowed_users: Vec<RequesterId>, target_channel: Option<SinkId>) -> Self {
        Self {
            allowed_users,
            target_channel,
        }
    }

    pub fn from_config(cfg: &AccessConfig) -> Self {
        Self::new(cfg.allowed_users.clone(), cfg.target_channel)
    }

    pub fn is_known_user(&self, requester: RequesterId) -> bool {
        self.allowed_users.contains(&requester)
    }

    /// Allowed users may request into their own private chat or the target channel.
    pub fn is_allowed(&self, requester: RequesterId, chat: SinkId) -> bool {
        self.is_known_user(requester)
            && (chat == requester || Some(chat) == self.target_channel)
    }
}
