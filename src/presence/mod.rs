// Voice membership hook
// When the last human leaves a channel, there is nobody left to listen - leave too.

use tracing::{debug, info};

use crate::engine::{ChannelId, SessionKey};
use crate::error::Result;
use crate::session::SessionRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceMember {
    pub user_id: u64,
    pub is_bot: bool,
}

/// A channel as it looked when the update was produced
#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub members: Vec<VoiceMember>,
}

impl ChannelSnapshot {
    pub fn has_humans(&self) -> bool {
        self.members.iter().any(|m| !m.is_bot)
    }
}

/// Someone joined, left or moved between voice channels in a guild
#[derive(Debug, Clone)]
pub struct VoiceStateUpdate {
    pub guild: SessionKey,
    pub member: VoiceMember,
    /// The channel the member was in before, with its remaining members
    pub before: Option<ChannelSnapshot>,
    pub after: Option<ChannelId>,
}

pub struct PresenceMonitor {
    registry: SessionRegistry,
}

impl PresenceMonitor {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Returns true when the update caused a teardown
    pub async fn on_voice_state_update(&self, update: &VoiceStateUpdate) -> Result<bool> {
        if update.member.is_bot {
            return Ok(false);
        }

        // An empty member list means nobody is left at all, including us
        let Some(before) = update.before.as_ref().filter(|c| !c.members.is_empty()) else {
            return Ok(false);
        };

        if before.has_humans() {
            return Ok(false);
        }

        // Only the channel we are sitting in matters
        let Some(session) = self.registry.get(update.guild).await else {
            return Ok(false);
        };
        match session.status().await {
            Ok(status) if status.channel == Some(before.id) => {}
            _ => return Ok(false),
        }

        debug!("Only bots left in channel {} on guild {}", before.id, update.guild);
        self.on_channel_emptied(update.guild).await?;
        Ok(true)
    }

    /// A guild's channel has no humans left
    pub async fn on_channel_emptied(&self, guild: SessionKey) -> Result<()> {
        if self.registry.get(guild).await.is_some() {
            info!("Everyone left the voice channel on guild {}, tearing down", guild);
        }
        self.registry.teardown(guild).await
    }
}
