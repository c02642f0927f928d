// Line-based front end - one stdin user sitting in one voice channel
// Maps typed commands onto the session registry and prints the replies

pub mod commands;

pub use commands::{parse_line, ConsoleCommand, ParseError};

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::audio::format_clock;
use crate::engine::{ChannelId, SessionKey};
use crate::error::Error;
use crate::presence::PresenceMonitor;
use crate::resolver::Enqueued;
use crate::session::{NowPlaying, SessionRegistry, SessionStatus};

pub enum Outcome {
    Reply(String),
    Quit,
}

pub struct Console {
    registry: SessionRegistry,
    presence: PresenceMonitor,
    guild: SessionKey,
    channel: ChannelId,
    display_limit: usize,
}

impl Console {
    pub fn new(registry: SessionRegistry, guild: SessionKey, channel: ChannelId) -> Self {
        let display_limit = registry.settings().upcoming_display_limit;
        Self {
            presence: PresenceMonitor::new(registry.clone()),
            registry,
            guild,
            channel,
            display_limit,
        }
    }

    pub async fn run<R: AsyncBufRead + Unpin>(&self, input: R) -> Result<()> {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let command = match parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };

            match self.execute(command).await {
                Outcome::Reply(text) => println!("{}", text),
                Outcome::Quit => break,
            }
        }

        self.registry.shutdown().await;
        Ok(())
    }

    /// Run one command; precondition failures come back as the reply text
    pub async fn execute(&self, command: ConsoleCommand) -> Outcome {
        debug!("Console command {:?} on guild {}", command, self.guild);
        if command == ConsoleCommand::Quit {
            return Outcome::Quit;
        }

        match self.dispatch(command).await {
            Ok(text) => Outcome::Reply(text),
            Err(e) => {
                if !e.is_user_facing() {
                    warn!("Command failed on guild {}: {}", self.guild, e);
                }
                Outcome::Reply(format!("{}.", e))
            }
        }
    }

    async fn dispatch(&self, command: ConsoleCommand) -> Result<String, Error> {
        let registry = &self.registry;
        let guild = self.guild;

        let text = match command {
            ConsoleCommand::Connect => {
                registry.connect(guild, self.channel).await?;
                format!("Connecting to channel {}", self.channel)
            }
            ConsoleCommand::Disconnect => {
                registry.disconnect(guild).await?;
                "Disconnected.".to_string()
            }
            ConsoleCommand::Play(query) => match registry.play(guild, &query, Some(self.channel)).await? {
                Enqueued::Track(track) => format!("Added {} to the Queue", track.title),
                Enqueued::Playlist { name, count } => {
                    format!("Added the playlist {} with {} songs to the queue.", name, count)
                }
            },
            ConsoleCommand::Pause => {
                registry.session(guild).await?.pause().await?;
                "Playback paused.".to_string()
            }
            ConsoleCommand::Resume => {
                registry.session(guild).await?.resume().await?;
                "Playback resumed.".to_string()
            }
            ConsoleCommand::Stop => {
                registry.session(guild).await?.stop().await?;
                "Playback stopped.".to_string()
            }
            ConsoleCommand::Skip => {
                registry.session(guild).await?.skip().await?;
                "Skipping the song!".to_string()
            }
            ConsoleCommand::Repeat(mode) => {
                let mode = registry.session(guild).await?.set_repeat_mode(&mode).await?;
                format!("The repeat mode has been set to {}.", mode)
            }
            ConsoleCommand::Shuffle => {
                registry.session(guild).await?.shuffle().await?;
                "Queue shuffled.".to_string()
            }
            ConsoleCommand::Clear => {
                registry.session(guild).await?.clear().await?;
                "Queue cleared.".to_string()
            }
            ConsoleCommand::Volume(volume) => {
                let applied = registry.session(guild).await?.set_volume(volume).await?;
                format!("Setting the player volume to `{}`", applied)
            }
            ConsoleCommand::NowPlaying => render_now_playing(&registry.session(guild).await?.now_playing().await?),
            ConsoleCommand::Queue => {
                let upcoming = registry.session(guild).await?.upcoming().await?;
                let lines: Vec<String> = upcoming
                    .iter()
                    .take(self.display_limit)
                    .map(|t| format!("{} ({})", t, t.display_length()))
                    .collect();
                format!("Upcoming - Next {}\n{}", upcoming.len(), lines.join("\n"))
            }
            ConsoleCommand::History => {
                let history = registry.session(guild).await?.history().await?;
                if history.is_empty() {
                    "Nothing has been played yet.".to_string()
                } else {
                    let lines: Vec<String> = history.iter().map(|t| t.to_string()).collect();
                    format!("Played so far:\n{}", lines.join("\n"))
                }
            }
            ConsoleCommand::Status => render_status(&registry.session(guild).await?.status().await?),
            ConsoleCommand::Empty => {
                self.presence.on_channel_emptied(guild).await?;
                "Everyone left the channel.".to_string()
            }
            ConsoleCommand::Help => commands::HELP.to_string(),
            ConsoleCommand::Quit => String::new(),
        };

        Ok(text)
    }
}

pub fn render_now_playing(now: &NowPlaying) -> String {
    let length = if now.length_ms == 0 {
        "live".to_string()
    } else {
        format_clock(now.length_ms)
    };
    format!(
        "Now playing{}\nTrack title: {}\nArtist: {}\nPosition: {}/{}",
        if now.paused { " (paused)" } else { "" },
        now.title,
        now.author,
        format_clock(now.position_ms),
        length
    )
}

pub fn render_status(status: &SessionStatus) -> String {
    format!(
        "Guild {} | channel {} | {:?} | repeat {} | volume {} | track {}/{} | idle timer {}",
        status.key,
        status
            .channel
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string()),
        status.state,
        status.repeat_mode,
        status.volume,
        (status.position + 1).min(status.queue_len),
        status.queue_len,
        if status.idle_timer_armed { "armed" } else { "off" }
    )
}
