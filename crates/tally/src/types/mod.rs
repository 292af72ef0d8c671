mod channel_id;
mod guild_id;
mod user_id;

pub use channel_id::ChannelId;
pub use guild_id::GuildId;
pub use user_id::UserId;
