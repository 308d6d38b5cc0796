//! Presentation helpers shared by front ends: names, grouping, CDN links and
//! formatting. Nothing here does layout.

use chrono::{DateTime, TimeZone};
use shared::{
    domain::ChannelKind,
    protocol::{Attachment, Channel, Guild, Identity},
};

use crate::content::CustomEmoji;
pub use crate::mentions::user_tag;

pub const CDN_BASE_URL: &str = "https://cdn.discordapp.com";
pub const DEFAULT_EMBED_COLOR: &str = "#5865f2";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac"];

/// Conversations are named after their first participant.
pub fn channel_display_name(channel: &Channel) -> String {
    if let Some(first) = channel.recipients.first() {
        return user_tag(first);
    }
    match (&channel.name, channel.kind) {
        (Some(name), _) => name.clone(),
        (None, ChannelKind::Direct | ChannelKind::Group) => "Direct Message".to_string(),
        (None, _) => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGroup<'a> {
    pub category: &'a Channel,
    pub channels: Vec<&'a Channel>,
}

/// Text channels of a guild as a sidebar would list them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelListing<'a> {
    pub uncategorized: Vec<&'a Channel>,
    pub groups: Vec<ChannelGroup<'a>>,
}

/// Keeps the input order; categories without text channels are left out.
pub fn group_channels(channels: &[Channel]) -> ChannelListing<'_> {
    let text = || {
        channels
            .iter()
            .filter(|channel| channel.kind == ChannelKind::Text)
    };
    ChannelListing {
        uncategorized: text().filter(|channel| channel.parent_id.is_none()).collect(),
        groups: channels
            .iter()
            .filter(|channel| channel.kind == ChannelKind::Category)
            .map(|category| ChannelGroup {
                category,
                channels: text()
                    .filter(|channel| channel.parent_id.as_ref() == Some(&category.id))
                    .collect(),
            })
            .filter(|group| !group.channels.is_empty())
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
}

/// Classified by content type, falling back to the file extension.
pub fn attachment_kind(attachment: &Attachment) -> AttachmentKind {
    let content_type = attachment
        .content_type
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    for (prefix, kind) in [
        ("image/", AttachmentKind::Image),
        ("video/", AttachmentKind::Video),
        ("audio/", AttachmentKind::Audio),
    ] {
        if content_type.starts_with(prefix) {
            return kind;
        }
    }

    let extension = attachment
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        AttachmentKind::Image
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        AttachmentKind::Video
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        AttachmentKind::Audio
    } else {
        AttachmentKind::File
    }
}

pub fn emoji_url(emoji: &CustomEmoji) -> String {
    let format = if emoji.animated { "gif" } else { "png" };
    format!("{CDN_BASE_URL}/emojis/{}.{format}?quality=lossless", emoji.id)
}

pub fn guild_icon_url(guild: &Guild) -> Option<String> {
    let icon = guild.icon.as_deref().filter(|icon| !icon.is_empty())?;
    Some(format!("{CDN_BASE_URL}/icons/{}/{icon}.png?size=128", guild.id))
}

pub fn avatar_url(user: &Identity) -> String {
    match user.avatar.as_deref().filter(|avatar| !avatar.is_empty()) {
        Some(avatar) => {
            let format = if avatar.starts_with("a_") { "gif" } else { "png" };
            format!("{CDN_BASE_URL}/avatars/{}/{avatar}.{format}?size=128", user.id)
        }
        None => {
            let index = user
                .id
                .as_str()
                .parse::<u64>()
                .map(|id| (id >> 22) % 5)
                .unwrap_or(0);
            format!("{CDN_BASE_URL}/embed/avatars/{index}.png")
        }
    }
}

pub fn embed_color_hex(color: Option<u32>) -> String {
    match color {
        Some(color) if color != 0 => format!("#{:06x}", color & 0x00ff_ffff),
        _ => DEFAULT_EMBED_COLOR.to_string(),
    }
}

/// Short day/month/year and hour:minute, in the timestamp's own zone.
pub fn format_timestamp<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    timestamp.format("%d/%m/%Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::domain::{AttachmentId, ChannelId, GuildId, UserId};

    fn channel(id: &str, kind: ChannelKind, parent: Option<&str>) -> Channel {
        Channel {
            id: ChannelId::new(id),
            kind,
            name: Some(id.to_string()),
            parent_id: parent.map(ChannelId::new),
            position: None,
            recipients: Vec::new(),
        }
    }

    fn user(id: &str, avatar: Option<&str>) -> Identity {
        Identity {
            id: UserId::new(id),
            username: "bob".into(),
            discriminator: "1234".into(),
            global_name: None,
            avatar: avatar.map(str::to_string),
            bot: false,
        }
    }

    fn attachment(filename: &str, content_type: Option<&str>) -> Attachment {
        Attachment {
            id: AttachmentId::new("1"),
            filename: filename.into(),
            size: 10,
            url: "https://cdn.example/file".into(),
            content_type: content_type.map(str::to_string),
            width: None,
            height: None,
            description: None,
        }
    }

    #[test]
    fn conversations_use_first_participant() {
        let mut dm = channel("d1", ChannelKind::Direct, None);
        dm.name = None;
        assert_eq!(channel_display_name(&dm), "Direct Message");

        dm.recipients.push(user("5", None));
        assert_eq!(channel_display_name(&dm), "bob#1234");

        let text = channel("general", ChannelKind::Text, None);
        assert_eq!(channel_display_name(&text), "general");
    }

    #[test]
    fn channels_are_grouped_under_categories() {
        let channels = vec![
            channel("loose", ChannelKind::Text, None),
            channel("cat-a", ChannelKind::Category, None),
            channel("empty", ChannelKind::Category, None),
            channel("in-a", ChannelKind::Text, Some("cat-a")),
            channel("voice", ChannelKind::Voice, Some("empty")),
        ];
        let listing = group_channels(&channels);

        assert_eq!(listing.uncategorized.len(), 1);
        assert_eq!(listing.uncategorized[0].id.as_str(), "loose");
        assert_eq!(listing.groups.len(), 1);
        assert_eq!(listing.groups[0].category.id.as_str(), "cat-a");
        assert_eq!(listing.groups[0].channels[0].id.as_str(), "in-a");
    }

    #[test]
    fn attachment_kind_prefers_content_type() {
        assert_eq!(
            attachment_kind(&attachment("clip.png", Some("video/mp4"))),
            AttachmentKind::Video
        );
        assert_eq!(attachment_kind(&attachment("photo.JPEG", None)), AttachmentKind::Image);
        assert_eq!(attachment_kind(&attachment("song.flac", None)), AttachmentKind::Audio);
        assert_eq!(attachment_kind(&attachment("notes", None)), AttachmentKind::File);
        assert_eq!(
            attachment_kind(&attachment("a.bin", Some("Image/PNG"))),
            AttachmentKind::Image
        );
    }

    #[test]
    fn avatar_urls() {
        assert_eq!(
            avatar_url(&user("42", Some("a_hash"))),
            "https://cdn.discordapp.com/avatars/42/a_hash.gif?size=128"
        );
        assert_eq!(
            avatar_url(&user("42", Some("hash"))),
            "https://cdn.discordapp.com/avatars/42/hash.png?size=128"
        );
        assert_eq!(
            avatar_url(&user("80351110224678912", None)),
            format!(
                "https://cdn.discordapp.com/embed/avatars/{}.png",
                (80351110224678912u64 >> 22) % 5
            )
        );
        assert_eq!(
            avatar_url(&user("not-a-number", None)),
            "https://cdn.discordapp.com/embed/avatars/0.png"
        );
    }

    #[test]
    fn emoji_and_icon_urls() {
        let emoji = CustomEmoji {
            animated: true,
            name: "party".into(),
            id: "99".into(),
            raw: "<a:party:99>".into(),
        };
        assert_eq!(
            emoji_url(&emoji),
            "https://cdn.discordapp.com/emojis/99.gif?quality=lossless"
        );

        let mut guild = Guild {
            id: GuildId::new("7"),
            name: "Seven".into(),
            icon: None,
        };
        assert_eq!(guild_icon_url(&guild), None);
        guild.icon = Some("abc".into());
        assert_eq!(
            guild_icon_url(&guild).as_deref(),
            Some("https://cdn.discordapp.com/icons/7/abc.png?size=128")
        );
    }

    #[test]
    fn embed_colors() {
        assert_eq!(embed_color_hex(None), "#5865f2");
        assert_eq!(embed_color_hex(Some(0)), "#5865f2");
        assert_eq!(embed_color_hex(Some(0xff)), "#0000ff");
        assert_eq!(embed_color_hex(Some(0x123456)), "#123456");
    }

    #[test]
    fn timestamps_are_short() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "09/03/2024 07:05");
    }
}
