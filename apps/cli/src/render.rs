use chrono::Local;
use client_core::{
    display::{
        attachment_kind, channel_display_name, embed_color_hex, format_timestamp,
        group_channels, AttachmentKind,
    },
    parse_content, render_plain, user_tag, SessionState, SessionStatus,
};
use shared::protocol::{Embed, Message};

pub fn status_line(state: &SessionState) -> String {
    let who = state
        .identity()
        .map(|identity| format!(" as {}", user_tag(identity)))
        .unwrap_or_default();
    let channel = state
        .selected_channel()
        .map(|channel| format!(", channel {}", channel_display_name(channel)))
        .unwrap_or_default();

    match state.status() {
        SessionStatus::Unauthenticated => match state.auth_error() {
            Some(err) => format!("signed out: {err}"),
            None => "signed out".to_string(),
        },
        SessionStatus::Verifying => "verifying token...".to_string(),
        SessionStatus::Authenticated => format!("signed in{who}"),
        SessionStatus::GuildSelected(guild_id) => {
            let name = state
                .guilds()
                .iter()
                .find(|guild| guild.id == guild_id)
                .map(|guild| guild.name.as_str())
                .unwrap_or("unknown guild");
            format!("signed in{who}, guild {name}{channel}")
        }
        SessionStatus::DirectSelected => format!("signed in{who}, direct messages{channel}"),
    }
}

pub fn guilds(state: &SessionState) -> String {
    if state.guilds().is_empty() {
        return "no guilds".to_string();
    }
    state
        .guilds()
        .iter()
        .map(|guild| {
            let marker = marker(state.selected_guild() == Some(&guild.id));
            format!("{marker} {} {}", guild.id, guild.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn direct_channels(state: &SessionState) -> String {
    if state.direct_channels().is_empty() {
        return "no direct conversations".to_string();
    }
    state
        .direct_channels()
        .iter()
        .map(|channel| {
            let marker = marker(state.selected_channel_id() == Some(&channel.id));
            format!("{marker} {} {}", channel.id, channel_display_name(channel))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn channels(state: &SessionState) -> String {
    if state.selected_guild().is_none() {
        return "no guild selected".to_string();
    }
    if state.is_loading_channels() {
        return "loading channels...".to_string();
    }

    let listing = group_channels(state.channels());
    let mut lines = Vec::new();
    let line = |channel: &shared::protocol::Channel, indent: &str| {
        let marker = marker(state.selected_channel_id() == Some(&channel.id));
        format!("{indent}{marker} {} #{}", channel.id, channel_display_name(channel))
    };
    for channel in &listing.uncategorized {
        lines.push(line(channel, ""));
    }
    for group in &listing.groups {
        let title = group.category.name.as_deref().unwrap_or("No category");
        lines.push(format!("{}:", title.to_uppercase()));
        for channel in &group.channels {
            lines.push(line(channel, "  "));
        }
    }
    if lines.is_empty() {
        return "no text channels".to_string();
    }
    lines.join("\n")
}

pub fn messages(state: &SessionState) -> String {
    if state.selected_channel_id().is_none() {
        return "no channel selected".to_string();
    }
    if state.is_loading_messages() {
        return "loading messages...".to_string();
    }
    if state.messages().is_empty() {
        return "no messages yet".to_string();
    }
    state
        .messages()
        .iter()
        .map(|message| render_message(state, message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_message(state: &SessionState, message: &Message) -> String {
    let directory = state.mention_directory(message);
    let author = user_tag(&message.author);
    let when = format_timestamp(&message.timestamp.with_timezone(&Local));

    let mut out = format!("[{when}] {author}");
    if message.author.bot {
        out.push_str(" [BOT]");
    }
    out.push_str(": ");
    out.push_str(&render_plain(&parse_content(&message.content, &directory)));

    for embed in &message.embeds {
        render_embed(&mut out, embed, state, message);
    }
    for attachment in &message.attachments {
        let kind = match attachment_kind(attachment) {
            AttachmentKind::Image => "image",
            AttachmentKind::Video => "video",
            AttachmentKind::Audio => "audio",
            AttachmentKind::File => "file",
        };
        out.push_str(&format!(
            "\n    [{kind}] {} ({} bytes) {}",
            attachment.filename, attachment.size, attachment.url
        ));
    }
    out
}

fn render_embed(out: &mut String, embed: &Embed, state: &SessionState, message: &Message) {
    let directory = state.mention_directory(message);
    let text = |raw: &str| render_plain(&parse_content(raw, &directory));

    out.push_str(&format!("\n    | embed {}", embed_color_hex(embed.color)));
    if let Some(name) = embed.author.as_ref().and_then(|author| author.name.as_deref()) {
        out.push_str(&format!("\n    | {name}"));
    }
    if let Some(title) = &embed.title {
        match &embed.url {
            Some(url) => out.push_str(&format!("\n    | {title} <{url}>")),
            None => out.push_str(&format!("\n    | {title}")),
        }
    }
    if let Some(description) = &embed.description {
        for line in text(description).lines() {
            out.push_str(&format!("\n    | {line}"));
        }
    }
    for field in &embed.fields {
        out.push_str(&format!("\n    | {}: {}", text(&field.name), text(&field.value)));
    }
    for media in [&embed.image, &embed.thumbnail, &embed.video]
        .into_iter()
        .flatten()
    {
        if let Some(url) = &media.url {
            out.push_str(&format!("\n    | {url}"));
        }
    }
    if let Some(footer) = &embed.footer {
        out.push_str(&format!("\n    | {}", footer.text));
    }
}

fn marker(selected: bool) -> &'static str {
    if selected {
        "*"
    } else {
        " "
    }
}
