//! Output delivery: long replies are split into a chain of follow-ups, each
//! replying to the previous chunk, with any image attached to the final one.

use serenity::all::{CreateAttachment, CreateMessage, Message};
use serenity::http::Http;

pub const MAX_REPLY_LEN: usize = 1950;

pub(crate) fn split_chunks(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        if count == limit {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub async fn reply_chunked(
    http: &Http,
    message: &Message,
    text: &str,
    image: Option<Vec<u8>>,
) -> serenity::Result<()> {
    let text = text.trim();
    if text.is_empty() && image.is_none() {
        message.reply(http, "Error: Empty response").await?;
        return Ok(());
    }

    let chunks = if text.is_empty() {
        vec![String::new()]
    } else {
        split_chunks(text, MAX_REPLY_LEN)
    };

    let mut target = message.clone();
    let last = chunks.len() - 1;
    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut builder = CreateMessage::new().reference_message(&target);
        if !chunk.is_empty() {
            builder = builder.content(chunk);
        }
        if i == last {
            if let Some(bytes) = &image {
                builder = builder.add_file(CreateAttachment::bytes(bytes.clone(), "image.png"));
            }
        }
        target = message.channel_id.send_message(http, builder).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_chunks("hello", 1950), vec!["hello"]);
    }

    #[test]
    fn text_at_the_limit_stays_whole() {
        let text = "x".repeat(1950);
        assert_eq!(split_chunks(&text, 1950).len(), 1);
    }

    #[test]
    fn text_over_the_limit_splits_in_order() {
        let text = format!("{}{}", "a".repeat(1950), "b".repeat(10));
        let chunks = split_chunks(&text, 1950);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 1950);
        assert_eq!(chunks[1], "b".repeat(10));
    }

    #[test]
    fn splitting_respects_char_boundaries() {
        let text = "é".repeat(2000);
        let chunks = split_chunks(&text, 1950);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1950);
        assert_eq!(chunks[1].chars().count(), 50);
    }
}
