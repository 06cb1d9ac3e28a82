//! RSS 2.0 serialization.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::Feed;
use crate::{Error, Result};

/// Channel editor shown by feed readers.
pub const MANAGING_EDITOR: &str = "feed@mailfeed.io (Mail Feed)";

/// Serializes `feed` as an RSS 2.0 document whose channel link is `link`.
///
/// # Errors
///
/// Returns [`Error::Render`] if the XML writer fails.
pub fn render_rss(feed: &Feed, link: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("rss").with_attributes([("version", "2.0")])),
    )?;
    write(&mut writer, Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &feed.title)?;
    text_element(&mut writer, "link", link)?;
    text_element(
        &mut writer,
        "description",
        &format!("{} via Mail Feed", feed.title),
    )?;
    text_element(&mut writer, "managingEditor", MANAGING_EDITOR)?;
    text_element(&mut writer, "pubDate", &feed.created.to_rfc2822())?;

    for (index, item) in feed.items.iter().enumerate() {
        write(&mut writer, Event::Start(BytesStart::new("item")))?;
        text_element(&mut writer, "title", &item.subject)?;
        text_element(&mut writer, "description", &item.body)?;
        text_element(&mut writer, "pubDate", &item.date.to_rfc2822())?;

        let guid = format!("{}-{}", feed.id, index + 1);
        write(
            &mut writer,
            Event::Start(BytesStart::new("guid").with_attributes([("isPermaLink", "false")])),
        )?;
        write(&mut writer, Event::Text(BytesText::new(&guid)))?;
        write(&mut writer, Event::End(BytesEnd::new("guid")))?;

        write(&mut writer, Event::End(BytesEnd::new("item")))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("channel")))?;
    write(&mut writer, Event::End(BytesEnd::new("rss")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| Error::Render(e.to_string()))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Render(e.to_string()))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}
