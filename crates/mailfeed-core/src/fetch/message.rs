//! Turning one fetched message into a [`NewsletterItem`].

use mailfeed_mime::Headers;
use mailfeed_mime::encoding::decode_words;
use tracing::{debug, info, warn};

use crate::date::parse_header_date;
use crate::feed::{EmailRecord, FeedRepository};
use crate::mailbox::RawMessage;
use crate::{Error, NewsletterItem, Result};

/// Picks which recipient of a message is the registered inbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientFilter {
    domain: Option<String>,
}

impl RecipientFilter {
    /// Accepts any recipient; the first address wins.
    #[must_use]
    pub const fn any() -> Self {
        Self { domain: None }
    }

    /// Accepts only recipients at `domain`.
    #[must_use]
    pub fn domain(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let domain = domain.trim().trim_start_matches('@').to_string();
        Self {
            domain: (!domain.is_empty()).then_some(domain),
        }
    }

    /// Selects the recipient address from a `To` header value.
    #[must_use]
    pub fn select(&self, to: &str) -> Option<String> {
        let mut addresses = addresses(to);
        match &self.domain {
            None => addresses.next(),
            Some(domain) => addresses.find(|address| {
                address
                    .rsplit_once('@')
                    .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain))
            }),
        }
    }
}

/// Inbox id for an address: its local part, trimmed.
#[must_use]
pub fn inbox_id(address: &str) -> &str {
    address.split('@').next().unwrap_or(address).trim()
}

/// Addresses in an address-list header, in order.
///
/// Handles `Name <local@domain>`, bare addresses and quoted display names
/// that contain commas.
fn addresses(list: &str) -> impl Iterator<Item = String> + '_ {
    split_list(list).into_iter().filter_map(|entry| {
        let address = match (entry.rfind('<'), entry.rfind('>')) {
            (Some(open), Some(close)) if open < close => &entry[open + 1..close],
            _ => entry.trim_matches('"'),
        };
        let address = address.trim();
        address.contains('@').then(|| address.to_string())
    })
}

fn split_list(list: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut quoted = false;
    let mut angle = false;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '"' if !angle => quoted = !quoted,
            '<' if !quoted => angle = true,
            '>' if !quoted => angle = false,
            ',' if !quoted && !angle => {
                entries.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(list[start..].trim());
    entries.retain(|entry| !entry.is_empty());
    entries
}

/// Decodes one message and resolves its feed.
///
/// Returns `Ok(None)` for messages that are not addressed to a registered
/// inbox. Errors mean the message could not be decoded and should be
/// skipped.
pub(super) async fn normalize(
    raw: &RawMessage,
    filter: &RecipientFilter,
    repo: &FeedRepository,
) -> Result<Option<NewsletterItem>> {
    let headers = Headers::parse(&raw.header);

    let to = headers.get("To").unwrap_or_default();
    let Some(recipient) = filter.select(to) else {
        info!(uid = raw.uid, to, "no matching recipient, message skipped");
        return Ok(None);
    };
    let inbox = inbox_id(&recipient).to_string();

    let body = mailfeed_mime::decode(&headers, &raw.text)?;
    let subject = decode_words(headers.get("Subject").unwrap_or_default());
    let date = headers
        .get("Date")
        .and_then(parse_header_date)
        .ok_or_else(|| Error::Date(format!("unusable Date header {:?}", headers.get("Date"))))?;

    let audit = EmailRecord {
        id: raw.uid,
        date,
        recipient: to.to_string(),
        sender: headers.get("From").unwrap_or_default().to_string(),
        subject: subject.clone(),
        body: body.clone(),
    };
    match repo.create_email(&audit).await {
        Ok(true) => {}
        Ok(false) => debug!(uid = raw.uid, "email already recorded"),
        Err(e) => warn!(uid = raw.uid, error = %e, "failed to record email"),
    }

    let feed_title = match repo.get_feed(&inbox).await {
        Ok(feed) => feed.map(|feed| feed.name),
        Err(e) => {
            warn!(uid = raw.uid, %inbox, error = %e, "feed lookup failed");
            None
        }
    };

    debug!(uid = raw.uid, %inbox, %subject, "message decoded");
    Ok(Some(NewsletterItem {
        inbox,
        feed_title,
        subject,
        body,
        date,
    }))
}
