//! Resource addresses served by the message cache.
//!
//! Two resources exist: the whole collection, and one message selected by id.
//! In URI form the id travels as a query parameter:
//!
//! - `content://<authority>/inAppMessages`
//! - `content://<authority>/inAppMessages/id?id=<id>`

use std::fmt;

use url::Url;

use crate::Error;

pub const SCHEME: &str = "content";
pub const PATH: &str = "inAppMessages";
pub const PATH_ID: &str = "id";
pub const QUERY_PARAM_ID: &str = "id";

/// A resource the cache can serve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageAddress {
    AllMessages,
    SingleMessage(String),
}

impl MessageAddress {
    pub fn single(id: impl Into<String>) -> Self {
        MessageAddress::SingleMessage(id.into())
    }
}

impl fmt::Display for MessageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageAddress::AllMessages => write!(f, "/{PATH}"),
            MessageAddress::SingleMessage(id) => write!(f, "/{PATH}/{PATH_ID}?{QUERY_PARAM_ID}={id}"),
        }
    }
}

/// Builds and parses `content://` URIs for one authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressScheme {
    authority: String,
    collection: Url,
}

impl AddressScheme {
    /// # Errors
    ///
    /// Returns `InvalidAddress` if the authority cannot be a URI host.
    pub fn new(authority: impl Into<String>) -> Result<Self, Error> {
        let authority = authority.into();
        let collection = Url::parse(&format!("{SCHEME}://{authority}/{PATH}"))
            .ok()
            .filter(|url| !authority.is_empty() && url.host_str() == Some(authority.as_str()))
            .ok_or_else(|| Error::InvalidAddress(format!("invalid authority: {authority:?}")))?;
        Ok(Self { authority, collection })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn to_url(&self, address: &MessageAddress) -> Url {
        let mut url = self.collection.clone();
        if let MessageAddress::SingleMessage(id) = address {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.push(PATH_ID);
            }
            url.query_pairs_mut().append_pair(QUERY_PARAM_ID, id);
        }
        url
    }

    /// Resolve a URI to the address it names.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` for a foreign scheme or authority, an unknown
    /// path, or a single-message URI without an id.
    pub fn parse(&self, uri: &str) -> Result<MessageAddress, Error> {
        let invalid = |reason: &str| Error::InvalidAddress(format!("{reason}: {uri}"));
        let url = Url::parse(uri).map_err(|_| invalid("malformed URI"))?;

        if url.scheme() != SCHEME {
            return Err(invalid("unsupported scheme"));
        }
        if url.host_str() != Some(self.authority.as_str()) {
            return Err(invalid("unknown authority"));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            [PATH] => Ok(MessageAddress::AllMessages),
            [PATH, PATH_ID] => url
                .query_pairs()
                .find(|(k, _)| k == QUERY_PARAM_ID)
                .map(|(_, v)| v.into_owned())
                .filter(|id| !id.is_empty())
                .map(MessageAddress::SingleMessage)
                .ok_or_else(|| invalid("missing message id")),
            _ => Err(invalid("unknown path")),
        }
    }
}
