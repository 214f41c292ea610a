//! Items travelling through the buffer

/// A payload or the end-of-stream marker
///
/// `Sentinel` is a distinct variant rather than a reserved payload value, so
/// no real item can ever be mistaken for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    /// A real item
    Item(T),

    /// Stops exactly one consumer
    Sentinel,
}

impl<T> Message<T> {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Message::Sentinel)
    }

    /// The payload, or `None` for a sentinel
    pub fn into_item(self) -> Option<T> {
        match self {
            Message::Item(item) => Some(item),
            Message::Sentinel => None,
        }
    }
}

impl<T> From<T> for Message<T> {
    fn from(item: T) -> Self {
        Message::Item(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_distinct_from_items() {
        let item: Message<Option<u8>> = Message::Item(None);
        assert!(!item.is_sentinel());
        assert_ne!(item, Message::Sentinel);
        assert_eq!(item.into_item(), Some(None));
        assert_eq!(Message::<Option<u8>>::Sentinel.into_item(), None);
    }
}
