//! Folder projection.
//!
//! The backend only lists `inbox` and `sent`. Starred, archive and trash are
//! virtual folders carved out of the inbox listing on the client.

use crate::model::{Endpoint, FolderView, Message, ServerFolder};

/// Listing endpoint that feeds a folder.
#[must_use]
pub const fn endpoint_for(folder: FolderView) -> Endpoint {
    match folder {
        FolderView::Sent => Endpoint::Sent,
        FolderView::Inbox | FolderView::Starred | FolderView::Archive | FolderView::Trash => {
            Endpoint::Inbox
        }
    }
}

/// Whether a message from the folder's endpoint belongs in the folder.
#[must_use]
pub fn belongs_to(folder: FolderView, message: &Message) -> bool {
    match folder {
        FolderView::Inbox => message.folder == ServerFolder::Inbox,
        // the sent listing is taken whole, minus mail moved out of it
        FolderView::Sent => {
            !matches!(message.folder, ServerFolder::Archive | ServerFolder::Trash)
        }
        FolderView::Starred => message.starred,
        FolderView::Archive => message.folder == ServerFolder::Archive,
        FolderView::Trash => message.folder == ServerFolder::Trash,
    }
}

/// Filters a raw listing down to one folder, keeping listing order.
pub fn project<'a>(
    folder: FolderView,
    messages: impl IntoIterator<Item = &'a Message>,
) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|m| belongs_to(folder, m))
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::model::fixtures::message;

    fn mixed_page() -> Vec<Message> {
        let mut page = Vec::new();
        for (id, folder, starred) in [
            (1, ServerFolder::Inbox, false),
            (2, ServerFolder::Inbox, true),
            (3, ServerFolder::Archive, false),
            (4, ServerFolder::Archive, true),
            (5, ServerFolder::Trash, false),
            (6, ServerFolder::Trash, true),
        ] {
            let mut m = message(id);
            m.folder = folder;
            m.starred = starred;
            page.push(m);
        }
        page
    }

    fn ids(messages: &[Message]) -> Vec<u64> {
        messages.iter().map(|m| m.id.0).collect()
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(endpoint_for(FolderView::Sent), Endpoint::Sent);
        for folder in [
            FolderView::Inbox,
            FolderView::Starred,
            FolderView::Archive,
            FolderView::Trash,
        ] {
            assert_eq!(endpoint_for(folder), Endpoint::Inbox);
        }
    }

    #[test]
    fn test_projection_of_mixed_page() {
        let page = mixed_page();
        assert_eq!(ids(&project(FolderView::Inbox, &page)), vec![1, 2]);
        assert_eq!(ids(&project(FolderView::Starred, &page)), vec![2, 4, 6]);
        assert_eq!(ids(&project(FolderView::Archive, &page)), vec![3, 4]);
        assert_eq!(ids(&project(FolderView::Trash, &page)), vec![5, 6]);
        assert_eq!(ids(&project(FolderView::Sent, &page)), vec![1, 2]);
    }

    #[test]
    fn test_sent_drops_moved_messages() {
        let mut page: Vec<Message> = (1..=3).map(message).collect();
        for m in &mut page {
            m.folder = ServerFolder::Sent;
        }
        page[1].folder = ServerFolder::Trash;
        assert_eq!(ids(&project(FolderView::Sent, &page)), vec![1, 3]);
    }

    fn arb_folder() -> impl Strategy<Value = ServerFolder> {
        prop_oneof![
            Just(ServerFolder::Inbox),
            Just(ServerFolder::Archive),
            Just(ServerFolder::Trash),
        ]
    }

    proptest! {
        #[test]
        fn prop_projection_is_exact_subset(
            flags in prop::collection::vec((arb_folder(), any::<bool>()), 0..40)
        ) {
            let page: Vec<Message> = flags
                .iter()
                .enumerate()
                .map(|(i, (folder, starred))| {
                    let mut m = message(i as u64);
                    m.folder = *folder;
                    m.starred = *starred;
                    m
                })
                .collect();

            let starred = project(FolderView::Starred, &page);
            prop_assert_eq!(starred.len(), page.iter().filter(|m| m.starred).count());
            prop_assert!(starred.iter().all(|m| m.starred));

            for (view, server) in [
                (FolderView::Inbox, ServerFolder::Inbox),
                (FolderView::Archive, ServerFolder::Archive),
                (FolderView::Trash, ServerFolder::Trash),
            ] {
                let projected = project(view, &page);
                prop_assert_eq!(
                    projected.len(),
                    page.iter().filter(|m| m.folder == server).count()
                );
                prop_assert!(projected.iter().all(|m| m.folder == server));
                // order is preserved
                let positions: Vec<usize> = projected
                    .iter()
                    .map(|p| page.iter().position(|m| m.id == p.id).unwrap())
                    .collect();
                prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
