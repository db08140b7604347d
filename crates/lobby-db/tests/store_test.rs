use std::time::Duration;

use lobby_db::Database;
use lobby_db::messages::{NewMessage, SendOutcome};

const NO_WINDOW: Duration = Duration::ZERO;
const WINDOW: Duration = Duration::from_secs(300);

fn db() -> Database {
    Database::open_in_memory().expect("in-memory db")
}

fn text_message<'a>(conversation_id: &'a str, sender_id: &'a str, text: &'a str) -> NewMessage<'a> {
    NewMessage {
        conversation_id,
        sender_id,
        kind: "text",
        text,
        attachments_json: "[]",
        links_json: "[]",
    }
}

fn send(db: &Database, conversation_id: &str, sender_id: &str, text: &str) -> i64 {
    match db
        .insert_message(text_message(conversation_id, sender_id, text), NO_WINDOW)
        .expect("insert")
    {
        SendOutcome::Stored(row) => row.id,
        SendOutcome::Duplicate => panic!("unexpected duplicate"),
    }
}

// -- Conversations --

#[test]
fn dm_get_or_create_is_idempotent() {
    let db = db();

    let first = db.get_or_create_dm("h1", "a1", "o1", "a1").unwrap();
    let second = db.get_or_create_dm("h1", "a1", "o1", "o1").unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.kind, "dm");
    assert_eq!(second.subtype, "admin_owner_dm");
    // The loser of the race keeps the original creator.
    assert_eq!(second.created_by, "a1");

    // A different triple gets its own conversation.
    let other = db.get_or_create_dm("h2", "a1", "o1", "a1").unwrap();
    assert_ne!(first.id, other.id);
}

#[test]
fn group_creation_is_never_deduplicated() {
    let db = db();

    let g1 = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();
    let g2 = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();
    assert_ne!(g1.id, g2.id);
}

#[test]
fn list_conversations_filters_by_hotel_and_type() {
    let db = db();

    db.get_or_create_dm("h1", "a1", "o1", "a1").unwrap();
    db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();
    db.create_group("h2", "Other", "owner_all_staff", "o2").unwrap();

    assert_eq!(db.list_conversations(Some("h1"), None, 100, 0).unwrap().len(), 2);
    assert_eq!(db.list_conversations(Some("h1"), Some("dm"), 100, 0).unwrap().len(), 1);
    assert_eq!(db.list_conversations(None, None, 100, 0).unwrap().len(), 3);

    // Newest-created-first.
    let all = db.list_conversations(None, None, 100, 0).unwrap();
    assert_eq!(all[0].hotel_id, "h2");

    // Skip walks past the newest.
    let rest = db.list_conversations(None, None, 100, 1).unwrap();
    assert_eq!(rest.len(), 2);
    assert_ne!(rest[0].id, all[0].id);
}

#[test]
fn list_conversations_for_user_requires_membership() {
    let db = db();

    let dm = db.get_or_create_dm("h1", "a1", "o1", "a1").unwrap();
    db.add_member(&dm.id, "a1", "admin").unwrap();
    db.add_member(&dm.id, "o1", "hotel_owner").unwrap();
    let group = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();
    db.add_member(&group.id, "o1", "hotel_owner").unwrap();

    let for_admin = db.list_conversations_for_user("h1", "a1").unwrap();
    assert_eq!(for_admin.len(), 1);
    assert_eq!(for_admin[0].id, dm.id);

    assert_eq!(db.list_conversations_for_user("h1", "o1").unwrap().len(), 2);
    assert!(db.list_conversations_for_user("h1", "s1").unwrap().is_empty());
}

#[test]
fn find_group_b_returns_the_hotels_staff_group() {
    let db = db();
    assert!(db.find_group_b("h1").unwrap().is_none());

    db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();
    let b = db.create_group("h1", "Owner & All Staff", "owner_all_staff", "o1").unwrap();

    let found = db.find_group_b("h1").unwrap().expect("group b");
    assert_eq!(found.id, b.id);
}

#[test]
fn last_message_preview_is_stored_on_the_conversation() {
    let db = db();
    let dm = db.get_or_create_dm("h1", "a1", "o1", "a1").unwrap();
    assert!(dm.last_message.is_none());

    db.update_last_message(&dm.id, r#"{"message_id":1,"text":"hi"}"#).unwrap();

    let reloaded = db.get_conversation(&dm.id).unwrap().expect("conversation");
    let preview = reloaded.last_message.expect("preview");
    assert!(preview.contains("\"hi\""));
}

// -- Participants --

#[test]
fn re_adding_a_member_updates_role_but_not_joined_at() {
    let db = db();
    let group = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();

    db.add_member(&group.id, "u1", "hotel_staff").unwrap();
    let before = db.list_members(&group.id).unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].role, "hotel_staff");

    db.add_member(&group.id, "u1", "admin").unwrap();
    let after = db.list_members(&group.id).unwrap();
    assert_eq!(after.len(), 1, "upsert must not duplicate the row");
    assert_eq!(after[0].role, "admin");
    assert_eq!(after[0].joined_at, before[0].joined_at);
}

#[test]
fn removed_members_are_no_longer_members() {
    let db = db();
    let group = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();

    db.add_member(&group.id, "u1", "hotel_staff").unwrap();
    assert!(db.is_member(&group.id, "u1").unwrap());

    assert!(db.remove_member(&group.id, "u1").unwrap());
    assert!(!db.is_member(&group.id, "u1").unwrap());

    // Deleting an absent row reports nothing removed.
    assert!(!db.remove_member(&group.id, "u1").unwrap());
}

#[test]
fn set_last_read_tracks_the_readers_position() {
    let db = db();
    let group = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();
    db.add_member(&group.id, "u1", "hotel_staff").unwrap();

    let m1 = send(&db, &group.id, "u1", "first");
    db.set_last_read(&group.id, "u1", m1).unwrap();

    let members = db.list_members(&group.id).unwrap();
    assert_eq!(members[0].last_read_message_id, Some(m1));
}

// -- Messages --

#[test]
fn message_ids_increase_in_insertion_order() {
    let db = db();
    let group = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();

    let ids: Vec<i64> = (0..5)
        .map(|i| send(&db, &group.id, "u1", &format!("msg {i}")))
        .collect();
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn pagination_yields_every_message_exactly_once() {
    let db = db();
    let group = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();

    let total = 25u32;
    for i in 0..total {
        send(&db, &group.id, "u1", &format!("msg {i}"));
    }

    let limit = 10u32;
    let mut seen: Vec<i64> = Vec::new();
    let mut cursor: Option<i64> = None;
    loop {
        let page = db.list_messages(&group.id, limit, cursor).unwrap();
        for row in &page {
            seen.push(row.id);
        }
        if page.len() < limit as usize {
            break;
        }
        cursor = page.last().map(|row| row.id);
    }

    assert_eq!(seen.len(), total as usize);
    for pair in seen.windows(2) {
        assert!(pair[0] > pair[1], "pages must stay strictly descending");
    }
}

#[test]
fn repeated_text_inside_the_window_is_a_duplicate() {
    let db = db();
    let group = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();

    let first = db
        .insert_message(text_message(&group.id, "u1", "hello"), WINDOW)
        .unwrap();
    assert!(matches!(first, SendOutcome::Stored(_)));

    let second = db
        .insert_message(text_message(&group.id, "u1", "hello"), WINDOW)
        .unwrap();
    assert!(matches!(second, SendOutcome::Duplicate));

    // Different text from the same sender goes through.
    let third = db
        .insert_message(text_message(&group.id, "u1", "hello again"), WINDOW)
        .unwrap();
    assert!(matches!(third, SendOutcome::Stored(_)));

    // Another sender repeating the text is not throttled.
    let fourth = db
        .insert_message(text_message(&group.id, "u2", "hello again"), WINDOW)
        .unwrap();
    assert!(matches!(fourth, SendOutcome::Stored(_)));
}

#[test]
fn file_messages_are_never_throttled() {
    let db = db();
    let group = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();

    for _ in 0..2 {
        let outcome = db
            .insert_message(
                NewMessage {
                    conversation_id: &group.id,
                    sender_id: "u1",
                    kind: "file",
                    text: "",
                    attachments_json: r#"[{"id":"x"}]"#,
                    links_json: "[]",
                },
                WINDOW,
            )
            .unwrap();
        assert!(matches!(outcome, SendOutcome::Stored(_)));
    }
}

#[test]
fn history_walk_matches_the_worked_example() {
    let db = db();

    // create DM twice -> same conversation both times
    let dm = db.get_or_create_dm("H1", "A1", "O1", "A1").unwrap();
    let again = db.get_or_create_dm("H1", "A1", "O1", "A1").unwrap();
    assert_eq!(dm.id, again.id);

    db.add_member(&dm.id, "A1", "admin").unwrap();
    db.add_member(&dm.id, "O1", "hotel_owner").unwrap();
    db.add_member(&dm.id, "A1", "admin").unwrap();
    db.add_member(&dm.id, "O1", "hotel_owner").unwrap();
    let members = db.list_members(&dm.id).unwrap();
    assert_eq!(members.len(), 2);

    let _m1 = send(&db, &dm.id, "A1", "m1");
    let m2 = send(&db, &dm.id, "O1", "m2");
    let m3 = send(&db, &dm.id, "A1", "m3");

    let page = db.list_messages(&dm.id, 2, None).unwrap();
    assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![m3, m2]);

    // Full page -> cursor continues at m2; next page is short -> end.
    let next = db.list_messages(&dm.id, 2, Some(m2)).unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].text, "m1");
}

// -- Blobs & attachments --

#[test]
fn blob_chunks_round_trip_and_cascade_on_delete() {
    let db = db();

    db.create_blob("b1", "notes.txt", "text/plain", 4, "im").unwrap();
    db.append_chunk("b1", 0, b"hell").unwrap();
    db.append_chunk("b1", 1, b"o").unwrap();
    db.finalize_blob("b1", 5, 2, "digest").unwrap();

    let blob = db.get_blob("b1").unwrap().expect("blob");
    assert_eq!(blob.size, 5);
    assert_eq!(blob.chunk_count, 2);
    assert_eq!(blob.sha256, "digest");
    assert_eq!(blob.source, "im");

    assert_eq!(db.read_chunk("b1", 0).unwrap().as_deref(), Some(&b"hell"[..]));
    assert_eq!(db.read_chunk("b1", 1).unwrap().as_deref(), Some(&b"o"[..]));
    assert!(db.read_chunk("b1", 2).unwrap().is_none());

    db.delete_blob("b1").unwrap();
    assert!(db.get_blob("b1").unwrap().is_none());
    assert!(db.read_chunk("b1", 0).unwrap().is_none());
}

#[test]
fn linking_attachments_is_scoped_and_one_shot() {
    let db = db();
    let ours = db.create_group("h1", "Ops", "admin_owner_staff", "o1").unwrap();
    let theirs = db.create_group("h1", "Other", "admin_owner_staff", "o1").unwrap();

    db.create_blob("b1", "a.png", "image/png", 1024, "im").unwrap();
    db.create_blob("b2", "b.png", "image/png", 1024, "im").unwrap();

    let a1 = db
        .create_attachment(lobby_db::attachments::NewAttachment {
            id: "att-1",
            blob_id: "b1",
            conversation_id: &ours.id,
            file_name: "a.png",
            mime_type: "image/png",
            size: 10,
            uploader_id: "u1",
        })
        .unwrap();
    assert!(a1.message_id.is_none());

    db.create_attachment(lobby_db::attachments::NewAttachment {
        id: "att-2",
        blob_id: "b2",
        conversation_id: &theirs.id,
        file_name: "b.png",
        mime_type: "image/png",
        size: 10,
        uploader_id: "u1",
    })
    .unwrap();

    let message_id = send(&db, &ours.id, "u1", "with file");

    // Only the attachment in our conversation links up.
    let linked = db
        .link_attachments(&ours.id, message_id, &["att-1".into(), "att-2".into()])
        .unwrap();
    assert_eq!(linked, 1);
    assert_eq!(
        db.get_attachment("att-1").unwrap().unwrap().message_id,
        Some(message_id)
    );
    assert_eq!(db.get_attachment("att-2").unwrap().unwrap().message_id, None);

    // Already-linked attachments stay with their first message.
    let relinked = db
        .link_attachments(&ours.id, message_id + 1, &["att-1".into()])
        .unwrap();
    assert_eq!(relinked, 0);
}
