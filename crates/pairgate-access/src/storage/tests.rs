//! Storage layer tests for the Pairgate access engine.

#![allow(clippy::unwrap_used)]

use pairgate_core::db::unix_timestamp;
use uuid::Uuid;

use super::db::AccessDatabase;
use super::models::RegistrationType;
use super::queries_activation::{ActivationOutcome, ActivationWrite};
use super::queries_codes::CodeParams;
use super::queries_entries::EntryParams;
use super::queries_links::LinkParams;

async fn test_db() -> AccessDatabase {
    AccessDatabase::open_in_memory().await.unwrap()
}

fn code_params(code: &str, chat_id: i64, expires_at: i64) -> CodeParams<'_> {
    CodeParams {
        code,
        chat_id,
        chat_username: Some("alice"),
        player_name: None,
        expires_at,
    }
}

// === Entry tests ===

#[tokio::test]
async fn upsert_entry_overwrites_existing_row() {
    let db = test_db().await;
    let player = Uuid::new_v4();

    let first = db
        .upsert_entry(&EntryParams {
            reason: Some("first"),
            ..EntryParams::new(player, "Steve", "server1", RegistrationType::Manual)
        })
        .await
        .unwrap();
    let second = db
        .upsert_entry(&EntryParams {
            reason: Some("second"),
            added_by: Some("admin"),
            ..EntryParams::new(player, "Steve2", "server1", RegistrationType::Invite)
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.player_name, "Steve2");
    assert_eq!(second.registration_type, RegistrationType::Invite);
    assert_eq!(second.reason.as_deref(), Some("second"));
    assert_eq!(second.added_by.as_deref(), Some("admin"));
    assert_eq!(db.count_entries("server1").await.unwrap(), 1);
}

#[tokio::test]
async fn expired_entry_is_not_valid() {
    let db = test_db().await;
    let player = Uuid::new_v4();

    db.upsert_entry(&EntryParams {
        expires_at: Some(unix_timestamp() - 10),
        ..EntryParams::new(player, "Steve", "server1", RegistrationType::Manual)
    })
    .await
    .unwrap();

    assert!(!db.has_valid_entry(player, "server1").await.unwrap());
    assert!(db.player_servers(player).await.unwrap().is_empty());
}

#[tokio::test]
async fn inactive_entry_is_not_valid() {
    let db = test_db().await;
    let player = Uuid::new_v4();

    db.upsert_entry(&EntryParams::new(
        player,
        "Steve",
        "server1",
        RegistrationType::Manual,
    ))
    .await
    .unwrap();
    assert!(db.has_valid_entry(player, "server1").await.unwrap());

    assert!(db.set_entry_active(player, "server1", false).await.unwrap());
    assert!(!db.has_valid_entry(player, "server1").await.unwrap());
    assert_eq!(db.count_entries("server1").await.unwrap(), 0);
}

#[tokio::test]
async fn name_lookup_is_case_insensitive_and_skips_same_id() {
    let db = test_db().await;
    let legacy = Uuid::new_v4();

    db.upsert_entry(&EntryParams::new(
        legacy,
        "Steve",
        "server1",
        RegistrationType::Import,
    ))
    .await
    .unwrap();

    let newcomer = Uuid::new_v4();
    assert!(
        db.has_valid_entry_by_name(newcomer, "sTEVE", "server1")
            .await
            .unwrap()
    );
    assert!(
        !db.has_valid_entry_by_name(legacy, "Steve", "server1")
            .await
            .unwrap()
    );
    assert!(
        !db.has_valid_entry_by_name(newcomer, "Steve", "server2")
            .await
            .unwrap()
    );
    assert!(db.is_name_taken("STEVE").await.unwrap());
}

#[tokio::test]
async fn delete_entry_reports_existence() {
    let db = test_db().await;
    let player = Uuid::new_v4();

    db.upsert_entry(&EntryParams::new(
        player,
        "Steve",
        "server1",
        RegistrationType::Manual,
    ))
    .await
    .unwrap();

    assert!(db.delete_entry(player, "server1").await.unwrap());
    assert!(!db.delete_entry(player, "server1").await.unwrap());
    assert!(db.get_entry(player, "server1").await.unwrap().is_none());
}

#[tokio::test]
async fn update_entry_keeps_registration_type() {
    let db = test_db().await;
    let player = Uuid::new_v4();

    db.upsert_entry(&EntryParams::new(
        player,
        "Steve",
        "server1",
        RegistrationType::Invite,
    ))
    .await
    .unwrap();

    let updated = db
        .update_entry(&EntryParams {
            reason: Some("renamed"),
            ..EntryParams::new(player, "Alex", "server1", RegistrationType::Manual)
        })
        .await
        .unwrap();
    assert!(updated);

    let entry = db.get_entry(player, "server1").await.unwrap().unwrap();
    assert_eq!(entry.player_name, "Alex");
    assert_eq!(entry.reason.as_deref(), Some("renamed"));
    assert_eq!(entry.registration_type, RegistrationType::Invite);
}

#[tokio::test]
async fn entry_listings_and_counts() {
    let db = test_db().await;
    let p1 = Uuid::new_v4();
    let p2 = Uuid::new_v4();

    for (player, name, server) in [
        (p1, "Steve", "server1"),
        (p1, "Steve", "server2"),
        (p2, "Alex", "server1"),
    ] {
        db.upsert_entry(&EntryParams::new(
            player,
            name,
            server,
            RegistrationType::Manual,
        ))
        .await
        .unwrap();
    }

    assert_eq!(db.entries_by_server("server1").await.unwrap().len(), 2);
    assert_eq!(db.entries_by_player(p1).await.unwrap().len(), 2);
    assert_eq!(db.all_active_entries().await.unwrap().len(), 3);
    assert_eq!(db.count_all_entries().await.unwrap(), 3);
    assert_eq!(
        db.player_servers(p1).await.unwrap(),
        vec!["server1".to_string(), "server2".to_string()]
    );
}

// === Code tests ===

#[tokio::test]
async fn insert_and_get_code() {
    let db = test_db().await;
    let code = db
        .insert_code(&code_params("K7Q-2MX", 123, unix_timestamp() + 600))
        .await
        .unwrap();

    assert_eq!(code.code, "K7Q-2MX");
    assert_eq!(code.chat_id, 123);
    assert!(!code.used);
    assert!(code.is_valid());
}

#[tokio::test]
async fn duplicate_code_is_a_constraint_error() {
    let db = test_db().await;
    let future = unix_timestamp() + 600;
    db.insert_code(&code_params("K7Q-2MX", 1, future))
        .await
        .unwrap();

    let err = db
        .insert_code(&code_params("K7Q-2MX", 2, future))
        .await
        .unwrap_err();
    assert!(err.is_constraint());
}

#[tokio::test]
async fn consume_code_succeeds_once() {
    let db = test_db().await;
    db.insert_code(&code_params("K7Q-2MX", 1, unix_timestamp() + 600))
        .await
        .unwrap();

    let player = Uuid::new_v4();
    assert!(db.consume_code("K7Q-2MX", player, "Steve").await.unwrap());
    assert!(!db.consume_code("K7Q-2MX", player, "Steve").await.unwrap());

    let code = db.get_code("K7Q-2MX").await.unwrap().unwrap();
    assert!(code.used);
    assert_eq!(code.used_by_id, Some(player.to_string()));
    assert_eq!(code.used_by_name.as_deref(), Some("Steve"));
    assert!(code.used_at.is_some());
}

#[tokio::test]
async fn expired_code_cannot_be_consumed() {
    let db = test_db().await;
    db.insert_code(&code_params("AAA-BBB", 1, unix_timestamp() - 1))
        .await
        .unwrap();

    assert!(
        !db.consume_code("AAA-BBB", Uuid::new_v4(), "Steve")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn active_code_ignores_used_and_expired() {
    let db = test_db().await;
    let now = unix_timestamp();
    db.insert_code(&code_params("OLD-OLD", 7, now - 5))
        .await
        .unwrap();
    db.insert_code(&code_params("USE-USE", 7, now + 600))
        .await
        .unwrap();
    db.consume_code("USE-USE", Uuid::new_v4(), "Steve")
        .await
        .unwrap();
    assert!(db.active_code_for_chat(7).await.unwrap().is_none());

    db.insert_code(&code_params("NEW-NEW", 7, now + 600))
        .await
        .unwrap();
    let active = db.active_code_for_chat(7).await.unwrap().unwrap();
    assert_eq!(active.code, "NEW-NEW");
}

#[tokio::test]
async fn replace_code_keeps_used_ones() {
    let db = test_db().await;
    let future = unix_timestamp() + 600;
    db.insert_code(&code_params("AAA-AAA", 7, future))
        .await
        .unwrap();
    db.insert_code(&code_params("BBB-BBB", 7, future))
        .await
        .unwrap();
    db.consume_code("BBB-BBB", Uuid::new_v4(), "Steve")
        .await
        .unwrap();

    let (code, removed) = db
        .replace_code_for_chat(&code_params("CCC-CCC", 7, future))
        .await
        .unwrap();
    assert_eq!(code.code, "CCC-CCC");
    assert_eq!(removed, 1);
    assert!(db.get_code("AAA-AAA").await.unwrap().is_none());
    assert!(db.get_code("BBB-BBB").await.unwrap().is_some());
}

#[tokio::test]
async fn colliding_replacement_keeps_previous_code() {
    let db = test_db().await;
    let future = unix_timestamp() + 600;
    db.insert_code(&code_params("AAA-AAA", 7, future))
        .await
        .unwrap();
    db.insert_code(&code_params("K7Q-2MX", 8, future))
        .await
        .unwrap();

    let err = db
        .replace_code_for_chat(&code_params("K7Q-2MX", 7, future))
        .await
        .unwrap_err();
    assert!(err.is_constraint());
    assert_eq!(
        db.active_code_for_chat(7).await.unwrap().unwrap().code,
        "AAA-AAA"
    );
}

#[tokio::test]
async fn delete_expired_codes() {
    let db = test_db().await;
    let now = unix_timestamp();
    db.insert_code(&code_params("OLD-OLD", 1, now - 60))
        .await
        .unwrap();
    db.insert_code(&code_params("NEW-NEW", 2, now + 600))
        .await
        .unwrap();

    assert_eq!(db.delete_expired_codes().await.unwrap(), 1);
    assert!(db.get_code("NEW-NEW").await.unwrap().is_some());
}

// === Link tests ===

#[tokio::test]
async fn create_and_find_link() {
    let db = test_db().await;
    let player = Uuid::new_v4();
    let link = db
        .insert_link(&LinkParams {
            player_id: player,
            player_name: "Steve",
            chat_id: 123,
            chat_username: Some("alice"),
        })
        .await
        .unwrap();

    assert!(link.active);
    assert!(link.is_player(player));
    assert_eq!(db.link_by_chat(123).await.unwrap().unwrap().id, link.id);
    assert_eq!(db.link_by_player(player).await.unwrap().unwrap().id, link.id);
}

#[tokio::test]
async fn second_active_link_for_chat_is_rejected() {
    let db = test_db().await;
    db.insert_link(&LinkParams {
        player_id: Uuid::new_v4(),
        player_name: "Steve",
        chat_id: 123,
        chat_username: None,
    })
    .await
    .unwrap();

    let err = db
        .insert_link(&LinkParams {
            player_id: Uuid::new_v4(),
            player_name: "Alex",
            chat_id: 123,
            chat_username: None,
        })
        .await
        .unwrap_err();
    assert!(err.is_constraint());
}

#[tokio::test]
async fn unlinked_player_can_link_again() {
    let db = test_db().await;
    let player = Uuid::new_v4();
    let params = LinkParams {
        player_id: player,
        player_name: "Steve",
        chat_id: 123,
        chat_username: None,
    };
    db.insert_link(&params).await.unwrap();

    assert!(db.deactivate_link(player).await.unwrap());
    assert!(!db.deactivate_link(player).await.unwrap());
    assert!(db.link_by_player(player).await.unwrap().is_none());

    db.insert_link(&params).await.unwrap();
    assert_eq!(db.active_links().await.unwrap().len(), 1);
}

// === Server tests ===

#[tokio::test]
async fn upsert_server_refreshes_fields() {
    let db = test_db().await;
    let first = db.upsert_server("server1", "Survival", true).await.unwrap();
    assert!(first.whitelist_enabled);
    assert!(first.is_online());

    let second = db
        .upsert_server("server1", "Survival+", false)
        .await
        .unwrap();
    assert_eq!(second.display_name, "Survival+");
    assert!(!second.whitelist_enabled);
    assert_eq!(db.list_servers().await.unwrap().len(), 1);
}

#[tokio::test]
async fn narrow_server_updates() {
    let db = test_db().await;
    assert!(!db.touch_server("ghost").await.unwrap());

    db.upsert_server("server1", "Survival", true).await.unwrap();
    assert!(db.touch_server("server1").await.unwrap());
    assert!(
        db.set_server_whitelist_enabled("server1", false)
            .await
            .unwrap()
    );
    assert!(
        !db.get_server("server1")
            .await
            .unwrap()
            .unwrap()
            .whitelist_enabled
    );
}

#[tokio::test]
async fn stale_heartbeat_is_offline() {
    let db = test_db().await;
    let mut server = db.upsert_server("server1", "Survival", true).await.unwrap();
    server.last_heartbeat -= 61;
    assert!(!server.is_online());
    server.last_heartbeat += 2;
    assert!(server.is_online());
}

// === Activation transaction tests ===

#[tokio::test]
async fn complete_activation_writes_link_and_entries() {
    let db = test_db().await;
    db.insert_code(&code_params("K7Q-2MX", 123, unix_timestamp() + 600))
        .await
        .unwrap();
    let player = Uuid::new_v4();
    let servers = vec!["lobby".to_string(), "server1".to_string()];

    let outcome = db
        .complete_activation(&ActivationWrite {
            code: "K7Q-2MX",
            player_id: player,
            player_name: "Steve",
            chat_id: 123,
            chat_username: Some("alice"),
            servers: &servers,
            reason: "linked via chat: @alice",
            added_by: "pairing-bot",
        })
        .await
        .unwrap();

    let ActivationOutcome::Granted { link, entries } = outcome else {
        panic!("expected grant");
    };
    assert!(link.is_player(player));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].server_name, "server1");
    assert_eq!(entries[1].registration_type, RegistrationType::Code);
    assert!(db.has_valid_entry(player, "lobby").await.unwrap());
    assert!(db.get_code("K7Q-2MX").await.unwrap().unwrap().used);
}

#[tokio::test]
async fn failed_link_insert_rolls_back_consume() {
    let db = test_db().await;
    db.insert_code(&code_params("K7Q-2MX", 123, unix_timestamp() + 600))
        .await
        .unwrap();
    let player = Uuid::new_v4();
    // The player already has an active link to a different chat identity.
    db.insert_link(&LinkParams {
        player_id: player,
        player_name: "Steve",
        chat_id: 999,
        chat_username: None,
    })
    .await
    .unwrap();
    let servers = vec!["server1".to_string()];

    let err = db
        .complete_activation(&ActivationWrite {
            code: "K7Q-2MX",
            player_id: player,
            player_name: "Steve",
            chat_id: 123,
            chat_username: None,
            servers: &servers,
            reason: "linked via chat: 123",
            added_by: "pairing-bot",
        })
        .await
        .unwrap_err();
    assert!(err.is_constraint());

    let code = db.get_code("K7Q-2MX").await.unwrap().unwrap();
    assert!(!code.used);
    assert!(!db.has_valid_entry(player, "server1").await.unwrap());
}

#[tokio::test]
async fn complete_activation_reports_used_code() {
    let db = test_db().await;
    db.insert_code(&code_params("K7Q-2MX", 123, unix_timestamp() + 600))
        .await
        .unwrap();
    db.consume_code("K7Q-2MX", Uuid::new_v4(), "Alex")
        .await
        .unwrap();
    let servers = vec!["server1".to_string()];

    let outcome = db
        .complete_activation(&ActivationWrite {
            code: "K7Q-2MX",
            player_id: Uuid::new_v4(),
            player_name: "Steve",
            chat_id: 123,
            chat_username: None,
            servers: &servers,
            reason: "linked via chat: 123",
            added_by: "pairing-bot",
        })
        .await
        .unwrap();

    assert!(matches!(outcome, ActivationOutcome::CodeUnavailable));
    assert!(db.active_links().await.unwrap().is_empty());
}
