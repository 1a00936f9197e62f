use super::Store;
use std::path::PathBuf;

fn temp_db(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "__yamato_store_{name}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("data").join("database.json")
}

async fn open(path: &PathBuf) -> Store {
    Store::open(path.to_str().unwrap()).await.unwrap()
}

fn cleanup(path: &PathBuf) {
    let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
}

#[tokio::test]
async fn test_open_creates_empty_document() {
    let path = temp_db("create");
    let store = open(&path).await;
    assert_eq!(store.user_count().await, 0);

    let raw = std::fs::read_to_string(&path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["users"], serde_json::json!([]));
    assert!(doc["profiles"].is_object());
    assert!(doc["economy"].is_object());
    cleanup(&path);
}

#[tokio::test]
async fn test_register_is_idempotent() {
    let path = temp_db("idempotent");
    let store = open(&path).await;

    let first = store
        .register("15550001111@s.whatsapp.net", "15550001111")
        .await
        .unwrap();
    assert!(first.is_new());
    assert_eq!(first.record().date, first.record().last_seen);

    let second = store
        .register("15550001111@s.whatsapp.net", "15550001111")
        .await
        .unwrap();
    assert!(!second.is_new());
    assert_eq!(second.record().date, first.record().date);
    assert!(second.record().last_seen >= first.record().last_seen);
    assert_eq!(store.user_count().await, 1);
    cleanup(&path);
}

#[tokio::test]
async fn test_registration_persists_across_reopen() {
    let path = temp_db("reopen");
    {
        let store = open(&path).await;
        store.register("a@s.whatsapp.net", "1").await.unwrap();
        store.register("b@s.whatsapp.net", "2").await.unwrap();
    }
    let store = open(&path).await;
    assert_eq!(store.user_count().await, 2);
    let b = store.register("b@s.whatsapp.net", "2").await.unwrap();
    assert!(!b.is_new());
    assert_eq!(b.record().number, "2");
    assert_eq!(store.user_count().await, 2);
    cleanup(&path);
}

#[tokio::test]
async fn test_unknown_collections_survive_rewrite() {
    let path = temp_db("preserve");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{"users":[{"jid":"x@s.whatsapp.net","number":"9","date":5}],
            "profiles":{"x@s.whatsapp.net":{"bio":"swordsman"}},
            "economy":{"x@s.whatsapp.net":{"wallet":1000}},
            "guilds":["straw hats"]}"#,
    )
    .unwrap();

    let store = open(&path).await;
    let reg = store.register("x@s.whatsapp.net", "9").await.unwrap();
    assert!(!reg.is_new());
    assert_eq!(reg.record().date, 5);

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["profiles"]["x@s.whatsapp.net"]["bio"], "swordsman");
    assert_eq!(doc["economy"]["x@s.whatsapp.net"]["wallet"], 1000);
    assert_eq!(doc["guilds"][0], "straw hats");
    assert!(doc["users"][0]["lastSeen"].as_i64().unwrap() > 5);
    cleanup(&path);
}

#[tokio::test]
async fn test_external_edit_is_picked_up_before_write() {
    let path = temp_db("external");
    let store = open(&path).await;
    store.register("a@s.whatsapp.net", "1").await.unwrap();

    // Another writer adds a user behind the store's back.
    let mut doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    doc["users"].as_array_mut().unwrap().push(serde_json::json!({
        "jid": "b@s.whatsapp.net", "number": "2", "date": 1, "lastSeen": 1
    }));
    std::fs::write(&path, doc.to_string()).unwrap();

    store.register("c@s.whatsapp.net", "3").await.unwrap();
    assert_eq!(store.user_count().await, 3);
    cleanup(&path);
}

#[tokio::test]
async fn test_corrupt_document_is_an_error() {
    let path = temp_db("corrupt");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();
    assert!(Store::open(path.to_str().unwrap()).await.is_err());
    cleanup(&path);
}
