//! Client identity: the persistent client id and the change counter.

use rand::Rng;
use tracing::warn;

use jotsync_storage::KvStore;

/// Version prefix baked into generated client ids, bumped when the id
/// format changes.
const CLIENT_ID_PREFIX: &str = "jot1-";

/// Generates a fresh client id: the version prefix plus 24 random hex
/// characters.
pub fn generate_client_id() -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(CLIENT_ID_PREFIX.len() + 24);
    id.push_str(CLIENT_ID_PREFIX);
    for _ in 0..24 {
        let nibble: u8 = rng.gen_range(0..16);
        id.push(char::from_digit(u32::from(nibble), 16).unwrap_or('0'));
    }
    id
}

/// Loads the persisted client id, generating and storing one on first run.
pub fn load_or_create_client_id(kv: &dyn KvStore, app_id: &str) -> String {
    let key = format!("{app_id}/clientid");
    match kv.read(&key) {
        Ok(Some(id)) if !id.is_empty() => id,
        Ok(_) => {
            let id = generate_client_id();
            if let Err(e) = kv.write(&key, &id) {
                warn!(error = %e, "failed to persist client id");
            }
            id
        }
        Err(e) => {
            warn!(error = %e, "failed to load client id, using a fresh one");
            generate_client_id()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jotsync_storage::MemoryStore;

    #[test]
    fn generated_ids_have_shape() {
        let id = generate_client_id();
        assert!(id.starts_with(CLIENT_ID_PREFIX));
        let hex = &id[CLIENT_ID_PREFIX.len()..];
        assert_eq!(hex.len(), 24);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(generate_client_id(), generate_client_id());
    }

    #[test]
    fn client_id_persists_across_loads() {
        let store = MemoryStore::new();
        let first = load_or_create_client_id(&store, "app");
        let second = load_or_create_client_id(&store, "app");
        assert_eq!(first, second);
        assert_eq!(store.read("app/clientid").unwrap().as_deref(), Some(first.as_str()));
    }
}
