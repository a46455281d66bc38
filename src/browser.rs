//! Player identity kept in the browser: a random session id and the display name in local
//! storage, and a per-tab flag in session storage for the welcome popup.

use rand::Rng;

pub const SESSION_ID_KEY: &str = "lucky_tree.session_id";
pub const PLAYER_NAME_KEY: &str = "lucky_tree.player_name";

pub fn popup_key(invite_code: &str) -> String {
    format!("lucky_tree.popup.{}", invite_code)
}

/// 32 lower-case hex characters.
pub fn generate_session_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(feature = "hydrate")]
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

#[cfg(feature = "hydrate")]
fn session_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.session_storage().ok()?
}

/// Returns the stored session id, creating and persisting one on first use.
#[cfg(feature = "hydrate")]
pub fn session_id() -> Option<String> {
    let storage = local_storage()?;
    if let Ok(Some(existing)) = storage.get_item(SESSION_ID_KEY) {
        if !existing.is_empty() {
            return Some(existing);
        }
    }
    let fresh = generate_session_id(&mut rand::rng());
    storage.set_item(SESSION_ID_KEY, &fresh).ok()?;
    Some(fresh)
}

#[cfg(not(feature = "hydrate"))]
pub fn session_id() -> Option<String> {
    None
}

#[cfg(feature = "hydrate")]
pub fn player_name() -> Option<String> {
    local_storage()?.get_item(PLAYER_NAME_KEY).ok()?
}

#[cfg(not(feature = "hydrate"))]
pub fn player_name() -> Option<String> {
    None
}

#[cfg(feature = "hydrate")]
pub fn set_player_name(name: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.set_item(PLAYER_NAME_KEY, name);
    }
}

#[cfg(not(feature = "hydrate"))]
pub fn set_player_name(_name: &str) {}

/// True the first time it is called for `invite_code` in this browser tab.
#[cfg(feature = "hydrate")]
pub fn take_popup_flag(invite_code: &str) -> bool {
    let Some(storage) = session_storage() else {
        return false;
    };
    let key = popup_key(invite_code);
    match storage.get_item(&key) {
        Ok(Some(_)) => false,
        _ => storage.set_item(&key, "1").is_ok(),
    }
}

#[cfg(not(feature = "hydrate"))]
pub fn take_popup_flag(_invite_code: &str) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_session_id() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = generate_session_id(&mut rng);
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(id, generate_session_id(&mut rng));
    }

    #[test]
    fn test_popup_key() {
        assert_eq!(popup_key("ABC234"), "lucky_tree.popup.ABC234");
    }
}
