use std::collections::HashMap;

use parking_lot::RwLock;

use crate::models::ChannelAccount;

/// Known chat users plus the one currently driving the emulator.
pub struct UserRegistry {
    users: RwLock<HashMap<String, ChannelAccount>>,
    current_user_id: RwLock<String>,
}

impl UserRegistry {
    pub fn new(current_user: ChannelAccount) -> Self {
        let current_user_id = current_user.id.clone();
        let mut users = HashMap::new();
        users.insert(current_user.id.clone(), current_user);
        Self {
            users: RwLock::new(users),
            current_user_id: RwLock::new(current_user_id),
        }
    }

    pub fn current_user_id(&self) -> String {
        self.current_user_id.read().clone()
    }

    pub fn current_user(&self) -> ChannelAccount {
        let id = self.current_user_id();
        self.user_by_id(&id).unwrap_or(ChannelAccount {
            id,
            name: Some("User".to_string()),
            role: None,
        })
    }

    pub fn user_by_id(&self, id: &str) -> Option<ChannelAccount> {
        self.users.read().get(id).cloned()
    }

    pub fn upsert(&self, user: ChannelAccount) {
        self.users.write().insert(user.id.clone(), user);
    }

    pub fn set_current_user(&self, user: ChannelAccount) {
        *self.current_user_id.write() = user.id.clone();
        self.upsert(user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_current_user() {
        let registry = UserRegistry::new(ChannelAccount::new("default-user", "User"));
        assert_eq!(registry.current_user().id, "default-user");

        registry.set_current_user(ChannelAccount::new("u2", "Second"));
        assert_eq!(registry.current_user_id(), "u2");
        assert_eq!(registry.current_user().name.as_deref(), Some("Second"));
        assert!(registry.user_by_id("default-user").is_some());
    }
}
