//! User and item references as the backend sends them.
//!
//! The backend populates references inconsistently: the same field may carry
//! a bare id string or a populated document depending on the endpoint. Both
//! shapes deserialize into the same value object.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ItemId, UserId};

/// Marketplace account type of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Farmer,
    Buyer,
}

/// A user as referenced from chats, participants and messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserRefWire")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserProfile {
    /// A reference that only knows the id.
    pub fn id_only(id: UserId) -> Self {
        Self {
            id,
            name: None,
            email: None,
            account_type: None,
            avatar: None,
        }
    }

    /// A reference with a display name.
    pub fn named(id: UserId, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::id_only(id)
        }
    }

    /// Sets the account type.
    pub fn with_account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = Some(account_type);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserRefWire {
    Id(UserId),
    Populated {
        #[serde(rename = "_id")]
        id: UserId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
        #[serde(rename = "type", default)]
        account_type: Option<AccountType>,
        #[serde(default)]
        avatar: Option<String>,
    },
}

impl From<UserRefWire> for UserProfile {
    fn from(wire: UserRefWire) -> Self {
        match wire {
            UserRefWire::Id(id) => UserProfile::id_only(id),
            UserRefWire::Populated {
                id,
                name,
                email,
                account_type,
                avatar,
            } => UserProfile {
                id,
                name,
                email,
                account_type,
                avatar,
            },
        }
    }
}

/// A marketplace item a chat is scoped to (a crop listing on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ItemRefWire")]
pub struct ItemRef {
    #[serde(rename = "_id")]
    pub id: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ItemRef {
    /// A reference that only knows the id.
    pub fn id_only(id: ItemId) -> Self {
        Self {
            id,
            name: None,
            category: None,
            images: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemRefWire {
    Id(ItemId),
    Populated {
        #[serde(rename = "_id")]
        id: ItemId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        images: Vec<String>,
    },
}

impl From<ItemRefWire> for ItemRef {
    fn from(wire: ItemRefWire) -> Self {
        match wire {
            ItemRefWire::Id(id) => ItemRef::id_only(id),
            ItemRefWire::Populated {
                id,
                name,
                category,
                images,
            } => ItemRef {
                id,
                name,
                category,
                images,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_ref_accepts_bare_id() {
        let user: UserProfile = serde_json::from_value(json!("u-1")).unwrap();
        assert_eq!(user.id.as_str(), "u-1");
        assert!(user.name.is_none());
    }

    #[test]
    fn user_ref_accepts_populated_document() {
        let user: UserProfile = serde_json::from_value(json!({
            "_id": "u-2",
            "name": "Asha",
            "email": "asha@example.com",
            "type": "farmer"
        }))
        .unwrap();

        assert_eq!(user.id.as_str(), "u-2");
        assert_eq!(user.name.as_deref(), Some("Asha"));
        assert_eq!(user.account_type, Some(AccountType::Farmer));
    }

    #[test]
    fn item_ref_accepts_both_shapes() {
        let bare: ItemRef = serde_json::from_value(json!("crop-9")).unwrap();
        assert_eq!(bare.id.as_str(), "crop-9");

        let full: ItemRef = serde_json::from_value(json!({
            "_id": "crop-9",
            "name": "Basmati rice",
            "category": "grains",
            "farmer": "u-2",
            "images": ["a.jpg"]
        }))
        .unwrap();
        assert_eq!(full.name.as_deref(), Some("Basmati rice"));
        assert_eq!(full.images, vec!["a.jpg".to_string()]);
    }
}
