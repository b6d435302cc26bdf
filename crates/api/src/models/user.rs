//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shoplane_core::{AddressId, Email, ProductId, ShippingAddress, UserId, UserRole};

use crate::validation::{FieldError, Validate, Validator, check_text};

/// A registered shopper or administrator.
///
/// The password hash is not part of this type. Repositories return it
/// separately, only to the auth service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub addresses: Vec<Address>,
    pub wishlist: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: UserRole,
}

/// Identity returned by register and login.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub email: Email,
}

/// Profile returned by `GET /api/auth/me`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub addresses: Vec<Address>,
    pub wishlist: Vec<ProductId>,
}

impl User {
    #[must_use]
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
            last_login: self.last_login,
            addresses: self.addresses.clone(),
            wishlist: self.wishlist.clone(),
        }
    }

    /// Whether a token issued at `issued_at_ms` (milliseconds since epoch)
    /// predates the last password change. A token minted in the same
    /// millisecond as the change counts as stale.
    #[must_use]
    pub fn token_predates_password_change(&self, issued_at_ms: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| issued_at_ms <= changed.timestamp_millis())
    }

    /// Add an address. The first address, or one flagged default, becomes
    /// the only default.
    pub fn add_address(&mut self, input: AddressInput) -> Address {
        let id = AddressId::new(
            self.addresses
                .iter()
                .map(|a| a.id.as_i32())
                .max()
                .unwrap_or(0)
                + 1,
        );
        let make_default = input.is_default || self.addresses.is_empty();
        if make_default {
            self.clear_default();
        }

        let address = Address::from_input(id, input, make_default);
        self.addresses.push(address.clone());
        address
    }

    /// Replace an address's fields. Returns `None` if the id is unknown.
    pub fn update_address(&mut self, id: AddressId, input: AddressInput) -> Option<Address> {
        let was_default = self.addresses.iter().find(|a| a.id == id)?.is_default;
        let make_default = input.is_default || was_default;
        if input.is_default {
            self.clear_default();
        }

        let slot = self.addresses.iter_mut().find(|a| a.id == id)?;
        *slot = Address::from_input(id, input, make_default);
        Some(slot.clone())
    }

    /// Remove an address. If it was the default, the first remaining address
    /// takes over. Returns `false` if the id is unknown.
    pub fn remove_address(&mut self, id: AddressId) -> bool {
        let Some(index) = self.addresses.iter().position(|a| a.id == id) else {
            return false;
        };
        let removed = self.addresses.remove(index);
        if removed.is_default
            && let Some(first) = self.addresses.first_mut()
        {
            first.is_default = true;
        }
        true
    }

    /// Add a product to the wishlist. Returns `false` if it was already there.
    pub fn add_to_wishlist(&mut self, product_id: ProductId) -> bool {
        if self.wishlist.contains(&product_id) {
            return false;
        }
        self.wishlist.push(product_id);
        true
    }

    /// Remove a product from the wishlist. Returns `false` if it was absent.
    pub fn remove_from_wishlist(&mut self, product_id: ProductId) -> bool {
        let before = self.wishlist.len();
        self.wishlist.retain(|id| *id != product_id);
        self.wishlist.len() != before
    }

    fn clear_default(&mut self) {
        for address in &mut self.addresses {
            address.is_default = false;
        }
    }
}

/// A saved delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    fn from_input(id: AddressId, input: AddressInput, is_default: bool) -> Self {
        let address = input.into_shipping();
        Self {
            id,
            name: address.name,
            street: address.street,
            city: address.city,
            state: address.state,
            postal_code: address.postal_code,
            country: address.country,
            phone: address.phone,
            is_default,
        }
    }
}

/// Address fields as submitted by the client.
///
/// Also used for the shipping address on checkout, where `is_default` is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Validate with field names under `prefix` (e.g. `shippingAddress.`).
    pub fn check(&self, v: &mut Validator, prefix: &str) {
        let field = |name: &str| format!("{prefix}{name}");
        check_text(v, &field("name"), &self.name, "Name", 100);
        check_text(v, &field("street"), &self.street, "Street", 200);
        check_text(v, &field("city"), &self.city, "City", 100);
        check_text(v, &field("state"), &self.state, "State", 100);
        check_text(v, &field("postalCode"), &self.postal_code, "Postal code", 20);
        if let Some(country) = &self.country {
            v.check(
                country.trim().chars().count() <= 100,
                &field("country"),
                "Country cannot exceed 100 characters",
            );
        }
        if let Some(phone) = &self.phone {
            v.check(
                phone
                    .trim()
                    .chars()
                    .all(|c| c.is_ascii_digit() || " +-()".contains(c)),
                &field("phone"),
                "Phone number is invalid",
            );
        }
    }

    /// Trimmed shipping address, defaulting the country.
    #[must_use]
    pub fn into_shipping(self) -> ShippingAddress {
        let trimmed = |s: String| s.trim().to_owned();
        ShippingAddress {
            name: trimmed(self.name),
            street: trimmed(self.street),
            city: trimmed(self.city),
            state: trimmed(self.state),
            postal_code: trimmed(self.postal_code),
            country: self
                .country
                .map(trimmed)
                .filter(|c| !c.is_empty())
                .unwrap_or_else(shoplane_core::order::default_country),
            phone: self.phone.map(trimmed).filter(|p| !p.is_empty()),
        }
    }
}

impl Validate for AddressInput {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        self.check(&mut v, "");
        v.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::tokens::{Claims, TokenKind};

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(1),
            name: "Asha Rao".to_owned(),
            email: Email::parse("asha@example.com").unwrap(),
            role: UserRole::User,
            is_active: true,
            last_login: None,
            password_changed_at: None,
            addresses: Vec::new(),
            wishlist: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn input(city: &str, is_default: bool) -> AddressInput {
        AddressInput {
            name: "Asha Rao".to_owned(),
            street: "12 MG Road".to_owned(),
            city: city.to_owned(),
            state: "KA".to_owned(),
            postal_code: "560001".to_owned(),
            country: None,
            phone: None,
            is_default,
        }
    }

    fn defaults(user: &User) -> Vec<AddressId> {
        user.addresses
            .iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect()
    }

    #[test]
    fn test_first_address_becomes_default() {
        let mut user = user();
        let first = user.add_address(input("Bengaluru", false));
        assert!(first.is_default);
        assert_eq!(first.country, "India");

        user.add_address(input("Mysuru", false));
        assert_eq!(defaults(&user), vec![first.id]);
    }

    #[test]
    fn test_single_default_address() {
        let mut user = user();
        user.add_address(input("Bengaluru", false));
        let second = user.add_address(input("Mysuru", true)).id;
        assert_eq!(defaults(&user), vec![second]);

        let first = user.addresses[0].id;
        user.update_address(first, input("Hubli", true)).unwrap();
        assert_eq!(defaults(&user), vec![first]);
        assert_eq!(user.addresses[0].city, "Hubli");
    }

    #[test]
    fn test_removing_default_promotes_next() {
        let mut user = user();
        let first = user.add_address(input("Bengaluru", false)).id;
        let second = user.add_address(input("Mysuru", false)).id;

        assert!(user.remove_address(first));
        assert_eq!(defaults(&user), vec![second]);
        assert!(!user.remove_address(first));
    }

    #[test]
    fn test_address_ids_are_not_reused() {
        let mut user = user();
        user.add_address(input("A", false));
        let second = user.add_address(input("B", false)).id;
        user.remove_address(AddressId::new(1));
        let third = user.add_address(input("C", false)).id;
        assert_ne!(second, third);
    }

    #[test]
    fn test_wishlist_is_a_set() {
        let mut user = user();
        assert!(user.add_to_wishlist(ProductId::new(3)));
        assert!(!user.add_to_wishlist(ProductId::new(3)));
        assert!(user.remove_from_wishlist(ProductId::new(3)));
        assert!(!user.remove_from_wishlist(ProductId::new(3)));
    }

    #[test]
    fn test_token_predates_password_change() {
        let mut user = user();
        assert!(!user.token_predates_password_change(0));

        let changed = Utc::now();
        user.password_changed_at = Some(changed);
        let at = changed.timestamp_millis();
        assert!(user.token_predates_password_change(at - 1));
        assert!(user.token_predates_password_change(at));
        assert!(!user.token_predates_password_change(at + 1));

        // Earlier in the same second as the change is still stale.
        let same_second = changed.timestamp() * 1000;
        assert!(user.token_predates_password_change(same_second));
    }

    #[test]
    fn test_relogin_after_password_change_is_fresh() {
        let mut user = user();
        user.password_changed_at = Some(Utc::now() - chrono::Duration::milliseconds(5));

        let claims = Claims::new(&user, TokenKind::Refresh, Duration::from_secs(60));
        assert!(!user.token_predates_password_change(claims.issued_at_millis()));
    }

    #[test]
    fn test_address_validation_lists_all_fields() {
        let empty = AddressInput {
            name: String::new(),
            street: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: None,
            phone: Some("call me".to_owned()),
            is_default: false,
        };
        let errors = empty.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["name", "street", "city", "state", "postalCode", "phone"]
        );
    }
}
