//! Users and their privacy-aware public profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A registered user. The store is the only authoritative copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id:            Uuid,
  pub email:         String,
  pub name:          String,
  pub phone:         Option<String>,
  /// When `true`, `phone` is hidden from everyone but the user themselves.
  pub phone_privacy: bool,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl User {
  /// The profile as seen by `viewer` (`None` for anonymous requests).
  pub fn profile_for(&self, viewer: Option<Uuid>) -> UserProfile {
    let phone = if self.phone_privacy && viewer != Some(self.id) {
      None
    } else {
      self.phone.clone()
    };

    UserProfile {
      id: self.id,
      name: self.name.clone(),
      phone,
      phone_privacy: self.phone_privacy,
      created_at: self.created_at,
    }
  }
}

/// What one user may see of another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
  pub id:            Uuid,
  pub name:          String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone:         Option<String>,
  pub phone_privacy: bool,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::DiscoveryStore::create_user`].
///
/// `phone_privacy` left as `None` takes the column default (`false`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
  pub email:         String,
  pub name:          String,
  pub phone:         Option<String>,
  pub phone_privacy: Option<bool>,
}

/// Partial profile update; `None` fields are left untouched.
///
/// `phone` distinguishes an absent key (`None`) from an explicit JSON `null`
/// (`Some(None)`), which clears the stored number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
  pub name:          Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub phone:         Option<Option<String>>,
  pub phone_privacy: Option<bool>,
}

/// Any key that is present, `null` included, deserializes to `Some`.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

impl UserPatch {
  pub fn is_empty(&self) -> bool {
    self.name.is_none() && self.phone.is_none() && self.phone_privacy.is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(phone_privacy: bool) -> User {
    User {
      id: Uuid::new_v4(),
      email: "ada@example.com".into(),
      name: "Ada".into(),
      phone: Some("+44 20 7946 0000".into()),
      phone_privacy,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn patch_tells_null_phone_from_absent_phone() {
    let absent: UserPatch = serde_json::from_str(r#"{"name":"Ada"}"#).unwrap();
    assert_eq!(absent.phone, None);

    let cleared: UserPatch = serde_json::from_str(r#"{"phone":null}"#).unwrap();
    assert_eq!(cleared.phone, Some(None));
    assert!(!cleared.is_empty());

    let set: UserPatch = serde_json::from_str(r#"{"phone":"555"}"#).unwrap();
    assert_eq!(set.phone, Some(Some("555".into())));
  }

  #[test]
  fn public_phone_visible_to_everyone() {
    let u = user(false);
    assert!(u.profile_for(None).phone.is_some());
    assert!(u.profile_for(Some(Uuid::new_v4())).phone.is_some());
  }

  #[test]
  fn private_phone_visible_only_to_owner() {
    let u = user(true);
    assert!(u.profile_for(None).phone.is_none());
    assert!(u.profile_for(Some(Uuid::new_v4())).phone.is_none());
    assert_eq!(u.profile_for(Some(u.id)).phone, u.phone);
  }

  #[test]
  fn hidden_phone_is_omitted_from_json() {
    let json = serde_json::to_value(user(true).profile_for(None)).unwrap();
    assert!(json.get("phone").is_none());
    assert_eq!(json["phone_privacy"], true);
  }
}
