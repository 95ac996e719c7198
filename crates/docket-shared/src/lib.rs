//! Request and response bodies of the
//! docket HTTP API. Tasks and categories
//! go over the wire in their stored
//! form; these are the shapes around
//! them.

use serde::{
  Deserialize,
  Deserializer,
  Serialize
};
use uuid::Uuid;

/// Body of `POST /register` and
/// `POST /login`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Credentials {
  #[serde(default)]
  pub email:    String,
  #[serde(default)]
  pub password: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
  pub token:   String,
  pub user_id: Uuid
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct CategoryCreate {
  #[serde(default)]
  pub name:  String,
  pub color: Option<String>
}

/// Dates are RFC 3339 strings.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreate {
  #[serde(default)]
  pub title:         String,
  pub description:   Option<String>,
  pub category_id:   Option<Uuid>,
  pub reminder_date: Option<String>,
  pub due_date:      Option<String>
}

/// Partial update. An absent field is
/// left alone; an explicit `null`
/// clears it.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title: Option<String>,
  #[serde(
    default,
    deserialize_with = "double_option",
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<Option<String>>,
  #[serde(
    default,
    deserialize_with = "double_option",
    skip_serializing_if = "Option::is_none"
  )]
  pub category_id: Option<Option<Uuid>>,
  #[serde(
    default,
    deserialize_with = "double_option",
    skip_serializing_if = "Option::is_none"
  )]
  pub reminder_date:
    Option<Option<String>>,
  #[serde(
    default,
    deserialize_with = "double_option",
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date: Option<Option<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed: Option<bool>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub is_starred: Option<bool>
}

/// Query string of `GET /tasks`.
/// `category` is `uncategorized` or a
/// category id; `date` is `YYYY-MM-DD`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct TasksQuery {
  pub category: Option<String>,
  pub tab:      Option<String>,
  pub search:   Option<String>,
  pub date:     Option<String>,
  pub starred:  Option<bool>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ErrorBody {
  pub error: String
}

impl ErrorBody {
  pub fn new(
    message: impl Into<String>
  ) -> Self {
    Self {
      error: message.into()
    }
  }
}

fn double_option<'de, T, D>(
  deserializer: D
) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>
{
  Option::<T>::deserialize(deserializer)
    .map(Some)
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::{
    AuthResponse,
    TaskPatch
  };

  #[test]
  fn patch_tells_null_from_absent() {
    let patch: TaskPatch =
      serde_json::from_str(
        r#"{"title":"x","dueDate":null}"#
      )
      .expect("parse patch");
    assert_eq!(
      patch.title.as_deref(),
      Some("x")
    );
    assert_eq!(patch.due_date, Some(None));
    assert_eq!(patch.reminder_date, None);
    assert_eq!(patch.category_id, None);

    let patch: TaskPatch =
      serde_json::from_str(
        r#"{"reminderDate":"2024-03-16T10:00:00Z","isStarred":true}"#
      )
      .expect("parse patch");
    assert_eq!(
      patch.reminder_date,
      Some(Some(
        "2024-03-16T10:00:00Z"
          .to_string()
      ))
    );
    assert_eq!(patch.is_starred, Some(true));
  }

  #[test]
  fn auth_response_is_camel_case() {
    let body = AuthResponse {
      token:   "t".to_string(),
      user_id: Uuid::nil()
    };
    let json = serde_json::to_value(&body)
      .expect("serialize");
    assert_eq!(
      json["userId"],
      "00000000-0000-0000-0000-000000000000"
    );
  }
}
