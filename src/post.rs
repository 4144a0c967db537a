use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl Account {
    pub fn display(&self) -> String {
        let name = self.display_name.trim();
        let name = if name.is_empty() { &self.username } else { name };
        format!("{name} <@{}>", self.acct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    pub account: Account,
    pub content: String,
    pub created_at: DateTime<Utc>,
    // Absent on some servers, null on others.
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(skip)]
    pub in_reply_to_url: Option<String>,
    #[serde(default)]
    pub reblog: Option<Box<Post>>,
    #[serde(default, deserialize_with = "quoted_post")]
    pub quote: Option<Box<Post>>,
    #[serde(default)]
    pub spoiler_text: String,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub media_attachments: Vec<MediaAttachment>,
    #[serde(skip)]
    pub pinned: bool,
}

/// Accepts a quoted status directly, or wrapped in Mastodon's
/// `{state, quoted_status}` quote entity. Pending, revoked and deleted
/// quotes carry no status and decode as `None`.
fn quoted_post<'de, D>(deserializer: D) -> Result<Option<Box<Post>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quote {
        Status(Box<Post>),
        Entity {
            #[serde(default)]
            quoted_status: Option<Box<Post>>,
        },
    }

    Ok(match Option::<Quote>::deserialize(deserializer)? {
        Some(Quote::Status(post)) => Some(post),
        Some(Quote::Entity { quoted_status }) => quoted_status,
        None => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub ancestors: Vec<Post>,
    #[serde(default)]
    pub descendants: Vec<Post>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};

    pub fn post_json(id: &str, content: &str) -> Value {
        json!({
            "id": id,
            "url": format!("https://example.social/@alice/{id}"),
            "uri": format!("https://example.social/users/alice/statuses/{id}"),
            "account": {
                "id": "1",
                "username": "alice",
                "acct": "alice",
                "display_name": "Alice",
                "url": "https://example.social/@alice"
            },
            "content": content,
            "created_at": "2024-01-02T03:04:05.000Z",
            "language": "en",
            "in_reply_to_id": null,
            "media_attachments": []
        })
    }

    pub fn sample_post(id: &str, content: &str) -> Post {
        serde_json::from_value(post_json(id, content)).unwrap()
    }

    #[test]
    fn missing_edited_at_is_none() {
        let post = sample_post("1", "<p>hi</p>");
        assert_eq!(post.edited_at, None);
        assert_eq!(post.in_reply_to_url, None);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let mut value = post_json("1", "<p>hi</p>");
        value.as_object_mut().unwrap().remove("content");
        let err = serde_json::from_value::<Post>(value).unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn quote_entity_unwraps_quoted_status() {
        let mut value = post_json("2", "<p>my take</p>");
        value["quote"] = json!({
            "state": "accepted",
            "quoted_status": post_json("1", "<p>quoted</p>")
        });
        let post: Post = serde_json::from_value(value).unwrap();
        let quoted = post.quote.as_deref().unwrap();
        assert_eq!(quoted.id, "1");
        assert_eq!(quoted.content, "<p>quoted</p>");
    }

    #[test]
    fn quote_without_status_is_none() {
        let mut value = post_json("2", "<p>x</p>");
        value["quote"] = json!({ "state": "pending", "quoted_status": null });
        let post: Post = serde_json::from_value(value).unwrap();
        assert_eq!(post.quote, None);

        let mut value = post_json("3", "<p>x</p>");
        value["quote"] = json!({ "state": "accepted", "quoted_status_id": "1" });
        let post: Post = serde_json::from_value(value).unwrap();
        assert_eq!(post.quote, None);
    }

    #[test]
    fn bare_quoted_status_still_decodes() {
        let mut value = post_json("2", "<p>x</p>");
        value["quote"] = post_json("1", "<p>quoted</p>");
        let post: Post = serde_json::from_value(value).unwrap();
        assert_eq!(post.quote.as_deref().map(|q| q.id.as_str()), Some("1"));
    }

    #[test]
    fn account_display_falls_back_to_username() {
        let mut post = sample_post("1", "");
        assert_eq!(post.account.display(), "Alice <@alice>");
        post.account.display_name = "  ".into();
        assert_eq!(post.account.display(), "alice <@alice>");
    }
}
