//! Opaque record serialization for cached lists.
//!
//! Every blob is a JSON envelope that names the record type and carries its
//! primary key next to the field values:
//!
//! ```json
//! {"model":"feed_entry","pk":7,"fields":{"id":7,"owner_id":1,...}}
//! ```
//!
//! Decoding checks both the type name and the key, so a blob written for one
//! record type can never come back as a different one.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// A record that can live inside a cached list.
pub trait CacheableRecord: Serialize + DeserializeOwned {
    /// Stable type name embedded in every blob.
    const MODEL: &'static str;

    fn primary_key(&self) -> i64;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    model: &'a str,
    pk: i64,
    fields: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    model: String,
    pk: i64,
    fields: serde_json::Value,
}

#[derive(Debug, Error)]
#[error("failed to serialize `{model}` record: {source}")]
pub struct SerializeError {
    model: &'static str,
    #[source]
    source: serde_json::Error,
}

#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("malformed cache blob: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("cache blob holds a `{found}` record, expected `{expected}`")]
    ModelMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("cache blob key {envelope} disagrees with record key {record}")]
    IdentityMismatch { envelope: i64, record: i64 },
}

pub struct ObjectSerializer;

impl ObjectSerializer {
    pub fn serialize<T: CacheableRecord>(record: &T) -> Result<String, SerializeError> {
        let envelope = EnvelopeRef {
            model: T::MODEL,
            pk: record.primary_key(),
            fields: record,
        };
        serde_json::to_string(&envelope).map_err(|source| SerializeError {
            model: T::MODEL,
            source,
        })
    }

    pub fn deserialize<T: CacheableRecord>(blob: &str) -> Result<T, DeserializationError> {
        let envelope: Envelope = serde_json::from_str(blob)?;
        if envelope.model != T::MODEL {
            return Err(DeserializationError::ModelMismatch {
                expected: T::MODEL,
                found: envelope.model,
            });
        }

        let record: T = serde_json::from_value(envelope.fields)?;
        if record.primary_key() != envelope.pk {
            return Err(DeserializationError::IdentityMismatch {
                envelope: envelope.pk,
                record: record.primary_key(),
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Comment {
        id: i64,
        body: String,
        likes: u32,
    }

    impl CacheableRecord for Comment {
        const MODEL: &'static str = "comment";

        fn primary_key(&self) -> i64 {
            self.id
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Like {
        id: i64,
        user_id: i64,
    }

    impl CacheableRecord for Like {
        const MODEL: &'static str = "like";

        fn primary_key(&self) -> i64 {
            self.id
        }
    }

    fn comment() -> Comment {
        Comment {
            id: 12,
            body: "first!".to_string(),
            likes: 3,
        }
    }

    #[test]
    fn repeated_cycles_preserve_identity_and_fields() {
        let original = comment();
        let mut current = original.clone();
        for _ in 0..3 {
            let blob = ObjectSerializer::serialize(&current).expect("serialize");
            current = ObjectSerializer::deserialize(&blob).expect("deserialize");
        }
        assert_eq!(current, original);
    }

    #[test]
    fn blob_embeds_type_and_key() {
        let blob = ObjectSerializer::serialize(&comment()).expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&blob).expect("json");
        assert_eq!(value["model"], "comment");
        assert_eq!(value["pk"], 12);
        assert_eq!(value["fields"]["body"], "first!");
    }

    #[test]
    fn malformed_blob_is_rejected() {
        let err = ObjectSerializer::deserialize::<Comment>("{\"model\":\"comment\"")
            .expect_err("truncated blob rejected");
        assert!(matches!(err, DeserializationError::Malformed(_)));

        let err = ObjectSerializer::deserialize::<Comment>(
            r#"{"model":"comment","pk":12,"fields":{"id":12}}"#,
        )
        .expect_err("missing fields rejected");
        assert!(matches!(err, DeserializationError::Malformed(_)));
    }

    #[test]
    fn blob_of_another_type_is_rejected() {
        let blob = ObjectSerializer::serialize(&Like { id: 1, user_id: 2 }).expect("serialize");
        let err = ObjectSerializer::deserialize::<Comment>(&blob).expect_err("wrong model");
        assert!(matches!(
            err,
            DeserializationError::ModelMismatch {
                expected: "comment",
                ..
            }
        ));
    }

    #[test]
    fn tampered_key_is_rejected() {
        let blob = r#"{"model":"like","pk":9,"fields":{"id":1,"user_id":2}}"#;
        let err = ObjectSerializer::deserialize::<Like>(blob).expect_err("pk mismatch");
        assert!(matches!(
            err,
            DeserializationError::IdentityMismatch {
                envelope: 9,
                record: 1
            }
        ));
    }
}
