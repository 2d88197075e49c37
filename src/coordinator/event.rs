//! Native S3 notification event payload

use serde::{Deserialize, Serialize};

/// Top-level S3 notification event delivered to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records")]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3BucketRef,
    pub object: S3ObjectRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3ObjectRef {
    pub key: String,
}

impl S3Event {
    /// Build the event S3 would deliver for a newly created object.
    pub fn object_created(bucket: &str, key: &str) -> Self {
        Self {
            records: vec![S3EventRecord {
                s3: S3Entity {
                    bucket: S3BucketRef {
                        name: bucket.to_string(),
                    },
                    object: S3ObjectRef {
                        key: key.to_string(),
                    },
                },
            }],
        }
    }

    /// The bucket the event originated from, if the event carries a record.
    pub fn bucket(&self) -> Option<&str> {
        self.records.first().map(|r| r.s3.bucket.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_native_notification_shape() {
        let raw = r#"{
            "Records": [{
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": {"name": "scratch", "arn": "arn:aws:s3:::scratch"},
                    "object": {"key": "j1/task/mapper/1", "size": 128}
                }
            }]
        }"#;
        let event: S3Event = serde_json::from_str(raw).unwrap();
        assert_eq!(event.bucket(), Some("scratch"));
        assert_eq!(event.records[0].s3.object.key, "j1/task/mapper/1");
    }

    #[test]
    fn test_empty_records_has_no_bucket() {
        let event = S3Event { records: vec![] };
        assert_eq!(event.bucket(), None);
    }
}
