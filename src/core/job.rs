use std::collections::HashMap;

use bytes::Bytes;

use crate::core::command::pairs_to_map;
use crate::proto::error::Error;
use crate::proto::frame::Frame;

/// A job record.
///
/// The server returns a job as an array whose first three elements are
/// positional (`queue`, `id`, `body`); anything after that is alternating
/// key/value extension pairs (for example `nacks` and
/// `additional-deliveries` when GETJOB ran with `WITHCOUNTERS`). Extension
/// keys are kept exactly as the server sends them.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Queue the job was fetched from.
    pub queue: String,
    /// Job ID.
    pub id: String,
    /// Job body; may be binary.
    pub body: Bytes,
    /// Extension fields keyed by the server's field names.
    pub extra: HashMap<String, Frame>,
}

impl Job {
    /// Builds a job from a `[queue, id, body, key1, val1, ...]` record.
    pub(crate) fn from_record(frame: Frame) -> crate::Result<Self> {
        let mut fields = frame
            .into_array()
            .ok_or_else(|| Error::protocol("job record must be an array"))?;
        if fields.len() < 3 {
            return Err(Error::protocol("job record must have at least 3 fields"));
        }
        let rest = fields.split_off(3);
        let mut fields = fields.into_iter();
        let queue = text_field(fields.next(), "queue")?;
        let id = text_field(fields.next(), "id")?;
        let body = match fields.next() {
            Some(Frame::BulkString(Some(body))) => body,
            Some(frame) => frame
                .as_text()
                .map(Bytes::from)
                .ok_or_else(|| Error::protocol("job body must be a string"))?,
            None => return Err(Error::protocol("job record missing body")),
        };
        Ok(Self {
            queue,
            id,
            body,
            extra: pairs_to_map(rest)?,
        })
    }

    /// Builds a job from a flat key/value SHOW reply, where `queue`, `id`
    /// and `body` appear among the pairs.
    pub(crate) fn from_pairs(pairs: Vec<Frame>) -> crate::Result<Self> {
        let mut map = pairs_to_map(pairs)?;
        let queue = take_text(&mut map, "queue")?;
        let id = take_text(&mut map, "id")?;
        let body = match map.remove("body") {
            Some(Frame::BulkString(Some(body))) => body,
            Some(frame) => frame
                .as_text()
                .map(Bytes::from)
                .ok_or_else(|| Error::protocol("job body must be a string"))?,
            None => Bytes::new(),
        };
        Ok(Self {
            queue,
            id,
            body,
            extra: map,
        })
    }

    /// The job body as UTF-8 text, lossily converted.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn text_field(frame: Option<Frame>, name: &str) -> crate::Result<String> {
    frame
        .and_then(|f| f.as_text())
        .ok_or_else(|| Error::protocol(format!("job record field {name:?} must be a string")))
}

fn take_text(map: &mut HashMap<String, Frame>, name: &str) -> crate::Result<String> {
    map.remove(name)
        .and_then(|f| f.as_text())
        .ok_or_else(|| Error::protocol(format!("job reply missing field {name:?}")))
}

/// Anything that can stand in for a job ID in acknowledge-style commands:
/// a [`Job`], a reference to one, or a plain ID string.
pub trait JobRef {
    /// The job ID to send.
    fn job_id(&self) -> &str;
}

impl JobRef for Job {
    fn job_id(&self) -> &str {
        &self.id
    }
}

impl JobRef for &Job {
    fn job_id(&self) -> &str {
        &self.id
    }
}

impl JobRef for &str {
    fn job_id(&self) -> &str {
        self
    }
}

impl JobRef for String {
    fn job_id(&self) -> &str {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(text: &str) -> Frame {
        Frame::BulkString(Some(Bytes::copy_from_slice(text.as_bytes())))
    }

    #[test]
    fn test_job_from_record() {
        let record = Frame::Array(vec![bulk("q"), bulk("id"), bulk("body")]);
        let job = Job::from_record(record).unwrap();
        assert_eq!(job.queue, "q");
        assert_eq!(job.id, "id");
        assert_eq!(job.body_text(), "body");
        assert!(job.extra.is_empty());
    }

    #[test]
    fn test_job_from_record_with_counters() {
        let record = Frame::Array(vec![
            bulk("q"),
            bulk("id"),
            bulk("body"),
            bulk("nacks"),
            Frame::Integer(1),
            bulk("additional-deliveries"),
            Frame::Integer(2),
        ]);
        let job = Job::from_record(record).unwrap();
        assert_eq!(job.extra.get("nacks"), Some(&Frame::Integer(1)));
        assert_eq!(
            job.extra.get("additional-deliveries"),
            Some(&Frame::Integer(2))
        );
    }

    #[test]
    fn test_job_from_record_too_short() {
        let record = Frame::Array(vec![bulk("q"), bulk("id")]);
        assert!(matches!(
            Job::from_record(record),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn test_job_from_pairs() {
        let pairs = vec![
            bulk("id"),
            bulk("D-abc"),
            bulk("queue"),
            bulk("q"),
            bulk("body"),
            bulk("payload"),
            bulk("state"),
            bulk("queued"),
        ];
        let job = Job::from_pairs(pairs).unwrap();
        assert_eq!(job.id, "D-abc");
        assert_eq!(job.queue, "q");
        assert_eq!(job.body_text(), "payload");
        assert_eq!(job.extra.get("state"), Some(&bulk("queued")));
    }

    #[test]
    fn test_job_ref_implementations() {
        let job = Job {
            queue: "q".to_string(),
            id: "D-xyz".to_string(),
            body: Bytes::new(),
            extra: HashMap::new(),
        };
        assert_eq!(job.job_id(), "D-xyz");
        assert_eq!((&job).job_id(), "D-xyz");
        assert_eq!("D-raw".job_id(), "D-raw");
        assert_eq!("D-owned".to_string().job_id(), "D-owned");
    }
}
