use serde_json::Value;

/// One queued publish: a destination plus the exported item.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub uri: String,
    pub realm: Option<String>,
    pub secret: Option<Vec<u8>>,
    pub channel: String,
    pub payload: Value,
}

/// Where a request goes: control endpoint, credentials and channel.
type Destination<'a> = (&'a str, Option<&'a str>, Option<&'a [u8]>, &'a str);

impl PublishRequest {
    fn destination(&self) -> Destination<'_> {
        (
            self.uri.as_str(),
            self.realm.as_deref(),
            self.secret.as_deref(),
            self.channel.as_str(),
        )
    }

    /// Same control endpoint, credentials, and channel.
    pub fn mergeable(&self, other: &Self) -> bool {
        self.destination() == other.destination()
    }
}

/// Consecutive mergeable requests, delivered as one `items` array.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub uri: String,
    pub realm: Option<String>,
    pub secret: Option<Vec<u8>>,
    pub channel: String,
    pub items: Vec<Value>,
}

impl From<PublishRequest> for Batch {
    fn from(request: PublishRequest) -> Self {
        Self {
            uri: request.uri,
            realm: request.realm,
            secret: request.secret,
            channel: request.channel,
            items: vec![request.payload],
        }
    }
}

impl Batch {

    fn destination(&self) -> Destination<'_> {
        (
            self.uri.as_str(),
            self.realm.as_deref(),
            self.secret.as_deref(),
            self.channel.as_str(),
        )
    }

    fn accepts(&self, request: &PublishRequest) -> bool {
        self.destination() == request.destination()
    }

    /// `<uri>/publish/<channel>/`
    pub fn endpoint(&self) -> String {
        format!("{}/publish/{}/", self.uri, self.channel)
    }
}

/// Split `requests` into maximal runs of adjacent mergeable requests.
///
/// Only neighbours merge: `[A, A, B, A]` gives three batches.
pub fn batches(requests: Vec<PublishRequest>) -> Vec<Batch> {
    let mut out: Vec<Batch> = Vec::new();
    for request in requests {
        match out.last_mut() {
            Some(batch) if batch.accepts(&request) => batch.items.push(request.payload),
            _ => out.push(Batch::from(request)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(uri: &str, channel: &str, n: u32) -> PublishRequest {
        PublishRequest {
            uri: uri.into(),
            realm: Some("realm".into()),
            secret: Some(b"secret".to_vec()),
            channel: channel.into(),
            payload: json!({"n": n}),
        }
    }

    #[test]
    fn mergeable_requires_all_destination_fields() {
        let a = req("http://h", "c", 1);
        assert!(a.mergeable(&req("http://h", "c", 2)));
        assert!(!a.mergeable(&req("http://other", "c", 2)));
        assert!(!a.mergeable(&req("http://h", "d", 2)));

        let mut no_realm = req("http://h", "c", 2);
        no_realm.realm = None;
        assert!(!a.mergeable(&no_realm));

        let mut other_secret = req("http://h", "c", 2);
        other_secret.secret = Some(b"other".to_vec());
        assert!(!a.mergeable(&other_secret));
    }

    #[test]
    fn adjacent_only_grouping() {
        let out = batches(vec![
            req("http://h", "a", 1),
            req("http://h", "a", 2),
            req("http://h", "b", 3),
            req("http://h", "a", 4),
        ]);
        let counts: Vec<usize> = out.iter().map(|b| b.items.len()).collect();
        assert_eq!(counts, vec![2, 1, 1]);
        assert_eq!(out[0].items, vec![json!({"n": 1}), json!({"n": 2})]);
        assert_eq!(out[1].channel, "b");
        assert_eq!(out[2].items, vec![json!({"n": 4})]);
    }

    #[test]
    fn single_destination_is_one_batch() {
        let out = batches((0..5).map(|n| req("http://h", "a", n)).collect());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].items.len(), 5);
    }

    #[test]
    fn grouping_agrees_with_mergeable() {
        let mut other_secret = req("http://h", "a", 2);
        other_secret.secret = Some(b"other".to_vec());
        let requests = vec![req("http://h", "a", 1), other_secret, req("http://h", "a", 3)];

        let expected = 1 + requests
            .windows(2)
            .filter(|pair| !pair[0].mergeable(&pair[1]))
            .count();
        assert_eq!(batches(requests).len(), expected);
        assert_eq!(expected, 3);
    }

    #[test]
    fn empty_input() {
        assert!(batches(Vec::new()).is_empty());
    }

    #[test]
    fn endpoint() {
        let out = batches(vec![req("http://h:5561", "news", 1)]);
        assert_eq!(out[0].endpoint(), "http://h:5561/publish/news/");
    }
}
