use super::Document;
use core::cmp::Ordering;
use regex::Regex;
use serde_json::Value;

/// A single condition on a document field.
///
/// Field names may be dotted (`submitters.alice.contributions`) to reach into nested objects.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// The field equals the value
    Eq { field: String, value: Value },

    /// The field lies in `[min, max)`; numbers compare numerically, strings lexicographically
    Range {
        field: String,
        min: Option<Value>,
        max: Option<Value>,
    },

    /// The field is a string matched by the pattern
    Matches { field: String, pattern: Regex },
}

impl Predicate {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq { field, value } => lookup(doc, field).is_some_and(|v| v == value),
            Self::Range { field, min, max } => lookup(doc, field).is_some_and(|v| {
                let above_min = min.as_ref().is_none_or(|m| compare(v, m).is_some_and(Ordering::is_ge));
                let below_max = max.as_ref().is_none_or(|m| compare(v, m).is_some_and(Ordering::is_lt));
                above_min && below_max
            }),
            Self::Matches { field, pattern } => lookup(doc, field)
                .and_then(Value::as_str)
                .is_some_and(|s| pattern.is_match(s)),
        }
    }
}

/// A conjunction of predicates. The empty filter matches every document.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// A filter matching every document
    #[must_use]
    pub const fn new() -> Self {
        Self { predicates: Vec::new() }
    }

    /// Require `field == value`
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Require `min <= field < max`, either end optional
    #[must_use]
    pub fn range(mut self, field: impl Into<String>, min: Option<Value>, max: Option<Value>) -> Self {
        self.predicates.push(Predicate::Range {
            field: field.into(),
            min,
            max,
        });
        self
    }

    /// Require the string `field` to match `pattern`
    #[must_use]
    pub fn matches(mut self, field: impl Into<String>, pattern: Regex) -> Self {
        self.predicates.push(Predicate::Matches {
            field: field.into(),
            pattern,
        });
        self
    }

    /// Whether the document satisfies every predicate
    #[must_use]
    pub fn is_match(&self, doc: &Document) -> bool {
        self.predicates.iter().all(|p| p.matches(doc))
    }

    /// The top-level equality predicates, used to seed upserted documents
    pub fn equality_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.predicates.iter().filter_map(|p| match p {
            Predicate::Eq { field, value } if !field.contains('.') => Some((field.as_str(), value)),
            _ => None,
        })
    }
}

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::into_document;
    use serde_json::json;

    fn doc() -> Document {
        into_document(json!({
            "project": "tokio-rs/tokio",
            "github": "git+https://github.com/tokio-rs/tokio.git",
            "amount_of_pull_requests": 250,
            "created_at": "2024-03-01T00:00:00Z",
            "submitters": { "alice": { "contributions": 4 } }
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().is_match(&doc()));
    }

    #[test]
    fn test_eq() {
        assert!(Filter::new().eq("project", "tokio-rs/tokio").is_match(&doc()));
        assert!(!Filter::new().eq("project", "tokio-rs/mio").is_match(&doc()));
        assert!(!Filter::new().eq("missing", "x").is_match(&doc()));
    }

    #[test]
    fn test_numeric_range_is_half_open() {
        assert!(Filter::new().range("amount_of_pull_requests", Some(json!(250)), None).is_match(&doc()));
        assert!(!Filter::new().range("amount_of_pull_requests", None, Some(json!(250))).is_match(&doc()));
        assert!(Filter::new().range("amount_of_pull_requests", Some(json!(100)), Some(json!(1000))).is_match(&doc()));
    }

    #[test]
    fn test_string_range_on_timestamps() {
        let filter = Filter::new().range("created_at", Some(json!("2024-01-01T00:00:00Z")), Some(json!("2024-06-01T00:00:00Z")));
        assert!(filter.is_match(&doc()));
    }

    #[test]
    fn test_range_type_mismatch_does_not_match() {
        assert!(!Filter::new().range("project", Some(json!(1)), None).is_match(&doc()));
    }

    #[test]
    fn test_regex_match() {
        let pattern = Regex::new(r"(^|/)tokio-rs/tokio(\.git)?$").unwrap();
        assert!(Filter::new().matches("github", pattern).is_match(&doc()));

        let other = Regex::new(r"(^|/)tokio-rs/tok(\.git)?$").unwrap();
        assert!(!Filter::new().matches("github", other).is_match(&doc()));
    }

    #[test]
    fn test_dotted_path() {
        assert!(Filter::new().eq("submitters.alice.contributions", 4).is_match(&doc()));
        assert!(!Filter::new().eq("submitters.bob.contributions", 4).is_match(&doc()));
    }

    #[test]
    fn test_conjunction() {
        let filter = Filter::new().eq("project", "tokio-rs/tokio").eq("amount_of_pull_requests", 1);
        assert!(!filter.is_match(&doc()));
    }

    #[test]
    fn test_equality_fields_skip_dotted_and_non_eq() {
        let filter = Filter::new()
            .eq("project", "a/b")
            .eq("nested.field", 1)
            .range("n", Some(json!(1)), None);
        let fields: Vec<_> = filter.equality_fields().collect();
        assert_eq!(fields, vec![("project", &json!("a/b"))]);
    }
}
