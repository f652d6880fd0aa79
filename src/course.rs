//! Course data model and response parsing.
//!
//! The backend nests classes under topics (`data.classes[].classes[]`), but
//! some endpoints return a flat `classes` array instead. Both layouts end up
//! as the same `Course` tree.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

const UNKNOWN_TOPIC: &str = "Unknown Topic";

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    /// API URL the course was fetched from.
    pub source: String,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub classes: Vec<Class>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Class {
    #[serde(rename = "classId", default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default = "default_title", deserialize_with = "lenient_or_default_title")]
    pub title: String,
    #[serde(rename = "teacherName", default = "default_teacher", deserialize_with = "lenient_or_default_teacher")]
    pub teacher: String,
    #[serde(default = "default_status", deserialize_with = "lenient_or_default_status")]
    pub status: String,
    #[serde(rename = "isFree", default, deserialize_with = "lenient_bool")]
    pub is_free: bool,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub class_link: Option<String>,
    #[serde(rename = "mp4Recordings", default, deserialize_with = "lenient_list")]
    pub recordings: Vec<Recording>,
    #[serde(rename = "classPdf", default, deserialize_with = "lenient_list")]
    pub pdfs: Vec<PdfMaterial>,
    #[serde(rename = "classTest", default, deserialize_with = "lenient_list")]
    pub tests: Vec<PracticeTest>,
}

/// One quality variant of a class video.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Recording {
    #[serde(default = "default_quality", deserialize_with = "lenient_or_default_quality")]
    pub quality: String,
    /// Size in MB, as reported by the API.
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PdfMaterial {
    #[serde(default = "default_pdf_name", deserialize_with = "lenient_or_default_pdf_name")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    /// Priority as served (`1`, `2.5`, `"3"`); see [`PdfMaterial::rank`].
    #[serde(default = "default_pdf_priority", deserialize_with = "lenient_or_default_pdf_priority")]
    pub priority: String,
}

impl PdfMaterial {
    /// Numeric sort key; unparsable priorities rank as 1.
    pub fn rank(&self) -> f64 {
        self.priority.trim().parse().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PracticeTest {
    #[serde(default = "default_test_name", deserialize_with = "lenient_or_default_test_name")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
}

/// Flat class entries may carry their own topic.
#[derive(Deserialize)]
struct FlatClass {
    #[serde(rename = "topicName", default, deserialize_with = "lenient_opt_string")]
    topic_name: Option<String>,
    #[serde(rename = "topicId", default, deserialize_with = "lenient_string")]
    topic_id: String,
    #[serde(flatten)]
    class: Class,
}

#[derive(Debug)]
pub enum ParseError {
    /// Neither the nested nor the flat layout produced a single class.
    NoCourseData,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCourseData => write!(f, "no valid course data found in the API response"),
        }
    }
}

impl std::error::Error for ParseError {}

impl Course {
    /// Parse an API response body.
    pub fn from_json(source: &str, value: &Value) -> Result<Self, ParseError> {
        let mut entries: Vec<&Value> = Vec::new();
        if let Some(list) = value.pointer("/data/classes").and_then(Value::as_array) {
            entries.extend(list);
        }
        if let Some(list) = value.get("classes").and_then(Value::as_array) {
            entries.extend(list);
        }

        let mut topics: Vec<Topic> = Vec::new();
        for entry in entries {
            if !entry.is_object() {
                warn!("Skipping non-object entry in classes list");
                continue;
            }
            match entry.get("classes").and_then(Value::as_array) {
                Some(classes) => topics.push(parse_topic(entry, classes)),
                None if is_bare_topic(entry) => topics.push(parse_topic(entry, &[])),
                None => match FlatClass::deserialize(entry) {
                    Ok(flat) => push_flat(&mut topics, flat),
                    Err(e) => warn!("Skipping malformed class entry: {e}"),
                },
            }
        }

        if topics.iter().all(|t| t.classes.is_empty()) {
            return Err(ParseError::NoCourseData);
        }

        Ok(Self {
            source: source.to_string(),
            topics,
        })
    }

    pub fn class_count(&self) -> usize {
        self.topics.iter().map(|t| t.classes.len()).sum()
    }
}

fn parse_topic(entry: &Value, classes: &[Value]) -> Topic {
    let name = entry
        .get("topicName")
        .and_then(scalar_to_string)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_TOPIC.to_string());
    let id = entry.get("topicId").and_then(scalar_to_string).unwrap_or_default();

    let classes = classes
        .iter()
        .filter_map(|c| match Class::deserialize(c) {
            Ok(class) => Some(class),
            Err(e) => {
                warn!("Skipping malformed class in topic {name}: {e}");
                None
            }
        })
        .collect();

    Topic { id, name, classes }
}

const CLASS_FIELDS: [&str; 6] = ["classId", "title", "mp4Recordings", "classPdf", "classTest", "class_link"];

/// A topic header without a usable `classes` array (missing or null).
fn is_bare_topic(entry: &Value) -> bool {
    let has_topic = entry.get("topicName").is_some() || entry.get("topicId").is_some();
    has_topic && !CLASS_FIELDS.iter().any(|f| entry.get(f).is_some())
}

fn push_flat(topics: &mut Vec<Topic>, flat: FlatClass) {
    let name = flat
        .topic_name
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_TOPIC.to_string());
    topics.push(Topic {
        id: flat.topic_id,
        name,
        classes: vec![flat.class],
    });
}

/// Group the course by topic and class.
///
/// Topics sharing a key are merged in first-seen order. Within a topic a
/// class is dropped only when an earlier one has the same id, or, lacking
/// ids, is identical. Link-less items are removed and PDFs are ordered by
/// priority (stable). Applying it twice changes nothing.
pub fn organize(course: Course) -> Course {
    let mut topics: Vec<Topic> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for topic in course.topics {
        let key = topic_key(&topic);
        let slot = match index.get(&key) {
            Some(&i) => i,
            None => {
                index.insert(key, topics.len());
                topics.push(Topic {
                    id: topic.id.clone(),
                    name: topic.name.clone(),
                    classes: Vec::new(),
                });
                topics.len() - 1
            }
        };

        for class in topic.classes {
            let class = tidy_class(class);
            if topics[slot].classes.iter().any(|c| same_class(c, &class)) {
                debug!("Dropping duplicate class '{}' in topic '{}'", class.title, topics[slot].name);
                continue;
            }
            topics[slot].classes.push(class);
        }
    }

    Course {
        source: course.source,
        topics,
    }
}

fn topic_key(topic: &Topic) -> String {
    if topic.id.is_empty() {
        format!("name:{}", topic.name)
    } else {
        format!("id:{}", topic.id)
    }
}

/// Same non-empty id, or (without ids) identical in every field.
fn same_class(a: &Class, b: &Class) -> bool {
    match (a.id.is_empty(), b.id.is_empty()) {
        (false, false) => a.id == b.id,
        (true, true) => a == b,
        _ => false,
    }
}

fn tidy_class(mut class: Class) -> Class {
    class.recordings.retain(|r| !r.url.trim().is_empty());
    class.pdfs.retain(|p| !p.url.trim().is_empty());
    class.tests.retain(|t| !t.url.trim().is_empty());
    class.pdfs.sort_by(|a, b| a.rank().total_cmp(&b.rank()));
    class.class_link = class.class_link.filter(|l| !l.trim().is_empty());
    class
}

// Scalar fields arrive as strings, numbers or null depending on the endpoint.

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(scalar_to_string(&value))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(d)?.unwrap_or_default())
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}

/// Lists whose items don't parse are dropped item by item.
fn lenient_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: for<'a> Deserialize<'a>,
{
    let value = Value::deserialize(d)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

macro_rules! lenient_with_default {
    ($name:ident, $default:ident, $text:expr) => {
        fn $default() -> String {
            $text.to_string()
        }

        fn $name<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
            Ok(lenient_opt_string(d)?
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else($default))
        }
    };
}

lenient_with_default!(lenient_or_default_title, default_title, "No Title");
lenient_with_default!(lenient_or_default_teacher, default_teacher, "Unknown Teacher");
lenient_with_default!(lenient_or_default_status, default_status, "unknown");
lenient_with_default!(lenient_or_default_quality, default_quality, "Unknown");
lenient_with_default!(lenient_or_default_pdf_name, default_pdf_name, "Unnamed PDF");
lenient_with_default!(lenient_or_default_test_name, default_test_name, "Practice Test");
lenient_with_default!(lenient_or_default_pdf_priority, default_pdf_priority, "1");
