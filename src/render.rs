//! Plain-text rendering of an organized course.
//!
//! Output only depends on the course and the options, so rendering the same
//! API response twice gives byte-identical files. The extraction time goes
//! into the Telegram caption instead of the file.

use std::fmt::Write;

use crate::course::{Class, Course, PdfMaterial, Topic};
use crate::quality::QualityPreference;

const HEAVY_RULE: usize = 80;
const TOPIC_RULE: usize = 60;

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub preferred: QualityPreference,
    /// Also list the variants that were not selected.
    pub list_alternatives: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub topics: usize,
    pub classes: usize,
    pub videos: usize,
    pub pdfs: usize,
}

impl Stats {
    pub fn of(course: &Course, options: &RenderOptions) -> Self {
        let classes = course.topics.iter().flat_map(|t| &t.classes);
        let mut stats = Self {
            topics: course.topics.len(),
            ..Self::default()
        };
        for class in classes {
            stats.classes += 1;
            stats.pdfs += class.pdfs.len();
            if options.preferred.select(&class.recordings).is_some() {
                stats.videos += 1;
            }
        }
        stats
    }
}

/// Render a course into the `.txt` document sent to the user.
pub fn render(course: &Course, options: &RenderOptions) -> String {
    let stats = Stats::of(course, options);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "API Source: {}", course.source);
    let _ = writeln!(
        out,
        "Topics: {} | Classes: {} | Videos: {} | PDFs: {}",
        stats.topics, stats.classes, stats.videos, stats.pdfs
    );
    let _ = writeln!(out, "{}\n", "=".repeat(HEAVY_RULE));

    for topic in &course.topics {
        render_topic(&mut out, topic, options);
    }

    out
}

fn render_topic(out: &mut String, topic: &Topic, options: &RenderOptions) {
    if topic.id.is_empty() {
        let _ = writeln!(out, "TOPIC: {}", topic.name);
    } else {
        let _ = writeln!(out, "TOPIC: {} (ID: {})", topic.name, topic.id);
    }
    let _ = writeln!(out, "{}\n", "-".repeat(TOPIC_RULE));

    for class in &topic.classes {
        render_class(out, class, options);
    }

    let _ = writeln!(out, "\n{}\n", "=".repeat(HEAVY_RULE));
}

fn render_class(out: &mut String, class: &Class, options: &RenderOptions) {
    let _ = writeln!(out, "CLASS: {}", class.title);
    if !class.id.is_empty() {
        let _ = writeln!(out, "ID: {}", class.id);
    }
    let _ = writeln!(out, "Teacher: {}", class.teacher);
    let _ = writeln!(
        out,
        "Status: {} | Free: {}",
        class.status,
        if class.is_free { "Yes" } else { "No" }
    );
    let _ = writeln!(out, "Priority: {}", class.priority.as_deref().unwrap_or("N/A"));

    out.push_str("\n📹 VIDEO LECTURES:\n");
    if let Some(link) = &class.class_link {
        let _ = writeln!(out, "  • Class Link: {link}");
    }
    match options.preferred.select(&class.recordings) {
        Some(chosen) => {
            let _ = writeln!(
                out,
                "  • {} ({} MB): {}",
                chosen.quality,
                chosen.size.as_deref().unwrap_or("0"),
                chosen.url
            );
            if options.list_alternatives {
                for other in class.recordings.iter().filter(|r| !std::ptr::eq(*r, chosen)) {
                    let _ = writeln!(out, "    also {}: {}", other.quality, other.url);
                }
            }
        }
        None => out.push_str("  • No video recordings available\n"),
    }

    out.push_str("\n📚 PDF & PRACTICE SHEETS:\n");
    if class.pdfs.is_empty() {
        out.push_str("  • No PDFs available\n");
    }
    for pdf in &class.pdfs {
        let _ = writeln!(out, "  • {}", pdf_label(pdf));
        let _ = writeln!(out, "    URL: {}", pdf.url);
    }

    if !class.tests.is_empty() {
        out.push_str("\n📝 PRACTICE TESTS:\n");
        for test in &class.tests {
            let _ = writeln!(out, "  • {}: {}", collapse_whitespace(&test.name), test.url);
        }
    }

    let _ = writeln!(out, "\n{}\n", "=".repeat(TOPIC_RULE));
}

/// `PDF <priority>: <name>`, name whitespace-collapsed.
pub fn pdf_label(pdf: &PdfMaterial) -> String {
    let name = collapse_whitespace(&pdf.name);
    let name = if name.is_empty() { "Unnamed PDF".to_string() } else { name };
    format!("PDF {}: {}", pdf.priority.trim(), name)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{Recording, organize};
    use serde_json::json;

    fn course() -> Course {
        let value = json!({
            "data": {
                "classes": [
                    {
                        "topicName": "PHYSICS",
                        "topicId": "p1",
                        "classes": [
                            {
                                "classId": "k1",
                                "title": "Kinematics",
                                "teacherName": "Mr. Sen",
                                "status": "live",
                                "isFree": false,
                                "class_link": "https://live/k1",
                                "mp4Recordings": [
                                    {"quality": "480p", "size": 120, "url": "https://v/k1-480"},
                                    {"quality": "720p", "size": 300, "url": "https://v/k1-720"}
                                ],
                                "classPdf": [
                                    {"name": "  Class\nNotes ", "url": "https://p/k1", "priority": 1}
                                ],
                                "classTest": [{"name": "Quiz 1", "url": "https://t/k1"}]
                            },
                            {"classId": "k2", "title": "Vectors"}
                        ]
                    },
                    {"topicName": "BIOLOGY", "classes": [{"title": "Cells", "priority": "2"}]}
                ]
            }
        });
        organize(Course::from_json("https://api/course", &value).unwrap())
    }

    #[test]
    fn test_every_topic_and_class_once() {
        let text = render(&course(), &RenderOptions::default());
        for needle in ["TOPIC: PHYSICS (ID: p1)", "TOPIC: BIOLOGY\n", "CLASS: Kinematics", "CLASS: Vectors", "CLASS: Cells"] {
            assert_eq!(text.matches(needle).count(), 1, "expected exactly one {needle:?}");
        }
        assert!(text.starts_with("API Source: https://api/course\n"));
        assert!(text.contains("Topics: 2 | Classes: 3 | Videos: 1 | PDFs: 1"));
    }

    #[test]
    fn test_selects_one_video_per_class() {
        let text = render(&course(), &RenderOptions::default());
        assert!(text.contains("  • 720p (300 MB): https://v/k1-720\n"));
        assert!(!text.contains("https://v/k1-480"));
        assert!(text.contains("  • Class Link: https://live/k1\n"));
        assert_eq!(text.matches("No video recordings available").count(), 2);
    }

    #[test]
    fn test_lists_alternatives_when_asked() {
        let options = RenderOptions {
            list_alternatives: true,
            ..RenderOptions::default()
        };
        let text = render(&course(), &options);
        assert!(text.contains("    also 480p: https://v/k1-480\n"));
        assert_eq!(text.matches("https://v/k1-720").count(), 1);
    }

    #[test]
    fn test_pdf_naming_convention() {
        let text = render(&course(), &RenderOptions::default());
        assert!(text.contains("  • PDF 1: Class Notes\n    URL: https://p/k1\n"));
        assert!(text.contains("  • Quiz 1: https://t/k1\n"));

        let blank = PdfMaterial {
            name: " \t ".to_string(),
            url: "u".to_string(),
            priority: "4".to_string(),
        };
        assert_eq!(pdf_label(&blank), "PDF 4: Unnamed PDF");

        let fractional = PdfMaterial {
            name: "Sheet".to_string(),
            url: "u".to_string(),
            priority: "2.5".to_string(),
        };
        assert_eq!(pdf_label(&fractional), "PDF 2.5: Sheet");
    }

    #[test]
    fn test_class_header() {
        let text = render(&course(), &RenderOptions::default());
        assert!(text.contains("CLASS: Kinematics\nID: k1\nTeacher: Mr. Sen\nStatus: live | Free: No\nPriority: N/A\n"));
        assert!(text.contains("CLASS: Cells\nTeacher: Unknown Teacher\nStatus: unknown | Free: No\nPriority: 2\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let options = RenderOptions::default();
        assert_eq!(render(&course(), &options), render(&course(), &options));
    }

    #[test]
    fn test_missing_size_renders_zero() {
        let mut c = course();
        c.topics[0].classes[1].recordings.push(Recording {
            quality: "360p".to_string(),
            size: None,
            url: "https://v/k2".to_string(),
        });
        let text = render(&c, &RenderOptions::default());
        assert!(text.contains("  • 360p (0 MB): https://v/k2\n"));
    }
}
