//! Renders a grading result as a downloadable plain-text report.

use std::fmt::Write as _;

use crate::grading::{AssignmentKind, GradingResult, ResultSource};

pub fn format_report(result: &GradingResult, assignment: AssignmentKind) -> String {
    let mut report = String::new();
    report.push_str("HOMEWORK GRADE REPORT\n");
    report.push_str("=====================\n");
    let _ = writeln!(report, "Student: {}", result.student_name);
    let _ = writeln!(report, "Assignment: {}", assignment.label());
    let _ = writeln!(report, "Date: {}", result.timestamp);
    match result.score {
        Some(score) => {
            let _ = writeln!(report, "Score: {score}/100");
        }
        None => report.push_str("Score: not available\n"),
    }
    report.push('\n');

    if result.source == ResultSource::Error {
        let _ = writeln!(
            report,
            "Grading failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
        return report;
    }

    if let Some(structured) = &result.structured {
        if !structured.detailed_feedback.is_empty() {
            report.push_str("Detailed feedback:\n");
            for item in &structured.detailed_feedback {
                let _ = writeln!(
                    report,
                    "- {} ({}/10): {}",
                    item.problem, item.score, item.feedback
                );
            }
            report.push('\n');
        }
        push_list(&mut report, "Strengths", &structured.strengths);
        push_list(&mut report, "Areas to improve", &structured.improvements);
        push_list(&mut report, "Suggestions", &structured.suggestions);
        if !structured.overall_comment.is_empty() {
            let _ = writeln!(report, "Teacher's comment: {}", structured.overall_comment);
        }
    } else {
        report.push_str(&result.raw_text);
        report.push('\n');
    }

    report
}

/// Filename offered for the report download, derived from the student name.
pub fn report_filename(student_name: &str) -> String {
    let sanitized = sanitize_filename::sanitize(format!("{student_name}_grade_report.txt"));
    if sanitized == "_grade_report.txt" || sanitized.is_empty() {
        "grade_report.txt".to_string()
    } else {
        sanitized
    }
}

fn push_list(report: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(report, "{heading}:");
    for item in items {
        let _ = writeln!(report, "- {item}");
    }
    report.push('\n');
}

#[cfg(test)]
mod tests {
    use crate::grading::{default_score_patterns, normalize::normalize};

    use super::*;

    #[test]
    fn structured_result_round_trips_score_and_name() {
        let raw = r#"{"score": 92, "strengths": ["good"], "improvements": [], "suggestions": [], "overall_comment": "well done"}"#;
        let result = normalize(raw, "Dana Levi", &default_score_patterns());
        let report = format_report(&result, AssignmentKind::Homework);

        assert!(report.contains("Student: Dana Levi"));
        assert!(report.contains("Score: 92/100"));
        assert!(report.contains("Assignment: Homework"));
        assert!(report.contains("Teacher's comment: well done"));
        assert!(report.contains("- good"));
    }

    #[test]
    fn free_text_result_embeds_raw_feedback() {
        let result = normalize("ציון: 87/100\nעבודה יפה", "Noa", &default_score_patterns());
        let report = format_report(&result, AssignmentKind::Quiz);
        assert!(report.contains("Score: 87/100"));
        assert!(report.contains("עבודה יפה"));
    }

    #[test]
    fn unscored_result_reports_absence() {
        let result = normalize("no grade here", "Noa", &default_score_patterns());
        let report = format_report(&result, AssignmentKind::Practice);
        assert!(report.contains("Score: not available"));
    }

    #[test]
    fn error_result_reports_the_failure() {
        let result = crate::grading::GradingResult::from_error("Noa", "service unavailable");
        let report = format_report(&result, AssignmentKind::Test);
        assert!(report.contains("Grading failed: service unavailable"));
        assert!(report.contains("Score: not available"));
    }

    #[test]
    fn filename_is_sanitized_and_never_empty() {
        assert_eq!(report_filename("Dana"), "Dana_grade_report.txt");
        assert_eq!(report_filename("a/b\\c"), "abc_grade_report.txt");
        assert_eq!(report_filename(""), "grade_report.txt");
    }
}
