//! Builds the instruction sequence sent to the model for one grading action.

use crate::extract::ExtractedContent;
use crate::grading::{GradingRequest, ReferenceMaterial};
use crate::llm::PromptPart;

/// Bounds applied while composing a prompt, sized to the model's context
/// budget. Truncation is a silent prefix cut, never a summary.
#[derive(Debug, Clone)]
pub struct PromptLimits {
    pub text_excerpt_chars: usize,
    pub image_excerpt_chars: usize,
    pub max_reference_images: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            text_excerpt_chars: 4000,
            image_excerpt_chars: 3000,
            max_reference_images: 3,
        }
    }
}

/// Composes the ordered prompt parts for a grading request.
///
/// Text-only requests collapse to a single instruction part. Image-based
/// reference material contributes at most `max_reference_images` pages;
/// image-based homework is appended after the instruction.
pub fn compose(
    reference: &ReferenceMaterial,
    request: &GradingRequest,
    limits: &PromptLimits,
) -> Vec<PromptPart> {
    match reference {
        ReferenceMaterial::Text(reference_text) => match &request.content {
            ExtractedContent::Text(homework_text) => {
                vec![PromptPart::Text(text_homework_prompt(
                    excerpt(reference_text, limits.text_excerpt_chars),
                    &request.student_name,
                    homework_text,
                ))]
            }
            ExtractedContent::Images(pages) => {
                let mut parts = vec![PromptPart::Text(image_homework_prompt(
                    excerpt(reference_text, limits.image_excerpt_chars),
                    &request.student_name,
                ))];
                parts.extend(pages.iter().map(PromptPart::from));
                parts
            }
        },
        ReferenceMaterial::Images(reference_pages) => {
            let mut parts = vec![PromptPart::Text(reference_images_prompt(
                &request.student_name,
            ))];
            parts.extend(
                reference_pages
                    .iter()
                    .take(limits.max_reference_images)
                    .map(PromptPart::from),
            );
            match &request.content {
                ExtractedContent::Text(homework_text) => {
                    parts.push(PromptPart::Text(format!(
                        "תוכן שיעורי הבית: {homework_text}"
                    )));
                }
                ExtractedContent::Images(pages) => {
                    parts.extend(pages.iter().map(PromptPart::from));
                }
            }
            parts
        }
    }
}

/// Char-boundary-safe prefix cut.
fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn text_homework_prompt(reference_excerpt: &str, student_name: &str, homework_text: &str) -> String {
    format!(
        r#"אתה מורה מתמטיקה מומחה הבודק שיעורי בית בעברית.

חומר ייחוס:
{reference_excerpt}

שיעורי בית של התלמיד:
שם התלמיד: {student_name}
תוכן: {homework_text}

אנא נתח את שיעורי הבית האלה וספק:
1. ציון כללי מתוך 100
2. משוב מפורט לכל בעיה/קטע
3. תחומים שבהם התלמיד הצטיין
4. תחומים הזקוקים לשיפור
5. הצעות ספציפיות להבנה טובה יותר

השב בפורמט JSON הבא:
{{
    "score": <מספר בין 0-100>,
    "detailed_feedback": [
        {{"problem": "תיאור הבעיה", "score": <0-10>, "feedback": "משוב מפורט"}}
    ],
    "strengths": ["רשימת חוזקות"],
    "improvements": ["רשימת תחומים לשיפור"],
    "suggestions": ["הצעות לימוד ספציפיות"],
    "overall_comment": "הערה כללית מעודדת"
}}

היה הוגן, בונה ומעודד במשוב שלך. אם יש בעיות בעברית, אתה יכול להשיב גם באנגלית."#
    )
}

fn image_homework_prompt(reference_excerpt: &str, student_name: &str) -> String {
    format!(
        r#"אתה מורה מתמטיקה מומחה הבודק שיעורי בית בעברית מהתמונות המצורפות.

חומר ייחוס:
{reference_excerpt}

תלמיד: {student_name}

אנא נתח את שיעורי הבית המוצגים בתמונות וספק ציון כללי מתוך 100, הערכה
של הפתרונות, משוב על דיוק מתמטי והצעות לשיפור.

השב בפורמט הבא:
ציון: [מספר]/100

הערכה:
[הערכה מפורטת]

משוב:
[משוב ספציפי]

הצעות לשיפור:
[הצעות קונקרטיות]"#
    )
}

fn reference_images_prompt(student_name: &str) -> String {
    format!(
        r#"אתה מורה מתמטיקה מומחה הבודק שיעורי בית בעברית.

יש לך חומר ייחוס של מתמטיקה בכתב יד בעברית (תמונות מצורפות).

שם התלמיד: {student_name}

בהתבסס על חומר הייחוס, אנא נתח את שיעורי הבית וספק ציון כללי מתוך 100,
השוואה לחומר הייחוס, ניתוח הפתרונות, חוזקות, שיפורים נדרשים והמלצות.

השב בפורמט הבא:
ציון: [מספר]/100

השוואה לחומר הייחוס:
[כיצד התשובות משתוות לחומר הלימוד]

חוזקות:
[מה התלמיד עשה טוב]

שיפורים נדרשים:
[מה צריך לשפר]

הערה כללית:
[הערה מעודדת ובונה]"#
    )
}
