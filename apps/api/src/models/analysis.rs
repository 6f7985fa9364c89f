use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every analysis record key in the key-value store.
pub const RECORD_KEY_PREFIX: &str = "resume:";

/// Derives the store key for an analysis id.
pub fn record_key(id: Uuid) -> String {
    format!("{RECORD_KEY_PREFIX}{id}")
}

/// Path of the results view for an analysis.
pub fn results_path(id: Uuid) -> String {
    format!("/resume/{id}")
}

/// The persisted unit of work for one resume submission.
///
/// Written once with `feedback: None` right after both uploads succeed and
/// once more, under the same key, after the inference response parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub resume_path: String,
    pub image_path: String,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub feedback: Option<Feedback>,
}

impl AnalysisRecord {
    pub fn key(&self) -> String {
        record_key(self.id)
    }
}

/// Structured resume feedback returned by the model.
///
/// Scores are plain JSON numbers; the model may answer with fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: f64,
    #[serde(rename = "ATS")]
    pub ats: AtsSection,
    pub tone_and_style: DetailedSection,
    pub content: DetailedSection,
    pub structure: DetailedSection,
    pub skills: DetailedSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsSection {
    pub score: f64,
    pub tips: Vec<AtsTip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsTip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedSection {
    pub score: f64,
    pub tips: Vec<DetailedTip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedTip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_key_is_prefixed_id() {
        let id = Uuid::new_v4();
        assert_eq!(record_key(id), format!("resume:{id}"));
    }

    #[test]
    fn test_results_path() {
        let id = Uuid::nil();
        assert_eq!(
            results_path(id),
            "/resume/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_partial_record_serializes_camel_case_with_null_feedback() {
        let record = AnalysisRecord {
            id: Uuid::nil(),
            resume_path: "uploads/a/resume.pdf".to_string(),
            image_path: "uploads/b/resume.png".to_string(),
            company_name: "Acme".to_string(),
            job_title: "Engineer".to_string(),
            job_description: "Build things".to_string(),
            feedback: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["resumePath"], "uploads/a/resume.pdf");
        assert_eq!(value["imagePath"], "uploads/b/resume.png");
        assert_eq!(value["companyName"], "Acme");
        assert!(value["feedback"].is_null());
    }

    #[test]
    fn test_feedback_reads_ats_and_tip_types() {
        let value = json!({
            "overallScore": 72,
            "ATS": { "score": 80, "tips": [{ "type": "good", "tip": "Clear headings" }] },
            "toneAndStyle": { "score": 70, "tips": [] },
            "content": { "score": 65, "tips": [
                { "type": "improve", "tip": "Quantify impact", "explanation": "Add numbers." }
            ] },
            "structure": { "score": 75, "tips": [] },
            "skills": { "score": 60, "tips": [{ "type": "improve", "tip": "List tools" }] }
        });
        let feedback: Feedback = serde_json::from_value(value).unwrap();
        assert_eq!(feedback.overall_score, 72.0);
        assert_eq!(feedback.ats.tips[0].kind, TipKind::Good);
        assert_eq!(feedback.content.tips[0].kind, TipKind::Improve);
        assert_eq!(feedback.skills.tips[0].explanation, "");
    }

    #[test]
    fn test_feedback_accepts_fractional_scores() {
        let mut value: serde_json::Value =
            serde_json::from_str(&crate::workflow::fakes::sample_feedback_json()).unwrap();
        value["overallScore"] = json!(72.5);
        value["ATS"]["score"] = json!(81.25);
        value["skills"]["score"] = json!(59.9);

        let feedback: Feedback = serde_json::from_value(value).unwrap();
        assert_eq!(feedback.overall_score, 72.5);
        assert_eq!(feedback.ats.score, 81.25);
        assert_eq!(feedback.skills.score, 59.9);

        let stored = serde_json::to_value(&feedback).unwrap();
        assert_eq!(stored["overallScore"], 72.5);
    }
}
