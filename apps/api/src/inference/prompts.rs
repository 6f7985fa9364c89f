// Prompt constants for resume feedback.

/// System prompt for every feedback request.
pub const FEEDBACK_SYSTEM: &str = "You review resumes for applicant tracking system compatibility. \
    The resume text is enclosed in <resume> tags. \
    Reply with a single JSON object in the requested format. \
    Do not add prose, markdown or code fences around it.";

/// Response format the model must follow. Mirrors `models::analysis::Feedback`.
pub const AI_RESPONSE_FORMAT: &str = r#"interface Feedback {
  overallScore: number; //max 100
  ATS: {
    score: number; //rate based on ATS suitability
    tips: {
      type: "good" | "improve";
      tip: string; //give 3-4 tips
    }[];
  };
  toneAndStyle: {
    score: number; //max 100
    tips: {
      type: "good" | "improve";
      tip: string; //make it a short "title" for the actual explanation
      explanation: string; //explain in detail here
    }[]; //give 3-4 tips
  };
  content: {
    score: number; //max 100
    tips: {
      type: "good" | "improve";
      tip: string; //make it a short "title" for the actual explanation
      explanation: string; //explain in detail here
    }[]; //give 3-4 tips
  };
  structure: {
    score: number; //max 100
    tips: {
      type: "good" | "improve";
      tip: string; //make it a short "title" for the actual explanation
      explanation: string; //explain in detail here
    }[]; //give 3-4 tips
  };
  skills: {
    score: number; //max 100
    tips: {
      type: "good" | "improve";
      tip: string; //make it a short "title" for the actual explanation
      explanation: string; //explain in detail here
    }[]; //give 3-4 tips
  };
}"#;

/// Feedback prompt. Replace `{job_title}`, `{job_description}` and
/// `{response_format}` before sending.
pub const FEEDBACK_PROMPT_TEMPLATE: &str = "You are an expert in ATS (Applicant Tracking System) and resume analysis.
Please analyze and rate this resume and suggest how to improve it.
The rating can be low if the resume is bad.
Be thorough and detailed. Don't be afraid to point out any mistakes or areas for improvement.
If there is a lot to improve, don't hesitate to give low scores. This is to help the user to improve their resume.
If available, use the job description for the job user is applying to to give more detailed feedback.
If provided, take the job description into consideration.
The job title is: {job_title}
The job description is: {job_description}
Provide the feedback using the following format:
{response_format}
Return the analysis as an JSON object, without any other text and without the backticks.
Do not include any other text or comments.";

/// Builds the feedback prompt with the job title and description embedded verbatim.
pub fn build_feedback_prompt(job_title: &str, job_description: &str) -> String {
    // Description is substituted before the title: the template's title placeholder
    // precedes it, so user text containing a placeholder is never expanded.
    FEEDBACK_PROMPT_TEMPLATE
        .replace("{response_format}", AI_RESPONSE_FORMAT)
        .replacen("{job_description}", job_description, 1)
        .replacen("{job_title}", job_title, 1)
}
