//! Prompt builder.
//!
//! Maps an analysis mode and a page snapshot to the model input text. Pure:
//! no I/O, never fails. Missing snapshot data interpolates as empty text.

use crate::models::analysis::{AnalysisMode, SpecializedKind};
use crate::models::snapshot::PageSnapshot;

/// Default language the model is asked to answer in.
pub const DEFAULT_LANGUAGE: &str = "Swedish";

/// System prompt sent with every generation request.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an expert in web design, SEO, UX and digital communication.";

const JSON_ONLY: &str = "Respond ONLY with a JSON object in exactly the format below. \
Do not include any explanation, commentary or markers outside the JSON object.";

const ASPECT_TOPICS: [Aspect; 3] = [Aspect::Seo, Aspect::Ux, Aspect::Content];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aspect {
    Seo,
    Ux,
    Content,
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

fn join(items: &[String]) -> String {
    items.join(", ")
}

fn or_none(items: &[String], none: &str) -> String {
    if items.is_empty() {
        none.to_string()
    } else {
        join(items)
    }
}

impl PromptBuilder {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Primary prompts for a mode: three for the standard and competitor
    /// families, one for a specialized kind.
    pub fn primary(&self, mode: AnalysisMode, snapshot: &PageSnapshot, url: &str) -> Vec<String> {
        match mode {
            AnalysisMode::Standard => ASPECT_TOPICS
                .iter()
                .map(|aspect| self.aspect(*aspect, false, snapshot, url))
                .collect(),
            AnalysisMode::Competitor => ASPECT_TOPICS
                .iter()
                .map(|aspect| self.aspect(*aspect, true, snapshot, url))
                .collect(),
            AnalysisMode::Specialized(kind) => vec![self.specialized(kind, snapshot, url)],
        }
    }

    fn aspect(
        &self,
        aspect: Aspect,
        strengths_only: bool,
        snapshot: &PageSnapshot,
        url: &str,
    ) -> String {
        let (role, focus, shape_subject) = match aspect {
            Aspect::Seo => (
                "an experienced SEO specialist",
                format!(
                    "- Title: {}\n- Meta description: {}\n- H1 headings: {}\n- H2 headings: {}\n\n\
                     Analyze:\n1. Use of relevant keywords.\n\
                     2. Quality and effectiveness of the title and meta description.\n\
                     3. {}",
                    snapshot.title,
                    snapshot.meta_description,
                    join(&snapshot.headings.h1),
                    join(&snapshot.headings.h2),
                    if strengths_only {
                        "Technique and structure that give them an edge in search results."
                    } else {
                        "Any technical SEO problems."
                    }
                ),
                "SEO",
            ),
            Aspect::Ux => (
                "a senior UX designer",
                format!(
                    "- Navigation: {}\n- Buttons: {}\n- Colors: {}\n- Fonts: {}\n\n\
                     Focus on:\n- Layout, color scheme and typography.\n\
                     - Navigation and ease of use.\n- User flow and conversion.",
                    join(&snapshot.navigation),
                    join(&snapshot.buttons),
                    join(&snapshot.design.colors),
                    join(&snapshot.design.fonts),
                ),
                "UX",
            ),
            Aspect::Content => (
                "an experienced content strategist and copywriter",
                format!(
                    "- Title: {}\n- H1 headings: {}\n- H2 headings: {}\n\n\
                     Focus on:\n- Clarity and relevance of the content.\n\
                     - Structure and readability.\n\
                     - How well the content communicates the purpose of the site.",
                    snapshot.title,
                    join(&snapshot.headings.h1),
                    join(&snapshot.headings.h2),
                ),
                "content",
            ),
        };

        let (intro, task, observation_label, recommendation_hint) = if strengths_only {
            (
                format!("You are {role} focused on competitor analysis."),
                format!(
                    "Identify ONLY their {shape_subject} strengths. Do not mention weaknesses \
                     or suggest improvements. Give an overall assessment, list clear strengths \
                     and explain what makes their strategy successful."
                ),
                "Strength",
                format!("What makes their {shape_subject} strategy successful."),
            )
        } else {
            (
                format!("You are {role}."),
                "Give an overall assessment, list clear observations and give concrete \
                 recommendations."
                    .to_string(),
                "Observation",
                format!("Your concrete {shape_subject} recommendations."),
            )
        };

        format!(
            "{intro} Analyze the website {url} based on the data below.\n\n{focus}\n\n{task}\n\n\
             {JSON_ONLY}\n\
             {{\n  \"summary\": \"Overall assessment of {shape_subject}.\",\n  \
             \"observations\": [\"{observation_label} 1\", \"{observation_label} 2\"],\n  \
             \"recommendations\": \"{recommendation_hint}\"\n}}\n\n\
             Respond in {language}.",
            language = self.language,
        )
    }

    fn specialized(&self, kind: SpecializedKind, snapshot: &PageSnapshot, url: &str) -> String {
        let (intro, data, analyze, shape) = match kind {
            SpecializedKind::LandingPage => (
                format!(
                    "You are an expert in conversion optimization and landing pages. \
                     Analyze the page {url}."
                ),
                format!(
                    "- Title: {}\n- Meta description: {}\n- H1 headings: {}\n\
                     - H2 headings: {}\n- Buttons: {}",
                    snapshot.title,
                    snapshot.meta_description,
                    join(&snapshot.headings.h1),
                    join(&snapshot.headings.h2),
                    join(&snapshot.buttons),
                ),
                "1. Clarity of the message and the call to action\n\
                 2. How well the page can convert visitors\n\
                 3. Structure and arrangement of information\n\
                 4. Persuasiveness and sales arguments",
                "{\n  \"summary\": \"Overall assessment of the landing page\",\n  \
                 \"clarity\": \"Clarity of the message\",\n  \
                 \"conversion_potential\": \"Conversion potential\",\n  \
                 \"structure\": \"Page structure\",\n  \
                 \"persuasiveness\": \"Persuasiveness\",\n  \
                 \"recommendations\": \"Concrete recommendations\"\n}",
            ),
            SpecializedKind::ProductPage => (
                format!(
                    "You are an expert in e-commerce and copywriting. Analyze the product page {url}."
                ),
                format!(
                    "- Title: {}\n- Meta description: {}\n- H1 headings: {}\n- H2 headings: {}\n\
                     - Images: {} found\n- Prices: {}",
                    snapshot.title,
                    snapshot.meta_description,
                    join(&snapshot.headings.h1),
                    join(&snapshot.headings.h2),
                    snapshot.images.len(),
                    or_none(&snapshot.prices, "No price found"),
                ),
                "1. How clear and compelling the product description is\n\
                 2. Whether the target audience is reached effectively\n\
                 3. How well the content is optimized for search\n\
                 4. What could be improved to increase conversions",
                "{\n  \"summary\": \"Overall assessment of the product page\",\n  \
                 \"targeting\": \"How well the copy matches the target audience\",\n  \
                 \"seo\": \"SEO assessment of the product page\",\n  \
                 \"persuasiveness\": \"Persuasiveness of the product description\",\n  \
                 \"recommendations\": \"Concrete improvements\"\n}",
            ),
            SpecializedKind::TrustCheck => (
                format!(
                    "You are an expert in digital trust and security. Analyze the website {url} \
                     from a trustworthiness perspective."
                ),
                format!(
                    "- Title: {}\n- Meta description: {}\n- SSL: {}\n\
                     - Certifications: {}\n- Payment methods: {}",
                    snapshot.title,
                    snapshot.meta_description,
                    if snapshot.security.ssl { "Yes" } else { "No" },
                    or_none(&snapshot.security.certifications, "None found"),
                    or_none(&snapshot.security.payment_methods, "None found"),
                ),
                "1. Professionalism and trustworthy design\n\
                 2. Security indicators\n\
                 3. Transparency about the company\n\
                 4. Risk indicators, or the absence of them",
                "{\n  \"summary\": \"Overall assessment of trustworthiness\",\n  \
                 \"professionalism\": \"Design and professional impression\",\n  \
                 \"security_indicators\": \"Security indicators\",\n  \
                 \"transparency\": \"Transparency about the business\",\n  \
                 \"risk_assessment\": \"Risk factors\",\n  \
                 \"recommendations\": \"Improvements that would increase trust\"\n}",
            ),
            SpecializedKind::BrandAnalysis => (
                format!(
                    "You are a brand expert with a deep understanding of digital positioning. \
                     Analyze the website {url} from a brand perspective."
                ),
                format!(
                    "- Title: {}\n- Meta description: {}\n- Colors: {}\n\
                     - Fonts: {}\n- H1 headings: {}",
                    snapshot.title,
                    snapshot.meta_description,
                    join(&snapshot.design.colors),
                    join(&snapshot.design.fonts),
                    join(&snapshot.headings.h1),
                ),
                "1. Brand positioning and promise\n\
                 2. Tone of voice and communication style\n\
                 3. Visual identity and consistency\n\
                 4. How the target audience is addressed",
                "{\n  \"summary\": \"Overall brand analysis\",\n  \
                 \"positioning\": \"Brand positioning\",\n  \
                 \"tone_of_voice\": \"Tone and communication style\",\n  \
                 \"visual_identity\": \"Visual identity\",\n  \
                 \"audience_appeal\": \"How well the brand appeals to its audience\",\n  \
                 \"recommendations\": \"Improvements for clearer brand communication\"\n}",
            ),
            SpecializedKind::MobileExperience => (
                format!(
                    "You are an expert in mobile usability and responsive design. Analyze the \
                     website {url} as if viewed on a mobile device."
                ),
                format!(
                    "- Title: {}\n- Meta description: {}\n- Navigation: {}",
                    snapshot.title,
                    snapshot.meta_description,
                    join(&snapshot.navigation),
                ),
                "1. Mobile adaptation and responsive design\n\
                 2. Ease of navigation on a small screen\n\
                 3. Load times and performance on mobile devices\n\
                 4. Touch friendliness and usability",
                "{\n  \"summary\": \"Overall assessment of the mobile experience\",\n  \
                 \"responsiveness\": \"Responsive design\",\n  \
                 \"navigation\": \"Navigation on mobile\",\n  \
                 \"performance\": \"Performance and load times on mobile\",\n  \
                 \"usability\": \"Touch friendliness and mobile usability\",\n  \
                 \"recommendations\": \"Improvements for the mobile experience\"\n}",
            ),
        };

        format!(
            "{intro}\n\n{data}\n\nAnalyze:\n{analyze}\n\n\
             {JSON_ONLY}\nRespond in {language}.\n\n{shape}",
            language = self.language,
        )
    }

    /// Design scoring prompt: three scores in `[0, 1]` plus a comment.
    pub fn design(&self, snapshot: &PageSnapshot, url: &str) -> String {
        format!(
            "You are an extremely critical, professional UX and design expert with very high \
             standards. Carefully analyze the page {url} based on these design elements:\n\n\
             Page title:\n{}\n\nColors:\n{}\n\nTypography:\n{}\n\nMain headings (H1):\n{}\n\n\
             Subheadings (H2):\n{}\n\nNavigation:\n{}\n\nButton labels:\n{}\n\n\
             Give a strict score on a scale from 0.0 (very poor) to 1.0 (perfect) for:\n\
             1. Usability\n2. Aesthetics\n3. Performance\n\n\
             {JSON_ONLY}\n\
             {{\n  \"usability\": 0.xx,\n  \"aesthetics\": 0.xx,\n  \"performance\": 0.xx,\n  \
             \"comment\": \"Short, critical and professional justification\"\n}}\n\n\
             Write the comment in {language}.",
            snapshot.title,
            join(&snapshot.design.colors),
            join(&snapshot.design.fonts),
            join(&snapshot.headings.h1),
            join(&snapshot.headings.h2),
            join(&snapshot.navigation),
            join(&snapshot.buttons),
            language = self.language,
        )
    }

    /// Cross-cutting summary prompt fed with the raw primary outputs.
    ///
    /// Returns `None` for modes without a summary stage.
    pub fn summary(&self, mode: AnalysisMode, raw_outputs: &[String]) -> Option<String> {
        let raw = |i: usize| raw_outputs.get(i).map(String::as_str).unwrap_or_default();
        match mode {
            AnalysisMode::Standard => Some(format!(
                "You are an expert in web analysis. Based on the following analyses, give a \
                 summary and concrete recommendations.\n\n\
                 SEO analysis:\n{}\n\nUX analysis:\n{}\n\nContent analysis:\n{}\n\n\
                 {JSON_ONLY}\n\
                 {{\n  \"seo_recommendations\": \"Improvements related to SEO.\",\n  \
                 \"ux_recommendations\": \"Improvements related to user experience.\",\n  \
                 \"content_recommendations\": \"Improvements related to content.\",\n  \
                 \"overall_summary\": \"Summary of the largest areas for improvement.\"\n}}\n\n\
                 Respond in {language}.",
                raw(0),
                raw(1),
                raw(2),
                language = self.language,
            )),
            AnalysisMode::Competitor => Some(format!(
                "You are an expert in competitor analysis for e-commerce and digital services. \
                 Here are three professional analyses of a competitor's website:\n\n\
                 SEO analysis:\n{}\n\nUX analysis:\n{}\n\nContent analysis:\n{}\n\n\
                 Summarize the most important strengths and success factors, split into SEO \
                 strengths, UX strengths and content strengths, and give an overall summary of \
                 their main competitive advantages. Report strengths only.\n\n\
                 {JSON_ONLY}\n\
                 {{\n  \"seo_strengths\": \"text\",\n  \"ux_strengths\": \"text\",\n  \
                 \"content_strengths\": \"text\",\n  \"overall_strengths\": \"text\"\n}}\n\n\
                 Respond in {language}.",
                raw(0),
                raw(1),
                raw(2),
                language = self.language,
            )),
            AnalysisMode::Specialized(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::snapshot::Headings;

    fn snapshot() -> PageSnapshot {
        PageSnapshot {
            title: "Acme Widgets".to_string(),
            meta_description: "The best widgets".to_string(),
            headings: Headings {
                h1: vec!["Widgets".to_string()],
                h2: vec!["Pricing".to_string(), "Support".to_string()],
            },
            prices: vec!["199 kr".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_standard_family_has_three_prompts() {
        let prompts = PromptBuilder::default().primary(
            AnalysisMode::Standard,
            &snapshot(),
            "https://acme.test",
        );
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("SEO specialist"));
        assert!(prompts[0].contains("Acme Widgets"));
        assert!(prompts[1].contains("UX designer"));
        assert!(prompts[2].contains("content strategist"));
        assert!(prompts.iter().all(|p| p.contains("Respond in Swedish.")));
        assert!(prompts.iter().all(|p| p.contains("\"observations\"")));
    }

    #[test]
    fn test_competitor_family_reports_strengths_only() {
        let prompts = PromptBuilder::default().primary(
            AnalysisMode::Competitor,
            &snapshot(),
            "https://acme.test",
        );
        assert_eq!(prompts.len(), 3);
        assert!(prompts.iter().all(|p| p.contains("ONLY their")));
        assert!(prompts.iter().all(|p| p.contains("Do not mention weaknesses")));
    }

    #[test]
    fn test_specialized_family_has_one_prompt_with_its_fields() {
        let builder = PromptBuilder::default();
        let cases = [
            (SpecializedKind::LandingPage, "conversion_potential"),
            (SpecializedKind::ProductPage, "targeting"),
            (SpecializedKind::TrustCheck, "risk_assessment"),
            (SpecializedKind::BrandAnalysis, "tone_of_voice"),
            (SpecializedKind::MobileExperience, "responsiveness"),
        ];
        for (kind, field) in cases {
            let prompts =
                builder.primary(AnalysisMode::Specialized(kind), &snapshot(), "https://acme.test");
            assert_eq!(prompts.len(), 1, "{kind}");
            assert!(prompts[0].contains(field), "{kind} missing {field}");
        }
    }

    #[test]
    fn test_product_page_mentions_prices() {
        let prompt = &PromptBuilder::default().primary(
            AnalysisMode::Specialized(SpecializedKind::ProductPage),
            &snapshot(),
            "https://acme.test",
        )[0];
        assert!(prompt.contains("199 kr"));
    }

    #[test]
    fn test_empty_snapshot_never_fails() {
        let empty = PageSnapshot::default();
        let builder = PromptBuilder::new("English");
        for kind in SpecializedKind::ALL {
            let prompts =
                builder.primary(AnalysisMode::Specialized(kind), &empty, "https://x.test");
            assert!(!prompts[0].is_empty());
        }
        assert!(builder.design(&empty, "https://x.test").contains("\"usability\""));
    }

    #[test]
    fn test_summary_prompt_embeds_raw_outputs() {
        let builder = PromptBuilder::default();
        let raw = vec!["SEO-RAW".to_string(), "UX-RAW".to_string(), "CONTENT-RAW".to_string()];

        let standard = builder.summary(AnalysisMode::Standard, &raw).unwrap();
        assert!(standard.contains("SEO-RAW") && standard.contains("CONTENT-RAW"));
        assert!(standard.contains("overall_summary"));

        let competitor = builder.summary(AnalysisMode::Competitor, &raw).unwrap();
        assert!(competitor.contains("overall_strengths"));

        assert!(builder
            .summary(AnalysisMode::Specialized(SpecializedKind::TrustCheck), &raw)
            .is_none());
    }

    #[test]
    fn test_summary_tolerates_short_input() {
        let prompt = PromptBuilder::default().summary(AnalysisMode::Standard, &[]).unwrap();
        assert!(prompt.contains("SEO analysis:"));
    }
}
