use docqa_core::{Answer, QaError};
use serde::Deserialize;
use std::path::Path;

/// User-facing strings, optionally loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub title: String,
    pub progress: String,
    pub success: String,
    pub answer_heading: String,
    pub sources_heading: String,
    pub processed: String,
    pub error_prefix: String,
    pub warning_prefix: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: "Document Q&A Assistant".to_string(),
            progress: "Processing document and generating answer...".to_string(),
            success: "Answer generated successfully!".to_string(),
            answer_heading: "Answer".to_string(),
            sources_heading: "Source pages".to_string(),
            processed: "Document processed successfully".to_string(),
            error_prefix: "An error occurred while processing:".to_string(),
            warning_prefix: "Warning:".to_string(),
        }
    }
}

impl Theme {
    pub fn load(path: &Path) -> Result<Self, QaError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            QaError::ResourceLoad(format!("theme file {}: {error}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            QaError::ResourceLoad(format!("theme file {} is invalid: {error}", path.display()))
        })
    }

    /// Falls back to the built-in theme; the error is returned for display.
    pub fn load_or_default(path: &Path) -> (Self, Option<QaError>) {
        match Self::load(path) {
            Ok(theme) => (theme, None),
            Err(error) => (Self::default(), Some(error)),
        }
    }

    pub fn header(&self) -> String {
        let rule = "=".repeat(self.title.chars().count());
        format!("{}\n{rule}", self.title)
    }

    pub fn render_answer(&self, answer: &Answer) -> String {
        let mut out = format!(
            "{}\n\n{}:\n{}\n",
            self.success, self.answer_heading, answer.text
        );

        let pages = answer.source_pages();
        if !pages.is_empty() {
            let pages = pages
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("\n{}: {pages}\n", self.sources_heading));
        }

        out.push_str(&format!("\n{}\n", self.processed));
        out
    }

    /// Validation problems are shown as-is; everything else gets the prefix.
    pub fn render_error(&self, error: &QaError) -> String {
        if error.is_user_error() {
            error.to_string()
        } else {
            format!("{} {error}", self.error_prefix)
        }
    }

    pub fn render_warning(&self, error: &QaError) -> String {
        format!("{} {error}", self.warning_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docqa_core::{Chunk, RetrievedChunk};

    fn answer() -> Answer {
        let source = |position: usize, page: u32| RetrievedChunk {
            chunk: Chunk {
                position,
                text: String::new(),
            },
            page,
            score: 0.9,
        };
        Answer {
            question: "What is the rent?".to_string(),
            text: "4200 dollars per month.".to_string(),
            sources: vec![source(1, 2), source(2, 3), source(4, 2)],
            document_fingerprint: String::new(),
            usage: None,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn missing_theme_falls_back_with_warning() {
        let (theme, warning) = Theme::load_or_default(Path::new("/definitely/not/here.json"));
        assert_eq!(theme, Theme::default());
        let warning = warning.expect("missing file should be reported");
        assert_eq!(warning.stage(), "resource");
        assert!(theme.render_warning(&warning).starts_with("Warning:"));
    }

    #[test]
    fn partial_theme_keeps_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("theme.json");
        std::fs::write(&path, r#"{"title": "Legal Document Q&A Assistant"}"#)?;

        let theme = Theme::load(&path)?;
        assert_eq!(theme.title, "Legal Document Q&A Assistant");
        assert_eq!(theme.answer_heading, Theme::default().answer_heading);
        Ok(())
    }

    #[test]
    fn invalid_theme_is_a_resource_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("theme.json");
        std::fs::write(&path, "{ not json")?;

        assert!(matches!(Theme::load(&path), Err(QaError::ResourceLoad(_))));
        Ok(())
    }

    #[test]
    fn answer_lists_distinct_source_pages() {
        let rendered = Theme::default().render_answer(&answer());
        assert!(rendered.contains("4200 dollars per month."));
        assert!(rendered.contains("Source pages: 2, 3"));
    }

    #[test]
    fn validation_errors_are_shown_inline() {
        let theme = Theme::default();
        let validation = QaError::Validation("Please upload a PDF document first.".to_string());
        assert_eq!(
            theme.render_error(&validation),
            "Please upload a PDF document first."
        );

        let failure = QaError::Generation("timeout".to_string());
        assert_eq!(
            theme.render_error(&failure),
            "An error occurred while processing: generation error: timeout"
        );
    }
}
