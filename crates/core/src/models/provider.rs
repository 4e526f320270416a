//! Provider selection from a configured model name.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelProvider {
    Gemini,
    Scripted,
}

impl ModelProvider {
    /// Infer the provider from a model name.
    ///
    /// Returns `None` for names no provider recognises.
    ///
    /// # Examples
    ///
    /// ```
    /// use ce_core::models::ModelProvider;
    ///
    /// assert_eq!(ModelProvider::from_model_name("gemini-2.5-pro"), Some(ModelProvider::Gemini));
    /// assert_eq!(ModelProvider::from_model_name("scripted"), Some(ModelProvider::Scripted));
    /// assert_eq!(ModelProvider::from_model_name("gpt-5"), None);
    /// ```
    pub fn from_model_name(model: &str) -> Option<Self> {
        let model_lower = model.to_lowercase();

        if model_lower.contains("gemini") {
            Some(Self::Gemini)
        } else if model_lower.starts_with("scripted") || model_lower == "demo" {
            Some(Self::Scripted)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::Scripted => "Scripted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_model_name_gemini() {
        assert_eq!(
            ModelProvider::from_model_name("gemini-2.5-flash"),
            Some(ModelProvider::Gemini)
        );
        assert_eq!(
            ModelProvider::from_model_name("models/Gemini-1.5-Pro"),
            Some(ModelProvider::Gemini)
        );
    }

    #[test]
    fn test_from_model_name_scripted() {
        assert_eq!(
            ModelProvider::from_model_name("scripted-demo"),
            Some(ModelProvider::Scripted)
        );
        assert_eq!(ModelProvider::from_model_name("demo"), Some(ModelProvider::Scripted));
    }

    #[test]
    fn test_from_model_name_unknown() {
        assert_eq!(ModelProvider::from_model_name("claude-sonnet-4.5"), None);
        assert_eq!(ModelProvider::from_model_name(""), None);
    }
}
