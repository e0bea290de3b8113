//! Prompt templates for Spotter.
//!
//! Prompts can be customized by placing a `rag.toml` file in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Answer templates, one per question intent.
///
/// Every template receives `{{context}}` (retrieved records separated by blank
/// lines) and `{{question}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub system: String,
    pub workout_plan: String,
    pub meal_plan: String,
    pub concise_answer: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a knowledgeable fitness and nutrition coach. Base your answers on the exercise and food records you are given. If the records do not cover the question, say so and give general, safe guidance."#.to_string(),

            workout_plan: r#"Use the following exercises to build a workout plan.

Exercises:
{{context}}

Request: {{question}}

Lay the plan out day by day. For each exercise give sets, reps and rest. Only use exercises that suit the equipment and level the request mentions."#.to_string(),

            meal_plan: r#"Use the following food and meal records to build a meal plan.

Records:
{{context}}

Request: {{question}}

Lay the plan out meal by meal, with approximate calories and protein where the records provide them."#.to_string(),

            concise_answer: r#"Answer the question using the records below. Keep the answer short and practical.

Records:
{{context}}

Question: {{question}}"#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Substitution is a single pass over the template, so placeholders that
    /// appear inside substituted values are left as they are. Unknown
    /// placeholders are kept verbatim.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let Ok(placeholder) = Regex::new(r"\{\{(\w+)\}\}") else {
            return template.to_string();
        };
        placeholder
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts_have_placeholders() {
        let prompts = Prompts::default();
        for template in [
            &prompts.rag.workout_plan,
            &prompts.rag.meal_plan,
            &prompts.rag.concise_answer,
        ] {
            assert!(template.contains("{{context}}"));
            assert!(template.contains("{{question}}"));
        }
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} sets left.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 sets left.");
    }

    #[test]
    fn test_render_does_not_expand_inside_values() {
        let template = "Context:\n{{context}}\nQuestion: {{question}} {{unknown}}";
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), "{'note': '{{question}}'}".to_string());
        vars.insert("question".to_string(), "how many sets?".to_string());

        assert_eq!(
            Prompts::render(template, &vars),
            "Context:\n{'note': '{{question}}'}\nQuestion: how many sets? {{unknown}}"
        );
    }

    #[test]
    fn test_custom_variables_are_overridden() {
        let mut custom = HashMap::new();
        custom.insert("goal".to_string(), "strength".to_string());
        custom.insert("question".to_string(), "ignored".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "How many squats?".to_string());
        let out = prompts.render_with_custom("{{goal}}: {{question}}", &vars);
        assert_eq!(out, "strength: How many squats?");
    }

    #[test]
    fn test_load_custom_rag_prompts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rag.toml"),
            "concise_answer = \"Q: {{question}}\\nC: {{context}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.rag.concise_answer, "Q: {{question}}\nC: {{context}}");
        assert!(!prompts.rag.workout_plan.is_empty());
    }
}
