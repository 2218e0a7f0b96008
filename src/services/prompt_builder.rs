use serde::Deserialize;

/// Form payload submitted for a generation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequestForm {
    pub topic: String,
    pub tone: Option<String>,
    pub audience: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// Assembles the natural-language prompt sent to the generation service.
/// Pure string templating; the admission layer has already run by the time
/// this executes.
pub fn build_prompt(form: &GenerationRequestForm) -> String {
    let mut prompt = format!(
        "Write a short piece of marketing copy about {}.",
        form.topic.trim()
    );

    if let Some(tone) = form.tone.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        prompt.push_str(&format!(" Use a {} tone.", tone));
    }

    if let Some(audience) = form.audience.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        prompt.push_str(&format!(" The audience is {}.", audience));
    }

    let points: Vec<&str> = form
        .key_points
        .iter()
        .map(|point| point.trim())
        .filter(|point| !point.is_empty())
        .collect();
    if !points.is_empty() {
        prompt.push_str(&format!(" Make sure to cover: {}.", points.join("; ")));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn a_bare_topic_builds_the_minimal_prompt() {
        let form = GenerationRequestForm {
            topic: "solar panels".to_string(),
            tone: None,
            audience: None,
            key_points: vec![],
        };

        assert_eq!(
            build_prompt(&form),
            "Write a short piece of marketing copy about solar panels."
        );
    }

    #[test]
    fn optional_fields_extend_the_prompt_in_order() {
        let form = GenerationRequestForm {
            topic: "solar panels".to_string(),
            tone: Some("friendly".to_string()),
            audience: Some("homeowners".to_string()),
            key_points: vec!["lower bills".to_string(), " tax credits ".to_string()],
        };

        assert_eq!(
            build_prompt(&form),
            "Write a short piece of marketing copy about solar panels. \
             Use a friendly tone. The audience is homeowners. \
             Make sure to cover: lower bills; tax credits."
        );
    }

    #[test]
    fn blank_optional_fields_are_skipped() {
        let form = GenerationRequestForm {
            topic: "solar panels".to_string(),
            tone: Some("   ".to_string()),
            audience: None,
            key_points: vec!["".to_string()],
        };

        assert_eq!(
            build_prompt(&form),
            "Write a short piece of marketing copy about solar panels."
        );
    }
}
