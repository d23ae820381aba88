/// Instruction for the classification call; the user message is sent alongside.
pub const CLASSIFIER_PROMPT: &str = r#"You are the User Proxy Agent of a Cleaning Company.
Return in json of the following format: {"agent": agent, "service": service}
You will return either Guardrail or Scheduler in json.
For agent:
Return Scheduler if the user wants to schedule a general cleaning appointment.
For Scheduler:
Return general_cleaning for service.
Return Guardrail otherwise.
For Guardrail:
Return post_renovation_cleaning if the user message is similar to post renovation cleaning for service.
Return unknown otherwise."#;

/// Grounded generation instruction: the snippet and slot are the only
/// knowledge the model may use.
pub fn scheduler_prompt(context: &str, next_available_slot: &str) -> String {
    format!(
        "You are the Scheduler Agent of a Cleaning Company.\n\
         Use the following knowledge base only when answering-> Price: {context}, \
         Next available slot: {next_available_slot}.\n\
         Return in json of the following format: \
         {{ \"response\": \"Next available slot on ___, and price is ___.\" }}"
    )
}

#[cfg(test)]
mod tests {
    use super::{scheduler_prompt, CLASSIFIER_PROMPT};

    #[test]
    fn classifier_prompt_names_every_label() {
        for label in ["Scheduler", "Guardrail", "general_cleaning", "post_renovation_cleaning", "unknown"] {
            assert!(CLASSIFIER_PROMPT.contains(label), "missing {label}");
        }
    }

    #[test]
    fn scheduler_prompt_embeds_context_and_slot() {
        let prompt = scheduler_prompt("price: $120", "2025-01-01 00:00");
        assert!(prompt.contains("Price: price: $120, Next available slot: 2025-01-01 00:00."));
        assert!(prompt.ends_with(r#"{ "response": "Next available slot on ___, and price is ___." }"#));
    }
}
