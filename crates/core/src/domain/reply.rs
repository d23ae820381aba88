use serde::{Deserialize, Serialize};

/// Assistant text appended whenever the agent path fails.
pub const FALLBACK_REPLY: &str =
    "Sorry, I am unable to process your request at the moment. Please try again later.";

/// Final text produced for one user message; also the `/enquire` response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub response: String,
}

impl Reply {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into() }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_REPLY)
    }

    pub fn into_text(self) -> String {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::{Reply, FALLBACK_REPLY};

    #[test]
    fn reply_serializes_as_response_object() {
        let json = serde_json::to_value(Reply::new("Next available slot on 2025-01-01 00:00."))
            .expect("serialize reply");
        assert_eq!(json, serde_json::json!({"response": "Next available slot on 2025-01-01 00:00."}));
    }

    #[test]
    fn fallback_reply_uses_apology_text() {
        assert_eq!(Reply::fallback().into_text(), FALLBACK_REPLY);
    }
}
