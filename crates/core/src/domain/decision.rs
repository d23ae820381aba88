use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    Scheduler,
    Guardrail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    GeneralCleaning,
    PostRenovationCleaning,
    Unknown,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduler => "Scheduler",
            Self::Guardrail => "Guardrail",
        }
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Scheduler" => Ok(Self::Scheduler),
            "Guardrail" => Ok(Self::Guardrail),
            other => Err(format!("unknown agent `{other}`")),
        }
    }
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralCleaning => "general_cleaning",
            Self::PostRenovationCleaning => "post_renovation_cleaning",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "general_cleaning" => Ok(Self::GeneralCleaning),
            "post_renovation_cleaning" => Ok(Self::PostRenovationCleaning),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown service `{other}`")),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing verdict for one user message.
///
/// `Scheduler` only books `general_cleaning`; `Guardrail` answers any service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationDecision {
    agent: AgentKind,
    service: ServiceKind,
}

impl ClassificationDecision {
    pub fn new(agent: AgentKind, service: ServiceKind) -> Result<Self, String> {
        let consistent = match agent {
            AgentKind::Scheduler => service == ServiceKind::GeneralCleaning,
            AgentKind::Guardrail => true,
        };
        if consistent {
            Ok(Self { agent, service })
        } else {
            Err(format!("agent `{agent}` cannot handle service `{service}`"))
        }
    }

    pub fn agent(&self) -> AgentKind {
        self.agent
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentKind, ClassificationDecision, ServiceKind};

    #[test]
    fn valid_pairings_are_accepted() {
        for (agent, service) in [
            (AgentKind::Scheduler, ServiceKind::GeneralCleaning),
            (AgentKind::Guardrail, ServiceKind::PostRenovationCleaning),
            (AgentKind::Guardrail, ServiceKind::Unknown),
            (AgentKind::Guardrail, ServiceKind::GeneralCleaning),
        ] {
            let decision = ClassificationDecision::new(agent, service).expect("valid pairing");
            assert_eq!(decision.agent(), agent);
            assert_eq!(decision.service(), service);
        }
    }

    #[test]
    fn scheduler_only_books_general_cleaning() {
        let error = ClassificationDecision::new(AgentKind::Scheduler, ServiceKind::Unknown)
            .expect_err("scheduler only handles general cleaning");
        assert!(error.contains("Scheduler"));

        assert!(ClassificationDecision::new(
            AgentKind::Scheduler,
            ServiceKind::PostRenovationCleaning
        )
        .is_err());
    }

    #[test]
    fn labels_parse_exactly() {
        assert_eq!("general_cleaning".parse::<ServiceKind>(), Ok(ServiceKind::GeneralCleaning));
        assert_eq!("Guardrail".parse::<AgentKind>(), Ok(AgentKind::Guardrail));
        assert!("guardrail".parse::<AgentKind>().is_err());
        assert!("deep_cleaning".parse::<ServiceKind>().is_err());
    }
}
