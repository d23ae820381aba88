use std::path::Path;

use cleanerio_agent::{Corpus, KnowledgeError, KnowledgeIndex};
use cleanerio_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_credentials(&config));
            checks.extend(check_knowledge(&config));
            checks.push(check_storage(&config.storage.conversations_dir));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_credentials", "knowledge_corpus", "knowledge_index", "conversation_storage"]
            {
                checks.push(skipped(name, "configuration did not load"));
            }
        }
    }

    summarize(checks)
}

pub fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_credentials(config: &AppConfig) -> DoctorCheck {
    match config.llm.require_api_key() {
        Ok(_) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!("api key present for {}", config.llm.base_url),
        },
        Err(error) => {
            DoctorCheck { name: "llm_credentials", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

/// Corpus readability plus whether the saved index still matches it.
pub fn check_knowledge(config: &AppConfig) -> [DoctorCheck; 2] {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let details = format!("failed to initialize async runtime: {error}");
            return [
                DoctorCheck { name: "knowledge_corpus", status: CheckStatus::Fail, details },
                skipped("knowledge_index", "async runtime unavailable"),
            ];
        }
    };

    let corpus_path = &config.knowledge.corpus_path;
    let corpus = match runtime.block_on(Corpus::load(corpus_path)) {
        Ok(corpus) => corpus,
        Err(error) => {
            return [
                DoctorCheck {
                    name: "knowledge_corpus",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
                skipped("knowledge_index", "corpus did not load"),
            ];
        }
    };
    let corpus_check = DoctorCheck {
        name: "knowledge_corpus",
        status: CheckStatus::Pass,
        details: format!("{} documents in `{}`", corpus.documents.len(), corpus_path.display()),
    };

    let index_path = &config.knowledge.index_path;
    let index_check = match runtime.block_on(KnowledgeIndex::load(index_path)) {
        Ok(index) if index.is_current(&corpus, &config.llm.embedding_model) => DoctorCheck {
            name: "knowledge_index",
            status: CheckStatus::Pass,
            details: format!("{} entries built {}", index.len(), index.built_at.to_rfc3339()),
        },
        Ok(_) => DoctorCheck {
            name: "knowledge_index",
            status: CheckStatus::Fail,
            details: "index is stale; run `cleanerio build-index`".to_string(),
        },
        Err(KnowledgeError::Io { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            DoctorCheck {
                name: "knowledge_index",
                status: CheckStatus::Fail,
                details: format!(
                    "no index at `{}`; run `cleanerio build-index`",
                    index_path.display()
                ),
            }
        }
        Err(error) => DoctorCheck {
            name: "knowledge_index",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    };

    [corpus_check, index_check]
}

pub fn check_storage(conversations_dir: &Path) -> DoctorCheck {
    let name = "conversation_storage";
    if conversations_dir.is_dir() {
        return DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("`{}` exists", conversations_dir.display()),
        };
    }
    if conversations_dir.exists() {
        return DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("`{}` is not a directory", conversations_dir.display()),
        };
    }
    DoctorCheck {
        name,
        status: CheckStatus::Pass,
        details: format!("`{}` will be created on first save", conversations_dir.display()),
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{check_storage, summarize, CheckStatus, DoctorCheck};

    #[test]
    fn storage_check_accepts_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let check = check_storage(&dir.path().join("conversations"));
        assert_eq!(check.status, CheckStatus::Pass);
        assert!(check.details.contains("created on first save"));
    }

    #[test]
    fn storage_check_rejects_plain_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conversations");
        std::fs::write(&path, "not a dir").expect("write");

        assert_eq!(check_storage(&path).status, CheckStatus::Fail);
    }

    #[test]
    fn skipped_checks_fail_the_report() {
        let report = summarize(vec![
            DoctorCheck { name: "config_validation", status: CheckStatus::Pass, details: String::new() },
            DoctorCheck { name: "knowledge_index", status: CheckStatus::Skipped, details: String::new() },
        ]);
        assert_eq!(report.overall_status, CheckStatus::Fail);
    }
}
