//! `kbchat doctor` command implementation

use crate::context::CliContext;
use crate::output::print_json;
use colored::Colorize;
use kbchat_foundation::GenerationMode;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoctorSeverity {
    Pass,
    Warn,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub id: String,
    pub title: String,
    pub severity: DoctorSeverity,
    pub details: String,
    pub recommendation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerationStatus {
    pub mode: String,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmbedderStatus {
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Serialize)]
pub struct StoreStatus {
    pub path: String,
    pub documents: usize,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub status: String,
    pub generation: GenerationStatus,
    pub embedder: EmbedderStatus,
    pub store: StoreStatus,
    pub checks: Vec<DoctorCheck>,
}

/// Execute the `kbchat doctor` command
pub async fn run(ctx: &CliContext) -> anyhow::Result<()> {
    let report = build_report(ctx).await?;

    if ctx.is_json() {
        print_json(&report)
    } else {
        print_report(&report);
        Ok(())
    }
}

async fn build_report(ctx: &CliContext) -> anyhow::Result<DoctorReport> {
    let orchestrator = ctx.service.orchestrator();
    let generator = orchestrator.generator();
    let embedder = orchestrator.embedder();

    let generation = GenerationStatus {
        mode: generator.mode().as_str().to_string(),
        model: generator.backend().map(|backend| backend.model().to_string()),
    };
    let embedder = EmbedderStatus {
        model: embedder.model().to_string(),
        dimensions: embedder.dimensions(),
    };

    let documents = ctx.service.list_documents().await?;
    let sessions = ctx.service.list_sessions().await?;
    let store = StoreStatus {
        path: ctx.store_path.display().to_string(),
        documents: documents.len(),
        sessions: sessions.len(),
    };

    let mismatched = documents
        .iter()
        .filter(|d| !d.embedding.is_empty() && d.embedding.len() != embedder.dimensions)
        .count();

    let checks = vec![
        check_generation(generator.mode(), ctx.config.llm.model.as_str()),
        check_documents(store.documents),
        check_embeddings(mismatched, &embedder),
    ];

    Ok(DoctorReport {
        status: "healthy".to_string(),
        generation,
        embedder,
        store,
        checks,
    })
}

fn check_generation(mode: GenerationMode, model: &str) -> DoctorCheck {
    match mode {
        GenerationMode::Backend => DoctorCheck {
            id: "chat-backend".to_string(),
            title: "Chat backend".to_string(),
            severity: DoctorSeverity::Pass,
            details: format!("Answers are generated by {model}"),
            recommendation: None,
        },
        GenerationMode::Fallback => DoctorCheck {
            id: "chat-backend".to_string(),
            title: "Chat backend".to_string(),
            severity: DoctorSeverity::Warn,
            details: "No usable chat backend; answers come from the built-in templates".to_string(),
            recommendation: Some(
                "Set OPENAI_API_KEY (and OPENAI_BASE_URL for compatible APIs).".to_string(),
            ),
        },
    }
}

fn check_documents(count: usize) -> DoctorCheck {
    if count == 0 {
        DoctorCheck {
            id: "documents".to_string(),
            title: "Knowledge base".to_string(),
            severity: DoctorSeverity::Warn,
            details: "The knowledge base is empty".to_string(),
            recommendation: Some("Add documents with `kbchat add`.".to_string()),
        }
    } else {
        DoctorCheck {
            id: "documents".to_string(),
            title: "Knowledge base".to_string(),
            severity: DoctorSeverity::Pass,
            details: format!("{count} document(s) stored"),
            recommendation: None,
        }
    }
}

fn check_embeddings(mismatched: usize, embedder: &EmbedderStatus) -> DoctorCheck {
    if mismatched == 0 {
        DoctorCheck {
            id: "embeddings".to_string(),
            title: "Document embeddings".to_string(),
            severity: DoctorSeverity::Pass,
            details: format!("Embedding with {} ({} dimensions)", embedder.model, embedder.dimensions),
            recommendation: None,
        }
    } else {
        DoctorCheck {
            id: "embeddings".to_string(),
            title: "Document embeddings".to_string(),
            severity: DoctorSeverity::Warn,
            details: format!(
                "{mismatched} document(s) were embedded with a different model and never match"
            ),
            recommendation: Some(
                "Remove and add those documents again to re-embed them.".to_string(),
            ),
        }
    }
}

fn print_report(report: &DoctorReport) {
    println!("{} kbchat Doctor Report", "→".green());
    println!("  Mode: {}", report.generation.mode.yellow());
    if let Some(model) = &report.generation.model {
        println!("  Model: {}", model.cyan());
    }
    println!(
        "  Embedder: {} ({} dimensions)",
        report.embedder.model.cyan(),
        report.embedder.dimensions
    );
    println!("  Store: {}", report.store.path.cyan());
    println!(
        "  Documents: {}  Sessions: {}",
        report.store.documents, report.store.sessions
    );
    println!();

    for check in &report.checks {
        let (icon, title) = match check.severity {
            DoctorSeverity::Pass => ("✓".green(), check.title.green()),
            DoctorSeverity::Warn => ("!".yellow(), check.title.yellow()),
        };
        println!("{} {} [{}]", icon, title, check.id);
        println!("    {}", check.details);
        if let Some(recommendation) = &check.recommendation {
            println!("    Recommendation: {}", recommendation);
        }
    }

    let warnings = report
        .checks
        .iter()
        .filter(|c| c.severity == DoctorSeverity::Warn)
        .count();
    println!();
    println!(
        "Summary: {} passed, {} warnings",
        (report.checks.len() - warnings).to_string().green(),
        warnings.to_string().yellow()
    );
}
