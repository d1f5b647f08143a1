//! `kbchat add|update|remove|list|show` command implementations

use crate::context::CliContext;
use crate::output::{excerpt, print_json};
use colored::Colorize;
use kbchat_kernel::rag::{Document, DocumentPatch, NewDocument, SourceType};
use serde::Serialize;
use std::path::Path;

/// Document as shown to users; the embedding is summarized by its length
#[derive(Debug, Serialize)]
struct DocumentView<'a> {
    id: &'a str,
    title: &'a str,
    category: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_url: Option<&'a str>,
    dimensions: usize,
    created_at: String,
    updated_at: String,
}

impl<'a> From<&'a Document> for DocumentView<'a> {
    fn from(doc: &'a Document) -> Self {
        Self {
            id: &doc.id,
            title: &doc.title,
            category: &doc.category,
            content: &doc.content,
            source_url: doc.source_url.as_deref(),
            dimensions: doc.embedding.len(),
            created_at: doc.created_at.to_rfc3339(),
            updated_at: doc.updated_at.to_rfc3339(),
        }
    }
}

/// Execute the `kbchat add` command
pub async fn add(
    ctx: &CliContext,
    title: String,
    content: Option<String>,
    file: Option<&Path>,
    category: Option<String>,
    url: Option<String>,
) -> anyhow::Result<()> {
    let (content, source_type) = match (content, file) {
        (Some(content), _) => (content, SourceType::Text),
        (None, Some(path)) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
            (text, SourceType::File)
        }
        (None, None) => anyhow::bail!("Either --content or --file is required"),
    };

    let mut input = NewDocument::new(title, content);
    input.category = category;
    input.source_type = if url.is_some() { SourceType::Url } else { source_type };
    input.source_url = url;
    if let Some(path) = file {
        input
            .metadata
            .insert("file_name".to_string(), path.display().to_string());
    }

    let doc = ctx.service.add_document(input).await?;

    if ctx.is_json() {
        return print_json(&DocumentView::from(&doc));
    }
    println!("{} Added document: {}", "✓".green(), doc.title.cyan());
    println!("  ID:         {}", doc.id);
    println!("  Category:   {}", doc.category);
    println!("  Dimensions: {}", doc.embedding.len());
    Ok(())
}

/// Execute the `kbchat update` command
pub async fn update(
    ctx: &CliContext,
    id: &str,
    title: Option<String>,
    content: Option<String>,
    category: Option<String>,
) -> anyhow::Result<()> {
    let patch = DocumentPatch {
        title,
        content,
        category,
        metadata: None,
    };
    if patch.is_empty() {
        anyhow::bail!("Nothing to update: pass --title, --content or --category");
    }

    let doc = ctx.service.update_document(id, patch).await?;

    if ctx.is_json() {
        return print_json(&DocumentView::from(&doc));
    }
    println!("{} Updated document: {}", "✓".green(), doc.title.cyan());
    Ok(())
}

/// Execute the `kbchat remove` command
pub async fn remove(ctx: &CliContext, id: &str) -> anyhow::Result<()> {
    if !ctx.service.delete_document(id).await? {
        anyhow::bail!("Document '{}' not found", id);
    }

    if ctx.is_json() {
        return print_json(&serde_json::json!({ "deleted": id }));
    }
    println!("{} Removed document {}", "✓".green(), id.cyan());
    Ok(())
}

/// Execute the `kbchat list` command
pub async fn list(ctx: &CliContext) -> anyhow::Result<()> {
    let docs = ctx.service.list_documents().await?;

    if ctx.is_json() {
        let views: Vec<DocumentView<'_>> = docs.iter().map(DocumentView::from).collect();
        return print_json(&views);
    }

    println!("{} Documents in {}", "→".green(), ctx.store_path.display());
    println!();
    if docs.is_empty() {
        println!("  No documents found.");
        return Ok(());
    }

    for doc in &docs {
        println!(
            "  {} {} {}",
            doc.id.dimmed(),
            doc.title.bold(),
            format!("[{}]", doc.category).yellow()
        );
        println!("      {}", excerpt(&doc.content, 70));
    }
    println!();
    println!("  {} document(s)", docs.len());
    Ok(())
}

/// Execute the `kbchat show` command
pub async fn show(ctx: &CliContext, id: &str) -> anyhow::Result<()> {
    let doc = ctx
        .service
        .get_document(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Document '{}' not found", id))?;

    if ctx.is_json() {
        return print_json(&DocumentView::from(&doc));
    }

    println!("{}", doc.title.bold());
    println!("  ID:       {}", doc.id);
    println!("  Category: {}", doc.category.yellow());
    if let Some(url) = &doc.source_url {
        println!("  Source:   {}", url.cyan());
    }
    println!(
        "  Updated:  {}",
        doc.updated_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    println!();
    println!("{}", doc.content);
    Ok(())
}
