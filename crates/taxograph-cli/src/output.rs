//! Human and JSON renderings of reports, lookups and stats.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use taxograph_loader::{LoadReport, NameMatch};
use taxograph_pathdb::{GraphReader, NameIndex, NodeKind};
use taxograph_storage::DurableGraph;

/// Anomalies printed in the human summary; `--json` carries the full sample.
const ANOMALIES_SHOWN: usize = 10;

pub fn print_report(report: &LoadReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    println!(
        "{} {} ({}, {} records)",
        "Loaded".green().bold(),
        report.source.bold(),
        report.mode.as_str(),
        report.records_read
    );
    println!(
        "  {} {} nodes created, {} matched, {} edges",
        "→".yellow(),
        report.nodes_created,
        report.nodes_matched,
        report.edges_created
    );
    println!(
        "  {} {} synonyms attached ({} unmatched)",
        "→".yellow(),
        report.synonyms_attached,
        report.synonyms_unmatched
    );
    println!(
        "  {} {} roots linked, {} commits",
        "→".yellow(),
        report.roots_linked,
        report.commits
    );

    let anomalies = report.anomaly_count();
    if anomalies == 0 {
        return Ok(());
    }
    println!(
        "  {} {} anomalies: {} duplicates, {} dangling, {} self-parent, {} broken chains ({} orphans removed), {} ambiguous roots, {} repeated ids",
        "!".red().bold(),
        anomalies,
        report.duplicates_created,
        report.dangling_parents,
        report.self_parents,
        report.broken_chains,
        report.orphans_removed,
        report.ambiguous_root_sentinels,
        report.duplicate_local_ids
    );
    for anomaly in report.anomalies.iter().take(ANOMALIES_SHOWN) {
        println!("    {} {}", "warn:".yellow().bold(), anomaly);
    }
    let shown = report.anomalies.len().min(ANOMALIES_SHOWN);
    if anomalies > shown {
        println!("    … {} more", anomalies - shown);
    }
    Ok(())
}

pub fn print_matches(name: &str, matches: &[NameMatch], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("{} no taxon named {}", "info:".yellow().bold(), name.bold());
        return Ok(());
    }
    for m in matches {
        let accepted = m.accepted_name.as_deref().unwrap_or("?");
        let mut line = format!("{} → node {} ({})", name, m.accepted, accepted);
        if m.is_synonym {
            let source = m.source.as_deref().unwrap_or("unknown source");
            line.push_str(&format!(" [synonym node {} from {}]", m.node, source));
        }
        if m.is_homonym {
            println!("{} {}", line, "[homonym]".yellow());
        } else {
            println!("{line}");
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub taxa: u64,
    pub synonyms: u64,
    pub sources: u64,
    pub edges: usize,
    pub accepted_names: usize,
    pub synonym_names: usize,
    pub sequence: u64,
    pub snapshot_loaded: bool,
    pub wal_frames_replayed: usize,
}

impl GraphStats {
    pub fn collect(db: &DurableGraph) -> Self {
        let graph = db.graph();
        let recovery = db.recovery();
        Self {
            nodes: graph.node_count(),
            taxa: graph.nodes_of_kind(NodeKind::Taxon).len(),
            synonyms: graph.nodes_of_kind(NodeKind::Synonym).len(),
            sources: graph.nodes_of_kind(NodeKind::SourceMetadata).len(),
            edges: graph.edge_total(),
            accepted_names: graph.distinct_names(NameIndex::Accepted),
            synonym_names: graph.distinct_names(NameIndex::Synonym),
            sequence: graph.sequence(),
            snapshot_loaded: recovery.snapshot_loaded,
            wal_frames_replayed: recovery.frames_replayed,
        }
    }
}

pub fn print_stats(stats: &GraphStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("{}", "Taxonomy graph".green().bold());
    println!(
        "  {} {} nodes ({} taxa, {} synonyms, {} sources)",
        "→".yellow(),
        stats.nodes,
        stats.taxa,
        stats.synonyms,
        stats.sources
    );
    println!("  {} {} edges", "→".yellow(), stats.edges);
    println!(
        "  {} {} accepted names, {} synonym names",
        "→".yellow(),
        stats.accepted_names,
        stats.synonym_names
    );
    println!(
        "  {} commit {} (snapshot: {}, wal frames replayed: {})",
        "→".yellow(),
        stats.sequence,
        if stats.snapshot_loaded { "yes" } else { "no" },
        stats.wal_frames_replayed
    );
    Ok(())
}
