// Report generation from scan results

use crate::liveness::{AssetSet, Liveness};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use sweeper_scanner::{ScanResult, WeightedGraph};

const DIVIDER: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Dot,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "dot" | "graphviz" => Some(ReportFormat::Dot),
            _ => None,
        }
    }
}

/// Everything one report is built from.
#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    /// Module root the liveness test was run against.
    pub module: String,
    /// Path whose assets were walked.
    pub scanned_path: String,
    pub scan: ScanResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness: Option<Liveness>,
}

impl ReportData {
    pub fn new(module: &str, scanned_path: &str, scan: ScanResult) -> Self {
        Self {
            module: module.to_string(),
            scanned_path: scanned_path.to_string(),
            scan,
            liveness: None,
        }
    }

    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = Some(liveness);
        self
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(DIVIDER);
    report.push_str("                        SWEEPER DEPENDENCY REPORT\n");
    report.push_str(DIVIDER);
    report.push('\n');

    report.push_str(&format!("Module:       {}\n", data.module));
    report.push_str(&format!("Scanned:      {}\n", data.scanned_path));
    report.push_str(&format!(
        "Generated:    {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!(
        "Assets:       {}/{}{}\n",
        data.scan.scanned,
        data.scan.total,
        if data.scan.cancelled { " (cancelled)" } else { "" }
    ));
    report.push_str(&format!("Dependencies: {}\n", data.scan.graph.len()));
    report.push('\n');

    report.push_str(DIVIDER);
    report.push_str("DEPENDENCIES\n");
    report.push_str(DIVIDER);
    report.push('\n');
    report.push_str(&format_graph(&data.scan.graph));
    report.push('\n');

    report.push_str(DIVIDER);
    report.push_str("UNREACHABLE FROM MODULE\n");
    report.push_str(DIVIDER);
    report.push('\n');
    report.push_str(&format_list(data.scan.unreachable.iter()));
    report.push('\n');

    if !data.scan.lookup_failures.is_empty() {
        report.push_str(DIVIDER);
        report.push_str("LOOKUP FAILURES\n");
        report.push_str(DIVIDER);
        report.push('\n');
        report.push_str(&format_list(data.scan.lookup_failures.iter()));
        report.push('\n');
    }

    if let Some(ref liveness) = data.liveness {
        report.push_str(DIVIDER);
        report.push_str("LIVENESS\n");
        report.push_str(DIVIDER);
        report.push('\n');
        report.push_str(&format!("Used:              {}\n", liveness.used.len()));
        report.push_str(&format!("Unused:            {}\n", liveness.unused.len()));
        report.push_str(&format!(
            "Dead dependencies: {}\n\n",
            liveness.dead_dependencies.len()
        ));
        report.push_str("Removal candidates:\n");
        report.push_str(&format_set(&liveness.candidates()));
        report.push('\n');
    }

    report.push_str(DIVIDER);
    report.push_str("                          End of Report\n");
    report.push_str(DIVIDER);

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Sweeper",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "scan": {
                "module": data.module,
                "path": data.scanned_path,
                "scanned": data.scan.scanned,
                "total": data.scan.total,
                "cancelled": data.scan.cancelled
            },
            "summary": {
                "dependencies": data.scan.graph.len(),
                "edges": data.scan.graph.edge_count(),
                "unreachable": data.scan.unreachable.len(),
                "lookup_failures": data.scan.lookup_failures.len()
            },
            "graph": data.scan.graph,
            "unreachable": data.scan.unreachable,
            "lookup_failures": data.scan.lookup_failures,
            "liveness": data.liveness.as_ref().map(|l| {
                serde_json::json!({
                    "used": l.used,
                    "unused": l.unused,
                    "dead_dependencies": l.dead_dependencies,
                    "candidates": l.candidates()
                })
            })
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// Graphviz rendering of the weighted graph. Edges point from referencer to
/// dependency and carry the reference count.
pub fn generate_dot(graph: &WeightedGraph) -> String {
    let mut g: DiGraph<String, u64> = DiGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

    let mut node = |g: &mut DiGraph<String, u64>, name: &str| -> NodeIndex {
        *nodes
            .entry(name.to_string())
            .or_insert_with(|| g.add_node(name.to_string()))
    };

    for (dependency, referencers) in graph {
        let to = node(&mut g, dependency.as_str());
        for (referencer, count) in referencers {
            let from = node(&mut g, referencer.as_str());
            g.add_edge(from, to, *count);
        }
    }

    format!("{}", Dot::new(&g))
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
        ReportFormat::Dot => Ok(generate_dot(&data.scan.graph)),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn format_graph(graph: &WeightedGraph) -> String {
    if graph.is_empty() {
        return "  (none)\n".to_string();
    }

    let mut out = String::new();
    for (dependency, referencers) in graph {
        out.push_str(&format!(
            "{}  [{} refs]\n",
            dependency,
            graph.total_references(dependency)
        ));
        let last = referencers.len().saturating_sub(1);
        for (i, (referencer, count)) in referencers.iter().enumerate() {
            let prefix = if i == last { "└── " } else { "├── " };
            out.push_str(&format!("  {}{} x{}\n", prefix, referencer, count));
        }
    }
    out
}

fn format_list<'a>(items: impl Iterator<Item = &'a sweeper_scanner::AssetId>) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str(&format!("  {}\n", item));
    }
    if out.is_empty() {
        out.push_str("  (none)\n");
    }
    out
}

fn format_set(set: &AssetSet) -> String {
    format_list(set.iter())
}
