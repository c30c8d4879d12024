//! # Report rendering
//!
//! Turns the finalized, sorted author list into one of the supported output
//! formats. Nothing here is visible to the aggregation engine.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::error::Result;
use crate::types::{AuthorStats, CollateBy};

/// Column used to order the report, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Edits,
    Commits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Aligned text columns
    #[default]
    Plaintext,
    Csv,
    /// Standalone LaTeX document
    Tex,
    /// LaTeX tabular only
    TexTable,
    /// `email = name` lines, loadable as an alias file
    Alias,
    Json,
}

/// One report column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Column {
    Name,
    Email,
    NameEmail,
    Commits,
    Added,
    Deleted,
    Edits,
    Percent,
    FirstDate,
    LastDate,
}

impl Column {
    /// Author column matching the collation policy, then the line metrics.
    pub fn defaults(collate_by: CollateBy) -> Vec<Column> {
        let author = match collate_by {
            CollateBy::Name => Column::Name,
            CollateBy::Email => Column::Email,
            CollateBy::NameAndEmail => Column::NameEmail,
        };
        vec![
            author,
            Column::Commits,
            Column::Added,
            Column::Deleted,
            Column::Edits,
            Column::Percent,
        ]
    }

    /// Machine-readable name, used as the CSV header.
    pub fn id(self) -> &'static str {
        match self {
            Column::Name => "name",
            Column::Email => "email",
            Column::NameEmail => "name_email",
            Column::Commits => "commits",
            Column::Added => "added",
            Column::Deleted => "deleted",
            Column::Edits => "edits",
            Column::Percent => "percent",
            Column::FirstDate => "first_date",
            Column::LastDate => "last_date",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Column::Name | Column::Email | Column::NameEmail => "Author",
            Column::Commits => "Commits",
            Column::Added => "Inserted",
            Column::Deleted => "Removed",
            Column::Edits => "Total",
            Column::Percent => "Percent",
            Column::FirstDate => "First commit",
            Column::LastDate => "Last commit",
        }
    }

    pub fn tex_label(self) -> &'static str {
        match self {
            Column::Name | Column::Email | Column::NameEmail => "\\emph{Author}",
            Column::Commits => "\\emph{Commits}",
            Column::Added => "\\emph{Inserted}",
            Column::Deleted => "\\emph{Removed}",
            Column::Edits => "$\\Sigma\\,\\downarrow$",
            Column::Percent => "\\%",
            Column::FirstDate => "\\emph{First commit}",
            Column::LastDate => "\\emph{Last commit}",
        }
    }

    fn cell(self, author: &AuthorStats, total_edits: u64) -> String {
        match self {
            Column::Name => author.name.clone(),
            Column::Email => author.email.clone(),
            Column::NameEmail => format!("{} <{}>", author.name, author.email),
            Column::Commits => author.commits.to_string(),
            Column::Added => author.added.to_string(),
            Column::Deleted => author.deleted.to_string(),
            Column::Edits => author.edits().to_string(),
            Column::Percent => percent(author.edits(), total_edits),
            Column::FirstDate => author.first_date.format("%Y-%m-%d").to_string(),
            Column::LastDate => author.last_date.format("%Y-%m-%d").to_string(),
        }
    }
}

const TEX_PREAMBLE: &str = "\\documentclass[10pt,border=10pt]{standalone}
\\usepackage{booktabs}
\\usepackage{newtxtext}
\\begin{document}
";

fn percent(edits: u64, total_edits: u64) -> String {
    if total_edits == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", 100.0 * edits as f64 / total_edits as f64)
}

fn tex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '\\' => out.push_str("\\textbackslash{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Render `authors` (already sorted and limited) in `format`.
///
/// `total_edits` is the edit total over all authors, limit or not; it is the
/// denominator of the percent column.
pub fn render(
    format: OutputFormat,
    columns: &[Column],
    authors: &[AuthorStats],
    total_edits: u64,
) -> Result<String> {
    let rows: Vec<Vec<String>> = authors
        .iter()
        .map(|author| columns.iter().map(|c| c.cell(author, total_edits)).collect())
        .collect();

    let out = match format {
        OutputFormat::Plaintext => plaintext(columns, &rows),
        OutputFormat::Csv => csv(columns, &rows),
        OutputFormat::Tex => {
            let mut out = String::from(TEX_PREAMBLE);
            out.push_str(&tex_table(columns, &rows));
            out.push_str("\\end{document}\n");
            out
        }
        OutputFormat::TexTable => tex_table(columns, &rows),
        OutputFormat::Alias => authors
            .iter()
            .map(|a| format!("{} = {}\n", a.email, a.name))
            .collect(),
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(authors)?;
            out.push('\n');
            out
        }
    };
    Ok(out)
}

fn plaintext(columns: &[Column], rows: &[Vec<String>]) -> String {
    let header: Vec<String> = columns.iter().map(|c| c.label().to_string()).collect();
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in std::iter::once(&header).chain(rows) {
        let last = row.len().saturating_sub(1);
        for (i, cell) in row.iter().enumerate() {
            if i == last {
                out.push_str(cell);
            } else {
                let _ = write!(out, "{:<width$}", cell, width = widths[i] + 2);
            }
        }
        out.push('\n');
    }
    out
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv(columns: &[Column], rows: &[Vec<String>]) -> String {
    let mut out = columns.iter().map(|c| c.id()).collect::<Vec<_>>().join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(","));
        out.push('\n');
    }
    out
}

fn tex_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let align: String = std::iter::once('l')
        .chain(std::iter::repeat('r').take(columns.len().saturating_sub(1)))
        .collect();

    let mut out = format!("\\begin{{tabular}}{{{align}}}\n\\toprule\n");
    let header: Vec<&str> = columns.iter().map(|c| c.tex_label()).collect();
    let _ = writeln!(out, "{} \\\\", header.join(" & "));
    out.push_str("\\midrule\n");
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| tex_escape(c)).collect();
        let _ = writeln!(out, "{} \\\\", cells.join(" & "));
    }
    out.push_str("\\bottomrule\n\\end{tabular}\n");
    out
}
