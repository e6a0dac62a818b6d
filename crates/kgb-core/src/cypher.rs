//! Cypher script analysis
//!
//! Only enough of Cypher is understood here to split a script into
//! statements and to count what its MERGE clauses write. Syntax checking is
//! left to the database.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const STRING_PATTERN: &str = r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#;
const CLAUSE_PATTERN: &str = r"(?i)\b(MERGE|MATCH|CREATE|WITH|RETURN|SET|UNWIND|DELETE|DETACH|REMOVE|ON|WHERE|FOREACH|CALL)\b";
const NODE_PATTERN: &str =
    r"\(\s*(?:[A-Za-z_][A-Za-z0-9_]*)?\s*((?::\s*(?:`[^`]+`|[A-Za-z_][A-Za-z0-9_]*)\s*)+)";
const REL_PATTERN: &str =
    r"\[\s*(?:[A-Za-z_][A-Za-z0-9_]*)?\s*:\s*(`[^`]+`|[A-Za-z_][A-Za-z0-9_]*)";

/// Split a script into statements on `;` outside strings and comments.
///
/// Comments are dropped and empty statements are skipped.
pub fn split_statements(script: &str) -> Vec<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Quoted(char),
        LineComment,
        BlockComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Code;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '\'' | '"' | '`' => {
                    state = State::Quoted(c);
                    current.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                ';' => {
                    push_statement(&mut statements, &mut current);
                }
                _ => current.push(c),
            },
            State::Quoted(quote) => {
                current.push(c);
                if c == '\\' && quote != '`' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == quote {
                    state = State::Code;
                }
            }
            State::LineComment => {
                if c == '\n' {
                    current.push('\n');
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    current.push(' ');
                    state = State::Code;
                }
            }
        }
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}

/// What a script writes, as far as its MERGE clauses tell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSummary {
    /// Number of statements
    pub statements: usize,
    /// Number of MERGE clauses
    pub merge_clauses: usize,
    /// Labelled node patterns per label
    pub node_labels: BTreeMap<String, usize>,
    /// Relationship patterns per type
    pub relationship_types: BTreeMap<String, usize>,
}

impl ScriptSummary {
    /// Summarize a script
    pub fn analyze(script: &str) -> Self {
        let mut summary = Self::default();

        let (Some(strings), Some(clauses), Some(nodes), Some(rels)) = (
            compile(STRING_PATTERN),
            compile(CLAUSE_PATTERN),
            compile(NODE_PATTERN),
            compile(REL_PATTERN),
        ) else {
            return summary;
        };

        let statements = split_statements(script);
        summary.statements = statements.len();

        for statement in &statements {
            let bare = strings.replace_all(statement, "\"\"");
            let keywords: Vec<regex::Captures<'_>> = clauses
                .captures_iter(&bare)
                .filter(|c| c.get(0).is_some_and(|m| is_clause_keyword(&bare, m.start())))
                .collect();

            for (i, keyword) in keywords.iter().enumerate() {
                if !keyword[1].eq_ignore_ascii_case("MERGE") {
                    continue;
                }
                summary.merge_clauses += 1;

                let start = keyword.get(0).map_or(0, |m| m.end());
                let end = keywords
                    .get(i + 1)
                    .and_then(|next| next.get(0))
                    .map_or(bare.len(), |m| m.start());
                let clause = &bare[start..end];

                for node in nodes.captures_iter(clause) {
                    for label in node[1].split(':').map(clean_name).filter(|l| !l.is_empty()) {
                        *summary.node_labels.entry(label).or_insert(0) += 1;
                    }
                }
                for rel in rels.captures_iter(clause) {
                    *summary
                        .relationship_types
                        .entry(clean_name(&rel[1]))
                        .or_insert(0) += 1;
                }
            }
        }

        summary
    }

    /// Total labelled node patterns
    pub fn node_count(&self) -> usize {
        self.node_labels.values().sum()
    }

    /// Total relationship patterns
    pub fn relationship_count(&self) -> usize {
        self.relationship_types.values().sum()
    }
}

/// A keyword only starts a clause outside patterns and maps, and never when
/// it names a label, relationship type or property
fn is_clause_keyword(statement: &str, start: usize) -> bool {
    let before = &statement[..start];
    let depth = before.chars().fold(0i32, |depth, c| match c {
        '(' | '[' | '{' => depth + 1,
        ')' | ']' | '}' => depth - 1,
        _ => depth,
    });
    depth <= 0 && !matches!(before.trim_end().chars().last(), Some(':' | '`' | '.'))
}

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

fn clean_name(raw: &str) -> String {
    raw.trim().trim_matches('`').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_on_semicolons() {
        let script = "MERGE (a:Person {name: 'Alice'});\nMERGE (p:Painting {title: 'Mona Lisa'});\n";
        assert_eq!(
            split_statements(script),
            vec![
                "MERGE (a:Person {name: 'Alice'})".to_string(),
                "MERGE (p:Painting {title: 'Mona Lisa'})".to_string(),
            ]
        );
    }

    #[test]
    fn test_semicolon_inside_string_is_kept() {
        let script = r#"MERGE (a:Note {text: "one; two"}); MERGE (b:Note {text: 'it\'s; fine'})"#;
        let statements = split_statements(script);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], r#"MERGE (a:Note {text: "one; two"})"#);
        assert_eq!(statements[1], r#"MERGE (b:Note {text: 'it\'s; fine'})"#);
    }

    #[test]
    fn test_comments_are_dropped() {
        let script = "// people\nMERGE (a:Person);\n/* art; works */ MERGE (p:Painting);\n// trailing;";
        assert_eq!(
            split_statements(script),
            vec!["MERGE (a:Person)".to_string(), "MERGE (p:Painting)".to_string()]
        );
    }

    #[test]
    fn test_script_without_semicolons_is_one_statement() {
        let script = "MERGE (a:Person {name: 'Alice'})\nMERGE (p:Painting {title: 'Mona Lisa'})\nMERGE (a)-[:painted]->(p)";
        assert_eq!(split_statements(script).len(), 1);
    }

    #[test]
    fn test_summary_counts_nodes_and_relationships() {
        let script = r#"MERGE (a:Person {name: "Alice"})
MERGE (p:Painting {title: "Mona Lisa"})
MERGE (a)-[:painted]->(p)"#;
        let summary = ScriptSummary::analyze(script);

        assert_eq!(summary.statements, 1);
        assert_eq!(summary.merge_clauses, 3);
        assert_eq!(summary.node_labels.get("Person"), Some(&1));
        assert_eq!(summary.node_labels.get("Painting"), Some(&1));
        assert_eq!(summary.relationship_types.get("painted"), Some(&1));
        assert_eq!(summary.node_count(), 2);
        assert_eq!(summary.relationship_count(), 1);
    }

    #[test]
    fn test_summary_ignores_labels_in_strings_and_match() {
        let script = r#"MATCH (x:Ignored) MERGE (a:Person {bio: "(b:Fake) -[:FAKE]->"}) ON CREATE SET a.seen = true"#;
        let summary = ScriptSummary::analyze(script);

        assert_eq!(summary.merge_clauses, 1);
        assert_eq!(summary.node_labels.len(), 1);
        assert_eq!(summary.node_labels.get("Person"), Some(&1));
        assert!(summary.relationship_types.is_empty());
    }

    #[test]
    fn test_summary_handles_inline_patterns_and_backticks() {
        let script = "MERGE (a:Person:`Old Master`)-[r:`painted by`]->(p:Painting)";
        let summary = ScriptSummary::analyze(script);

        assert_eq!(summary.node_labels.get("Person"), Some(&1));
        assert_eq!(summary.node_labels.get("Old Master"), Some(&1));
        assert_eq!(summary.node_labels.get("Painting"), Some(&1));
        assert_eq!(summary.relationship_types.get("painted by"), Some(&1));
    }

    #[test]
    fn test_keywords_as_labels_and_keys_do_not_end_merge() {
        let summary = ScriptSummary::analyze(
            "MERGE (m:Match {id: 1}) MERGE (p:Player {name: \"A\", on: true})-[:played_in]->(m)",
        );
        assert_eq!(summary.merge_clauses, 2);
        assert_eq!(
            summary.node_labels,
            BTreeMap::from([("Match".to_string(), 1), ("Player".to_string(), 1)])
        );
        assert_eq!(
            summary.relationship_types,
            BTreeMap::from([("played_in".to_string(), 1)])
        );
    }

    #[test]
    fn test_top_level_on_create_still_ends_merge() {
        let summary = ScriptSummary::analyze(
            "MERGE (a:Person {where: 'Paris'}) ON CREATE SET a.created = 1 MERGE (b:Painting)",
        );
        assert_eq!(summary.merge_clauses, 2);
        assert_eq!(
            summary.node_labels,
            BTreeMap::from([("Painting".to_string(), 1), ("Person".to_string(), 1)])
        );
    }
}
