use log::debug;

use crate::expr::alias::AliasTable;
use crate::expr::token::tokenize;
use crate::models::{EvaluationResult, Token, TokenKind, UsagePolicy};
use crate::policy::PolicyTable;

/// How many combined-alias substitutions may chain before giving up.
const MAX_ALIAS_DEPTH: usize = 5;

/// How deep parenthesized groups may nest before evaluation gives up.
const MAX_PAREN_DEPTH: usize = 64;

/// Evaluates SPDX license expressions against a policy table.
///
/// Precedence, lowest to highest: `OR` < `AND` < `WITH` < `+`. Evaluation is
/// total: any input produces a verdict and a human-readable explanation, and
/// malformed trailing input is ignored rather than rejected.
pub struct Evaluator<'a> {
    table: &'a PolicyTable,
    aliases: &'a AliasTable,
}

impl<'a> Evaluator<'a> {
    pub fn new(table: &'a PolicyTable, aliases: &'a AliasTable) -> Self {
        Evaluator { table, aliases }
    }

    /// Evaluate an expression to a policy verdict with an explanation.
    pub fn evaluate(&self, expression: &str) -> EvaluationResult {
        self.evaluate_at_depth(expression, 0)
    }

    fn evaluate_at_depth(&self, expression: &str, depth: usize) -> EvaluationResult {
        let expression = expression.trim();
        if expression.is_empty()
            || matches!(expression, "NO-LICENSE-FOUND" | "NOASSERTION" | "NONE")
        {
            return EvaluationResult {
                policy: UsagePolicy::NeedsReview,
                explanation: "No license found".to_string(),
            };
        }

        // Combined aliases match the whole raw expression and substitute a new
        // one, which is evaluated from scratch. The depth bound stops
        // self-referential alias chains.
        if let Some(replacement) = self.aliases.combined(expression) {
            if depth >= MAX_ALIAS_DEPTH {
                return EvaluationResult {
                    policy: UsagePolicy::NeedsReview,
                    explanation: format!("Cyclic license alias at '{}'", expression),
                };
            }
            debug!("combined alias '{}' -> '{}'", expression, replacement);
            return self.evaluate_at_depth(replacement, depth + 1);
        }

        let expression = self.aliases.apply_expression_aliases(expression);
        let mut parser = ExprParser {
            tokens: tokenize(&expression),
            pos: 0,
            paren_depth: 0,
            table: self.table,
            aliases: self.aliases,
        };
        let (policy, explanation) = parser.parse_or();
        EvaluationResult { policy, explanation }
    }
}

/// A simple operand together with the license id it came from, when it was a
/// bare id or reference. `WITH` handling needs that id for combined-form
/// policy lookups.
struct Operand {
    policy: UsagePolicy,
    explanation: String,
    base_id: Option<String>,
}

struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    paren_depth: usize,
    table: &'a PolicyTable,
    aliases: &'a AliasTable,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens.get(self.pos).map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn parse_or(&mut self) -> (UsagePolicy, String) {
        let mut results = vec![self.parse_and()];
        while self.peek_kind() == TokenKind::Or {
            self.pos += 1;
            results.push(self.parse_and());
        }

        if results.len() == 1 {
            return results.remove(0);
        }

        let joined = join_explanations(&results);
        if results.iter().any(|(p, _)| *p == UsagePolicy::Allow) {
            (UsagePolicy::Allow, format!("OR: at least one allowed ({})", joined))
        } else if results.iter().all(|(p, _)| *p == UsagePolicy::Deny) {
            (UsagePolicy::Deny, format!("OR: all denied ({})", joined))
        } else {
            (UsagePolicy::NeedsReview, format!("OR: none allowed ({})", joined))
        }
    }

    fn parse_and(&mut self) -> (UsagePolicy, String) {
        let mut results = vec![self.parse_with()];
        while self.peek_kind() == TokenKind::And {
            self.pos += 1;
            results.push(self.parse_with());
        }

        if results.len() == 1 {
            return results.remove(0);
        }

        let joined = join_explanations(&results);
        if results.iter().all(|(p, _)| *p == UsagePolicy::Allow) {
            (UsagePolicy::Allow, format!("AND: all allowed ({})", joined))
        } else if results.iter().any(|(p, _)| *p == UsagePolicy::Deny) {
            (UsagePolicy::Deny, format!("AND: at least one denied ({})", joined))
        } else {
            (UsagePolicy::NeedsReview, format!("AND: some need review ({})", joined))
        }
    }

    fn parse_with(&mut self) -> (UsagePolicy, String) {
        let base = self.parse_simple();

        if self.peek_kind() != TokenKind::With {
            return (base.policy, base.explanation);
        }
        self.pos += 1;

        // addition-expression = license-exception-id / addition-ref
        let exception = match self.peek() {
            Some(t) if matches!(t.kind, TokenKind::LicenseId | TokenKind::AdditionRef) => {
                t.text.clone()
            }
            _ => return (base.policy, base.explanation),
        };
        self.pos += 1;

        let base_label = base.base_id.unwrap_or(base.explanation);

        if let Some(entry) = self.table.find_with(&base_label, &exception, self.aliases) {
            return (
                entry.usage_policy,
                format!("'{} WITH {}' (combined form)", base_label, exception),
            );
        }

        // Exceptions only ever widen the base license, so its verdict carries
        match base.policy {
            UsagePolicy::Allow => (
                UsagePolicy::Allow,
                format!("'{}' WITH '{}' (base allowed)", base_label, exception),
            ),
            UsagePolicy::Deny => (
                UsagePolicy::Deny,
                format!("'{}' WITH '{}' (base denied)", base_label, exception),
            ),
            UsagePolicy::NeedsReview => (
                UsagePolicy::NeedsReview,
                format!("'{}' WITH '{}' (base needs review)", base_label, exception),
            ),
        }
    }

    fn parse_simple(&mut self) -> Operand {
        let token = match self.peek() {
            Some(t) if t.kind != TokenKind::Eof => t.clone(),
            _ => {
                return Operand {
                    policy: UsagePolicy::NeedsReview,
                    explanation: "Empty expression".to_string(),
                    base_id: None,
                }
            }
        };

        match token.kind {
            TokenKind::LParen => {
                self.pos += 1;
                if self.paren_depth >= MAX_PAREN_DEPTH {
                    return Operand {
                        policy: UsagePolicy::NeedsReview,
                        explanation: format!(
                            "Parentheses nested deeper than {} levels",
                            MAX_PAREN_DEPTH
                        ),
                        base_id: None,
                    };
                }
                self.paren_depth += 1;
                let (policy, explanation) = self.parse_or();
                self.paren_depth -= 1;
                if self.peek_kind() == TokenKind::RParen {
                    self.pos += 1;
                }
                Operand { policy, explanation: format!("({})", explanation), base_id: None }
            }
            TokenKind::LicenseRef => {
                self.pos += 1;
                let license_ref = token.text;
                match self.table.find(&license_ref, false, self.aliases) {
                    Some(entry) => Operand {
                        policy: entry.usage_policy,
                        explanation: format!("'{}'", license_ref),
                        base_id: Some(license_ref),
                    },
                    None => Operand {
                        policy: UsagePolicy::NeedsReview,
                        explanation: format!("'{}' (custom license reference)", license_ref),
                        base_id: Some(license_ref),
                    },
                }
            }
            TokenKind::LicenseId => {
                self.pos += 1;
                let license_id = token.text;

                // An immediately following + means "or later"
                let or_later = self.peek_kind() == TokenKind::Plus;
                if or_later {
                    self.pos += 1;
                }

                let display_id =
                    if or_later { format!("{}+", license_id) } else { license_id.clone() };

                match self.table.find(&license_id, or_later, self.aliases) {
                    Some(entry) => Operand {
                        policy: entry.usage_policy,
                        explanation: format!("'{}'", display_id),
                        base_id: Some(display_id),
                    },
                    None => Operand {
                        policy: UsagePolicy::NeedsReview,
                        explanation: format!("'{}' (no policy)", display_id),
                        base_id: Some(display_id),
                    },
                }
            }
            _ => {
                debug!("unexpected token '{}' at offset {}", token.text, token.position);
                Operand {
                    policy: UsagePolicy::NeedsReview,
                    explanation: format!("Unexpected token: '{}'", token.text),
                    base_id: None,
                }
            }
        }
    }
}

fn join_explanations(results: &[(UsagePolicy, String)]) -> String {
    results.iter().map(|(_, e)| e.as_str()).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::PolicyEntry;
    use crate::policy::PolicyDocument;

    fn table(entries: &[(&str, UsagePolicy)]) -> PolicyTable {
        PolicyTable::new(
            entries
                .iter()
                .map(|(id, policy)| PolicyEntry {
                    id: id.to_string(),
                    usage_policy: *policy,
                    reason: None,
                })
                .collect(),
        )
    }

    fn aliases(licenses: &[(&str, &str)], combined: &[(&str, &str)]) -> AliasTable {
        let licenses: HashMap<String, String> =
            licenses.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let combined: HashMap<String, String> =
            combined.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AliasTable::new(&licenses, &combined)
    }

    fn standard_table() -> PolicyTable {
        table(&[
            ("MIT", UsagePolicy::Allow),
            ("Apache-2.0", UsagePolicy::Allow),
            ("EPL-2.0", UsagePolicy::Allow),
            ("GPL-3.0-only", UsagePolicy::Deny),
            ("AGPL-3.0-only", UsagePolicy::Deny),
            ("LGPL-2.1-only", UsagePolicy::NeedsReview),
        ])
    }

    fn eval(expression: &str, table: &PolicyTable) -> EvaluationResult {
        let no_aliases = AliasTable::default();
        Evaluator::new(table, &no_aliases).evaluate(expression)
    }

    #[test]
    fn test_single_license_verdicts() {
        let table = standard_table();
        let result = eval("MIT", &table);
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(result.explanation, "'MIT'");

        let result = eval("GPL-3.0-only", &table);
        assert_eq!(result.policy, UsagePolicy::Deny);
        assert_eq!(result.explanation, "'GPL-3.0-only'");
    }

    #[test]
    fn test_unknown_license_needs_review() {
        let result = eval("SomeUnknown-1.0", &standard_table());
        assert_eq!(result.policy, UsagePolicy::NeedsReview);
        assert_eq!(result.explanation, "'SomeUnknown-1.0' (no policy)");
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let table = standard_table();
        assert_eq!(eval("apache-2.0", &table).policy, UsagePolicy::Allow);
        assert_eq!(eval("APACHE-2.0", &table).policy, UsagePolicy::Allow);
        assert_eq!(eval("mit AND apache-2.0", &table).policy, UsagePolicy::Allow);
    }

    #[test]
    fn test_or_at_least_one_allowed() {
        let result = eval("MIT OR GPL-3.0-only", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(
            result.explanation,
            "OR: at least one allowed ('MIT'; 'GPL-3.0-only')"
        );
    }

    #[test]
    fn test_or_all_denied() {
        let result = eval("GPL-3.0-only OR AGPL-3.0-only", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Deny);
        assert_eq!(
            result.explanation,
            "OR: all denied ('GPL-3.0-only'; 'AGPL-3.0-only')"
        );
    }

    #[test]
    fn test_or_none_allowed() {
        let result = eval("GPL-3.0-only OR LGPL-2.1-only", &standard_table());
        assert_eq!(result.policy, UsagePolicy::NeedsReview);
        assert_eq!(
            result.explanation,
            "OR: none allowed ('GPL-3.0-only'; 'LGPL-2.1-only')"
        );
    }

    #[test]
    fn test_and_all_allowed() {
        let result = eval("MIT AND Apache-2.0", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(result.explanation, "AND: all allowed ('MIT'; 'Apache-2.0')");
    }

    #[test]
    fn test_and_at_least_one_denied() {
        let result = eval("MIT AND GPL-3.0-only", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Deny);
        assert_eq!(
            result.explanation,
            "AND: at least one denied ('MIT'; 'GPL-3.0-only')"
        );
    }

    #[test]
    fn test_and_some_need_review() {
        let result = eval("MIT AND LGPL-2.1-only", &standard_table());
        assert_eq!(result.policy, UsagePolicy::NeedsReview);
        assert_eq!(
            result.explanation,
            "AND: some need review ('MIT'; 'LGPL-2.1-only')"
        );
    }

    #[test]
    fn test_parentheses_and_precedence() {
        let result = eval("(MIT OR GPL-3.0-only) AND Apache-2.0", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(
            result.explanation,
            "AND: all allowed ((OR: at least one allowed ('MIT'; 'GPL-3.0-only')); 'Apache-2.0')"
        );

        // AND binds tighter than OR
        let result = eval("GPL-3.0-only AND MIT OR Apache-2.0", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Allow);
    }

    #[test]
    fn test_or_later_matches_only_variant() {
        let table = table(&[("GPL-2.0-only", UsagePolicy::Allow)]);
        let result = eval("GPL-2.0+", &table);
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(result.explanation, "'GPL-2.0+'");
    }

    #[test]
    fn test_or_later_matches_or_later_variant() {
        let table = table(&[("LGPL-2.1-or-later", UsagePolicy::NeedsReview)]);
        assert_eq!(eval("LGPL-2.1+", &table).policy, UsagePolicy::NeedsReview);
    }

    #[test]
    fn test_with_combined_form_policy() {
        let table = table(&[("GPL-2.0-with-classpath-exception", UsagePolicy::Allow)]);
        let result = eval("GPL-2.0-only WITH Classpath-exception-2.0", &table);
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert!(result.explanation.contains("combined form"), "{}", result.explanation);
    }

    #[test]
    fn test_with_inherits_base_policy() {
        let result = eval("EPL-2.0 WITH Classpath-exception-2.0", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(
            result.explanation,
            "'EPL-2.0' WITH 'Classpath-exception-2.0' (base allowed)"
        );

        let result = eval("GPL-3.0-only WITH Autoconf-exception-3.0", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Deny);
        assert_eq!(
            result.explanation,
            "'GPL-3.0-only' WITH 'Autoconf-exception-3.0' (base denied)"
        );
    }

    #[test]
    fn test_with_unknown_base_needs_review() {
        let result = eval("Nope-1.0 WITH Classpath-exception-2.0", &standard_table());
        assert_eq!(result.policy, UsagePolicy::NeedsReview);
        assert_eq!(
            result.explanation,
            "'Nope-1.0' WITH 'Classpath-exception-2.0' (base needs review)"
        );
    }

    #[test]
    fn test_with_missing_exception_falls_back_to_base() {
        let result = eval("MIT WITH", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(result.explanation, "'MIT'");
    }

    #[test]
    fn test_license_ref() {
        let result = eval("LicenseRef-internal-tool", &standard_table());
        assert_eq!(result.policy, UsagePolicy::NeedsReview);
        assert_eq!(
            result.explanation,
            "'LicenseRef-internal-tool' (custom license reference)"
        );

        let table = table(&[("LicenseRef-internal-tool", UsagePolicy::Allow)]);
        let result = eval("LicenseRef-internal-tool", &table);
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(result.explanation, "'LicenseRef-internal-tool'");
    }

    #[test]
    fn test_sentinels() {
        let table = standard_table();
        for expression in ["", "   ", "NOASSERTION", "NONE", "NO-LICENSE-FOUND"] {
            let result = eval(expression, &table);
            assert_eq!(result.policy, UsagePolicy::NeedsReview, "for {:?}", expression);
            assert_eq!(result.explanation, "No license found");
        }
    }

    #[test]
    fn test_trailing_garbage_is_ignored() {
        // "And" in mixed case is an identifier, so evaluation stops after MIT
        let result = eval("MIT And GPL-3.0-only", &standard_table());
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(result.explanation, "'MIT'");
    }

    #[test]
    fn test_unexpected_token() {
        let result = eval(") OR MIT", &standard_table());
        assert_eq!(result.policy, UsagePolicy::NeedsReview);
        assert!(result.explanation.starts_with("Unexpected token"), "{}", result.explanation);

        let result = eval("()", &standard_table());
        assert_eq!(result.policy, UsagePolicy::NeedsReview);
    }

    #[test]
    fn test_plus_as_legacy_and() {
        let table = table(&[("CDDL-1.1", UsagePolicy::Allow), ("MIT", UsagePolicy::Allow)]);
        let result = eval("CDDL-1.1 + MIT", &table);
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(result.explanation, "AND: all allowed ('CDDL-1.1'; 'MIT')");
    }

    #[test]
    fn test_w_slash_with_single_token_aliases() {
        let table = table(&[
            ("GPL-2.0-only", UsagePolicy::Allow),
            ("GPL-2.0-with-classpath-exception", UsagePolicy::Allow),
        ]);
        let aliases = aliases(
            &[("gpl2", "GPL-2.0-only"), ("cpe", "Classpath-exception-2.0")],
            &[],
        );
        let result = Evaluator::new(&table, &aliases).evaluate("GPL2 w/ CPE");
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert!(result.explanation.contains("combined form"), "{}", result.explanation);
    }

    #[test]
    fn test_single_token_alias_keeps_display_id() {
        let table = table(&[("GPL-2.0-only", UsagePolicy::Allow)]);
        let aliases = aliases(&[("gplv2", "GPL-2.0-only")], &[]);
        let result = Evaluator::new(&table, &aliases).evaluate("GPLv2");
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(result.explanation, "'GPLv2'");
    }

    #[test]
    fn test_expression_alias_before_tokenization() {
        let table = table(&[("CC0-1.0", UsagePolicy::Allow), ("MIT", UsagePolicy::Allow)]);
        let aliases = aliases(&[("public domain", "CC0-1.0")], &[]);
        let result = Evaluator::new(&table, &aliases).evaluate("MIT OR Public Domain");
        assert_eq!(result.policy, UsagePolicy::Allow);
        assert_eq!(
            result.explanation,
            "OR: at least one allowed ('MIT'; 'CC0-1.0')"
        );
    }

    #[test]
    fn test_combined_alias_reevaluates_substitution() {
        let table = table(&[
            ("CDDL-1.1", UsagePolicy::Allow),
            ("GPL-2.0-with-classpath-exception", UsagePolicy::Allow),
        ]);
        let aliases = aliases(
            &[],
            &[(
                "cddl + gplv2 with classpath exception",
                "CDDL-1.1 OR GPL-2.0-with-classpath-exception",
            )],
        );
        let result =
            Evaluator::new(&table, &aliases).evaluate("CDDL + GPLv2 with classpath exception");
        assert_eq!(result.policy, UsagePolicy::Allow);
    }

    #[test]
    fn test_cyclic_combined_alias_is_bounded() {
        let table = standard_table();
        let aliases = aliases(&[], &[("a-license", "b-license"), ("b-license", "a-license")]);
        let result = Evaluator::new(&table, &aliases).evaluate("a-license");
        assert_eq!(result.policy, UsagePolicy::NeedsReview);
        assert!(result.explanation.contains("Cyclic license alias"), "{}", result.explanation);
    }

    #[test]
    fn test_deeply_nested_parens_are_bounded() {
        let table = standard_table();
        let modest = format!("{}MIT{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(eval(&modest, &table).policy, UsagePolicy::Allow);

        let pathological = format!("{}MIT{}", "(".repeat(100_000), ")".repeat(100_000));
        let result = eval(&pathological, &table);
        assert_eq!(result.policy, UsagePolicy::NeedsReview);
        assert!(result.explanation.contains("nested deeper"), "{}", result.explanation);
    }

    #[test]
    fn test_default_policy_entries_round_trip() {
        let document = PolicyDocument::default();
        let aliases =
            AliasTable::new(&document.license_aliases, &document.combined_license_aliases);
        let table = PolicyTable::new(document.policies.clone());
        let evaluator = Evaluator::new(&table, &aliases);
        for entry in &document.policies {
            let result = evaluator.evaluate(&entry.id);
            assert_eq!(result.policy, entry.usage_policy, "policy for '{}'", entry.id);
        }
    }
}
