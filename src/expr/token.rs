use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Token, TokenKind};

static LICENSE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(DocumentRef-[A-Za-z0-9.\-]+:)?LicenseRef-[A-Za-z0-9.\-]+$")
        .expect("invalid regex")
});

static ADDITION_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(DocumentRef-[A-Za-z0-9.\-]+:)?AdditionRef-[A-Za-z0-9.\-]+$")
        .expect("invalid regex")
});

/// Split an SPDX license expression into tokens.
///
/// Tokenization never fails: anything that is not an operator, a parenthesis
/// or a reference becomes a [`TokenKind::LicenseId`], and the stream always
/// ends with exactly one [`TokenKind::Eof`].
///
/// Beyond the SPDX grammar this accepts two legacy spellings seen in the
/// wild: a `+` surrounded by whitespace acts as `AND`, and `w/` acts as
/// `WITH`. Operator keywords are matched in their exact upper or lower case
/// forms only (`AND`/`and`, never `And`), as the grammar requires.
pub fn tokenize(expression: &str) -> Vec<Token> {
    let chars: Vec<char> = expression.trim().chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < len {
        let mut had_whitespace = false;
        while pos < len && chars[pos].is_whitespace() {
            pos += 1;
            had_whitespace = true;
        }
        if pos >= len {
            break;
        }

        let c = chars[pos];

        if c == '(' {
            tokens.push(Token { kind: TokenKind::LParen, text: "(".to_string(), position: pos });
            pos += 1;
            continue;
        }
        if c == ')' {
            tokens.push(Token { kind: TokenKind::RParen, text: ")".to_string(), position: pos });
            pos += 1;
            continue;
        }

        // A plus is three different things depending on its neighbours:
        // " + "  -> AND (legacy), " +x" -> or-later for the next id,
        // "id+"  -> or-later suffix for the previous id.
        if c == '+' {
            let kind = if had_whitespace && (pos + 1 >= len || chars[pos + 1].is_whitespace()) {
                TokenKind::And
            } else {
                TokenKind::Plus
            };
            tokens.push(Token { kind, text: "+".to_string(), position: pos });
            pos += 1;
            continue;
        }

        // "w/" as WITH, when followed by whitespace or end of input
        if (c == 'w' || c == 'W') && pos + 1 < len && chars[pos + 1] == '/' {
            if pos + 2 >= len || chars[pos + 2].is_whitespace() {
                tokens.push(Token { kind: TokenKind::With, text: "w/".to_string(), position: pos });
                pos += 2;
                continue;
            }
        }

        if let Some((kind, op_len)) = match_operator(&chars, pos) {
            let text: String = chars[pos..pos + op_len].iter().collect();
            tokens.push(Token { kind, text, position: pos });
            pos += op_len;
            continue;
        }

        // Identifier run: ends at whitespace, parentheses, or a '+' that is
        // itself followed by whitespace or end of input (an or-later suffix).
        let id_start = pos;
        while pos < len {
            let c = chars[pos];
            if c.is_whitespace() || c == '(' || c == ')' {
                break;
            }
            if c == '+' && (pos + 1 >= len || chars[pos + 1].is_whitespace()) {
                break;
            }
            pos += 1;
        }

        if pos > id_start {
            let identifier: String = chars[id_start..pos].iter().collect();
            let kind = if LICENSE_REF_RE.is_match(&identifier) {
                TokenKind::LicenseRef
            } else if ADDITION_REF_RE.is_match(&identifier) {
                TokenKind::AdditionRef
            } else {
                TokenKind::LicenseId
            };
            tokens.push(Token { kind, text: identifier, position: id_start });
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, text: String::new(), position: len });
    tokens
}

/// Match AND/and, OR/or or WITH/with at `pos`, requiring the keyword to be
/// followed by whitespace, `(` or the end of input.
fn match_operator(chars: &[char], pos: usize) -> Option<(TokenKind, usize)> {
    for (upper, lower, kind) in [
        ("AND", "and", TokenKind::And),
        ("OR", "or", TokenKind::Or),
        ("WITH", "with", TokenKind::With),
    ] {
        let op_len = upper.len();
        if !word_at(chars, pos, upper) && !word_at(chars, pos, lower) {
            continue;
        }
        if pos + op_len >= chars.len()
            || chars[pos + op_len].is_whitespace()
            || chars[pos + op_len] == '('
        {
            return Some((kind, op_len));
        }
    }
    None
}

fn word_at(chars: &[char], pos: usize, word: &str) -> bool {
    word.chars()
        .enumerate()
        .all(|(i, w)| chars.get(pos + i) == Some(&w))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expression: &str) -> Vec<TokenKind> {
        tokenize(expression).into_iter().map(|t| t.kind).collect()
    }

    fn texts(expression: &str) -> Vec<String> {
        tokenize(expression).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_single_license() {
        assert_eq!(kinds("MIT"), vec![TokenKind::LicenseId, TokenKind::Eof]);
        assert_eq!(texts("MIT"), vec!["MIT", ""]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("Apache-2.0 AND MIT"),
            vec![TokenKind::LicenseId, TokenKind::And, TokenKind::LicenseId, TokenKind::Eof]
        );
        assert_eq!(
            kinds("MIT or Apache-2.0"),
            vec![TokenKind::LicenseId, TokenKind::Or, TokenKind::LicenseId, TokenKind::Eof]
        );
    }

    #[test]
    fn test_mixed_case_operator_is_an_identifier() {
        assert_eq!(
            kinds("MIT Or Apache-2.0"),
            vec![
                TokenKind::LicenseId,
                TokenKind::LicenseId,
                TokenKind::LicenseId,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operator_followed_by_paren() {
        assert_eq!(
            kinds("MIT AND(Apache-2.0)"),
            vec![
                TokenKind::LicenseId,
                TokenKind::And,
                TokenKind::LParen,
                TokenKind::LicenseId,
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operator_prefix_stays_in_identifier() {
        // "ORacle" starts with OR but is not followed by a boundary
        assert_eq!(kinds("ORacle"), vec![TokenKind::LicenseId, TokenKind::Eof]);
        assert_eq!(texts("ORacle"), vec!["ORacle", ""]);
    }

    #[test]
    fn test_or_later_suffix() {
        assert_eq!(kinds("GPL-2.0+"), vec![TokenKind::LicenseId, TokenKind::Plus, TokenKind::Eof]);
        assert_eq!(texts("GPL-2.0+"), vec!["GPL-2.0", "+", ""]);
    }

    #[test]
    fn test_plus_surrounded_by_whitespace_is_and() {
        let tokens = tokenize("CDDL + GPLv2");
        assert_eq!(tokens[1].kind, TokenKind::And);
        assert_eq!(tokens[1].text, "+");
        assert_eq!(
            kinds("CDDL + GPLv2"),
            vec![TokenKind::LicenseId, TokenKind::And, TokenKind::LicenseId, TokenKind::Eof]
        );
    }

    #[test]
    fn test_interior_plus_is_swallowed() {
        // Plus characters inside an identifier only end it when trailing
        assert_eq!(texts("libstdc++"), vec!["libstdc+", "+", ""]);
        assert_eq!(
            kinds("libstdc++"),
            vec![TokenKind::LicenseId, TokenKind::Plus, TokenKind::Eof]
        );
    }

    #[test]
    fn test_w_slash_is_with() {
        assert_eq!(
            kinds("GPL2 w/ CPE"),
            vec![TokenKind::LicenseId, TokenKind::With, TokenKind::LicenseId, TokenKind::Eof]
        );
        assert_eq!(
            kinds("GPL2 W/ CPE"),
            vec![TokenKind::LicenseId, TokenKind::With, TokenKind::LicenseId, TokenKind::Eof]
        );
    }

    #[test]
    fn test_w_slash_without_space_is_an_identifier() {
        assert_eq!(texts("GPL2 w/CPE"), vec!["GPL2", "w/CPE", ""]);
    }

    #[test]
    fn test_license_ref() {
        assert_eq!(kinds("LicenseRef-my-license"), vec![TokenKind::LicenseRef, TokenKind::Eof]);
        assert_eq!(
            kinds("DocumentRef-doc1:LicenseRef-custom"),
            vec![TokenKind::LicenseRef, TokenKind::Eof]
        );
        assert_eq!(
            kinds("AdditionRef-my-exception"),
            vec![TokenKind::AdditionRef, TokenKind::Eof]
        );
    }

    #[test]
    fn test_with_expression() {
        assert_eq!(
            kinds("GPL-2.0-only WITH Classpath-exception-2.0"),
            vec![TokenKind::LicenseId, TokenKind::With, TokenKind::LicenseId, TokenKind::Eof]
        );
    }

    #[test]
    fn test_positions_after_trim() {
        let tokens = tokenize("  MIT OR ISC  ");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 4);
        assert_eq!(tokens[2].position, 7);
        assert_eq!(tokens[3].kind, TokenKind::Eof);
        assert_eq!(tokens[3].position, 10);
    }

    #[test]
    fn test_empty_expression() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("   "), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_parenthesized() {
        assert_eq!(
            kinds("(MIT OR GPL-3.0-only) AND ISC"),
            vec![
                TokenKind::LParen,
                TokenKind::LicenseId,
                TokenKind::Or,
                TokenKind::LicenseId,
                TokenKind::RParen,
                TokenKind::And,
                TokenKind::LicenseId,
                TokenKind::Eof
            ]
        );
    }
}
