//! Shell-style tokenizer for batch identifier queries.
//!
//! Identifiers are separated by tab, newline, vertical tab, form feed,
//! carriage return, `|`, `,` or `+`. Plain space is NOT a separator, so
//! `CDK2 interacting` stays one term while `CDK2, CDK3` splits in two.
//! Single or double quotes preserve a phrase verbatim (separators
//! included), and a backslash escapes the next character.

use genehub_core::{Error, Result};

const SEPARATORS: &str = "\t\n\x0b\x0c\r|,+";

/// Split a raw query into identifier terms.
///
/// ```
/// use genehub_geneinfo::split_query_terms;
/// assert_eq!(split_query_terms("CDK2, CDK3").unwrap(), ["CDK2", "CDK3"]);
/// assert_eq!(
///     split_query_terms("\"CDK2, CDK3\"\nCDK4").unwrap(),
///     ["CDK2, CDK3", "CDK4"]
/// );
/// ```
pub fn split_query_terms(q: &str) -> Result<Vec<String>> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut chars = q.chars();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(open) => {
                if c == open {
                    quote = None;
                } else if c == '\\' && open == '"' {
                    // inside double quotes a backslash escapes the next
                    // character; inside single quotes it is literal
                    match chars.next() {
                        Some(escaped) => current.push(escaped),
                        None => return Err(no_escaped_character()),
                    }
                } else {
                    current.push(c);
                }
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                has_token = true;
            }
            None if c == '\\' => match chars.next() {
                Some(escaped) => {
                    current.push(escaped);
                    has_token = true;
                }
                None => return Err(no_escaped_character()),
            },
            None if SEPARATORS.contains(c) => {
                push_term(&mut terms, &mut current, &mut has_token);
            }
            None => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(Error::MalformedQuery(
            "No closing quotation! Or just remove the dangling quote.".to_string(),
        ));
    }
    push_term(&mut terms, &mut current, &mut has_token);
    Ok(terms)
}

fn push_term(terms: &mut Vec<String>, current: &mut String, has_token: &mut bool) {
    if *has_token {
        let term = current.trim().to_string();
        if !term.is_empty() {
            terms.push(term);
        }
    }
    current.clear();
    *has_token = false;
}

fn no_escaped_character() -> Error {
    Error::MalformedQuery(
        "No escaped character! You probably want to remove the \"\\\" (backslash) from your query."
            .to_string(),
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators_split() {
        assert_eq!(split_query_terms("CDK2, CDK3").unwrap(), ["CDK2", "CDK3"]);
        assert_eq!(
            split_query_terms("1017+1018|1019\n1020").unwrap(),
            ["1017", "1018", "1019", "1020"]
        );
    }

    #[test]
    fn test_plain_space_is_not_a_separator() {
        assert_eq!(
            split_query_terms("insulin receptor").unwrap(),
            ["insulin receptor"]
        );
    }

    #[test]
    fn test_quoted_phrase_preserved() {
        assert_eq!(
            split_query_terms("\"CDK2, CDK3\"\nCDK4").unwrap(),
            ["CDK2, CDK3", "CDK4"]
        );
        assert_eq!(
            split_query_terms("'a,b' , c").unwrap(),
            ["a,b", "c"]
        );
    }

    #[test]
    fn test_escape_outside_quotes() {
        assert_eq!(split_query_terms(r"CDK\,2").unwrap(), ["CDK,2"]);
    }

    #[test]
    fn test_empty_and_separator_only_input() {
        assert!(split_query_terms("").unwrap().is_empty());
        assert!(split_query_terms(",,|\n").unwrap().is_empty());
    }

    #[test]
    fn test_dangling_quote_hint() {
        let err = split_query_terms("\"CDK2, CDK3").unwrap_err();
        assert!(err.to_string().contains("dangling quote"));
    }

    #[test]
    fn test_trailing_backslash_hint() {
        let err = split_query_terms("CDK2\\").unwrap_err();
        assert!(err.to_string().contains("backslash"));
    }
}
