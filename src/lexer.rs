use crate::error::{ExprError, Result};
use crate::grammar::OperatorGrammar;
use crate::types::{Token, TokenKind};

/// Converts source text into a flat token sequence.
///
/// Operators are matched longest first against the grammar's spelling list,
/// so the grammar decides what counts as an operator.
///
/// # Examples
///
/// ```
/// use exp_eval::grammar::OperatorGrammar;
/// use exp_eval::lexer::tokenize;
/// use exp_eval::types::TokenKind;
///
/// let tokens = tokenize("a >= 1.5", &OperatorGrammar::default()).unwrap();
/// let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(kinds, vec![TokenKind::Identifier, TokenKind::Operator, TokenKind::Number]);
/// assert_eq!(tokens[1].text.as_deref(), Some(">="));
/// ```
pub fn tokenize(text: &str, grammar: &OperatorGrammar) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(text, grammar);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// The lexer struct, which produces tokens from an input string.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    grammar: &'a OperatorGrammar,
    operators: Vec<&'a str>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, grammar: &'a OperatorGrammar) -> Self {
        Self {
            input,
            pos: 0,
            grammar,
            operators: grammar.all_operators(),
        }
    }

    /// Peek at the current character.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Advance the position by one character.
    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, position: usize, message: impl Into<String>) -> ExprError {
        ExprError::Lex {
            position,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(' ' | '\t' | '\r' | '\n' | '\u{0C}') = self.peek() {
            self.advance();
        }
    }

    /// Get the next token from the input, or `None` at the end.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = if c.is_ascii_digit() || c == '.' {
            self.lex_number()?
        } else if self.grammar.is_identifier_char(c) {
            while self.peek().is_some_and(|c| self.grammar.is_identifier_char(c)) {
                self.advance();
            }
            Token::new(
                TokenKind::Identifier,
                Some(self.input[start..self.pos].to_string()),
                start,
            )
        } else if c == '"' || c == '\'' {
            self.lex_string(c)?
        } else if let Some(kind) = match c {
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            ',' => Some(TokenKind::Comma),
            _ => None,
        } {
            self.advance();
            Token::new(kind, None, start)
        } else {
            let rest = &self.input[start..];
            let Some(op) = self.operators.iter().find(|op| rest.starts_with(**op)) else {
                return Err(self.error(start, format!("Unexpected character '{}'", c)));
            };
            self.pos += op.len();
            Token::new(TokenKind::Operator, Some(op.to_string()), start)
        };
        Ok(Some(token))
    }

    /// Digits with at most one `.`, then an optional `e` exponent.
    fn lex_number(&mut self) -> Result<Token> {
        let start = self.pos;
        let mut saw_dot = false;
        let mut digits = 0;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits += 1;
            } else if c == '.' && !saw_dot {
                saw_dot = true;
            } else {
                break;
            }
            self.advance();
        }
        if digits == 0 {
            return Err(self.error(start, "Number has no digits"));
        }

        if self.peek() == Some('e') {
            self.advance();
            if let Some('+' | '-') = self.peek() {
                self.advance();
            }
            let mut exp_digits = 0;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                exp_digits += 1;
                self.advance();
            }
            if exp_digits == 0 {
                return Err(self.error(
                    start,
                    format!("Malformed exponent in '{}'", &self.input[start..self.pos]),
                ));
            }
        }

        Ok(Token::new(
            TokenKind::Number,
            Some(self.input[start..self.pos].to_string()),
            start,
        ))
    }

    fn lex_string(&mut self, quote: char) -> Result<Token> {
        let start = self.pos;
        self.advance();
        let mut value = String::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(self.error(start, "Unterminated string literal"));
            };
            self.advance();
            if c == quote {
                break;
            }
            if c != '\\' {
                value.push(c);
                continue;
            }

            let escape_pos = self.pos - 1;
            let Some(e) = self.peek() else {
                return Err(self.error(escape_pos, "Escape sequence at end of input"));
            };
            self.advance();
            let decoded = match e {
                'b' => '\u{08}',
                'f' => '\u{0C}',
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                'x' => self.hex_escape(escape_pos, 2)?,
                'u' => self.hex_escape(escape_pos, 4)?,
                other => other,
            };
            value.push(decoded);
        }

        Ok(Token::new(TokenKind::StringLiteral, Some(value), start))
    }

    fn hex_escape(&mut self, escape_pos: usize, len: usize) -> Result<char> {
        let digits = self.input[self.pos..]
            .get(..len)
            .filter(|d| d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error(escape_pos, "Malformed hex escape"))?;
        let code = u32::from_str_radix(digits, 16)
            .map_err(|_| self.error(escape_pos, "Malformed hex escape"))?;
        let c = char::from_u32(code)
            .ok_or_else(|| self.error(escape_pos, format!("Invalid code point U+{:04X}", code)))?;
        self.pos += len;
        Ok(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<Token> {
        tokenize(text, &OperatorGrammar::default()).unwrap()
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text()).collect()
    }

    #[test]
    fn test_lexer_tokenization_all_types() {
        let tokens = lex("1 + foo_bar * (2.5e-1) , 'x' $y");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::LeftParen,
                TokenKind::Number,
                TokenKind::RightParen,
                TokenKind::Comma,
                TokenKind::StringLiteral,
                TokenKind::Identifier,
            ]
        );
        assert_eq!(tokens[2].position, 4);
        assert_eq!(tokens[9].text(), "$y");
    }

    #[test]
    fn test_lexer_longest_match() {
        let tokens = lex("a>=b**c<>d<<e!f");
        let ops: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text())
            .collect();
        assert_eq!(ops, vec![">=", "**", "<>", "<<", "!"]);
    }

    #[test]
    fn test_lexer_numbers() {
        assert_eq!(texts(&lex("12e5 12e+5 .5 3.")), vec!["12e5", "12e+5", ".5", "3."]);
        // uppercase E is not an exponent marker
        let tokens = lex("2E3");
        assert_eq!(tokens[0].text(), "2");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_lexer_malformed_numbers() {
        let grammar = OperatorGrammar::default();
        for text in ["12e", "12e+", "1 + 3e-", "."] {
            let err = tokenize(text, &grammar).unwrap_err();
            assert!(matches!(err, ExprError::Lex { .. }), "{text}: {err:?}");
        }
        assert_eq!(tokenize("1 + 3e-", &grammar).unwrap_err().position(), Some(4));
    }

    #[test]
    fn test_lexer_string_escapes() {
        let tokens = lex(r#""a\"b\n\x41\u00e9\q" 'it\'s'"#);
        assert_eq!(tokens[0].text(), "a\"b\nAéq");
        assert_eq!(tokens[1].text(), "it's");
    }

    #[test]
    fn test_lexer_string_errors() {
        let grammar = OperatorGrammar::default();
        assert!(tokenize("\"abc", &grammar).is_err());
        assert!(tokenize("\"abc\\", &grammar).is_err());
        assert!(tokenize("\"\\xZ1\"", &grammar).is_err());
        assert!(tokenize("\"\\u12\"", &grammar).is_err());
        assert!(tokenize("\"\\uD800\"", &grammar).is_err());
    }

    #[test]
    fn test_lexer_unknown_character() {
        let err = tokenize("1 # 2", &OperatorGrammar::default()).unwrap_err();
        assert_eq!(err.position(), Some(2));
    }

    #[test]
    fn test_lexer_custom_grammar() {
        let mut grammar = OperatorGrammar::default();
        grammar.precedence_tiers.push(vec!["@".to_string()]);
        grammar.variable_name_characters.remove(&'$');
        let tokens = tokenize("a@b", &grammar).unwrap();
        assert_eq!(texts(&tokens), vec!["a", "@", "b"]);
        assert!(tokenize("$a", &grammar).is_err());
    }
}
