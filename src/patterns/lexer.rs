//! # Lexer Sintático de Submissões
//!
//! Tokenizador leve usado pelo validador de padrões e pelo instrumentador.
//! Não é um parser completo: os detectores de padrão são deliberadamente
//! sintáticos, então basta uma visão fiel dos tokens com comentários e
//! strings já descartados.
//!
//! Invariantes importantes:
//! - Conteúdo de strings/comentários nunca vira token (um `while` dentro
//!   de uma string não conta como loop).
//! - Cada token carrega o offset em bytes no fonte original, para o
//!   instrumentador reescrever por posição.
//! - Comentários de bloco aninham, como na linguagem da sandbox.

use std::collections::HashMap;

// ============================================================================
// TOKENS
// ============================================================================

/// Um token da submissão.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador ou palavra-chave (`fn`, `while`, nomes...).
    Ident(String),
    /// Literal numérico, mantido como texto (`42`, `0x1F`, `3.14`).
    Number(String),
    /// Literal string. O conteúdo é irrelevante para a análise.
    Str,
    /// String interpolada (crases). Conteúdo ignorado por inteiro.
    InterpStr,
    /// Literal de caractere.
    CharLit,
    /// Operador ou pontuação (`=`, `==`, `.`, `>>`, ...).
    Op(String),
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Semicolon,
    Comma,
}

impl Token {
    /// True se o token é o identificador dado.
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(s) if s == name)
    }

    /// True se o token é o operador dado.
    pub fn is_op(&self, op: &str) -> bool {
        matches!(self, Token::Op(s) if s == op)
    }
}

/// Token com posição no fonte original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    /// Offset em bytes do início do token.
    pub start: usize,
    /// Offset em bytes logo após o token.
    pub end: usize,
    /// Linha 1-based onde o token começa.
    pub line: u32,
}

// Operadores multi-caractere, do mais longo para o mais curto.
const MULTI_OPS: [&str; 24] = [
    "<<=", ">>=", "**=", "..=", "**", "<<", ">>", "..", "==", "!=", "<=", ">=", "&&", "||", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "=>", "??",
];

// ============================================================================
// TOKENIZAÇÃO
// ============================================================================

/// Tokeniza o fonte, descartando comentários e conteúdo de strings.
pub fn tokenize(src: &str) -> Vec<Spanned> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    let mut line = 1u32;

    while i < bytes.len() {
        let c = bytes[i] as char;

        // Espaços em branco.
        if c.is_ascii_whitespace() {
            if c == '\n' {
                line += 1;
            }
            i += 1;
            continue;
        }

        // Comentário de linha.
        if c == '/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // Comentário de bloco (aninha).
        if c == '/' && bytes.get(i + 1) == Some(&b'*') {
            let mut depth = 1;
            i += 2;
            while i < bytes.len() && depth > 0 {
                if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    depth += 1;
                    i += 2;
                } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    depth -= 1;
                    i += 2;
                } else {
                    if bytes[i] == b'\n' {
                        line += 1;
                    }
                    i += 1;
                }
            }
            continue;
        }

        let start = i;
        let start_line = line;

        // String comum.
        if c == '"' {
            i += 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'"' => {
                        i += 1;
                        break;
                    }
                    b'\n' => {
                        line += 1;
                        i += 1;
                    }
                    _ => i += 1,
                }
            }
            tokens.push(Spanned {
                token: Token::Str,
                start,
                end: i,
                line: start_line,
            });
            continue;
        }

        // String interpolada (crases). O conteúdo inteiro é pulado,
        // inclusive chaves de interpolação.
        if c == '`' {
            i += 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'`' => {
                        i += 1;
                        break;
                    }
                    b'\n' => {
                        line += 1;
                        i += 1;
                    }
                    _ => i += 1,
                }
            }
            tokens.push(Spanned {
                token: Token::InterpStr,
                start,
                end: i,
                line: start_line,
            });
            continue;
        }

        // Literal de caractere.
        if c == '\'' {
            i += 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'\'' => {
                        i += 1;
                        break;
                    }
                    _ => i += 1,
                }
            }
            tokens.push(Spanned {
                token: Token::CharLit,
                start,
                end: i,
                line: start_line,
            });
            continue;
        }

        // Identificador / palavra-chave.
        if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
            {
                i += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(src[start..i].to_string()),
                start,
                end: i,
                line: start_line,
            });
            continue;
        }

        // Número (inteiro, hex/octal/binário, decimal, expoente).
        if c.is_ascii_digit() {
            i += 1;
            if c == '0' && matches!(bytes.get(i), Some(b'x') | Some(b'o') | Some(b'b')) {
                i += 1;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
            } else {
                while i < bytes.len() && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'_') {
                    i += 1;
                }
                // Parte decimal: só consome '.' seguido de dígito, para
                // não engolir o operador de range `..`.
                if bytes.get(i) == Some(&b'.')
                    && bytes
                        .get(i + 1)
                        .map(|b| (*b as char).is_ascii_digit())
                        .unwrap_or(false)
                {
                    i += 1;
                    while i < bytes.len()
                        && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'_')
                    {
                        i += 1;
                    }
                }
                // Expoente.
                if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
                    let mut j = i + 1;
                    if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
                        j += 1;
                    }
                    if bytes
                        .get(j)
                        .map(|b| (*b as char).is_ascii_digit())
                        .unwrap_or(false)
                    {
                        i = j;
                        while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
            }
            tokens.push(Spanned {
                token: Token::Number(src[start..i].to_string()),
                start,
                end: i,
                line: start_line,
            });
            continue;
        }

        // Delimitadores e pontuação com token próprio.
        let single = match c {
            '{' => Some(Token::OpenBrace),
            '}' => Some(Token::CloseBrace),
            '(' => Some(Token::OpenParen),
            ')' => Some(Token::CloseParen),
            '[' => Some(Token::OpenBracket),
            ']' => Some(Token::CloseBracket),
            ';' => Some(Token::Semicolon),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = single {
            i += 1;
            tokens.push(Spanned {
                token,
                start,
                end: i,
                line: start_line,
            });
            continue;
        }

        // Operadores multi-caractere, greedy.
        let rest = &src[i..];
        if let Some(op) = MULTI_OPS.iter().find(|op| rest.starts_with(**op)) {
            i += op.len();
            tokens.push(Spanned {
                token: Token::Op((*op).to_string()),
                start,
                end: i,
                line: start_line,
            });
            continue;
        }

        // Qualquer outro caractere vira operador de um caractere.
        let ch_len = c.len_utf8();
        i += ch_len;
        tokens.push(Spanned {
            token: Token::Op(src[start..i].to_string()),
            start,
            end: i,
            line: start_line,
        });
    }

    tokens
}

// ============================================================================
// ESTRUTURA DE BLOCOS
// ============================================================================

/// Casa cada delimitador de abertura com o de fechamento.
///
/// Retorna um mapa índice-de-abertura → índice-de-fechamento cobrindo
/// `{}`, `()` e `[]`. Retorna `None` se os delimitadores estiverem
/// desbalanceados ou intercalados de forma inválida.
pub fn delimiter_pairs(tokens: &[Spanned]) -> Option<HashMap<usize, usize>> {
    let mut pairs = HashMap::new();
    let mut stack: Vec<(usize, &Token)> = Vec::new();

    for (idx, spanned) in tokens.iter().enumerate() {
        match spanned.token {
            Token::OpenBrace | Token::OpenParen | Token::OpenBracket => {
                stack.push((idx, &spanned.token));
            }
            Token::CloseBrace | Token::CloseParen | Token::CloseBracket => {
                let (open_idx, open_token) = stack.pop()?;
                let matches = matches!(
                    (open_token, &spanned.token),
                    (Token::OpenBrace, Token::CloseBrace)
                        | (Token::OpenParen, Token::CloseParen)
                        | (Token::OpenBracket, Token::CloseBracket)
                );
                if !matches {
                    return None;
                }
                pairs.insert(open_idx, idx);
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        Some(pairs)
    } else {
        None
    }
}

/// Verificação rápida de balanceamento de `{}`, `[]` e `()`.
pub fn delimiters_balanced(src: &str) -> bool {
    delimiter_pairs(&tokenize(src)).is_some()
}

// ============================================================================
// TESTES
// ============================================================================
