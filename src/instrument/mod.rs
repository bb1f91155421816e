//! # Módulo de Instrumentação de Código
//!
//! Reescreve o fonte submetido antes de entrar na sandbox:
//!
//! 1. **Validação de sintaxe** - checagens rápidas (delimitadores
//!    balanceados, atribuição com lado direito vazio) para mensagens
//!    amigáveis, depois o parser real da linguagem da sandbox.
//! 2. **Instrumentação de loops** - todo `while`, `for`, `do` e `loop`
//!    recebe um guard próprio (`__loop_guard(N)`) como primeiro comando
//!    do corpo. O guard mantém um contador por loop no host e lança
//!    "Infinite loop detected" ao cruzar o limite.
//! 3. **Guarda de recursão** - a profundidade de chamadas é imposta pelo
//!    próprio motor da sandbox (limite de call levels); o valor pedido
//!    viaja nas opções.
//! 4. **Error boundary opcional** - as declarações `fn` são içadas e o
//!    restante do fonte é embrulhado em `try`/`catch`: qualquer erro não
//!    capturado é encaminhado ao repórter injetado (`__reportError`)
//!    antes de ser relançado.
//! 5. **Hook legado de captura de operações** - reescrita rasa de
//!    `ident.push(x)` / `ident.pop()` para chamadas rastreadas. Fica
//!    DESLIGADO no caminho principal: as coleções rastreadas emitem os
//!    passos diretamente.
//!
//! ## Semântica de falha
//!
//! Nenhuma falha é lançada: tudo vira `InstrumentedCode { code: "",
//! error: Some(...) }`.

use tracing::debug;

use crate::limits::{DEFAULT_MAX_LOOP_ITERATIONS, DEFAULT_MAX_RECURSION_DEPTH};
use crate::patterns::collect_loops;
use crate::patterns::lexer::{delimiter_pairs, tokenize, Spanned, Token};

// ============================================================================
// OPÇÕES E RESULTADO
// ============================================================================

/// Opções de instrumentação.
#[derive(Debug, Clone)]
pub struct InstrumentOptions {
    /// Iterações máximas por loop. O valor é imposto pelo guard
    /// registrado no host; viaja aqui para a sandbox configurar.
    pub max_loop_iterations: u64,

    /// Profundidade máxima de chamadas no script.
    pub max_recursion_depth: usize,

    /// Liga o hook legado de captura rasa de operações (`push`/`pop`
    /// em arrays comuns). Desligado no caminho do orquestrador.
    pub capture_operations: bool,

    /// Embrulha o fonte num error boundary que encaminha erros não
    /// capturados ao repórter antes de relançar.
    pub add_error_boundaries: bool,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            capture_operations: false,
            add_error_boundaries: false,
        }
    }
}

/// Fonte instrumentado, ou erro de instrumentação.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentedCode {
    /// Fonte pronto para a sandbox. Vazio quando `error` está presente.
    pub code: String,
    /// Mensagem de erro de parse/instrumentação.
    pub error: Option<String>,
}

impl InstrumentedCode {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            code: String::new(),
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// PIPELINE DE INSTRUMENTAÇÃO
// ============================================================================

/// Instrumenta o fonte submetido.
///
/// O pipeline roda na ordem: sintaxe → hook legado (opcional) →
/// guards de loop → error boundary (opcional).
pub fn instrument(source: &str, options: &InstrumentOptions) -> InstrumentedCode {
    // 1. Validação de sintaxe.
    if let Some(error) = validate_syntax(source) {
        return InstrumentedCode::failed(error);
    }

    let mut code = source.to_string();

    // 2. Hook legado de captura (desligado no caminho principal).
    if options.capture_operations {
        code = rewrite_shallow_captures(&code);
    }

    // 3. Guards de loop.
    let (guarded, loop_count) = inject_loop_guards(&code);
    code = guarded;
    debug!(loops = loop_count, "Loop guards injetados");

    // 4. Error boundary.
    if options.add_error_boundaries {
        code = wrap_error_boundary(&code);
    }

    InstrumentedCode { code, error: None }
}

// ============================================================================
// VALIDAÇÃO DE SINTAXE
// ============================================================================

/// Valida a sintaxe do fonte. Retorna a mensagem de erro, se houver.
///
/// As checagens rápidas rodam primeiro porque produzem mensagens mais
/// amigáveis que as do parser; o parser real fecha a validação.
fn validate_syntax(source: &str) -> Option<String> {
    let tokens = tokenize(source);

    // Delimitadores balanceados ({}, [], ()).
    if delimiter_pairs(&tokens).is_none() {
        return Some("Syntax error: unbalanced braces, brackets or parentheses".to_string());
    }

    // Atribuição com lado direito vazio: `let x =;` ou `x =;`.
    for (i, spanned) in tokens.iter().enumerate() {
        if spanned.token.is_op("=") {
            match tokens.get(i + 1).map(|s| &s.token) {
                Some(Token::Semicolon) | None => {
                    return Some(format!(
                        "Syntax error: assignment with empty right-hand side at line {}",
                        spanned.line
                    ));
                }
                _ => {}
            }
        }
    }

    // Parser real. Engine cru: o parse não depende de funções
    // registradas.
    if let Err(parse_error) = rhai::Engine::new_raw().compile(source) {
        return Some(format!("Syntax error: {}", parse_error));
    }

    None
}

// ============================================================================
// GUARDS DE LOOP
// ============================================================================

/// Injeta `__loop_guard(N);` como primeiro comando de cada corpo de
/// loop. Cada loop recebe um N único, em ordem de aparição no fonte,
/// então loops aninhados e sequenciais têm contadores independentes.
///
/// A inserção acontece na mesma linha da chave de abertura para não
/// deslocar a numeração de linhas do fonte original.
fn inject_loop_guards(source: &str) -> (String, usize) {
    let tokens = tokenize(source);
    let pairs = match delimiter_pairs(&tokens) {
        Some(p) => p,
        None => return (source.to_string(), 0), // sintaxe já validada; defensivo
    };

    // Offset em bytes logo após a chave de abertura de cada corpo.
    let mut insertions: Vec<usize> = collect_loops(&tokens, &pairs)
        .into_iter()
        .map(|(_, (body_start, _))| tokens[body_start - 1].end)
        .collect();
    insertions.sort_unstable();

    let mut result = String::with_capacity(source.len() + insertions.len() * 24);
    let mut last = 0usize;
    for (id, offset) in insertions.iter().enumerate() {
        result.push_str(&source[last..*offset]);
        result.push_str(&format!(" __loop_guard({});", id));
        last = *offset;
    }
    result.push_str(&source[last..]);

    (result, insertions.len())
}

// ============================================================================
// ERROR BOUNDARY
// ============================================================================

/// Embrulha o fonte num error boundary.
///
/// Declarações `fn` só podem aparecer no nível raiz do script, então
/// elas são içadas para fora do `try` (o próprio motor já as iça na
/// compilação; a ordem relativa não muda a semântica). O restante dos
/// comandos roda dentro do `try`, e o último comando captura os
/// identificadores `result`/`finalResult` para o host, já que
/// variáveis declaradas dentro do bloco não sobrevivem a ele.
fn wrap_error_boundary(source: &str) -> String {
    let (functions, body) = hoist_functions(source);

    let mut wrapped = String::with_capacity(source.len() + 256);
    if !functions.is_empty() {
        wrapped.push_str(&functions);
        wrapped.push_str("\n\n");
    }
    wrapped.push_str("try {\n");
    wrapped.push_str(&body);
    wrapped.push_str(
        "\n    let __result = if is_def_var(\"result\") { result } else { () };\
         \n    let __final_result = if is_def_var(\"finalResult\") { finalResult } else { () };\
         \n    __capture_result(__result, __final_result);\n",
    );
    wrapped.push_str("} catch (err) {\n    __reportError(err);\n    throw err;\n}\n");
    wrapped
}

/// Separa as declarações `fn` de nível raiz do restante do fonte.
fn hoist_functions(source: &str) -> (String, String) {
    let tokens = tokenize(source);
    let pairs = match delimiter_pairs(&tokens) {
        Some(p) => p,
        None => return (String::new(), source.to_string()),
    };

    // Faixas de bytes de cada declaração `fn` de nível raiz.
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut depth = 0i32;
    let mut i = 0usize;
    while i < tokens.len() {
        match tokens[i].token {
            Token::OpenBrace | Token::OpenParen | Token::OpenBracket => depth += 1,
            Token::CloseBrace | Token::CloseParen | Token::CloseBracket => depth -= 1,
            _ => {}
        }

        if depth == 0 && tokens[i].token.is_ident("fn") {
            if let Some(span) = function_span(&tokens, &pairs, i) {
                spans.push(span);
                // Pula para depois da declaração.
                while i < tokens.len() && tokens[i].end <= span.1 {
                    i += 1;
                }
                continue;
            }
        }
        i += 1;
    }

    if spans.is_empty() {
        return (String::new(), source.to_string());
    }

    let mut functions = String::new();
    let mut body = String::new();
    let mut last = 0usize;
    for (start, end) in &spans {
        body.push_str(&source[last..*start]);
        functions.push_str(&source[*start..*end]);
        functions.push('\n');
        last = *end;
    }
    body.push_str(&source[last..]);

    (functions, body)
}

/// Faixa de bytes de uma declaração `fn` começando no token `fn_idx`.
fn function_span(
    tokens: &[Spanned],
    pairs: &std::collections::HashMap<usize, usize>,
    fn_idx: usize,
) -> Option<(usize, usize)> {
    if !matches!(tokens.get(fn_idx + 1).map(|s| &s.token), Some(Token::Ident(_))) {
        return None;
    }
    if !matches!(tokens.get(fn_idx + 2).map(|s| &s.token), Some(Token::OpenParen)) {
        return None;
    }
    let params_close = *pairs.get(&(fn_idx + 2))?;
    if !matches!(
        tokens.get(params_close + 1).map(|s| &s.token),
        Some(Token::OpenBrace)
    ) {
        return None;
    }
    let body_close = *pairs.get(&(params_close + 1))?;
    Some((tokens[fn_idx].start, tokens[body_close].end))
}

// ============================================================================
// HOOK LEGADO DE CAPTURA RASA
// ============================================================================

/// Reescreve chamadas rasas `ident.push(x)` / `ident.pop()` para as
/// variantes rastreadas do host. Só receptores que são identificadores
/// simples são tocados (hook raso por contrato); as coleções
/// rastreadas já emitem os próprios passos e as variantes rastreadas
/// não re-capturam sobre elas.
fn rewrite_shallow_captures(source: &str) -> String {
    let tokens = tokenize(source);

    // (início, fim, substituição)
    let mut edits: Vec<(usize, usize, String)> = Vec::new();

    for i in 0..tokens.len() {
        let receiver = match &tokens[i].token {
            Token::Ident(name) => name,
            _ => continue,
        };
        // Não reescrever `a.b.push(...)`: receptor tem que ser raso.
        if i > 0 && tokens[i - 1].token.is_op(".") {
            continue;
        }
        if !matches!(tokens.get(i + 1).map(|s| &s.token), Some(t) if t.is_op(".")) {
            continue;
        }
        let method = match tokens.get(i + 2).map(|s| &s.token) {
            Some(Token::Ident(m)) => m.as_str(),
            _ => continue,
        };
        if !matches!(tokens.get(i + 3).map(|s| &s.token), Some(Token::OpenParen)) {
            continue;
        }

        match method {
            "push" => {
                let empty_args =
                    matches!(tokens.get(i + 4).map(|s| &s.token), Some(Token::CloseParen));
                let replacement = if empty_args {
                    format!("__traced_push({}", receiver)
                } else {
                    format!("__traced_push({}, ", receiver)
                };
                edits.push((tokens[i].start, tokens[i + 3].end, replacement));
            }
            "pop" => {
                if matches!(tokens.get(i + 4).map(|s| &s.token), Some(Token::CloseParen)) {
                    edits.push((
                        tokens[i].start,
                        tokens[i + 4].end,
                        format!("__traced_pop({})", receiver),
                    ));
                }
            }
            _ => {}
        }
    }

    let mut result = String::with_capacity(source.len());
    let mut last = 0usize;
    for (start, end, replacement) in edits {
        result.push_str(&source[last..start]);
        result.push_str(&replacement);
        last = end;
    }
    result.push_str(&source[last..]);
    result
}

// ============================================================================
// TESTES
// ============================================================================
