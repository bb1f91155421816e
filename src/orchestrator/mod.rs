//! # Orquestrador de Testes
//!
//! Compõe tudo: dado `(submissão, desafio, opções)`,
//!
//! 1. Determina o **entry point** (campo explícito do desafio, ou
//!    inferência: nome da solução de referência se a submissão o
//!    define, senão a primeira função da submissão).
//! 2. Seleciona o **bundle de coleções** pelo prefixo do id
//!    (`stack-`/`queue-`/`stackqueue-` incluem pilha E fila; prefixo
//!    desconhecido cai em TrackedArray).
//! 3. Roda o **gate de padrões** quando o desafio declara
//!    `patternRequirement` - rejeição encerra sem subir sandbox.
//! 4. Monta o fonte da sandbox: submissão verbatim, `initialData`
//!    literal, `additionalArgs`, o `input` embrulhado por família,
//!    `result`, `finalResult` (desembrulhado), `steps` e o texto de
//!    assertions com `result` reescrito para `finalResult`.
//! 5. Entrega ao pipeline de captura com o timeout da run.
//! 6. Converte em `TestResult` - mesmo em falha os passos parciais
//!    voltam, para a UI animar o progresso.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{info, instrument};

use crate::collections::CollectionFamily;
use crate::errors::ErrorCode;
use crate::limits::ExecutionLimits;
use crate::patterns::lexer::delimiters_balanced;
use crate::patterns::validate_patterns;
use crate::pipeline::{capture_steps, CaptureRequest};
use crate::protocol::{Challenge, Difficulty, TestResult};
use crate::sandbox::RunCallbacks;
use crate::telemetry::spans::RunSpan;

// ============================================================================
// OPÇÕES
// ============================================================================

/// Opções reconhecidas por run de teste.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Limites da run (timeout, loops, recursão).
    pub limits: ExecutionLimits,
    /// Se os passos capturados entram no resultado.
    pub capture_steps: bool,
    /// Se o console interceptado entra no resultado.
    pub capture_logs: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limits: ExecutionLimits::default(),
            capture_steps: true,
            capture_logs: true,
        }
    }
}

/// Mensagem exibida quando nenhuma função é encontrada na submissão.
pub const NO_ENTRY_POINT_MESSAGE: &str =
    "Could not find a function to test. Please define a function in your code.";

// ============================================================================
// ENTRY POINT
// ============================================================================

static FN_DECL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"fn\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid fn regex"));
static CLOSURE_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:let|const)\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*\|").expect("valid closure regex")
});

/// Entry point resolvido: nome + estilo de chamada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    /// Closures em binding são chamadas via `.call(...)`.
    pub is_closure: bool,
}

/// Primeira função declarada num fonte (declaração ou closure), na
/// ordem do texto.
fn first_function(source: &str) -> Option<EntryPoint> {
    let fn_match = FN_DECL_RE.captures(source).and_then(|c| c.get(1));
    let closure_match = CLOSURE_DECL_RE.captures(source).and_then(|c| c.get(1));

    match (fn_match, closure_match) {
        (Some(f), Some(c)) if c.start() < f.start() => Some(EntryPoint {
            name: c.as_str().to_string(),
            is_closure: true,
        }),
        (Some(f), _) => Some(EntryPoint {
            name: f.as_str().to_string(),
            is_closure: false,
        }),
        (None, Some(c)) => Some(EntryPoint {
            name: c.as_str().to_string(),
            is_closure: true,
        }),
        (None, None) => None,
    }
}

/// Como a submissão declara `name`, se declara.
fn declaration_style(submission: &str, name: &str) -> Option<bool> {
    let fn_re = Regex::new(&format!(r"fn\s+{}\s*\(", regex::escape(name))).ok()?;
    if fn_re.is_match(submission) {
        return Some(false);
    }
    let closure_re =
        Regex::new(&format!(r"(?:let|const)\s+{}\s*=\s*\|", regex::escape(name))).ok()?;
    if closure_re.is_match(submission) {
        return Some(true);
    }
    None
}

/// Resolve o entry point de forma determinística.
///
/// Ordem: nome explícito do desafio; nome inferido da solução de
/// referência quando a submissão o define; primeira função da
/// submissão.
pub fn resolve_entry_point(submission: &str, challenge: &Challenge) -> Option<EntryPoint> {
    if let Some(explicit) = &challenge.entry_point {
        let is_closure = declaration_style(submission, explicit).unwrap_or(false);
        return Some(EntryPoint {
            name: explicit.clone(),
            is_closure,
        });
    }

    if let Some(reference) = first_function(&challenge.reference_solution) {
        if let Some(is_closure) = declaration_style(submission, &reference.name) {
            return Some(EntryPoint {
                name: reference.name,
                is_closure,
            });
        }
    }

    first_function(submission)
}

// ============================================================================
// SELEÇÃO DE BUNDLE
// ============================================================================

/// Bundle de coleções pelo prefixo do id do desafio.
///
/// Total: todo prefixo conhecido tem exatamente um conjunto
/// determinístico; desconhecido cai em TrackedArray. As famílias de
/// pilha e fila se usam mutuamente (fila com duas pilhas, etc.), então
/// `stack-`, `queue-` e `stackqueue-` incluem os dois bundles.
pub fn families_for(challenge_id: &str) -> Vec<CollectionFamily> {
    let prefix = challenge_id.split('-').next().unwrap_or("");
    match prefix {
        "array" => vec![CollectionFamily::Array],
        "linkedlist" => vec![CollectionFamily::LinkedList],
        "stack" | "queue" | "stackqueue" => {
            vec![CollectionFamily::Stack, CollectionFamily::Queue]
        }
        "binarytree" | "tree" => vec![CollectionFamily::BinaryTree],
        "graph" => vec![CollectionFamily::Graph],
        "hashmap" => vec![CollectionFamily::HashMap],
        _ => vec![CollectionFamily::Array],
    }
}

// ============================================================================
// MONTAGEM DO FONTE DA SANDBOX
// ============================================================================

/// Literal da linguagem da sandbox equivalente a um JSON.
/// Objetos viram mapas `#{...}` com chaves entre aspas.
pub fn to_script_literal(value: &Value) -> String {
    match value {
        Value::Null => "()".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                format!("{:?}", n.as_f64().unwrap_or(0.0))
            }
        }
        // Serialização JSON de string é um literal válido na sandbox.
        Value::String(s) => serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(to_script_literal).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(key, value)| {
                    format!(
                        "{}: {}",
                        serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_string()),
                        to_script_literal(value)
                    )
                })
                .collect();
            format!("#{{{}}}", parts.join(", "))
        }
    }
}

/// Expressão de `input` por família: pilha/fila/hashmap recebem o dado
/// cru; grafo constrói via factory; as demais embrulham arrays numa
/// instância rastreada.
fn input_expression(challenge: &Challenge, families: &[CollectionFamily]) -> String {
    let primary = families.first().copied().unwrap_or(CollectionFamily::Array);
    match primary {
        CollectionFamily::Stack | CollectionFamily::Queue | CollectionFamily::HashMap => {
            "initialData".to_string()
        }
        CollectionFamily::Graph => {
            let (vertices, edges, directed) = match &challenge.initial_data {
                Value::Object(map) => (
                    map.get("vertices").cloned().unwrap_or(Value::Array(vec![])),
                    map.get("edges").cloned().unwrap_or(Value::Array(vec![])),
                    map.get("directed").and_then(Value::as_bool).unwrap_or(false),
                ),
                _ => (Value::Array(vec![]), Value::Array(vec![]), false),
            };
            format!(
                "createTrackedGraphFrom({}, {}, {})",
                to_script_literal(&vertices),
                to_script_literal(&edges),
                directed
            )
        }
        CollectionFamily::Array => wrap_if_array(challenge, "createTrackedArray"),
        CollectionFamily::LinkedList => wrap_if_array(challenge, "createTrackedLinkedList"),
        CollectionFamily::BinaryTree => wrap_if_array(challenge, "createTrackedBinaryTree"),
    }
}

fn wrap_if_array(challenge: &Challenge, factory: &str) -> String {
    if challenge.initial_data.is_array() {
        format!("{}(initialData)", factory)
    } else {
        "initialData".to_string()
    }
}

static RESULT_IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bresult\b").expect("valid result regex"));

/// Monta o fonte completo da sandbox na ordem do contrato:
/// submissão → dados → input → result → finalResult → steps →
/// assertions (com `result` reescrito para `finalResult`).
pub fn assemble_source(
    submission: &str,
    challenge: &Challenge,
    entry: &EntryPoint,
    families: &[CollectionFamily],
) -> String {
    let mut source = String::with_capacity(submission.len() + 512);
    source.push_str(submission);
    source.push_str("\n\n");

    source.push_str(&format!(
        "let initialData = {};\n",
        to_script_literal(&challenge.initial_data)
    ));
    source.push_str(&format!(
        "let additionalArgs = {};\n",
        to_script_literal(&Value::Array(challenge.additional_args.clone()))
    ));
    source.push_str(&format!(
        "let input = {};\n",
        input_expression(challenge, families)
    ));

    let mut call_args = vec!["input".to_string()];
    for index in 0..challenge.additional_args.len() {
        call_args.push(format!("additionalArgs[{}]", index));
    }
    let call = if entry.is_closure {
        format!("{}.call({})", entry.name, call_args.join(", "))
    } else {
        format!("{}({})", entry.name, call_args.join(", "))
    };
    source.push_str(&format!("let result = {};\n", call));
    source.push_str("let finalResult = __unwrap(result);\n");
    source.push_str("let steps = __captured_steps();\n");

    let assertions = RESULT_IDENT_RE.replace_all(&challenge.assertions, "finalResult");
    source.push_str(&assertions);
    source.push('\n');

    source
}

// ============================================================================
// EXECUÇÃO DE TESTES
// ============================================================================

fn failed_result(challenge: &Challenge, error: impl Into<String>) -> TestResult {
    TestResult {
        test_id: challenge.id.clone(),
        passed: false,
        error: Some(error.into()),
        execution_time: 0,
        steps: Vec::new(),
        console_logs: Vec::new(),
    }
}

/// Executa uma submissão contra um desafio.
#[instrument(skip(submission, challenge, options), fields(challenge_id = %challenge.id))]
pub async fn run_test(
    submission: &str,
    challenge: &Challenge,
    options: &RunOptions,
) -> TestResult {
    // 1. Entry point.
    let entry = match resolve_entry_point(submission, challenge) {
        Some(entry) => entry,
        None => return failed_result(challenge, NO_ENTRY_POINT_MESSAGE),
    };

    // 2. Bundle.
    let families = families_for(&challenge.id);

    // 3. Gate de padrões: rejeição encerra sem subir sandbox.
    if let Some(requirement) = &challenge.pattern_requirement {
        let validation = validate_patterns(submission, requirement);
        if !validation.valid {
            info!(challenge_id = %challenge.id, "Pattern requirement rejected submission");
            return failed_result(
                challenge,
                validation
                    .error
                    .unwrap_or_else(|| requirement.error_message.clone()),
            );
        }
    }

    // 4. Montagem do fonte.
    let source = assemble_source(submission, challenge, &entry, &families);

    // 5. Pipeline com o timeout da run, sob o span lógico da run.
    let span = RunSpan::begin(&challenge.id);
    let request = CaptureRequest {
        code: source,
        limits: options.limits.clone(),
        families,
        capture_logs: options.capture_logs,
    };
    let capture = capture_steps(request, RunCallbacks::default()).await;

    let error_code = capture
        .error
        .as_deref()
        .map(|error| ErrorCode::classify(error).formatted());
    span.complete(capture.success, capture.steps.len(), error_code.as_deref());

    // 6. TestResult; passos parciais sobrevivem à falha.
    TestResult {
        test_id: challenge.id.clone(),
        passed: capture.success,
        error: capture.error,
        execution_time: capture.execution_time,
        steps: if options.capture_steps {
            capture.steps
        } else {
            Vec::new()
        },
        console_logs: capture.console_logs,
    }
}

/// Executa todos os desafios em sequência.
pub async fn run_tests(
    submission: &str,
    challenges: &[Challenge],
    options: &RunOptions,
) -> Vec<TestResult> {
    let mut results = Vec::with_capacity(challenges.len());
    for challenge in challenges {
        results.push(run_test(submission, challenge, options).await);
    }
    results
}

/// Executa só os desafios da dificuldade pedida, em sequência.
pub async fn run_tests_by_difficulty(
    submission: &str,
    challenges: &[Challenge],
    difficulty: Difficulty,
    options: &RunOptions,
) -> Vec<TestResult> {
    let filtered: Vec<Challenge> = challenges
        .iter()
        .filter(|challenge| challenge.difficulty == difficulty)
        .cloned()
        .collect();
    run_tests(submission, &filtered, options).await
}

// ============================================================================
// PRÉ-VOO DA SUBMISSÃO
// ============================================================================

/// Resultado do pré-voo de uma submissão.
#[derive(Debug, Clone, PartialEq)]
pub struct UserCodeValidation {
    pub valid: bool,
    pub error: Option<String>,
}

/// Pré-voo barato para a UI: não-vazia, tem alguma função,
/// delimitadores balanceados.
pub fn validate_user_code(submission: &str) -> UserCodeValidation {
    if submission.trim().is_empty() {
        return UserCodeValidation {
            valid: false,
            error: Some("Your code is empty. Please write a solution.".to_string()),
        };
    }

    if first_function(submission).is_none() {
        return UserCodeValidation {
            valid: false,
            error: Some(NO_ENTRY_POINT_MESSAGE.to_string()),
        };
    }

    if !delimiters_balanced(submission) {
        return UserCodeValidation {
            valid: false,
            error: Some(
                "Syntax error: unbalanced braces, brackets or parentheses".to_string(),
            ),
        };
    }

    UserCodeValidation {
        valid: true,
        error: None,
    }
}

// ============================================================================
// TESTES
// ============================================================================
